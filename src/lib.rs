//! An embeddable JavaScript evaluator for interactive consoles.
//!
//! [`evaluate`] parses and runs a script against a [`Realm`]. A script that
//! never suspends completes synchronously; one that reaches a top-level
//! `await` on a pending promise comes back as a [`PendingEvaluation`] the
//! host drives to completion. Evaluations can run as dry runs that abort
//! with [`JSError::PossibleSideEffect`] instead of mutating anything that
//! existed before they started.

pub(crate) mod core;
pub(crate) mod error;
pub(crate) mod js_array;
pub(crate) mod js_async;
pub(crate) mod js_boolean;
pub(crate) mod js_class;
pub(crate) mod js_console;
pub(crate) mod js_function;
pub(crate) mod js_iterator;
pub(crate) mod js_json;
pub(crate) mod js_map;
pub(crate) mod js_math;
pub(crate) mod js_number;
pub(crate) mod js_object;
pub(crate) mod js_promise;
pub(crate) mod js_proxy;
pub(crate) mod js_reflect;
pub(crate) mod js_set;
pub(crate) mod js_string;
pub(crate) mod js_symbol;
pub(crate) mod js_timers;
pub(crate) mod js_weakmap;
pub(crate) mod js_weakref;
pub(crate) mod js_weakset;
pub mod repl;
pub(crate) mod timer_thread;
pub(crate) mod unicode;

use crate::core::call_stack::StackFrame;
use crate::core::context::{Context, DEFAULT_FILENAME, Deadline};
use crate::core::eval::evaluate_program;
use crate::core::js_error::{into_uncaught, on_frame_exit};
use crate::core::scope::FunctionFrame;
use crate::core::trampoline::{ResultSlot, run_microtasks};
use crate::core::value::identity_watermark;
use futures::FutureExt;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub use crate::core::context::{ConsoleLevel, DebugSink, LogSink, SourceInfo};
pub use crate::core::inspector::{FunctionInfo, PromiseInfo, ProxyInfo, WeakCollectionEntry};
pub use crate::core::interrupt::InterruptHandle;
pub use crate::core::metadata::Metadata;
pub use crate::core::scope::Scope;
pub use crate::core::side_effects::{SideEffectFlags, SideEffectTable};
pub use crate::core::statement::Program;
pub use crate::core::token::{Span, TokenData, tokenize};
pub use crate::core::trampoline::PendingEvaluation;
pub use crate::core::{JSObjectData, JSObjectDataPtr, ObjectKind, PropertyKey, Realm, Value, parse_program};
pub use crate::error::JSError;
pub use crate::js_console::{display_value, format_value};
pub use crate::js_promise::PromiseState;
pub use crate::repl::Repl;

/// Settings of one [`evaluate`] call.
///
/// Everything left unset comes from the realm, so passing the same realm to
/// successive calls is enough to keep global bindings alive between them.
#[derive(Clone)]
pub struct EvaluateOptions {
    realm: Option<Rc<Realm>>,
    global_object: Option<JSObjectDataPtr>,
    global_scope: Option<Rc<Scope>>,
    metadata: Option<Rc<Metadata>>,
    side_effect_table: Option<Rc<SideEffectTable>>,
    throw_on_side_effect: bool,
    timeout: Option<Duration>,
    debug_sink: Option<Rc<dyn DebugSink>>,
    filename: String,
    strict: bool,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        EvaluateOptions {
            realm: None,
            global_object: None,
            global_scope: None,
            metadata: None,
            side_effect_table: None,
            throw_on_side_effect: false,
            timeout: None,
            debug_sink: None,
            filename: DEFAULT_FILENAME.to_string(),
            strict: false,
        }
    }
}

impl EvaluateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn realm(mut self, realm: Rc<Realm>) -> Self {
        self.realm = Some(realm);
        self
    }

    /// Installs the built-ins onto `global` and evaluates against it.
    /// Ignored when a realm is given.
    pub fn global_object(mut self, global: JSObjectDataPtr) -> Self {
        self.global_object = Some(global);
        self
    }

    pub fn global_scope(mut self, scope: Rc<Scope>) -> Self {
        self.global_scope = Some(scope);
        self
    }

    pub fn metadata(mut self, metadata: Rc<Metadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Table consulted by dry runs; defaults to the realm's.
    pub fn side_effect_table(mut self, table: Rc<SideEffectTable>) -> Self {
        self.side_effect_table = Some(table);
        self
    }

    pub fn throw_on_side_effect(mut self, enabled: bool) -> Self {
        self.throw_on_side_effect = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn debug_sink(mut self, sink: Rc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Reads `timeoutMillis`, `throwOnSideEffect`, `filename` and `strict`
    /// from a JSON object. Unknown keys are ignored.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, JSError> {
        let Some(map) = json.as_object() else {
            return Err(raise_type_error!("evaluation options must be a JSON object"));
        };
        let mut options = Self::default();
        if let Some(v) = map.get("timeoutMillis").filter(|v| !v.is_null()) {
            let millis = v
                .as_u64()
                .ok_or_else(|| raise_type_error!("timeoutMillis must be a non-negative integer"))?;
            options.timeout = Some(Duration::from_millis(millis));
        }
        if let Some(v) = map.get("throwOnSideEffect") {
            options.throw_on_side_effect = v.as_bool().ok_or_else(|| raise_type_error!("throwOnSideEffect must be a boolean"))?;
        }
        if let Some(v) = map.get("filename") {
            options.filename = v
                .as_str()
                .ok_or_else(|| raise_type_error!("filename must be a string"))?
                .to_string();
        }
        if let Some(v) = map.get("strict") {
            options.strict = v.as_bool().ok_or_else(|| raise_type_error!("strict must be a boolean"))?;
        }
        Ok(options)
    }
}

impl std::fmt::Debug for EvaluateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluateOptions")
            .field("throw_on_side_effect", &self.throw_on_side_effect)
            .field("timeout", &self.timeout)
            .field("filename", &self.filename)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationOutput {
    pub value: Value,
}

/// What [`evaluate`] returns: a finished result, or a program parked at a
/// top-level `await`.
#[derive(Debug)]
pub enum Evaluation {
    Complete(EvaluationOutput),
    Pending(PendingEvaluation),
}

impl Evaluation {
    pub fn is_pending(&self) -> bool {
        matches!(self, Evaluation::Pending(_))
    }

    /// The completion value, blocking on a pending evaluation.
    pub fn into_value(self) -> Result<Value, JSError> {
        match self {
            Evaluation::Complete(output) => Ok(output.value),
            Evaluation::Pending(pending) => pending.run_to_completion(),
        }
    }
}

/// Queue positions recorded before a dry run, so work it scheduled on
/// temporaries can be dropped afterwards.
struct DryRunMarks {
    jobs: usize,
    first_timer: u64,
    rejections: usize,
}

impl DryRunMarks {
    fn record(realm: &Realm) -> Self {
        DryRunMarks {
            jobs: realm.jobs.borrow().len(),
            first_timer: realm.timers.borrow().peek_id(),
            rejections: realm.tracked_rejection_count(),
        }
    }

    fn discard(&self, realm: &Realm) {
        realm.jobs.borrow_mut().truncate(self.jobs);
        realm.timers.borrow_mut().discard_from(self.first_timer);
        realm.truncate_tracked_rejections(self.rejections);
    }
}

/// Parses and runs `source`.
///
/// Syntax errors and uncaught exceptions come back as `Err`, the latter as
/// [`JSError::Thrown`] carrying the thrown value with its stack attached.
/// Timeouts, interrupts, dry-run aborts and unsupported constructs come back
/// as their own variants and are never observable by the script.
pub fn evaluate(source: &str, options: EvaluateOptions) -> Result<Evaluation, JSError> {
    let program = Rc::new(parse_program(source)?);
    let realm = match (options.realm, options.global_object) {
        (Some(realm), _) => realm,
        (None, Some(global)) => Realm::with_global_object(global),
        (None, None) => Realm::new(),
    };
    realm.interrupt.clear();
    let dry_run = options.throw_on_side_effect;
    let global_scope = options.global_scope.unwrap_or_else(|| realm.global_scope.clone());
    let ctx = Rc::new(Context {
        source: SourceInfo::new(source, &options.filename),
        strict: options.strict || program.strict,
        realm: realm.clone(),
        global_scope: global_scope.clone(),
        metadata: options.metadata.unwrap_or_else(|| realm.metadata.clone()),
        side_effects: dry_run.then(|| options.side_effect_table.unwrap_or_else(|| realm.side_effect_table.clone())),
        watermark: identity_watermark(),
        debug: options.debug_sink,
        deadline: options.timeout.map(Deadline::after),
    });
    log::debug!(
        "evaluating {} ({} statement(s), dry run: {dry_run}, timeout: {:?})",
        ctx.source.filename,
        program.body.len(),
        options.timeout
    );

    // Declarations of a dry run land in a throwaway function scope.
    let scope = if dry_run {
        Scope::new_function(
            &global_scope,
            FunctionFrame {
                this: RefCell::new(Some(Value::Object(realm.global_object.clone()))),
                new_target: Value::Undefined,
                function: None,
                home_object: None,
                is_arrow: false,
            },
        )
    } else {
        global_scope
    };
    let marks = dry_run.then(|| DryRunMarks::record(&realm));

    let slot: ResultSlot = Rc::new(RefCell::new(None));
    let body = {
        let ctx = ctx.clone();
        let slot = slot.clone();
        let program = program.clone();
        async move {
            let result = evaluate_program(&ctx, &scope, &program).await;
            let result = result.map_err(|e| into_uncaught(&ctx, on_frame_exit(&ctx, e)));
            *slot.borrow_mut() = Some(result);
        }
    };
    let frame = StackFrame::source("".into(), None, ctx.source.filename.clone(), 1, 1);
    let spawned = realm.executor.spawn_now(&realm, frame, body.boxed_local());
    if let Some(marks) = &marks {
        marks.discard(&realm);
    }
    spawned?;
    if let Some(fatal) = realm.take_fatal() {
        return Err(fatal);
    }

    let finished = slot.borrow_mut().take();
    match finished {
        Some(result) => {
            let value = result?;
            if !dry_run {
                run_microtasks(&ctx)?;
            }
            Ok(Evaluation::Complete(EvaluationOutput { value }))
        }
        None => {
            log::debug!("evaluation suspended at a top-level await");
            Ok(Evaluation::Pending(PendingEvaluation::new(ctx, slot)))
        }
    }
}

/// Evaluates `source` in a fresh realm and waits for the result.
pub fn evaluate_to_value(source: &str) -> Result<Value, JSError> {
    evaluate(source, EvaluateOptions::default())?.into_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_json() {
        let json = serde_json::json!({ "timeoutMillis": 25, "throwOnSideEffect": true, "filename": "a.js", "strict": true });
        let options = EvaluateOptions::from_json(&json).unwrap();
        assert_eq!(options.timeout, Some(Duration::from_millis(25)));
        assert!(options.throw_on_side_effect);
        assert_eq!(options.filename, "a.js");
        assert!(options.strict);
    }

    #[test]
    fn options_from_json_rejects_bad_types() {
        assert!(EvaluateOptions::from_json(&serde_json::json!({ "timeoutMillis": -1 })).is_err());
        assert!(EvaluateOptions::from_json(&serde_json::json!([])).is_err());
        let defaults = EvaluateOptions::from_json(&serde_json::json!({})).unwrap();
        assert_eq!(defaults.filename, DEFAULT_FILENAME);
        assert!(defaults.timeout.is_none());
    }
}
