use crate::core::metadata::Metadata;
use crate::core::realm::Realm;
use crate::core::scope::Scope;
use crate::core::side_effects::SideEffectTable;
use crate::core::token::{Span, source_slice};
use crate::core::value::JSObjectDataPtr;
use crate::{JSError, raise_side_effect};
use std::rc::Rc;
use std::time::{Duration, Instant};

pub const DEFAULT_FILENAME: &str = "<console>";

/// Text and name of a piece of evaluated source.
#[derive(Debug)]
pub struct SourceInfo {
    pub text: Rc<str>,
    pub filename: Rc<str>,
}

impl SourceInfo {
    pub fn new(text: &str, filename: &str) -> Rc<SourceInfo> {
        Rc::new(SourceInfo {
            text: text.into(),
            filename: filename.into(),
        })
    }

    pub fn slice(&self, span: Span) -> &str {
        source_slice(&self.text, &span)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// Host hooks observing an evaluation.
pub trait DebugSink {
    /// Called before each statement executes.
    fn statement(&self, _source: &SourceInfo, _span: Span) {}

    /// Called when a `debugger` statement executes.
    fn debugger(&self, _source: &SourceInfo, _span: Span) {}

    /// Receives `console.*` output.
    fn console(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Error => log::error!("{message}"),
            ConsoleLevel::Warn => log::warn!("{message}"),
            ConsoleLevel::Debug => log::debug!("{message}"),
            ConsoleLevel::Log | ConsoleLevel::Info => log::info!("{message}"),
        }
    }
}

/// Forwards console output to the `log` facade.
pub struct LogSink;

impl DebugSink for LogSink {}

#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    pub started: Instant,
    pub limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Deadline {
            started: Instant::now(),
            limit,
        }
    }

    pub fn instant(&self) -> Instant {
        self.started + self.limit
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.instant()
    }
}

/// Everything an evaluation step needs besides the syntax node and scope.
///
/// Closures do not capture a context: calling one derives a new context
/// from the caller's, so dry-run checks, deadlines and debug hooks follow
/// the evaluation that is running, not the one that created the function.
#[derive(Clone)]
pub struct Context {
    pub source: Rc<SourceInfo>,
    pub strict: bool,
    pub realm: Rc<Realm>,
    pub global_scope: Rc<Scope>,
    pub metadata: Rc<Metadata>,
    /// `Some` while evaluating without side effects.
    pub side_effects: Option<Rc<SideEffectTable>>,
    /// Objects and scopes with an identity below this predate the evaluation.
    pub watermark: u64,
    pub debug: Option<Rc<dyn DebugSink>>,
    pub deadline: Option<Deadline>,
}

impl Context {
    pub fn with_source(self: &Rc<Self>, source: &Rc<SourceInfo>, strict: bool) -> Rc<Context> {
        if Rc::ptr_eq(&self.source, source) && self.strict == strict {
            return self.clone();
        }
        Rc::new(Context {
            source: source.clone(),
            strict,
            ..(**self).clone()
        })
    }

    pub fn with_strict(self: &Rc<Self>, strict: bool) -> Rc<Context> {
        let source = self.source.clone();
        self.with_source(&source, strict)
    }

    pub fn is_dry_run(&self) -> bool {
        self.side_effects.is_some()
    }

    pub fn is_temporary(&self, id: u64) -> bool {
        id >= self.watermark
    }

    /// Refuses to mutate an object that existed before a dry run started.
    pub fn check_object_write(&self, obj: &JSObjectDataPtr, what: &str) -> Result<(), JSError> {
        if self.is_dry_run() && !self.is_temporary(obj.borrow().id) {
            return Err(raise_side_effect!("{what} on an object that outlives the evaluation"));
        }
        Ok(())
    }

    /// Refuses to assign a binding of a scope that existed before a dry run started.
    pub fn check_scope_write(&self, scope: &Scope, name: &str) -> Result<(), JSError> {
        if self.is_dry_run() && !self.is_temporary(scope.id) {
            return Err(raise_side_effect!("assignment to '{name}' declared outside the evaluation"));
        }
        Ok(())
    }

    /// Fails once the deadline passed or the host requested an interrupt.
    pub fn check_interrupts(&self) -> Result<(), JSError> {
        if self.realm.interrupt.is_interrupted() {
            return Err(JSError::Interrupted);
        }
        if let Some(deadline) = &self.deadline
            && deadline.expired()
        {
            return Err(JSError::Timeout {
                millis: deadline.limit.as_millis(),
            });
        }
        Ok(())
    }

    /// Records the position of the statement or call about to run.
    pub fn at(&self, span: Span) {
        self.realm.call_stack.set_position(span.line, span.column);
    }

    pub fn console(&self, level: ConsoleLevel, message: &str) {
        match &self.debug {
            Some(sink) => sink.console(level, message),
            None => LogSink.console(level, message),
        }
    }
}
