use crate::core::call_stack::{CallStack, DEFAULT_MAX_CALL_DEPTH};
use crate::core::callable::{Callable, NativeFunction};
use crate::core::context::{Context, DEFAULT_FILENAME, SourceInfo};
use crate::core::interrupt::InterruptHandle;
use crate::core::metadata::Metadata;
use crate::core::scope::Scope;
use crate::core::side_effects::SideEffectTable;
use crate::core::token::TemplateQuasi;
use crate::core::trampoline::Executor;
use crate::core::value::{JSObjectDataPtr, ObjectKind, SymbolData, Value, new_object, new_object_with_kind};
use crate::js_promise::Job;
use crate::js_timers::TimerQueue;
use crate::JSError;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

pub struct WellKnownSymbols {
    pub iterator: Rc<SymbolData>,
    pub async_iterator: Rc<SymbolData>,
    pub has_instance: Rc<SymbolData>,
    pub to_primitive: Rc<SymbolData>,
    pub to_string_tag: Rc<SymbolData>,
    pub species: Rc<SymbolData>,
}

impl WellKnownSymbols {
    fn new() -> Self {
        let make = |name: &str| SymbolData::new(Some(format!("Symbol.{name}").into()));
        WellKnownSymbols {
            iterator: make("iterator"),
            async_iterator: make("asyncIterator"),
            has_instance: make("hasInstance"),
            to_primitive: make("toPrimitive"),
            to_string_tag: make("toStringTag"),
            species: make("species"),
        }
    }

    /// `(property name on Symbol, symbol)` pairs.
    pub fn all(&self) -> [(&'static str, &Rc<SymbolData>); 6] {
        [
            ("iterator", &self.iterator),
            ("asyncIterator", &self.async_iterator),
            ("hasInstance", &self.has_instance),
            ("toPrimitive", &self.to_primitive),
            ("toStringTag", &self.to_string_tag),
            ("species", &self.species),
        ]
    }
}

/// Prototype objects the engine needs to reach without a global lookup.
pub struct Intrinsics {
    pub object_prototype: JSObjectDataPtr,
    pub function_prototype: JSObjectDataPtr,
    pub array_prototype: JSObjectDataPtr,
    pub string_prototype: JSObjectDataPtr,
    pub number_prototype: JSObjectDataPtr,
    pub boolean_prototype: JSObjectDataPtr,
    pub symbol_prototype: JSObjectDataPtr,
    pub error_prototype: JSObjectDataPtr,
    pub promise_prototype: JSObjectDataPtr,
    pub map_prototype: JSObjectDataPtr,
    pub set_prototype: JSObjectDataPtr,
    pub weak_map_prototype: JSObjectDataPtr,
    pub weak_set_prototype: JSObjectDataPtr,
    pub weak_ref_prototype: JSObjectDataPtr,
    pub iterator_prototype: JSObjectDataPtr,
    pub array_iterator_prototype: JSObjectDataPtr,
    pub string_iterator_prototype: JSObjectDataPtr,
    pub map_iterator_prototype: JSObjectDataPtr,
    pub set_iterator_prototype: JSObjectDataPtr,
    native_error_prototypes: HashMap<&'static str, JSObjectDataPtr>,
    pub symbols: WellKnownSymbols,
}

pub const NATIVE_ERROR_NAMES: [&str; 6] = ["TypeError", "RangeError", "ReferenceError", "SyntaxError", "EvalError", "URIError"];

impl Intrinsics {
    fn new() -> Self {
        let object_prototype = new_object(None);
        let noop = NativeFunction {
            name: "".into(),
            call: Rc::new(|_, _, _| Ok(Value::Undefined)),
            construct: None,
        };
        let function_prototype = new_object_with_kind(Some(&object_prototype), ObjectKind::Function(Callable::Native(Rc::new(noop))));
        let ordinary = || new_object(Some(&object_prototype));
        let array_prototype = new_object_with_kind(Some(&object_prototype), ObjectKind::Array);
        array_prototype.borrow_mut().insert_data("length", Value::Number(0.0), true, false, false);
        let iterator_prototype = ordinary();
        let error_prototype = ordinary();
        let native_error_prototypes = NATIVE_ERROR_NAMES
            .iter()
            .map(|name| (*name, new_object(Some(&error_prototype))))
            .collect();
        Intrinsics {
            function_prototype,
            array_prototype,
            string_prototype: new_object_with_kind(Some(&object_prototype), ObjectKind::String("".into())),
            number_prototype: new_object_with_kind(Some(&object_prototype), ObjectKind::Number(0.0)),
            boolean_prototype: new_object_with_kind(Some(&object_prototype), ObjectKind::Boolean(false)),
            symbol_prototype: ordinary(),
            promise_prototype: ordinary(),
            map_prototype: ordinary(),
            set_prototype: ordinary(),
            weak_map_prototype: ordinary(),
            weak_set_prototype: ordinary(),
            weak_ref_prototype: ordinary(),
            array_iterator_prototype: new_object(Some(&iterator_prototype)),
            string_iterator_prototype: new_object(Some(&iterator_prototype)),
            map_iterator_prototype: new_object(Some(&iterator_prototype)),
            set_iterator_prototype: new_object(Some(&iterator_prototype)),
            iterator_prototype,
            error_prototype,
            native_error_prototypes,
            symbols: WellKnownSymbols::new(),
            object_prototype,
        }
    }

    /// Prototype for instances of the named error constructor (`"Error"` included).
    pub fn error_prototype_for(&self, name: &str) -> JSObjectDataPtr {
        self.native_error_prototypes
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.error_prototype.clone())
    }
}

/// A global object with its built-ins and the machinery that runs code against it.
///
/// Reusing one realm across [`crate::evaluate`] calls keeps global bindings,
/// pending timers and registries alive between entries, as a console does.
pub struct Realm {
    pub global_object: JSObjectDataPtr,
    pub intrinsics: Intrinsics,
    pub global_scope: Rc<Scope>,
    pub metadata: Rc<Metadata>,
    pub side_effect_table: Rc<SideEffectTable>,
    pub call_stack: CallStack,
    pub jobs: RefCell<VecDeque<Job>>,
    pub timers: RefCell<TimerQueue>,
    pub executor: Executor,
    pub interrupt: InterruptHandle,
    pub symbol_registry: RefCell<HashMap<Rc<str>, Rc<SymbolData>>>,
    /// Template objects of tagged templates, keyed by call site. The quasis
    /// are kept alive so a site's address is never reused by another one.
    pub template_objects: RefCell<HashMap<usize, (Rc<Vec<TemplateQuasi>>, JSObjectDataPtr)>>,
    /// Promises rejected while nothing handled them, checked after each microtask checkpoint.
    rejections: RefCell<Vec<JSObjectDataPtr>>,
    fatal: RefCell<Option<JSError>>,
}

impl Realm {
    pub fn new() -> Rc<Realm> {
        let intrinsics = Intrinsics::new();
        let global = new_object(Some(&intrinsics.object_prototype));
        Self::build(intrinsics, global)
    }

    /// Installs the built-ins onto a caller-supplied global object.
    pub fn with_global_object(global: JSObjectDataPtr) -> Rc<Realm> {
        let intrinsics = Intrinsics::new();
        {
            let mut g = global.borrow_mut();
            if g.prototype.is_none() {
                g.prototype = Some(intrinsics.object_prototype.clone());
            }
        }
        Self::build(intrinsics, global)
    }

    fn build(intrinsics: Intrinsics, global: JSObjectDataPtr) -> Rc<Realm> {
        install_globals(&intrinsics, &global);
        let side_effect_table = SideEffectTable::with_defaults(&global, &intrinsics);
        log::debug!("realm created, global object #{}", global.borrow().id);
        Rc::new(Realm {
            global_scope: Scope::new_global(global.clone()),
            global_object: global,
            intrinsics,
            metadata: Rc::new(Metadata::new()),
            side_effect_table: Rc::new(side_effect_table),
            call_stack: CallStack::new(DEFAULT_MAX_CALL_DEPTH),
            jobs: RefCell::new(VecDeque::new()),
            timers: RefCell::new(TimerQueue::default()),
            executor: Executor::new(),
            interrupt: InterruptHandle::new(),
            symbol_registry: RefCell::new(HashMap::new()),
            template_objects: RefCell::new(HashMap::new()),
            rejections: RefCell::new(Vec::new()),
            fatal: RefCell::new(None),
        })
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn set_max_call_depth(&self, depth: usize) {
        self.call_stack.set_max_depth(depth);
    }

    /// Context for host-initiated work (jobs, timers) outside any evaluation.
    pub fn base_context(self: &Rc<Self>) -> Rc<Context> {
        Rc::new(Context {
            source: SourceInfo::new("", DEFAULT_FILENAME),
            strict: false,
            realm: self.clone(),
            global_scope: self.global_scope.clone(),
            metadata: self.metadata.clone(),
            side_effects: None,
            watermark: 0,
            debug: None,
            deadline: None,
        })
    }

    pub fn enqueue_job(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
    }

    /// Records an engine condition raised where it cannot propagate directly,
    /// such as inside a task poll. The first one wins.
    pub fn set_fatal(&self, err: JSError) {
        let mut fatal = self.fatal.borrow_mut();
        if fatal.is_none() {
            *fatal = Some(err);
        }
    }

    pub fn take_fatal(&self) -> Option<JSError> {
        self.fatal.borrow_mut().take()
    }

    pub fn track_rejection(&self, promise: &JSObjectDataPtr) {
        self.rejections.borrow_mut().push(promise.clone());
    }

    pub fn take_tracked_rejections(&self) -> Vec<JSObjectDataPtr> {
        std::mem::take(&mut *self.rejections.borrow_mut())
    }

    pub(crate) fn tracked_rejection_count(&self) -> usize {
        self.rejections.borrow().len()
    }

    /// Forgets rejections recorded after the first `len`.
    pub(crate) fn truncate_tracked_rejections(&self, len: usize) {
        self.rejections.borrow_mut().truncate(len);
    }

    /// True while jobs, runnable tasks or timers remain.
    pub fn has_pending_work(&self) -> bool {
        !self.jobs.borrow().is_empty() || self.executor.has_ready() || !self.timers.borrow().is_empty()
    }

    /// Runs queued jobs and any timers that fall due until nothing is left,
    /// sleeping between timers.
    pub fn run_event_loop(self: &Rc<Self>) -> Result<(), JSError> {
        crate::core::trampoline::run_event_loop(&self.base_context())
    }
}

fn install_globals(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    crate::js_object::initialize_object(intrinsics, global);
    crate::js_function::initialize_function(intrinsics, global);
    crate::js_array::initialize_array(intrinsics, global);
    crate::js_iterator::initialize_iterators(intrinsics, global);
    crate::js_string::initialize_string(intrinsics, global);
    crate::js_number::initialize_number(intrinsics, global);
    crate::js_boolean::initialize_boolean(intrinsics, global);
    crate::js_symbol::initialize_symbol(intrinsics, global);
    crate::js_math::initialize_math(intrinsics, global);
    crate::js_json::initialize_json(intrinsics, global);
    crate::core::js_error::initialize_error(intrinsics, global);
    crate::js_promise::initialize_promise(intrinsics, global);
    crate::js_proxy::initialize_proxy(intrinsics, global);
    crate::js_reflect::initialize_reflect(intrinsics, global);
    crate::js_map::initialize_map(intrinsics, global);
    crate::js_set::initialize_set(intrinsics, global);
    crate::js_weakmap::initialize_weakmap(intrinsics, global);
    crate::js_weakset::initialize_weakset(intrinsics, global);
    crate::js_weakref::initialize_weakref(intrinsics, global);
    crate::js_console::initialize_console(intrinsics, global);
    crate::js_timers::initialize_timers(intrinsics, global);
    let mut g = global.borrow_mut();
    g.insert_builtin("globalThis", Value::Object(global.clone()));
    g.insert_builtin("global", Value::Object(global.clone()));
    g.insert_data("undefined", Value::Undefined, false, false, false);
    g.insert_data("NaN", Value::Number(f64::NAN), false, false, false);
    g.insert_data("Infinity", Value::Number(f64::INFINITY), false, false, false);
}
