use crate::core::context::{ConsoleLevel, Context};
use crate::core::conversion::value_description;
use crate::core::js_error::{EvalError, EvalResult, create_error, describe_thrown, into_thrown_value};
use crate::core::property::{get_property, get_value};
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, new_object, new_object_with_kind, same_value};
use crate::js_array::create_array;
use crate::js_function::{
    arg, call_function, construct, define_getter, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor,
    new_native_function,
};
use crate::js_iterator::get_iterator;
use crate::{JSError, raise_type_error};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

impl PromiseState {
    pub fn name(&self) -> &'static str {
        match self {
            PromiseState::Pending => "pending",
            PromiseState::Fulfilled(_) => "fulfilled",
            PromiseState::Rejected(_) => "rejected",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReactionKind {
    Fulfill,
    Reject,
}

/// A promise together with the functions that settle it.
#[derive(Clone)]
pub struct PromiseCapability {
    pub promise: Value,
    pub resolve: Value,
    pub reject: Value,
}

#[derive(Clone)]
pub struct PromiseReaction {
    capability: Option<PromiseCapability>,
    kind: ReactionKind,
    handler: Value,
}

/// `[[PromiseState]]` and the reaction lists of a promise object.
pub struct PromiseData {
    pub state: PromiseState,
    fulfill_reactions: Vec<PromiseReaction>,
    reject_reactions: Vec<PromiseReaction>,
    pub handled: bool,
}

impl Default for PromiseData {
    fn default() -> Self {
        PromiseData {
            state: PromiseState::Pending,
            fulfill_reactions: Vec::new(),
            reject_reactions: Vec::new(),
            handled: false,
        }
    }
}

/// A unit of work on the microtask queue.
pub enum Job {
    Reaction { reaction: PromiseReaction, argument: Value },
    ResolveThenable { promise: JSObjectDataPtr, thenable: Value, then: Value },
    /// `queueMicrotask` callback.
    Callback { callback: Value },
}

pub fn is_promise(obj: &JSObjectDataPtr) -> bool {
    matches!(obj.borrow().kind, ObjectKind::Promise(_))
}

/// A pending promise whose prototype is `proto`.
pub fn new_promise_with_prototype(proto: &JSObjectDataPtr) -> JSObjectDataPtr {
    new_object_with_kind(Some(proto), ObjectKind::Promise(PromiseData::default()))
}

pub fn new_promise(ctx: &Rc<Context>) -> JSObjectDataPtr {
    new_promise_with_prototype(&ctx.realm.intrinsics.promise_prototype)
}

/// `CreateResolvingFunctions`.
fn create_resolving_functions(ctx: &Rc<Context>, promise: &JSObjectDataPtr) -> (JSObjectDataPtr, JSObjectDataPtr) {
    let intrinsics = &ctx.realm.intrinsics;
    let already_resolved = Rc::new(Cell::new(false));
    let resolve = {
        let promise = promise.clone();
        let already_resolved = already_resolved.clone();
        new_native_function(intrinsics, "", 1, move |ctx, _this, args| {
            if already_resolved.replace(true) {
                return Ok(Value::Undefined);
            }
            resolve_promise(ctx, &promise, arg(args, 0))?;
            Ok(Value::Undefined)
        })
    };
    let reject = {
        let promise = promise.clone();
        new_native_function(intrinsics, "", 1, move |ctx, _this, args| {
            if already_resolved.replace(true) {
                return Ok(Value::Undefined);
            }
            reject_promise(ctx, &promise, arg(args, 0))?;
            Ok(Value::Undefined)
        })
    };
    (resolve, reject)
}

/// The body of a promise resolve function: adopts thenables, fulfills with anything else.
pub fn resolve_promise(ctx: &Rc<Context>, promise: &JSObjectDataPtr, resolution: Value) -> EvalResult<()> {
    if let Value::Object(obj) = &resolution {
        if Rc::ptr_eq(obj, promise) {
            let error = create_error(ctx, "TypeError", "Chaining cycle detected for promise #<Promise>");
            return reject_promise(ctx, promise, Value::Object(error));
        }
        let then = match get_property(ctx, obj, &"then".into(), &resolution) {
            Ok(then) => then,
            Err(e) => {
                let reason = into_thrown_value(ctx, e)?;
                return reject_promise(ctx, promise, reason);
            }
        };
        if then.is_callable() {
            log::debug!("promise #{} adopts a thenable", promise.borrow().id);
            ctx.realm.enqueue_job(Job::ResolveThenable {
                promise: promise.clone(),
                thenable: resolution,
                then,
            });
            return Ok(());
        }
    }
    fulfill_promise(ctx, promise, resolution)
}

fn settle(ctx: &Rc<Context>, promise: &JSObjectDataPtr, state: PromiseState) -> Result<(), JSError> {
    ctx.check_object_write(promise, "settling a promise")?;
    let (reactions, argument, unhandled) = {
        let mut o = promise.borrow_mut();
        let ObjectKind::Promise(data) = &mut o.kind else {
            return Ok(());
        };
        if !matches!(data.state, PromiseState::Pending) {
            return Ok(());
        }
        let fulfill = std::mem::take(&mut data.fulfill_reactions);
        let reject = std::mem::take(&mut data.reject_reactions);
        let (reactions, argument, unhandled) = match &state {
            PromiseState::Fulfilled(v) => (fulfill, v.clone(), false),
            PromiseState::Rejected(v) => (reject, v.clone(), !data.handled),
            PromiseState::Pending => return Ok(()),
        };
        data.state = state;
        (reactions, argument, unhandled)
    };
    if unhandled {
        ctx.realm.track_rejection(promise);
    }
    for reaction in reactions {
        ctx.realm.enqueue_job(Job::Reaction {
            reaction,
            argument: argument.clone(),
        });
    }
    Ok(())
}

pub fn fulfill_promise(ctx: &Rc<Context>, promise: &JSObjectDataPtr, value: Value) -> EvalResult<()> {
    Ok(settle(ctx, promise, PromiseState::Fulfilled(value))?)
}

pub fn reject_promise(ctx: &Rc<Context>, promise: &JSObjectDataPtr, reason: Value) -> EvalResult<()> {
    Ok(settle(ctx, promise, PromiseState::Rejected(reason))?)
}

/// `PerformPromiseThen`. With no capability the handlers' results are dropped.
pub fn perform_then(
    ctx: &Rc<Context>,
    promise: &JSObjectDataPtr,
    on_fulfilled: Value,
    on_rejected: Value,
    capability: Option<PromiseCapability>,
) -> Result<(), JSError> {
    let fulfill = PromiseReaction {
        capability: capability.clone(),
        kind: ReactionKind::Fulfill,
        handler: if on_fulfilled.is_callable() { on_fulfilled } else { Value::Undefined },
    };
    let reject = PromiseReaction {
        capability,
        kind: ReactionKind::Reject,
        handler: if on_rejected.is_callable() { on_rejected } else { Value::Undefined },
    };
    let mut o = promise.borrow_mut();
    let ObjectKind::Promise(data) = &mut o.kind else {
        return Err(raise_type_error!("then called on a non-promise"));
    };
    match data.state.clone() {
        PromiseState::Pending => {
            data.fulfill_reactions.push(fulfill);
            data.reject_reactions.push(reject);
        }
        PromiseState::Fulfilled(v) => ctx.realm.enqueue_job(Job::Reaction {
            reaction: fulfill,
            argument: v,
        }),
        PromiseState::Rejected(v) => {
            ctx.realm.enqueue_job(Job::Reaction {
                reaction: reject,
                argument: v,
            });
        }
    }
    data.handled = true;
    Ok(())
}

/// The realm's own `Promise` constructor.
fn intrinsic_promise_constructor(ctx: &Rc<Context>) -> Option<JSObjectDataPtr> {
    match ctx.realm.intrinsics.promise_prototype.borrow().own_data_value(&"constructor".into()) {
        Some(Value::Object(c)) => Some(c),
        _ => None,
    }
}

fn is_intrinsic_constructor(ctx: &Rc<Context>, c: &Value) -> bool {
    match (c, intrinsic_promise_constructor(ctx)) {
        (Value::Object(c), Some(intrinsic)) => Rc::ptr_eq(c, &intrinsic),
        _ => false,
    }
}

/// `NewPromiseCapability(C)`.
pub fn new_promise_capability(ctx: &Rc<Context>, constructor: &Value) -> EvalResult<PromiseCapability> {
    if is_intrinsic_constructor(ctx, constructor) {
        let promise = new_promise(ctx);
        let (resolve, reject) = create_resolving_functions(ctx, &promise);
        return Ok(PromiseCapability {
            promise: Value::Object(promise),
            resolve: Value::Object(resolve),
            reject: Value::Object(reject),
        });
    }
    if !constructor.is_constructor() {
        return Err(raise_type_error!("{} is not a constructor", value_description(constructor)).into());
    }
    let slots: Rc<RefCell<(Value, Value)>> = Rc::new(RefCell::new((Value::Undefined, Value::Undefined)));
    let executor = {
        let slots = slots.clone();
        new_native_function(&ctx.realm.intrinsics, "", 2, move |_ctx, _this, args| {
            let mut s = slots.borrow_mut();
            if !s.0.is_undefined() || !s.1.is_undefined() {
                return Err(raise_type_error!("Promise executor has already been invoked with non-undefined arguments").into());
            }
            *s = (arg(args, 0), arg(args, 1));
            Ok(Value::Undefined)
        })
    };
    let promise = construct(ctx, constructor, &[Value::Object(executor)], constructor)?;
    let (resolve, reject) = slots.borrow().clone();
    if !resolve.is_callable() {
        return Err(raise_type_error!("Promise resolve function is not callable").into());
    }
    if !reject.is_callable() {
        return Err(raise_type_error!("Promise reject function is not callable").into());
    }
    Ok(PromiseCapability { promise, resolve, reject })
}

/// `PromiseResolve(%Promise%, x)`.
pub fn promise_resolve(ctx: &Rc<Context>, value: Value) -> EvalResult<JSObjectDataPtr> {
    if let Value::Object(obj) = &value
        && is_promise(obj)
    {
        let ctor = get_property(ctx, obj, &"constructor".into(), &value)?;
        if is_intrinsic_constructor(ctx, &ctor) {
            return Ok(obj.clone());
        }
    }
    let promise = new_promise(ctx);
    resolve_promise(ctx, &promise, value)?;
    Ok(promise)
}

/// `PromiseResolve(C, x)` for an arbitrary constructor.
fn promise_resolve_with(ctx: &Rc<Context>, constructor: &Value, value: Value) -> EvalResult<Value> {
    if is_intrinsic_constructor(ctx, constructor) {
        return Ok(Value::Object(promise_resolve(ctx, value)?));
    }
    if let Value::Object(obj) = &value
        && is_promise(obj)
    {
        let ctor = get_property(ctx, obj, &"constructor".into(), &value)?;
        if same_value(&ctor, constructor) {
            return Ok(value);
        }
    }
    let capability = new_promise_capability(ctx, constructor)?;
    call_function(ctx, &capability.resolve, &Value::Undefined, &[value])?;
    Ok(capability.promise)
}

/// Runs one job from the microtask queue.
pub fn run_job(ctx: &Rc<Context>, job: Job) -> EvalResult<()> {
    match job {
        Job::Reaction { reaction, argument } => run_reaction(ctx, reaction, argument),
        Job::ResolveThenable { promise, thenable, then } => {
            let (resolve, reject) = create_resolving_functions(ctx, &promise);
            if let Err(e) = call_function(ctx, &then, &thenable, &[Value::Object(resolve), Value::Object(reject.clone())]) {
                let reason = into_thrown_value(ctx, e)?;
                call_function(ctx, &Value::Object(reject), &Value::Undefined, &[reason])?;
            }
            Ok(())
        }
        Job::Callback { callback } => call_function(ctx, &callback, &Value::Undefined, &[]).map(|_| ()),
    }
}

fn run_reaction(ctx: &Rc<Context>, reaction: PromiseReaction, argument: Value) -> EvalResult<()> {
    let outcome: Result<Value, Value> = if reaction.handler.is_undefined() {
        match reaction.kind {
            ReactionKind::Fulfill => Ok(argument),
            ReactionKind::Reject => Err(argument),
        }
    } else {
        match call_function(ctx, &reaction.handler, &Value::Undefined, &[argument]) {
            Ok(v) => Ok(v),
            Err(e) => Err(into_thrown_value(ctx, e)?),
        }
    };
    let Some(capability) = reaction.capability else {
        return Ok(());
    };
    match outcome {
        Ok(v) => call_function(ctx, &capability.resolve, &Value::Undefined, &[v])?,
        Err(reason) => call_function(ctx, &capability.reject, &Value::Undefined, &[reason])?,
    };
    Ok(())
}

/// Logs rejections that still have no handler once the microtask queue is empty.
pub fn report_unhandled_rejections(ctx: &Rc<Context>) {
    for promise in ctx.realm.take_tracked_rejections() {
        let reason = match &promise.borrow().kind {
            ObjectKind::Promise(PromiseData {
                state: PromiseState::Rejected(reason),
                handled: false,
                ..
            }) => reason.clone(),
            _ => continue,
        };
        ctx.console(ConsoleLevel::Error, &format!("Uncaught (in promise) {}", describe_thrown(&reason)));
    }
}

fn this_promise(this: &Value, method: &str) -> EvalResult<JSObjectDataPtr> {
    match this {
        Value::Object(obj) if is_promise(obj) => Ok(obj.clone()),
        _ => Err(raise_type_error!("Method Promise.prototype.{method} called on incompatible receiver {}", value_description(this)).into()),
    }
}

/// `SpeciesConstructor(promise, %Promise%)`.
fn species_constructor(ctx: &Rc<Context>, promise: &JSObjectDataPtr) -> EvalResult<Value> {
    let default = intrinsic_promise_constructor(ctx).map(Value::Object).unwrap_or_default();
    let ctor = get_property(ctx, promise, &"constructor".into(), &Value::Object(promise.clone()))?;
    let ctor_obj = match ctor {
        Value::Undefined => return Ok(default),
        Value::Object(c) => c,
        _ => return Err(raise_type_error!("The .constructor property is not an object").into()),
    };
    let species_key = PropertyKey::from(&ctx.realm.intrinsics.symbols.species);
    match get_property(ctx, &ctor_obj, &species_key, &Value::Object(ctor_obj.clone()))? {
        Value::Undefined | Value::Null => Ok(default),
        s if s.is_constructor() => Ok(s),
        _ => Err(raise_type_error!("object.constructor[Symbol.species] is not a constructor").into()),
    }
}

fn promise_then(ctx: &Rc<Context>, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let promise = this_promise(this, "then")?;
    let ctor = species_constructor(ctx, &promise)?;
    let capability = new_promise_capability(ctx, &ctor)?;
    let result = capability.promise.clone();
    perform_then(ctx, &promise, arg(args, 0), arg(args, 1), Some(capability))?;
    Ok(result)
}

fn invoke_then(ctx: &Rc<Context>, this: &Value, on_fulfilled: Value, on_rejected: Value) -> EvalResult<Value> {
    let then = get_value(ctx, this, &"then".into())?;
    call_function(ctx, &then, this, &[on_fulfilled, on_rejected])
}

fn promise_finally(ctx: &Rc<Context>, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Value::Object(promise) = this else {
        return Err(raise_type_error!("Method Promise.prototype.finally called on incompatible receiver {}", value_description(this)).into());
    };
    let on_finally = arg(args, 0);
    if !on_finally.is_callable() {
        return invoke_then(ctx, this, on_finally.clone(), on_finally);
    }
    let ctor = species_constructor(ctx, promise)?;
    let intrinsics = &ctx.realm.intrinsics;
    let then_finally = {
        let on_finally = on_finally.clone();
        let ctor = ctor.clone();
        new_native_function(intrinsics, "", 1, move |ctx, _this, args| {
            let result = call_function(ctx, &on_finally, &Value::Undefined, &[])?;
            let settled = promise_resolve_with(ctx, &ctor, result)?;
            let value = arg(args, 0);
            let value_thunk = new_native_function(&ctx.realm.intrinsics, "", 0, move |_ctx, _this, _args| Ok(value.clone()));
            invoke_then(ctx, &settled, Value::Object(value_thunk), Value::Undefined)
        })
    };
    let catch_finally = new_native_function(intrinsics, "", 1, move |ctx, _this, args| {
        let result = call_function(ctx, &on_finally, &Value::Undefined, &[])?;
        let settled = promise_resolve_with(ctx, &ctor, result)?;
        let reason = arg(args, 0);
        let thrower = new_native_function(&ctx.realm.intrinsics, "", 0, move |_ctx, _this, _args| Err(EvalError::Throw(reason.clone())));
        invoke_then(ctx, &settled, Value::Object(thrower), Value::Undefined)
    });
    invoke_then(ctx, this, Value::Object(then_finally), Value::Object(catch_finally))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Combinator {
    All,
    AllSettled,
    Any,
}

/// Shared bookkeeping of `all`, `allSettled` and `any`: one slot per element
/// and a countdown of elements still pending.
struct Aggregate {
    values: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
    capability: PromiseCapability,
}

impl Aggregate {
    fn finish_one(&self, ctx: &Rc<Context>, combinator: Combinator) -> EvalResult<()> {
        let left = self.remaining.get() - 1;
        self.remaining.set(left);
        if left > 0 {
            return Ok(());
        }
        let values = self.values.borrow().clone();
        let array = Value::Object(create_array(&ctx.realm.intrinsics, values));
        if combinator == Combinator::Any {
            let error = aggregate_error(ctx, array);
            call_function(ctx, &self.capability.reject, &Value::Undefined, &[error])?;
        } else {
            call_function(ctx, &self.capability.resolve, &Value::Undefined, &[array])?;
        }
        Ok(())
    }
}

/// `AggregateError` is not a global here; the rejection is an `Error` named
/// `AggregateError` carrying the `errors` array.
fn aggregate_error(ctx: &Rc<Context>, errors: Value) -> Value {
    let error = create_error(ctx, "Error", "All promises were rejected");
    {
        let mut e = error.borrow_mut();
        e.insert_builtin("name", Value::from("AggregateError"));
        e.insert_builtin("errors", errors);
    }
    Value::Object(error)
}

fn settled_record(ctx: &Rc<Context>, fulfilled: bool, value: Value) -> Value {
    let record = new_object(Some(&ctx.realm.intrinsics.object_prototype));
    {
        let mut r = record.borrow_mut();
        r.insert_data("status", Value::from(if fulfilled { "fulfilled" } else { "rejected" }), true, true, true);
        r.insert_data(if fulfilled { "value" } else { "reason" }, value, true, true, true);
    }
    Value::Object(record)
}

fn element_function(ctx: &Rc<Context>, aggregate: &Rc<Aggregate>, index: usize, combinator: Combinator, fulfilled: bool) -> Value {
    let aggregate = aggregate.clone();
    let called = Cell::new(false);
    let f = new_native_function(&ctx.realm.intrinsics, "", 1, move |ctx, _this, args| {
        if called.replace(true) {
            return Ok(Value::Undefined);
        }
        let value = match combinator {
            Combinator::AllSettled => settled_record(ctx, fulfilled, arg(args, 0)),
            _ => arg(args, 0),
        };
        aggregate.values.borrow_mut()[index] = value;
        aggregate.finish_one(ctx, combinator)?;
        Ok(Value::Undefined)
    });
    Value::Object(f)
}

fn combine(ctx: &Rc<Context>, this: &Value, iterable: &Value, combinator: Option<Combinator>) -> EvalResult<Value> {
    let capability = new_promise_capability(ctx, this)?;
    let result = capability.promise.clone();
    match run_combinator(ctx, this, iterable, combinator, &capability) {
        Ok(()) => Ok(result),
        Err(e) => {
            let reason = into_thrown_value(ctx, e)?;
            call_function(ctx, &capability.reject, &Value::Undefined, &[reason])?;
            Ok(result)
        }
    }
}

fn run_combinator(ctx: &Rc<Context>, ctor: &Value, iterable: &Value, combinator: Option<Combinator>, capability: &PromiseCapability) -> EvalResult<()> {
    let resolve_fn = get_value(ctx, ctor, &"resolve".into())?;
    if !resolve_fn.is_callable() {
        return Err(raise_type_error!("Promise resolve or reject function is not callable").into());
    }
    let aggregate = Rc::new(Aggregate {
        values: RefCell::new(Vec::new()),
        remaining: Cell::new(1),
        capability: capability.clone(),
    });
    let mut record = get_iterator(ctx, iterable)?;
    let mut index = 0;
    loop {
        let Some(next) = record.step(ctx)? else {
            break;
        };
        let step = (|| -> EvalResult<()> {
            let next_promise = call_function(ctx, &resolve_fn, ctor, &[next])?;
            let (on_fulfilled, on_rejected) = match combinator {
                None => (capability.resolve.clone(), capability.reject.clone()),
                Some(c) => {
                    aggregate.values.borrow_mut().push(Value::Undefined);
                    aggregate.remaining.set(aggregate.remaining.get() + 1);
                    match c {
                        Combinator::All => (element_function(ctx, &aggregate, index, c, true), capability.reject.clone()),
                        Combinator::AllSettled => (
                            element_function(ctx, &aggregate, index, c, true),
                            element_function(ctx, &aggregate, index, c, false),
                        ),
                        Combinator::Any => (capability.resolve.clone(), element_function(ctx, &aggregate, index, c, false)),
                    }
                }
            };
            invoke_then(ctx, &next_promise, on_fulfilled, on_rejected)?;
            Ok(())
        })();
        if let Err(e) = step {
            if e.is_catchable() {
                let _ = record.close(ctx);
            }
            return Err(e);
        }
        index += 1;
    }
    if let Some(c) = combinator {
        aggregate.finish_one(ctx, c)?;
    }
    Ok(())
}

fn promise_construct(ctx: &Rc<Context>, args: &[Value], new_target: &JSObjectDataPtr) -> EvalResult<Value> {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(raise_type_error!("Promise resolver {} is not a function", value_description(&executor)).into());
    }
    let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.promise_prototype)?;
    let promise = new_promise_with_prototype(&proto);
    let (resolve, reject) = create_resolving_functions(ctx, &promise);
    if let Err(e) = call_function(ctx, &executor, &Value::Undefined, &[Value::Object(resolve), Value::Object(reject.clone())]) {
        let reason = into_thrown_value(ctx, e)?;
        call_function(ctx, &Value::Object(reject), &Value::Undefined, &[reason])?;
    }
    Ok(Value::Object(promise))
}

pub fn initialize_promise(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.promise_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "Promise",
        1,
        |_ctx, _this, _args| Err(raise_type_error!("Promise constructor cannot be invoked without 'new'").into()),
        promise_construct,
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, proto, "then", 2, promise_then);
    define_method(intrinsics, proto, "catch", 1, |ctx, this, args| {
        invoke_then(ctx, this, Value::Undefined, arg(args, 0))
    });
    define_method(intrinsics, proto, "finally", 1, promise_finally);
    proto
        .borrow_mut()
        .insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("Promise"), false, false, true);

    define_method(intrinsics, &ctor, "resolve", 1, |ctx, this, args| {
        if !matches!(this, Value::Object(_)) {
            return Err(raise_type_error!("PromiseResolve called on non-object").into());
        }
        promise_resolve_with(ctx, this, arg(args, 0))
    });
    define_method(intrinsics, &ctor, "reject", 1, |ctx, this, args| {
        let capability = new_promise_capability(ctx, this)?;
        call_function(ctx, &capability.reject, &Value::Undefined, &[arg(args, 0)])?;
        Ok(capability.promise)
    });
    define_method(intrinsics, &ctor, "withResolvers", 0, |ctx, this, _args| {
        let capability = new_promise_capability(ctx, this)?;
        let record = new_object(Some(&ctx.realm.intrinsics.object_prototype));
        {
            let mut r = record.borrow_mut();
            r.insert_data("promise", capability.promise, true, true, true);
            r.insert_data("resolve", capability.resolve, true, true, true);
            r.insert_data("reject", capability.reject, true, true, true);
        }
        Ok(Value::Object(record))
    });
    define_method(intrinsics, &ctor, "all", 1, |ctx, this, args| combine(ctx, this, &arg(args, 0), Some(Combinator::All)));
    define_method(intrinsics, &ctor, "allSettled", 1, |ctx, this, args| {
        combine(ctx, this, &arg(args, 0), Some(Combinator::AllSettled))
    });
    define_method(intrinsics, &ctor, "any", 1, |ctx, this, args| combine(ctx, this, &arg(args, 0), Some(Combinator::Any)));
    define_method(intrinsics, &ctor, "race", 1, |ctx, this, args| combine(ctx, this, &arg(args, 0), None));
    define_getter(intrinsics, &ctor, &intrinsics.symbols.species, |_ctx, this, _args| Ok(this.clone()));

    global.borrow_mut().insert_builtin("Promise", Value::Object(ctor));
}

/// Resolves or rejects `promise` from the outcome of a body that may have thrown.
pub fn settle_from_result(ctx: &Rc<Context>, promise: &JSObjectDataPtr, result: EvalResult<Value>) -> Result<(), JSError> {
    let outcome = match result {
        Ok(v) => resolve_promise(ctx, promise, v),
        Err(e) => match into_thrown_value(ctx, e) {
            Ok(reason) => reject_promise(ctx, promise, reason),
            Err(internal) => return Err(internal),
        },
    };
    match outcome {
        Ok(()) => Ok(()),
        Err(EvalError::Js(e)) => Err(e),
        Err(EvalError::Throw(v)) => Err(crate::raise_internal_error!("settling a promise threw {}", describe_thrown(&v))),
    }
}
