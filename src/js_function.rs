use crate::core::call_stack::{FrameGuard, StackFrame, with_stack_headroom};
use crate::core::callable::{BoundFunction, Callable, Closure, NativeFunction};
use crate::core::context::{Context, SourceInfo};
use crate::core::conversion::{to_integer_or_infinity, to_string, value_description};
use crate::core::descriptor::PropertyDescriptor;
use crate::core::expr::{FunctionKind, FunctionNode};
use crate::core::js_error::{EvalError, EvalResult, on_frame_exit};
use crate::core::metadata::{ClassKind, FunctionMetadata};
use crate::core::property::{define_property_or_throw, get_property, has_own_property, ordinary_has_instance};
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::scope::{FunctionFrame, Scope};
use crate::core::side_effects::check_call;
use crate::core::value::{JSObjectDataPtr, ObjectKind, SymbolData, Value, is_constructor, new_object, new_object_with_kind};
use crate::js_proxy::{self, ProxyData};
use crate::{raise_internal_error, raise_reference_error, raise_type_error, raise_unsupported};
use futures::FutureExt;
use std::cell::RefCell;
use std::rc::Rc;

/// Parameter aliasing of a sloppy-mode `arguments` object.
///
/// `names[i]` is the parameter index `i` is still mapped to.
pub struct MappedArguments {
    pub scope: Rc<Scope>,
    pub names: Vec<Option<Rc<str>>>,
}

/// The `i`th argument, or undefined.
pub fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn install_name_and_length(obj: &JSObjectDataPtr, name: &str, length: usize) {
    let mut o = obj.borrow_mut();
    o.insert_data("length", Value::Number(length as f64), false, false, true);
    o.insert_data("name", Value::from(name), false, false, true);
}

pub fn new_native_function(
    intrinsics: &Intrinsics,
    name: &str,
    length: usize,
    call: impl Fn(&Rc<Context>, &Value, &[Value]) -> EvalResult<Value> + 'static,
) -> JSObjectDataPtr {
    let native = NativeFunction {
        name: name.into(),
        call: Rc::new(call),
        construct: None,
    };
    let obj = new_object_with_kind(Some(&intrinsics.function_prototype), ObjectKind::Function(Callable::Native(Rc::new(native))));
    install_name_and_length(&obj, name, length);
    obj
}

pub fn new_native_constructor(
    intrinsics: &Intrinsics,
    name: &str,
    length: usize,
    call: impl Fn(&Rc<Context>, &Value, &[Value]) -> EvalResult<Value> + 'static,
    construct: impl Fn(&Rc<Context>, &[Value], &JSObjectDataPtr) -> EvalResult<Value> + 'static,
) -> JSObjectDataPtr {
    let native = NativeFunction {
        name: name.into(),
        call: Rc::new(call),
        construct: Some(Rc::new(construct)),
    };
    let obj = new_object_with_kind(Some(&intrinsics.function_prototype), ObjectKind::Function(Callable::Native(Rc::new(native))));
    install_name_and_length(&obj, name, length);
    obj
}

/// Installs a built-in method on `target` and returns the function object.
pub fn define_method(
    intrinsics: &Intrinsics,
    target: &JSObjectDataPtr,
    name: &str,
    length: usize,
    f: impl Fn(&Rc<Context>, &Value, &[Value]) -> EvalResult<Value> + 'static,
) -> JSObjectDataPtr {
    let func = new_native_function(intrinsics, name, length, f);
    target.borrow_mut().insert_builtin(name, Value::Object(func.clone()));
    func
}

/// Like [`define_method`] for a symbol key; `name` is the function's `name`, e.g. `[Symbol.iterator]`.
pub fn define_symbol_method(
    intrinsics: &Intrinsics,
    target: &JSObjectDataPtr,
    symbol: &Rc<SymbolData>,
    name: &str,
    length: usize,
    f: impl Fn(&Rc<Context>, &Value, &[Value]) -> EvalResult<Value> + 'static,
) -> JSObjectDataPtr {
    let func = new_native_function(intrinsics, name, length, f);
    target.borrow_mut().insert_builtin(PropertyKey::from(symbol), Value::Object(func.clone()));
    func
}

/// Installs a configurable, non-enumerable getter.
pub fn define_getter(
    intrinsics: &Intrinsics,
    target: &JSObjectDataPtr,
    key: impl Into<PropertyKey>,
    f: impl Fn(&Rc<Context>, &Value, &[Value]) -> EvalResult<Value> + 'static,
) -> JSObjectDataPtr {
    let key = key.into();
    let name = format!("get {}", key.function_name());
    let getter = new_native_function(intrinsics, &name, 0, f);
    target.borrow_mut().insert_accessor(key, Some(Value::Object(getter.clone())), None, false, true);
    getter
}

/// Wires `ctor.prototype` and `proto.constructor` the way built-in constructors have them.
pub fn link_constructor(ctor: &JSObjectDataPtr, proto: &JSObjectDataPtr) {
    ctor.borrow_mut().insert_data("prototype", Value::Object(proto.clone()), false, false, false);
    proto.borrow_mut().insert_builtin("constructor", Value::Object(ctor.clone()));
}

/// Metadata for a function created from `node` in the current source.
pub fn function_metadata(ctx: &Context, node: &FunctionNode) -> FunctionMetadata {
    let constructable = matches!(node.kind, FunctionKind::Normal) && !node.is_async && !node.is_generator;
    FunctionMetadata {
        source_text: ctx.source.slice(node.span).into(),
        is_arrow: node.is_arrow(),
        is_async: node.is_async,
        is_generator: node.is_generator,
        constructable,
        class_kind: None,
        home_object: RefCell::new(None),
        instance_elements: RefCell::new(Vec::new()),
    }
}

/// Allocates the function object for `node` closing over `scope`.
pub fn create_closure(
    ctx: &Rc<Context>,
    node: &Rc<FunctionNode>,
    scope: &Rc<Scope>,
    meta: FunctionMetadata,
    name: &str,
) -> JSObjectDataPtr {
    let meta = Rc::new(meta);
    let closure = Closure {
        node: node.clone(),
        scope: scope.clone(),
        source: ctx.source.clone(),
        strict: ctx.strict || node.strict,
        meta: meta.clone(),
    };
    let intrinsics = &ctx.realm.intrinsics;
    let func = new_object_with_kind(Some(&intrinsics.function_prototype), ObjectKind::Function(Callable::Closure(Rc::new(closure))));
    install_name_and_length(&func, name, node.expected_argument_count());
    if meta.constructable && meta.class_kind.is_none() {
        let proto = new_object(Some(&intrinsics.object_prototype));
        proto.borrow_mut().insert_builtin("constructor", Value::Object(func.clone()));
        func.borrow_mut().insert_data("prototype", Value::Object(proto), true, false, false);
    }
    ctx.metadata.register_function(&func, meta);
    log::trace!("created function '{name}' #{}", func.borrow().id);
    func
}

/// `OrdinaryFunctionCreate` for function declarations, expressions, arrows and methods.
pub fn create_function(
    ctx: &Rc<Context>,
    node: &Rc<FunctionNode>,
    scope: &Rc<Scope>,
    name: &str,
    home_object: Option<&JSObjectDataPtr>,
) -> JSObjectDataPtr {
    let meta = function_metadata(ctx, node);
    *meta.home_object.borrow_mut() = home_object.cloned();
    create_closure(ctx, node, scope, meta, name)
}

/// `SetFunctionName`: overwrites `name`, used for computed keys and accessors.
pub fn set_function_name(func: &JSObjectDataPtr, key: &PropertyKey, prefix: Option<&str>) {
    let base = key.function_name();
    let name = match prefix {
        Some(p) => format!("{p} {base}"),
        None => base.to_string(),
    };
    func.borrow_mut().insert_data("name", Value::from(name), false, false, true);
}

pub fn function_name_of(func: &JSObjectDataPtr) -> Rc<str> {
    match func.borrow().own_data_value(&"name".into()) {
        Some(Value::String(s)) => s,
        _ => "".into(),
    }
}

/// `GetPrototypeFromConstructor`.
pub fn get_prototype_from_constructor(ctx: &Rc<Context>, ctor: &JSObjectDataPtr, fallback: &JSObjectDataPtr) -> EvalResult<JSObjectDataPtr> {
    match get_property(ctx, ctor, &"prototype".into(), &Value::Object(ctor.clone()))? {
        Value::Object(proto) => Ok(proto),
        _ => Ok(fallback.clone()),
    }
}

enum CallTarget {
    Callable(Callable),
    Proxy(ProxyData),
}

fn call_target(obj: &JSObjectDataPtr, operation: &str) -> EvalResult<Option<CallTarget>> {
    Ok(match &obj.borrow().kind {
        ObjectKind::Function(c) => Some(CallTarget::Callable(c.clone())),
        ObjectKind::Proxy(Some(data)) => Some(CallTarget::Proxy(data.clone())),
        ObjectKind::Proxy(None) => {
            return Err(raise_type_error!("Cannot perform '{operation}' on a proxy that has been revoked").into());
        }
        _ => None,
    })
}

fn native_frame(native: &NativeFunction, obj: &JSObjectDataPtr) -> StackFrame {
    StackFrame::native(native.name.clone(), Some(obj.borrow().id))
}

pub(crate) fn closure_frame(func: &JSObjectDataPtr, closure: &Closure) -> StackFrame {
    let name = function_name_of(func);
    let span = closure.node.span;
    StackFrame::source(name, Some(func.borrow().id), closure.source.filename.clone(), span.line, span.column)
}

fn enter_closure_frame<'a>(ctx: &'a Rc<Context>, func: &JSObjectDataPtr, closure: &Closure) -> Result<FrameGuard<'a>, EvalError> {
    Ok(ctx.realm.call_stack.enter(closure_frame(func, closure))?)
}

/// `Call(F, thisArgument, argumentsList)`.
pub fn call_function(ctx: &Rc<Context>, func: &Value, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Value::Object(obj) = func else {
        return Err(raise_type_error!("{} is not a function", value_description(func)).into());
    };
    ctx.check_interrupts()?;
    let target = match call_target(obj, "apply")? {
        Some(CallTarget::Proxy(data)) if data.callable => return js_proxy::proxy_call(ctx, &data, this, args),
        Some(CallTarget::Callable(c)) => c,
        _ => return Err(raise_type_error!("{} is not a function", value_description(func)).into()),
    };
    check_call(ctx, obj, this, args)?;
    match target {
        Callable::Native(native) => {
            let _guard = ctx.realm.call_stack.enter(native_frame(&native, obj))?;
            (native.call)(ctx, this, args).map_err(|e| on_frame_exit(ctx, e))
        }
        Callable::Bound(bound) => {
            let mut all = bound.args.clone();
            all.extend_from_slice(args);
            call_function(ctx, &Value::Object(bound.target.clone()), &bound.this, &all)
        }
        Callable::Closure(closure) => {
            if closure.meta.is_class_constructor() {
                let name = function_name_of(obj);
                return Err(raise_type_error!("Class constructor {name} cannot be invoked without 'new'").into());
            }
            call_closure(ctx, obj, &closure, this, args)
        }
    }
}

/// `this` as seen by a non-arrow function body.
fn bind_this(ctx: &Rc<Context>, strict: bool, this: &Value) -> EvalResult<Value> {
    if strict {
        return Ok(this.clone());
    }
    Ok(match this {
        Value::Undefined | Value::Null => {
            let global = ctx.global_scope.global_object().unwrap_or(&ctx.realm.global_object);
            Value::Object(global.clone())
        }
        Value::Object(_) => this.clone(),
        primitive => Value::Object(crate::core::conversion::to_object(ctx, primitive)?),
    })
}

/// A fresh function scope for one activation of `closure`.
pub(crate) fn function_scope(func: &JSObjectDataPtr, closure: &Closure, this: Option<Value>, new_target: Value) -> Rc<Scope> {
    let frame = FunctionFrame {
        this: RefCell::new(this),
        new_target,
        function: Some(func.clone()),
        home_object: closure.meta.home_object(),
        is_arrow: closure.meta.is_arrow,
    };
    Scope::new_function(&closure.scope, frame)
}

fn call_closure(ctx: &Rc<Context>, func: &JSObjectDataPtr, closure: &Rc<Closure>, this: &Value, args: &[Value]) -> EvalResult<Value> {
    if closure.meta.is_generator {
        return Err(raise_unsupported!("generator functions").into());
    }
    let ctx = ctx.with_source(&closure.source, closure.strict);
    let this_value = if closure.meta.is_arrow {
        None
    } else {
        Some(bind_this(&ctx, closure.strict, this)?)
    };
    let scope = function_scope(func, closure, this_value, Value::Undefined);
    if closure.meta.is_async {
        return crate::js_async::start_async_function(&ctx, func, closure, scope, args.to_vec());
    }
    let _guard = enter_closure_frame(&ctx, func, closure)?;
    run_body(&ctx, func, closure, &scope, args).map_err(|e| on_frame_exit(&ctx, e))
}

/// Runs a synchronous function body to completion.
fn run_body(ctx: &Rc<Context>, func: &JSObjectDataPtr, closure: &Rc<Closure>, scope: &Rc<Scope>, args: &[Value]) -> EvalResult<Value> {
    let body = crate::core::eval::evaluate_function_body(ctx, scope, closure, func, args);
    match with_stack_headroom(|| body.now_or_never()) {
        Some(result) => result,
        None => Err(raise_internal_error!("synchronous function body suspended").into()),
    }
}

/// `Construct(F, argumentsList, newTarget)`.
pub fn construct(ctx: &Rc<Context>, func: &Value, args: &[Value], new_target: &Value) -> EvalResult<Value> {
    let Value::Object(obj) = func else {
        return Err(raise_type_error!("{} is not a constructor", value_description(func)).into());
    };
    ctx.check_interrupts()?;
    if !is_constructor(obj) {
        let name = match obj.borrow().callable() {
            Some(_) => function_name_of(obj).to_string(),
            None => value_description(func),
        };
        let name = if name.is_empty() { "anonymous".to_string() } else { name };
        return Err(raise_type_error!("{name} is not a constructor").into());
    }
    let target = match call_target(obj, "construct")? {
        Some(CallTarget::Proxy(data)) => return js_proxy::proxy_construct(ctx, &data, args, new_target),
        Some(CallTarget::Callable(c)) => c,
        None => return Err(raise_type_error!("{} is not a constructor", value_description(func)).into()),
    };
    check_call(ctx, obj, &Value::Undefined, args)?;
    let Value::Object(new_target_obj) = new_target else {
        return Err(raise_internal_error!("construct without a new.target object").into());
    };
    match target {
        Callable::Native(native) => {
            let Some(construct_fn) = native.construct.clone() else {
                return Err(raise_type_error!("{} is not a constructor", native.name).into());
            };
            let _guard = ctx.realm.call_stack.enter(native_frame(&native, obj))?;
            construct_fn(ctx, args, new_target_obj).map_err(|e| on_frame_exit(ctx, e))
        }
        Callable::Bound(bound) => {
            let mut all = bound.args.clone();
            all.extend_from_slice(args);
            let target = Value::Object(bound.target.clone());
            let new_target = if Rc::ptr_eq(new_target_obj, obj) { target.clone() } else { new_target.clone() };
            construct(ctx, &target, &all, &new_target)
        }
        Callable::Closure(closure) => construct_closure(ctx, obj, &closure, args, new_target_obj),
    }
}

fn construct_closure(ctx: &Rc<Context>, func: &JSObjectDataPtr, closure: &Rc<Closure>, args: &[Value], new_target: &JSObjectDataPtr) -> EvalResult<Value> {
    let ctx = ctx.with_source(&closure.source, closure.strict);
    let derived = closure.meta.class_kind == Some(ClassKind::Derived);
    let this_obj = if derived {
        None
    } else {
        let proto = get_prototype_from_constructor(&ctx, new_target, &ctx.realm.intrinsics.object_prototype)?;
        Some(new_object(Some(&proto)))
    };
    let scope = function_scope(func, closure, this_obj.clone().map(Value::Object), Value::Object(new_target.clone()));
    let _guard = enter_closure_frame(&ctx, func, closure)?;
    let outcome = (|| -> EvalResult<Value> {
        if let Some(this_obj) = &this_obj
            && closure.meta.is_class_constructor()
        {
            crate::js_class::initialize_instance_elements(&ctx, this_obj, func)?;
        }
        let result = run_body(&ctx, func, closure, &scope, args)?;
        if let Value::Object(_) = result {
            return Ok(result);
        }
        if derived && !result.is_undefined() {
            return Err(raise_type_error!("Derived constructors may only return object or undefined").into());
        }
        let bound_this = scope.function_frame().and_then(|f| f.this.borrow().clone());
        match bound_this {
            Some(this) => Ok(this),
            None => Err(raise_reference_error!(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor"
            )
            .into()),
        }
    })();
    outcome.map_err(|e| on_frame_exit(&ctx, e))
}

/// Source text reported by `Function.prototype.toString`.
pub fn function_source_text(func: &JSObjectDataPtr) -> Option<String> {
    let callable = func.borrow().callable().cloned()?;
    Some(match callable {
        Callable::Closure(c) => c.meta.source_text.to_string(),
        Callable::Native(n) => format!("function {}() {{ [native code] }}", n.name),
        Callable::Bound(_) => "function () { [native code] }".to_string(),
    })
}

fn bind(ctx: &Rc<Context>, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Value::Object(target) = this else {
        return Err(raise_type_error!("Bind must be called on a function").into());
    };
    if !this.is_callable() {
        return Err(raise_type_error!("Bind must be called on a function").into());
    }
    let bound_this = arg(args, 0);
    let bound_args: Vec<Value> = args.iter().skip(1).cloned().collect();
    let length = if has_own_property(ctx, target, &"length".into())? {
        match get_property(ctx, target, &"length".into(), this)? {
            Value::Number(n) => (to_integer_or_infinity(ctx, &Value::Number(n))? - bound_args.len() as f64).max(0.0),
            _ => 0.0,
        }
    } else {
        0.0
    };
    let target_name = match get_property(ctx, target, &"name".into(), this)? {
        Value::String(s) => s,
        _ => "".into(),
    };
    let proto = crate::core::property::get_prototype_of(ctx, target)?;
    let bound = BoundFunction {
        target: target.clone(),
        this: bound_this,
        args: bound_args,
    };
    let obj = new_object_with_kind(proto.as_ref(), ObjectKind::Function(Callable::Bound(Rc::new(bound))));
    {
        let mut o = obj.borrow_mut();
        o.insert_data("length", Value::Number(length), false, false, true);
        o.insert_data("name", Value::from(format!("bound {target_name}")), false, false, true);
    }
    Ok(Value::Object(obj))
}

/// `new Function(p1, ..., body)`.
fn create_dynamic_function(ctx: &Rc<Context>, args: &[Value]) -> EvalResult<Value> {
    let (params, body) = match args.split_last() {
        Some((body, params)) => {
            let mut names = Vec::with_capacity(params.len());
            for p in params {
                names.push(to_string(ctx, p)?.to_string());
            }
            (names.join(","), to_string(ctx, body)?.to_string())
        }
        None => (String::new(), String::new()),
    };
    let (node, source) = crate::core::parser::parse_function_source(&params, &body, false)?;
    let source = SourceInfo::new(&source, "anonymous");
    let fn_ctx = ctx.with_source(&source, node.strict);
    let func = create_function(&fn_ctx, &node, &ctx.global_scope, "anonymous", None);
    Ok(Value::Object(func))
}

pub fn initialize_function(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.function_prototype;
    install_name_and_length(proto, "", 0);
    let ctor = new_native_constructor(
        intrinsics,
        "Function",
        1,
        |ctx, _this, args| create_dynamic_function(ctx, args),
        |ctx, args, _new_target| create_dynamic_function(ctx, args),
    );
    link_constructor(&ctor, proto);
    define_method(intrinsics, proto, "call", 1, |ctx, this, args| {
        let rest = if args.is_empty() { &[][..] } else { &args[1..] };
        call_function(ctx, this, &arg(args, 0), rest)
    });
    define_method(intrinsics, proto, "apply", 2, |ctx, this, args| {
        let list = match arg(args, 1) {
            Value::Undefined | Value::Null => Vec::new(),
            list @ Value::Object(_) => crate::js_array::create_list_from_array_like(ctx, &list)?,
            _ => return Err(raise_type_error!("CreateListFromArrayLike called on non-object").into()),
        };
        call_function(ctx, this, &arg(args, 0), &list)
    });
    define_method(intrinsics, proto, "bind", 1, bind);
    define_method(intrinsics, proto, "toString", 0, |_ctx, this, _args| {
        let source = match this {
            Value::Object(f) => function_source_text(f),
            _ => None,
        };
        match source {
            Some(s) => Ok(Value::from(s)),
            None => Err(raise_type_error!("Function.prototype.toString requires that 'this' be a Function").into()),
        }
    });
    let has_instance = new_native_function(intrinsics, "[Symbol.hasInstance]", 1, |ctx, this, args| {
        Ok(Value::Boolean(ordinary_has_instance(ctx, this, &arg(args, 0))?))
    });
    proto.borrow_mut().insert_data(
        PropertyKey::from(&intrinsics.symbols.has_instance),
        Value::Object(has_instance),
        false,
        false,
        false,
    );
    global.borrow_mut().insert_builtin("Function", Value::Object(ctor));
}

/// Defines `key` on `target` as a method created from a function node, the way
/// object literals and class bodies do.
pub fn define_method_property(
    ctx: &Rc<Context>,
    target: &JSObjectDataPtr,
    key: &PropertyKey,
    func: &JSObjectDataPtr,
    enumerable: bool,
) -> EvalResult<()> {
    define_property_or_throw(
        ctx,
        target,
        key,
        PropertyDescriptor::new_data(Value::Object(func.clone()), true, enumerable, true),
    )
}
