use crate::core::context::Context;
use crate::core::conversion::to_string;
use crate::core::property::{get_property, peek_property};
use crate::core::property_key::PropertyKey;
use crate::core::realm::{Intrinsics, NATIVE_ERROR_NAMES};
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, new_object_with_kind};
use crate::js_function::{arg, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::{JSError, raise_type_error};
use std::rc::Rc;

/// Failure inside the evaluator: an engine condition or a thrown language value.
#[derive(Debug, Clone)]
pub enum EvalError {
    Js(JSError),
    Throw(Value),
}

pub type EvalResult<T> = Result<T, EvalError>;

impl From<JSError> for EvalError {
    fn from(e: JSError) -> Self {
        EvalError::Js(e)
    }
}

impl EvalError {
    /// False for engine conditions, which skip `catch` and `finally`.
    pub fn is_catchable(&self) -> bool {
        match self {
            EvalError::Throw(_) => true,
            EvalError::Js(e) => !e.is_internal(),
        }
    }
}

/// Creates an instance of the named error constructor with the current stack attached.
pub fn create_error(ctx: &Rc<Context>, name: &str, message: &str) -> JSObjectDataPtr {
    let proto = ctx.realm.intrinsics.error_prototype_for(name);
    let obj = new_object_with_kind(Some(&proto), ObjectKind::Error);
    obj.borrow_mut().insert_builtin("message", Value::from(message));
    stamp_stack(ctx, &obj, 0, None);
    obj
}

/// The language value a language-level engine error materializes as.
fn materialize(ctx: &Rc<Context>, err: &JSError) -> Value {
    let name = err.constructor_name().unwrap_or("Error");
    Value::Object(create_error(ctx, name, &err.message()))
}

/// Value bound by `catch`, or the engine condition that must keep unwinding.
pub fn into_thrown_value(ctx: &Rc<Context>, err: EvalError) -> Result<Value, JSError> {
    match err {
        EvalError::Throw(v) => Ok(v),
        EvalError::Js(e) if e.is_internal() => Err(e),
        EvalError::Js(e) => Ok(materialize(ctx, &e)),
    }
}

/// Applied while the frame an error escapes from is still on the stack.
pub fn on_frame_exit(ctx: &Rc<Context>, err: EvalError) -> EvalError {
    match err {
        EvalError::Js(e) if !e.is_internal() => EvalError::Throw(materialize(ctx, &e)),
        EvalError::Throw(Value::Object(obj)) => {
            stamp_if_error(ctx, &obj);
            EvalError::Throw(Value::Object(obj))
        }
        other => other,
    }
}

/// Error returned to the host for an evaluation that ended by throwing.
pub fn into_uncaught(ctx: &Rc<Context>, err: EvalError) -> JSError {
    match into_thrown_value(ctx, err) {
        Ok(value) => {
            let message = describe_thrown(&value);
            JSError::Thrown { value, message }
        }
        Err(e) => e,
    }
}

/// One-line description of a thrown value that never runs user code.
pub fn describe_thrown(value: &Value) -> String {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(stack)) = obj.borrow().own_data_value(&PropertyKey::from("stack")) {
                return stack.to_string();
            }
            error_header(obj).unwrap_or_else(|| "[object Object]".to_string())
        }
        Value::String(s) => s.to_string(),
        Value::Symbol(s) => format!("Symbol({})", s.description.as_deref().unwrap_or("")),
        other => crate::core::conversion::primitive_to_string(other).to_string(),
    }
}

/// `"<name>: <message>"` read from data properties only.
fn error_header(obj: &JSObjectDataPtr) -> Option<String> {
    let name = match peek_property(obj, &"name".into()) {
        Some(Value::String(s)) => s.to_string(),
        Some(_) => return None,
        None if matches!(obj.borrow().kind, ObjectKind::Error) => "Error".to_string(),
        None => return None,
    };
    let message = match peek_property(obj, &"message".into()) {
        Some(Value::String(s)) => s.to_string(),
        _ => String::new(),
    };
    Some(if message.is_empty() {
        name
    } else if name.is_empty() {
        message
    } else {
        format!("{name}: {message}")
    })
}

/// Attaches `stack` to an error object thrown without one.
pub fn stamp_if_error(ctx: &Rc<Context>, obj: &JSObjectDataPtr) {
    let (is_error, id) = {
        let o = obj.borrow();
        (matches!(o.kind, ObjectKind::Error), o.id)
    };
    if ctx.is_dry_run() && !ctx.is_temporary(id) {
        return;
    }
    if is_error && !ctx.metadata.is_stamped(obj) {
        stamp_stack(ctx, obj, 0, None);
    }
}

/// Writes the rendered live call stack into `obj.stack`, once per object.
pub fn stamp_stack(ctx: &Rc<Context>, obj: &JSObjectDataPtr, skip: usize, stop_at: Option<u64>) {
    if !ctx.metadata.mark_stamped(obj) {
        return;
    }
    let header = error_header(obj).unwrap_or_else(|| "Error".to_string());
    let stack = ctx.realm.call_stack.render(&header, skip, stop_at);
    obj.borrow_mut().insert_builtin("stack", Value::from(stack));
}

fn build_error(ctx: &Rc<Context>, proto: JSObjectDataPtr, args: &[Value]) -> Result<JSObjectDataPtr, EvalError> {
    let obj = new_object_with_kind(Some(&proto), ObjectKind::Error);
    let message = arg(args, 0);
    if !message.is_undefined() {
        let text = to_string(ctx, &message)?;
        obj.borrow_mut().insert_builtin("message", Value::String(text));
    }
    if let Value::Object(options) = arg(args, 1)
        && crate::core::property::has_property(ctx, &options, &"cause".into())?
    {
        let cause = get_property(ctx, &options, &"cause".into(), &Value::Object(options.clone()))?;
        obj.borrow_mut().insert_builtin("cause", cause);
    }
    // Skip the constructor's own native frame.
    stamp_stack(ctx, &obj, 1, None);
    Ok(obj)
}

fn install_error_constructor(intrinsics: &Intrinsics, global: &JSObjectDataPtr, name: &'static str, parent: Option<&JSObjectDataPtr>) -> JSObjectDataPtr {
    let proto = intrinsics.error_prototype_for(name);
    let call = move |ctx: &Rc<Context>, _this: &Value, args: &[Value]| -> EvalResult<Value> {
        let proto = ctx.realm.intrinsics.error_prototype_for(name);
        Ok(Value::Object(build_error(ctx, proto, args)?))
    };
    let construct = move |ctx: &Rc<Context>, args: &[Value], new_target: &JSObjectDataPtr| -> EvalResult<Value> {
        let fallback = ctx.realm.intrinsics.error_prototype_for(name);
        let proto = get_prototype_from_constructor(ctx, new_target, &fallback)?;
        Ok(Value::Object(build_error(ctx, proto, args)?))
    };
    let ctor = new_native_constructor(intrinsics, name, 1, call, construct);
    if let Some(parent) = parent {
        ctor.borrow_mut().prototype = Some(parent.clone());
    }
    link_constructor(&ctor, &proto);
    {
        let mut p = proto.borrow_mut();
        p.insert_builtin("name", Value::from(name));
        p.insert_builtin("message", Value::from(""));
    }
    global.borrow_mut().insert_builtin(name, Value::Object(ctor.clone()));
    ctor
}

pub fn initialize_error(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let error_ctor = install_error_constructor(intrinsics, global, "Error", None);
    define_method(intrinsics, &intrinsics.error_prototype, "toString", 0, |ctx, this, _args| {
        let Value::Object(obj) = this else {
            return Err(raise_type_error!("Error.prototype.toString called on non-object").into());
        };
        let name = get_property(ctx, obj, &"name".into(), this)?;
        let name = if name.is_undefined() { "Error".into() } else { to_string(ctx, &name)? };
        let message = get_property(ctx, obj, &"message".into(), this)?;
        let message = if message.is_undefined() { "".into() } else { to_string(ctx, &message)? };
        Ok(Value::from(match (name.is_empty(), message.is_empty()) {
            (true, _) => message.to_string(),
            (false, true) => name.to_string(),
            (false, false) => format!("{name}: {message}"),
        }))
    });
    define_method(intrinsics, &error_ctor, "captureStackTrace", 2, |ctx, _this, args| {
        let Value::Object(target) = arg(args, 0) else {
            return Err(raise_type_error!("Invalid argument").into());
        };
        ctx.check_object_write(&target, "Error.captureStackTrace")?;
        let stop_at = match arg(args, 1) {
            Value::Object(f) if f.borrow().callable().is_some() => Some(f.borrow().id),
            _ => None,
        };
        let header = match error_header(&target) {
            Some(h) => h,
            None => {
                let text = crate::core::conversion::to_string(ctx, &Value::Object(target.clone()))?;
                text.to_string()
            }
        };
        // Frame 0 is captureStackTrace itself.
        let stack = ctx.realm.call_stack.render(&header, 1, stop_at);
        ctx.metadata.mark_stamped(&target);
        crate::core::property::define_property_or_throw(
            ctx,
            &target,
            &"stack".into(),
            crate::core::descriptor::PropertyDescriptor::new_data(Value::from(stack), true, false, true),
        )?;
        Ok(Value::Undefined)
    });
    for name in NATIVE_ERROR_NAMES {
        install_error_constructor(intrinsics, global, name, Some(&error_ctor));
    }
}
