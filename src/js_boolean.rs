use crate::core::context::Context;
use crate::core::js_error::EvalResult;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, new_object_with_kind, to_boolean};
use crate::js_function::{arg, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::raise_type_error;
use std::rc::Rc;

fn this_boolean_value(this: &Value, method: &str) -> EvalResult<bool> {
    match this {
        Value::Boolean(b) => Ok(*b),
        Value::Object(o) => match o.borrow().kind {
            ObjectKind::Boolean(b) => Ok(b),
            _ => Err(raise_type_error!("Boolean.prototype.{method} requires that 'this' be a Boolean").into()),
        },
        _ => Err(raise_type_error!("Boolean.prototype.{method} requires that 'this' be a Boolean").into()),
    }
}

fn boolean_construct(ctx: &Rc<Context>, args: &[Value], new_target: &JSObjectDataPtr) -> EvalResult<Value> {
    let b = to_boolean(&arg(args, 0));
    let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.boolean_prototype)?;
    Ok(Value::Object(new_object_with_kind(Some(&proto), ObjectKind::Boolean(b))))
}

pub fn initialize_boolean(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.boolean_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "Boolean",
        1,
        |_ctx, _this, args| Ok(Value::Boolean(to_boolean(&arg(args, 0)))),
        boolean_construct,
    );
    link_constructor(&ctor, proto);
    define_method(intrinsics, proto, "toString", 0, |_ctx, this, _args| {
        Ok(Value::from(if this_boolean_value(this, "toString")? { "true" } else { "false" }))
    });
    define_method(intrinsics, proto, "valueOf", 0, |_ctx, this, _args| Ok(Value::Boolean(this_boolean_value(this, "valueOf")?)));
    global.borrow_mut().insert_builtin("Boolean", Value::Object(ctor));
}
