use crate::core::context::Context;
use crate::core::conversion::value_description;
use crate::core::js_error::EvalResult;
use crate::core::property::get_value;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, new_object_with_kind};
use crate::js_function::{arg, call_function, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::js_iterator::for_each_iterated;
use crate::js_weakmap::{WeakTable, this_weak_table, with_weak_table};
use crate::raise_type_error;
use std::rc::Rc;

fn weakset_construct(ctx: &Rc<Context>, args: &[Value], new_target: &JSObjectDataPtr) -> EvalResult<Value> {
    let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.weak_set_prototype)?;
    let set = Value::Object(new_object_with_kind(Some(&proto), ObjectKind::WeakSet(WeakTable::new())));
    let iterable = arg(args, 0);
    if iterable.is_nullish() {
        return Ok(set);
    }
    let adder = get_value(ctx, &set, &"add".into())?;
    if !adder.is_callable() {
        return Err(raise_type_error!("WeakSet constructor: 'add' is not a function").into());
    }
    for_each_iterated(ctx, &iterable, |value| {
        call_function(ctx, &adder, &set, &[value])?;
        Ok(())
    })?;
    Ok(set)
}

pub fn initialize_weakset(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.weak_set_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "WeakSet",
        0,
        |_ctx, _this, _args| Err(raise_type_error!("Constructor WeakSet requires 'new'").into()),
        weakset_construct,
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, proto, "add", 1, |ctx, this, args| {
        let set = this_weak_table(this, true, "add")?;
        let value = match arg(args, 0) {
            Value::Object(value) => value,
            other => return Err(raise_type_error!("Invalid value used in weak set: {}", value_description(&other)).into()),
        };
        ctx.check_object_write(&set, "WeakSet.prototype.add")?;
        with_weak_table(&set, |t| t.insert(&value, Value::Boolean(true)));
        Ok(this.clone())
    });
    define_method(intrinsics, proto, "has", 1, |_ctx, this, args| {
        let set = this_weak_table(this, true, "has")?;
        let Value::Object(value) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        Ok(Value::Boolean(with_weak_table(&set, |t| t.contains(&value)).unwrap_or(false)))
    });
    define_method(intrinsics, proto, "delete", 1, |ctx, this, args| {
        let set = this_weak_table(this, true, "delete")?;
        let Value::Object(value) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        ctx.check_object_write(&set, "WeakSet.prototype.delete")?;
        Ok(Value::Boolean(with_weak_table(&set, |t| t.remove(&value).is_some()).unwrap_or(false)))
    });
    proto
        .borrow_mut()
        .insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("WeakSet"), false, false, true);

    global.borrow_mut().insert_builtin("WeakSet", Value::Object(ctor));
}
