//! `WeakMap`. Entries are keyed by object identity and hold their key weakly.

use crate::core::context::Context;
use crate::core::conversion::value_description;
use crate::core::js_error::EvalResult;
use crate::core::metadata::WeakIdentityMap;
use crate::core::property::get_value;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, new_object_with_kind};
use crate::js_function::{arg, call_function, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::js_iterator::for_each_iterated;
use crate::raise_type_error;
use std::rc::Rc;

/// Backing store of `WeakMap` and `WeakSet` objects. A `WeakSet` stores
/// `true` for each member.
pub type WeakTable = WeakIdentityMap<Value>;

/// The weak table of a `WeakMap` (`want_set == false`) or `WeakSet` receiver.
pub(crate) fn this_weak_table(this: &Value, want_set: bool, method: &str) -> EvalResult<JSObjectDataPtr> {
    let type_name = if want_set { "WeakSet" } else { "WeakMap" };
    if let Value::Object(o) = this {
        let matches = match o.borrow().kind {
            ObjectKind::WeakMap(_) => !want_set,
            ObjectKind::WeakSet(_) => want_set,
            _ => false,
        };
        if matches {
            return Ok(o.clone());
        }
    }
    Err(raise_type_error!("Method {type_name}.prototype.{method} called on incompatible receiver {}", value_description(this)).into())
}

pub(crate) fn with_weak_table<R>(obj: &JSObjectDataPtr, f: impl FnOnce(&WeakTable) -> R) -> Option<R> {
    match &obj.borrow().kind {
        ObjectKind::WeakMap(table) | ObjectKind::WeakSet(table) => Some(f(table)),
        _ => None,
    }
}

/// Live `(key, value)` pairs of a weak collection, for inspection.
pub fn weak_entries(obj: &JSObjectDataPtr) -> Option<Vec<(JSObjectDataPtr, Value)>> {
    with_weak_table(obj, |t| t.entries())
}

fn weakmap_construct(ctx: &Rc<Context>, args: &[Value], new_target: &JSObjectDataPtr) -> EvalResult<Value> {
    let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.weak_map_prototype)?;
    let map = Value::Object(new_object_with_kind(Some(&proto), ObjectKind::WeakMap(WeakTable::new())));
    let iterable = arg(args, 0);
    if iterable.is_nullish() {
        return Ok(map);
    }
    let adder = get_value(ctx, &map, &"set".into())?;
    if !adder.is_callable() {
        return Err(raise_type_error!("WeakMap constructor: 'set' is not a function").into());
    }
    for_each_iterated(ctx, &iterable, |entry| {
        if !matches!(entry, Value::Object(_)) {
            return Err(raise_type_error!("Iterator value {} is not an entry object", value_description(&entry)).into());
        }
        let k = get_value(ctx, &entry, &PropertyKey::from(0u32))?;
        let v = get_value(ctx, &entry, &PropertyKey::from(1u32))?;
        call_function(ctx, &adder, &map, &[k, v])?;
        Ok(())
    })?;
    Ok(map)
}

pub fn initialize_weakmap(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.weak_map_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "WeakMap",
        0,
        |_ctx, _this, _args| Err(raise_type_error!("Constructor WeakMap requires 'new'").into()),
        weakmap_construct,
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, proto, "get", 1, |_ctx, this, args| {
        let map = this_weak_table(this, false, "get")?;
        let Value::Object(key) = arg(args, 0) else {
            return Ok(Value::Undefined);
        };
        Ok(with_weak_table(&map, |t| t.get(&key)).flatten().unwrap_or_default())
    });
    define_method(intrinsics, proto, "has", 1, |_ctx, this, args| {
        let map = this_weak_table(this, false, "has")?;
        let Value::Object(key) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        Ok(Value::Boolean(with_weak_table(&map, |t| t.contains(&key)).unwrap_or(false)))
    });
    define_method(intrinsics, proto, "set", 2, |ctx, this, args| {
        let map = this_weak_table(this, false, "set")?;
        let key = match arg(args, 0) {
            Value::Object(key) => key,
            other => return Err(raise_type_error!("Invalid value used as weak map key: {}", value_description(&other)).into()),
        };
        ctx.check_object_write(&map, "WeakMap.prototype.set")?;
        with_weak_table(&map, |t| t.insert(&key, arg(args, 1)));
        Ok(this.clone())
    });
    define_method(intrinsics, proto, "delete", 1, |ctx, this, args| {
        let map = this_weak_table(this, false, "delete")?;
        let Value::Object(key) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        ctx.check_object_write(&map, "WeakMap.prototype.delete")?;
        Ok(Value::Boolean(with_weak_table(&map, |t| t.remove(&key).is_some()).unwrap_or(false)))
    });
    proto
        .borrow_mut()
        .insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("WeakMap"), false, false, true);

    global.borrow_mut().insert_builtin("WeakMap", Value::Object(ctor));
}
