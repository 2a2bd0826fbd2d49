//! `Object` and `Object.prototype`.

use crate::core::context::Context;
use crate::core::conversion::{to_object, to_property_key, value_description};
use crate::core::descriptor::PropertyDescriptor;
use crate::core::js_error::EvalResult;
use crate::core::property::{
    IntegrityLevel, create_data_property_or_throw, define_property_or_throw, enumerable_own_keys, get_own_property, get_property,
    get_prototype_of, get_value, has_own_property, is_extensible, own_property_keys, prevent_extensions, put_value, set_integrity_level,
    set_prototype_of, test_integrity_level,
};
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, is_array_value, new_object, same_value};
use crate::js_array::create_array;
use crate::js_function::{arg, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor, new_native_function};
use crate::js_iterator::for_each_iterated;
use crate::raise_type_error;
use std::rc::Rc;

fn object_arg(args: &[Value], i: usize, method: &str) -> EvalResult<JSObjectDataPtr> {
    match arg(args, i) {
        Value::Object(o) => Ok(o),
        other => Err(raise_type_error!("Object.{method} called on non-object {}", value_description(&other)).into()),
    }
}

fn prototype_arg(v: &Value, what: &str) -> EvalResult<Option<JSObjectDataPtr>> {
    match v {
        Value::Object(o) => Ok(Some(o.clone())),
        Value::Null => Ok(None),
        other => Err(raise_type_error!("{what} may only be an Object or null: {}", value_description(other)).into()),
    }
}

fn proto_value(proto: Option<JSObjectDataPtr>) -> Value {
    proto.map(Value::Object).unwrap_or(Value::Null)
}

#[derive(Clone, Copy)]
enum EntryKind {
    Keys,
    Values,
    Entries,
}

fn own_entries(ctx: &Rc<Context>, value: &Value, kind: EntryKind) -> EvalResult<Value> {
    let obj = to_object(ctx, value)?;
    let receiver = Value::Object(obj.clone());
    let mut out = Vec::new();
    for key in enumerable_own_keys(ctx, &obj)? {
        let item = match kind {
            EntryKind::Keys => Value::from(&key),
            EntryKind::Values => get_property(ctx, &obj, &key, &receiver)?,
            EntryKind::Entries => {
                let v = get_property(ctx, &obj, &key, &receiver)?;
                Value::Object(create_array(&ctx.realm.intrinsics, vec![Value::from(&key), v]))
            }
        };
        out.push(item);
    }
    Ok(Value::Object(create_array(&ctx.realm.intrinsics, out)))
}

/// `ObjectDefineProperties`.
fn define_properties(ctx: &Rc<Context>, target: &JSObjectDataPtr, properties: &Value) -> EvalResult<()> {
    let props = to_object(ctx, properties)?;
    let receiver = Value::Object(props.clone());
    let mut descriptors = Vec::new();
    for key in own_property_keys(ctx, &props)? {
        let Some(p) = get_own_property(ctx, &props, &key)? else {
            continue;
        };
        if !p.enumerable {
            continue;
        }
        let desc = match get_property(ctx, &props, &key, &receiver)? {
            Value::Object(d) => PropertyDescriptor::from_object(ctx, &d)?,
            other => return Err(raise_type_error!("Property description must be an object: {}", value_description(&other)).into()),
        };
        descriptors.push((key, desc));
    }
    for (key, desc) in descriptors {
        define_property_or_throw(ctx, target, &key, desc)?;
    }
    Ok(())
}

/// Tag used by `Object.prototype.toString` before consulting `Symbol.toStringTag`.
fn builtin_tag(obj: &JSObjectDataPtr) -> &'static str {
    if is_array_value(&Value::Object(obj.clone())) {
        return "Array";
    }
    match &obj.borrow().kind {
        ObjectKind::Function(_) => "Function",
        ObjectKind::Proxy(Some(p)) if p.callable => "Function",
        ObjectKind::Error => "Error",
        ObjectKind::Boolean(_) => "Boolean",
        ObjectKind::Number(_) => "Number",
        ObjectKind::String(_) => "String",
        ObjectKind::Arguments(_) => "Arguments",
        _ => "Object",
    }
}

fn object_to_string(ctx: &Rc<Context>, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    match this {
        Value::Undefined => return Ok(Value::from("[object Undefined]")),
        Value::Null => return Ok(Value::from("[object Null]")),
        _ => {}
    }
    let obj = to_object(ctx, this)?;
    let tag_key = PropertyKey::from(&ctx.realm.intrinsics.symbols.to_string_tag);
    let tag = match get_property(ctx, &obj, &tag_key, &Value::Object(obj.clone()))? {
        Value::String(s) => s.to_string(),
        _ => builtin_tag(&obj).to_string(),
    };
    Ok(Value::from(format!("[object {tag}]")))
}

fn object_construct(ctx: &Rc<Context>, args: &[Value], new_target: Option<&JSObjectDataPtr>) -> EvalResult<Value> {
    let intrinsics = &ctx.realm.intrinsics;
    if let Some(target) = new_target {
        let proto = get_prototype_from_constructor(ctx, target, &intrinsics.object_prototype)?;
        if !Rc::ptr_eq(&proto, &intrinsics.object_prototype) {
            return Ok(Value::Object(new_object(Some(&proto))));
        }
    }
    match arg(args, 0) {
        Value::Undefined | Value::Null => Ok(Value::Object(new_object(Some(&intrinsics.object_prototype)))),
        v => Ok(Value::Object(to_object(ctx, &v)?)),
    }
}

pub fn initialize_object(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.object_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "Object",
        1,
        |ctx, _this, args| object_construct(ctx, args, None),
        |ctx, args, new_target| object_construct(ctx, args, Some(new_target)),
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, &ctor, "keys", 1, |ctx, _this, args| own_entries(ctx, &arg(args, 0), EntryKind::Keys));
    define_method(intrinsics, &ctor, "values", 1, |ctx, _this, args| own_entries(ctx, &arg(args, 0), EntryKind::Values));
    define_method(intrinsics, &ctor, "entries", 1, |ctx, _this, args| own_entries(ctx, &arg(args, 0), EntryKind::Entries));
    define_method(intrinsics, &ctor, "getPrototypeOf", 1, |ctx, _this, args| {
        let obj = to_object(ctx, &arg(args, 0))?;
        Ok(proto_value(get_prototype_of(ctx, &obj)?))
    });
    define_method(intrinsics, &ctor, "setPrototypeOf", 2, |ctx, _this, args| {
        let target = arg(args, 0);
        if target.is_nullish() {
            return Err(raise_type_error!("Object.setPrototypeOf called on null or undefined").into());
        }
        let proto = prototype_arg(&arg(args, 1), "Object prototype")?;
        if let Value::Object(obj) = &target
            && !set_prototype_of(ctx, obj, proto)?
        {
            return Err(raise_type_error!("Cyclic __proto__ value or object is not extensible").into());
        }
        Ok(target)
    });
    define_method(intrinsics, &ctor, "getOwnPropertyNames", 1, |ctx, _this, args| {
        let obj = to_object(ctx, &arg(args, 0))?;
        let names = own_property_keys(ctx, &obj)?
            .iter()
            .filter(|k| !k.is_symbol())
            .map(Value::from)
            .collect();
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, names)))
    });
    define_method(intrinsics, &ctor, "getOwnPropertySymbols", 1, |ctx, _this, args| {
        let obj = to_object(ctx, &arg(args, 0))?;
        let symbols = own_property_keys(ctx, &obj)?.iter().filter(|k| k.is_symbol()).map(Value::from).collect();
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, symbols)))
    });
    define_method(intrinsics, &ctor, "getOwnPropertyDescriptor", 2, |ctx, _this, args| {
        let obj = to_object(ctx, &arg(args, 0))?;
        let key = to_property_key(ctx, &arg(args, 1))?;
        Ok(match get_own_property(ctx, &obj, &key)? {
            Some(p) => Value::Object(p.to_descriptor().to_object(ctx)),
            None => Value::Undefined,
        })
    });
    define_method(intrinsics, &ctor, "getOwnPropertyDescriptors", 1, |ctx, _this, args| {
        let obj = to_object(ctx, &arg(args, 0))?;
        let out = new_object(Some(&ctx.realm.intrinsics.object_prototype));
        for key in own_property_keys(ctx, &obj)? {
            if let Some(p) = get_own_property(ctx, &obj, &key)? {
                create_data_property_or_throw(ctx, &out, &key, Value::Object(p.to_descriptor().to_object(ctx)))?;
            }
        }
        Ok(Value::Object(out))
    });
    define_method(intrinsics, &ctor, "defineProperty", 3, |ctx, _this, args| {
        let obj = object_arg(args, 0, "defineProperty")?;
        let key = to_property_key(ctx, &arg(args, 1))?;
        let desc = match arg(args, 2) {
            Value::Object(d) => PropertyDescriptor::from_object(ctx, &d)?,
            other => return Err(raise_type_error!("Property description must be an object: {}", value_description(&other)).into()),
        };
        define_property_or_throw(ctx, &obj, &key, desc)?;
        Ok(Value::Object(obj))
    });
    define_method(intrinsics, &ctor, "defineProperties", 2, |ctx, _this, args| {
        let obj = object_arg(args, 0, "defineProperties")?;
        define_properties(ctx, &obj, &arg(args, 1))?;
        Ok(Value::Object(obj))
    });
    define_method(intrinsics, &ctor, "create", 2, |ctx, _this, args| {
        let proto = prototype_arg(&arg(args, 0), "Object prototype")?;
        let obj = new_object(proto.as_ref());
        let properties = arg(args, 1);
        if !properties.is_undefined() {
            define_properties(ctx, &obj, &properties)?;
        }
        Ok(Value::Object(obj))
    });
    define_method(intrinsics, &ctor, "assign", 2, |ctx, _this, args| {
        let target = to_object(ctx, &arg(args, 0))?;
        let target_value = Value::Object(target.clone());
        for source in args.iter().skip(1) {
            if source.is_nullish() {
                continue;
            }
            let from = to_object(ctx, source)?;
            for key in own_property_keys(ctx, &from)? {
                if let Some(p) = get_own_property(ctx, &from, &key)?
                    && p.enumerable
                {
                    let v = get_property(ctx, &from, &key, source)?;
                    put_value(ctx, &target_value, &key, v, true)?;
                }
            }
        }
        Ok(target_value)
    });
    define_method(intrinsics, &ctor, "fromEntries", 1, |ctx, _this, args| {
        let iterable = arg(args, 0);
        if iterable.is_nullish() {
            return Err(raise_type_error!("{} is not iterable", value_description(&iterable)).into());
        }
        let out = new_object(Some(&ctx.realm.intrinsics.object_prototype));
        for_each_iterated(ctx, &iterable, |entry| {
            if !matches!(entry, Value::Object(_)) {
                return Err(raise_type_error!("Iterator value {} is not an entry object", value_description(&entry)).into());
            }
            let key = get_value(ctx, &entry, &PropertyKey::from(0usize))?;
            let value = get_value(ctx, &entry, &PropertyKey::from(1usize))?;
            let key = to_property_key(ctx, &key)?;
            create_data_property_or_throw(ctx, &out, &key, value)
        })?;
        Ok(Value::Object(out))
    });
    define_method(intrinsics, &ctor, "freeze", 1, |ctx, _this, args| {
        let target = arg(args, 0);
        if let Value::Object(obj) = &target
            && !set_integrity_level(ctx, obj, IntegrityLevel::Frozen)?
        {
            return Err(raise_type_error!("Cannot freeze").into());
        }
        Ok(target)
    });
    define_method(intrinsics, &ctor, "seal", 1, |ctx, _this, args| {
        let target = arg(args, 0);
        if let Value::Object(obj) = &target
            && !set_integrity_level(ctx, obj, IntegrityLevel::Sealed)?
        {
            return Err(raise_type_error!("Cannot seal").into());
        }
        Ok(target)
    });
    define_method(intrinsics, &ctor, "preventExtensions", 1, |ctx, _this, args| {
        let target = arg(args, 0);
        if let Value::Object(obj) = &target
            && !prevent_extensions(ctx, obj)?
        {
            return Err(raise_type_error!("Cannot prevent extensions").into());
        }
        Ok(target)
    });
    define_method(intrinsics, &ctor, "isFrozen", 1, |ctx, _this, args| match arg(args, 0) {
        Value::Object(obj) => Ok(Value::Boolean(test_integrity_level(ctx, &obj, IntegrityLevel::Frozen)?)),
        _ => Ok(Value::Boolean(true)),
    });
    define_method(intrinsics, &ctor, "isSealed", 1, |ctx, _this, args| match arg(args, 0) {
        Value::Object(obj) => Ok(Value::Boolean(test_integrity_level(ctx, &obj, IntegrityLevel::Sealed)?)),
        _ => Ok(Value::Boolean(true)),
    });
    define_method(intrinsics, &ctor, "isExtensible", 1, |ctx, _this, args| match arg(args, 0) {
        Value::Object(obj) => Ok(Value::Boolean(is_extensible(ctx, &obj)?)),
        _ => Ok(Value::Boolean(false)),
    });
    define_method(intrinsics, &ctor, "is", 2, |_ctx, _this, args| {
        Ok(Value::Boolean(same_value(&arg(args, 0), &arg(args, 1))))
    });
    define_method(intrinsics, &ctor, "hasOwn", 2, |ctx, _this, args| {
        let obj = to_object(ctx, &arg(args, 0))?;
        let key = to_property_key(ctx, &arg(args, 1))?;
        Ok(Value::Boolean(has_own_property(ctx, &obj, &key)?))
    });

    define_method(intrinsics, proto, "hasOwnProperty", 1, |ctx, this, args| {
        let key = to_property_key(ctx, &arg(args, 0))?;
        let obj = to_object(ctx, this)?;
        Ok(Value::Boolean(has_own_property(ctx, &obj, &key)?))
    });
    define_method(intrinsics, proto, "isPrototypeOf", 1, |ctx, this, args| {
        let Value::Object(v) = arg(args, 0) else {
            return Ok(Value::Boolean(false));
        };
        let obj = to_object(ctx, this)?;
        let mut current = get_prototype_of(ctx, &v)?;
        while let Some(p) = current {
            if Rc::ptr_eq(&p, &obj) {
                return Ok(Value::Boolean(true));
            }
            current = get_prototype_of(ctx, &p)?;
        }
        Ok(Value::Boolean(false))
    });
    define_method(intrinsics, proto, "propertyIsEnumerable", 1, |ctx, this, args| {
        let key = to_property_key(ctx, &arg(args, 0))?;
        let obj = to_object(ctx, this)?;
        Ok(Value::Boolean(get_own_property(ctx, &obj, &key)?.is_some_and(|p| p.enumerable)))
    });
    define_method(intrinsics, proto, "toString", 0, object_to_string);
    define_method(intrinsics, proto, "toLocaleString", 0, |ctx, this, _args| {
        let to_string = get_value(ctx, this, &"toString".into())?;
        crate::js_function::call_function(ctx, &to_string, this, &[])
    });
    define_method(intrinsics, proto, "valueOf", 0, |ctx, this, _args| Ok(Value::Object(to_object(ctx, this)?)));

    let proto_getter = new_native_function(intrinsics, "get __proto__", 0, |ctx, this, _args| {
        let obj = to_object(ctx, this)?;
        Ok(proto_value(get_prototype_of(ctx, &obj)?))
    });
    let proto_setter = new_native_function(intrinsics, "set __proto__", 1, |ctx, this, args| {
        if this.is_nullish() {
            return Err(raise_type_error!("Object.prototype.__proto__ called on null or undefined").into());
        }
        let proto = match arg(args, 0) {
            Value::Object(o) => Some(o),
            Value::Null => None,
            _ => return Ok(Value::Undefined),
        };
        if let Value::Object(obj) = this
            && !set_prototype_of(ctx, obj, proto)?
        {
            return Err(raise_type_error!("Cyclic __proto__ value or object is not extensible").into());
        }
        Ok(Value::Undefined)
    });
    proto
        .borrow_mut()
        .insert_accessor("__proto__", Some(Value::Object(proto_getter)), Some(Value::Object(proto_setter)), false, true);

    global.borrow_mut().insert_builtin("Object", Value::Object(ctor));
}
