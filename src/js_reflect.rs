use crate::core::context::Context;
use crate::core::conversion::{to_property_key, value_description};
use crate::core::descriptor::PropertyDescriptor;
use crate::core::js_error::EvalResult;
use crate::core::property::{
    define_own_property, delete_property, get_own_property, get_property, get_prototype_of, has_property, is_extensible, own_property_keys,
    prevent_extensions, set_property, set_prototype_of,
};
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, Value, new_object};
use crate::js_array::{create_array, create_list_from_array_like};
use crate::js_function::{arg, call_function, construct, define_method};
use crate::raise_type_error;
use std::rc::Rc;

fn target_arg(args: &[Value], method: &str) -> EvalResult<JSObjectDataPtr> {
    match args.first() {
        Some(Value::Object(o)) => Ok(o.clone()),
        other => {
            let shown = other.cloned().unwrap_or_default();
            Err(raise_type_error!("Reflect.{method} called on non-object {}", value_description(&shown)).into())
        }
    }
}

fn key_arg(ctx: &Rc<Context>, args: &[Value], i: usize) -> EvalResult<PropertyKey> {
    to_property_key(ctx, &arg(args, i))
}

/// Create the Reflect object with all reflection methods
pub fn initialize_reflect(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let reflect = new_object(Some(&intrinsics.object_prototype));

    define_method(intrinsics, &reflect, "apply", 3, |ctx, _this, args| {
        let target = arg(args, 0);
        if !target.is_callable() {
            return Err(raise_type_error!("{} is not a function", value_description(&target)).into());
        }
        let list = create_list_from_array_like(ctx, &arg(args, 2))?;
        call_function(ctx, &target, &arg(args, 1), &list)
    });
    define_method(intrinsics, &reflect, "construct", 2, |ctx, _this, args| {
        let target = arg(args, 0);
        if !target.is_constructor() {
            return Err(raise_type_error!("{} is not a constructor", value_description(&target)).into());
        }
        let new_target = match args.get(2) {
            Some(nt) if !nt.is_constructor() => {
                return Err(raise_type_error!("{} is not a constructor", value_description(nt)).into());
            }
            Some(nt) => nt.clone(),
            None => target.clone(),
        };
        let list = create_list_from_array_like(ctx, &arg(args, 1))?;
        construct(ctx, &target, &list, &new_target)
    });
    define_method(intrinsics, &reflect, "defineProperty", 3, |ctx, _this, args| {
        let target = target_arg(args, "defineProperty")?;
        let key = key_arg(ctx, args, 1)?;
        let Value::Object(attributes) = arg(args, 2) else {
            return Err(raise_type_error!("Property description must be an object").into());
        };
        let desc = PropertyDescriptor::from_object(ctx, &attributes)?;
        Ok(Value::Boolean(define_own_property(ctx, &target, &key, desc)?))
    });
    define_method(intrinsics, &reflect, "deleteProperty", 2, |ctx, _this, args| {
        let target = target_arg(args, "deleteProperty")?;
        let key = key_arg(ctx, args, 1)?;
        Ok(Value::Boolean(delete_property(ctx, &target, &key)?))
    });
    define_method(intrinsics, &reflect, "get", 2, |ctx, _this, args| {
        let target = target_arg(args, "get")?;
        let key = key_arg(ctx, args, 1)?;
        let receiver = args.get(2).cloned().unwrap_or_else(|| Value::Object(target.clone()));
        get_property(ctx, &target, &key, &receiver)
    });
    define_method(intrinsics, &reflect, "getOwnPropertyDescriptor", 2, |ctx, _this, args| {
        let target = target_arg(args, "getOwnPropertyDescriptor")?;
        let key = key_arg(ctx, args, 1)?;
        Ok(match get_own_property(ctx, &target, &key)? {
            Some(p) => Value::Object(p.to_descriptor().to_object(ctx)),
            None => Value::Undefined,
        })
    });
    define_method(intrinsics, &reflect, "getPrototypeOf", 1, |ctx, _this, args| {
        let target = target_arg(args, "getPrototypeOf")?;
        Ok(get_prototype_of(ctx, &target)?.map(Value::Object).unwrap_or(Value::Null))
    });
    define_method(intrinsics, &reflect, "has", 2, |ctx, _this, args| {
        let target = target_arg(args, "has")?;
        let key = key_arg(ctx, args, 1)?;
        Ok(Value::Boolean(has_property(ctx, &target, &key)?))
    });
    define_method(intrinsics, &reflect, "isExtensible", 1, |ctx, _this, args| {
        let target = target_arg(args, "isExtensible")?;
        Ok(Value::Boolean(is_extensible(ctx, &target)?))
    });
    define_method(intrinsics, &reflect, "ownKeys", 1, |ctx, _this, args| {
        let target = target_arg(args, "ownKeys")?;
        let keys = own_property_keys(ctx, &target)?.iter().map(Value::from).collect();
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, keys)))
    });
    define_method(intrinsics, &reflect, "preventExtensions", 1, |ctx, _this, args| {
        let target = target_arg(args, "preventExtensions")?;
        Ok(Value::Boolean(prevent_extensions(ctx, &target)?))
    });
    define_method(intrinsics, &reflect, "set", 3, |ctx, _this, args| {
        let target = target_arg(args, "set")?;
        let key = key_arg(ctx, args, 1)?;
        let receiver = args.get(3).cloned().unwrap_or_else(|| Value::Object(target.clone()));
        Ok(Value::Boolean(set_property(ctx, &target, &key, arg(args, 2), &receiver)?))
    });
    define_method(intrinsics, &reflect, "setPrototypeOf", 2, |ctx, _this, args| {
        let target = target_arg(args, "setPrototypeOf")?;
        let proto = match arg(args, 1) {
            Value::Object(o) => Some(o),
            Value::Null => None,
            _ => return Err(raise_type_error!("Object prototype may only be an Object or null").into()),
        };
        Ok(Value::Boolean(set_prototype_of(ctx, &target, proto)?))
    });

    reflect
        .borrow_mut()
        .insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("Reflect"), false, false, true);
    global.borrow_mut().insert_builtin("Reflect", Value::Object(reflect));
}
