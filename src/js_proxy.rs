//! `Proxy` objects and the trap dispatch behind every object internal method.

use crate::core::context::Context;
use crate::core::conversion::primitive_to_string;
use crate::core::descriptor::{PropertyDescriptor, PropertySlot};
use crate::core::js_error::EvalResult;
use crate::core::property::{self, get_method};
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, is_callable, is_constructor, new_object, new_object_with_kind, same_value, to_boolean};
use crate::js_array::{create_array, create_list_from_array_like};
use crate::js_function::{call_function, construct, define_method, new_native_constructor, new_native_function};
use crate::raise_type_error;
use std::cell::RefCell;
use std::rc::Rc;

/// Internal slots of a live proxy.
#[derive(Clone, Debug)]
pub struct ProxyData {
    pub target: JSObjectDataPtr,
    pub handler: JSObjectDataPtr,
    pub callable: bool,
    pub constructable: bool,
}

fn key_text(key: &PropertyKey) -> String {
    key.to_string()
}

fn trap(ctx: &Rc<Context>, data: &ProxyData, name: &str) -> EvalResult<Option<Value>> {
    get_method(ctx, &Value::Object(data.handler.clone()), &name.into())
}

fn call_trap(ctx: &Rc<Context>, data: &ProxyData, trap: &Value, args: &[Value]) -> EvalResult<Value> {
    call_function(ctx, trap, &Value::Object(data.handler.clone()), args)
}

fn target_value(data: &ProxyData) -> Value {
    Value::Object(data.target.clone())
}

pub fn proxy_get_own_property(ctx: &Rc<Context>, data: &ProxyData, key: &PropertyKey) -> EvalResult<Option<PropertyDescriptor>> {
    let target_prop = property::get_own_property(ctx, &data.target, key)?;
    let Some(t) = trap(ctx, data, "getOwnPropertyDescriptor")? else {
        return Ok(target_prop.map(|p| p.to_descriptor()));
    };
    let result = call_trap(ctx, data, &t, &[target_value(data), Value::from(key)])?;
    match result {
        Value::Undefined => {
            if target_prop.as_ref().is_some_and(|p| !p.configurable) {
                return Err(raise_type_error!(
                    "'getOwnPropertyDescriptor' on proxy: trap returned undefined for property '{}' which is non-configurable in the proxy target",
                    key_text(key)
                )
                .into());
            }
            Ok(None)
        }
        Value::Object(desc_obj) => {
            let desc = PropertyDescriptor::from_object(ctx, &desc_obj)?.into_property();
            if !desc.configurable && target_prop.as_ref().is_none_or(|p| p.configurable) {
                return Err(raise_type_error!(
                    "'getOwnPropertyDescriptor' on proxy: trap reported non-configurability for property '{}' which is either non-existent or configurable in the proxy target",
                    key_text(key)
                )
                .into());
            }
            Ok(Some(desc.to_descriptor()))
        }
        _ => Err(raise_type_error!(
            "'getOwnPropertyDescriptor' on proxy: trap returned neither object nor undefined for property '{}'",
            key_text(key)
        )
        .into()),
    }
}

pub fn proxy_define_own_property(ctx: &Rc<Context>, data: &ProxyData, key: &PropertyKey, desc: PropertyDescriptor) -> EvalResult<bool> {
    let Some(t) = trap(ctx, data, "defineProperty")? else {
        return property::define_own_property(ctx, &data.target, key, desc);
    };
    let setting_non_configurable = desc.configurable == Some(false);
    let desc_obj = desc.to_object(ctx);
    let result = call_trap(ctx, data, &t, &[target_value(data), Value::from(key), Value::Object(desc_obj)])?;
    if !to_boolean(&result) {
        return Ok(false);
    }
    let target_prop = property::get_own_property(ctx, &data.target, key)?;
    match target_prop {
        None if !property::is_extensible(ctx, &data.target)? => Err(raise_type_error!(
            "'defineProperty' on proxy: trap returned truish for adding property '{}'  to the non-extensible proxy target",
            key_text(key)
        )
        .into()),
        None if setting_non_configurable => Err(raise_type_error!(
            "'defineProperty' on proxy: trap returned truish for defining non-configurable property '{}' which is either non-existent or configurable in the proxy target",
            key_text(key)
        )
        .into()),
        Some(p) if setting_non_configurable && p.configurable => Err(raise_type_error!(
            "'defineProperty' on proxy: trap returned truish for defining non-configurable property '{}' which is either non-existent or configurable in the proxy target",
            key_text(key)
        )
        .into()),
        _ => Ok(true),
    }
}

pub fn proxy_has(ctx: &Rc<Context>, data: &ProxyData, key: &PropertyKey) -> EvalResult<bool> {
    let Some(t) = trap(ctx, data, "has")? else {
        return property::has_property(ctx, &data.target, key);
    };
    let result = to_boolean(&call_trap(ctx, data, &t, &[target_value(data), Value::from(key)])?);
    if !result
        && let Some(p) = property::get_own_property(ctx, &data.target, key)?
        && !p.configurable
    {
        return Err(raise_type_error!(
            "'has' on proxy: trap returned falsish for property '{}' which exists in the proxy target as non-configurable",
            key_text(key)
        )
        .into());
    }
    Ok(result)
}

/// Value of a non-configurable, non-writable data property of the target.
fn frozen_target_value(ctx: &Rc<Context>, data: &ProxyData, key: &PropertyKey) -> EvalResult<Option<Value>> {
    Ok(match property::get_own_property(ctx, &data.target, key)? {
        Some(p) if !p.configurable => match p.slot {
            PropertySlot::Data { value, writable: false } => Some(value),
            _ => None,
        },
        _ => None,
    })
}

pub fn proxy_get(ctx: &Rc<Context>, data: &ProxyData, key: &PropertyKey, receiver: &Value) -> EvalResult<Value> {
    let Some(t) = trap(ctx, data, "get")? else {
        return property::get_property(ctx, &data.target, key, receiver);
    };
    let value = call_trap(ctx, data, &t, &[target_value(data), Value::from(key), receiver.clone()])?;
    if let Some(expected) = frozen_target_value(ctx, data, key)?
        && !same_value(&expected, &value)
    {
        return Err(raise_type_error!(
            "'get' on proxy: property '{}' is a read-only and non-configurable data property on the proxy target but the proxy did not return its actual value (expected '{}' but got '{}')",
            key_text(key),
            primitive_to_string(&expected),
            primitive_to_string(&value)
        )
        .into());
    }
    Ok(value)
}

pub fn proxy_set(ctx: &Rc<Context>, data: &ProxyData, key: &PropertyKey, value: Value, receiver: &Value) -> EvalResult<bool> {
    let Some(t) = trap(ctx, data, "set")? else {
        return property::set_property(ctx, &data.target, key, value, receiver);
    };
    let result = call_trap(ctx, data, &t, &[target_value(data), Value::from(key), value.clone(), receiver.clone()])?;
    if !to_boolean(&result) {
        return Ok(false);
    }
    if let Some(expected) = frozen_target_value(ctx, data, key)?
        && !same_value(&expected, &value)
    {
        return Err(raise_type_error!(
            "'set' on proxy: trap returned truish for property '{}' which exists in the proxy target as a non-configurable and non-writable data property with a different value",
            key_text(key)
        )
        .into());
    }
    Ok(true)
}

pub fn proxy_delete(ctx: &Rc<Context>, data: &ProxyData, key: &PropertyKey) -> EvalResult<bool> {
    let Some(t) = trap(ctx, data, "deleteProperty")? else {
        return property::delete_property(ctx, &data.target, key);
    };
    let result = to_boolean(&call_trap(ctx, data, &t, &[target_value(data), Value::from(key)])?);
    if result
        && let Some(p) = property::get_own_property(ctx, &data.target, key)?
        && !p.configurable
    {
        return Err(raise_type_error!(
            "'deleteProperty' on proxy: trap returned truish for property '{}' which is non-configurable in the proxy target",
            key_text(key)
        )
        .into());
    }
    Ok(result)
}

pub fn proxy_own_keys(ctx: &Rc<Context>, data: &ProxyData) -> EvalResult<Vec<PropertyKey>> {
    let Some(t) = trap(ctx, data, "ownKeys")? else {
        return property::own_property_keys(ctx, &data.target);
    };
    let result = call_trap(ctx, data, &t, &[target_value(data)])?;
    if !matches!(result, Value::Object(_)) {
        return Err(raise_type_error!("CreateListFromArrayLike called on non-object").into());
    }
    let mut keys: Vec<PropertyKey> = Vec::new();
    for v in create_list_from_array_like(ctx, &result)? {
        let key = match v {
            Value::String(s) => PropertyKey::String(s),
            Value::Symbol(s) => PropertyKey::Symbol(s),
            other => return Err(raise_type_error!("{} is not a valid property name", primitive_to_string(&other)).into()),
        };
        if keys.contains(&key) {
            return Err(raise_type_error!("'ownKeys' on proxy: trap returned duplicate entries").into());
        }
        keys.push(key);
    }
    let target_extensible = property::is_extensible(ctx, &data.target)?;
    for target_key in property::own_property_keys(ctx, &data.target)? {
        let required = !target_extensible
            || property::get_own_property(ctx, &data.target, &target_key)?.is_some_and(|p| !p.configurable);
        if required && !keys.contains(&target_key) {
            return Err(raise_type_error!("'ownKeys' on proxy: trap result did not include '{}'", key_text(&target_key)).into());
        }
    }
    Ok(keys)
}

pub fn proxy_get_prototype_of(ctx: &Rc<Context>, data: &ProxyData) -> EvalResult<Option<JSObjectDataPtr>> {
    let Some(t) = trap(ctx, data, "getPrototypeOf")? else {
        return property::get_prototype_of(ctx, &data.target);
    };
    match call_trap(ctx, data, &t, &[target_value(data)])? {
        Value::Object(o) => Ok(Some(o)),
        Value::Null => Ok(None),
        _ => Err(raise_type_error!("'getPrototypeOf' on proxy: trap returned neither object nor null").into()),
    }
}

pub fn proxy_set_prototype_of(ctx: &Rc<Context>, data: &ProxyData, proto: Option<JSObjectDataPtr>) -> EvalResult<bool> {
    let Some(t) = trap(ctx, data, "setPrototypeOf")? else {
        return property::set_prototype_of(ctx, &data.target, proto);
    };
    let proto_value = proto.map(Value::Object).unwrap_or(Value::Null);
    Ok(to_boolean(&call_trap(ctx, data, &t, &[target_value(data), proto_value])?))
}

pub fn proxy_is_extensible(ctx: &Rc<Context>, data: &ProxyData) -> EvalResult<bool> {
    let Some(t) = trap(ctx, data, "isExtensible")? else {
        return property::is_extensible(ctx, &data.target);
    };
    let result = to_boolean(&call_trap(ctx, data, &t, &[target_value(data)])?);
    let actual = property::is_extensible(ctx, &data.target)?;
    if result != actual {
        return Err(raise_type_error!(
            "'isExtensible' on proxy: trap result does not reflect extensibility of proxy target (which is '{actual}')"
        )
        .into());
    }
    Ok(result)
}

pub fn proxy_prevent_extensions(ctx: &Rc<Context>, data: &ProxyData) -> EvalResult<bool> {
    let Some(t) = trap(ctx, data, "preventExtensions")? else {
        return property::prevent_extensions(ctx, &data.target);
    };
    let result = to_boolean(&call_trap(ctx, data, &t, &[target_value(data)])?);
    if result && property::is_extensible(ctx, &data.target)? {
        return Err(raise_type_error!("'preventExtensions' on proxy: trap returned truish but the proxy target is extensible").into());
    }
    Ok(result)
}

pub fn proxy_call(ctx: &Rc<Context>, data: &ProxyData, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Some(t) = trap(ctx, data, "apply")? else {
        return call_function(ctx, &target_value(data), this, args);
    };
    let list = create_array(&ctx.realm.intrinsics, args.to_vec());
    call_trap(ctx, data, &t, &[target_value(data), this.clone(), Value::Object(list)])
}

pub fn proxy_construct(ctx: &Rc<Context>, data: &ProxyData, args: &[Value], new_target: &Value) -> EvalResult<Value> {
    let Some(t) = trap(ctx, data, "construct")? else {
        return construct(ctx, &target_value(data), args, new_target);
    };
    let list = create_array(&ctx.realm.intrinsics, args.to_vec());
    let result = call_trap(ctx, data, &t, &[target_value(data), Value::Object(list), new_target.clone()])?;
    if !matches!(result, Value::Object(_)) {
        return Err(raise_type_error!("proxy [[Construct]] must return an object").into());
    }
    Ok(result)
}

fn proxy_create(target: &Value, handler: &Value) -> EvalResult<JSObjectDataPtr> {
    let (Value::Object(target), Value::Object(handler)) = (target, handler) else {
        return Err(raise_type_error!("Cannot create proxy with a non-object as target or handler").into());
    };
    let data = ProxyData {
        target: target.clone(),
        handler: handler.clone(),
        callable: is_callable(target),
        constructable: is_constructor(target),
    };
    Ok(new_object_with_kind(None, ObjectKind::Proxy(Some(data))))
}

pub fn initialize_proxy(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let ctor = new_native_constructor(
        intrinsics,
        "Proxy",
        2,
        |_ctx, _this, _args| Err(raise_type_error!("Constructor Proxy requires 'new'").into()),
        |_ctx, args, _new_target| {
            let proxy = proxy_create(&crate::js_function::arg(args, 0), &crate::js_function::arg(args, 1))?;
            Ok(Value::Object(proxy))
        },
    );
    define_method(intrinsics, &ctor, "revocable", 2, |ctx, _this, args| {
        let proxy = proxy_create(&crate::js_function::arg(args, 0), &crate::js_function::arg(args, 1))?;
        let slot = Rc::new(RefCell::new(Some(proxy.clone())));
        let revoke = new_native_function(&ctx.realm.intrinsics, "", 0, move |ctx, _this, _args| {
            let taken = slot.borrow_mut().take();
            if let Some(p) = taken {
                ctx.check_object_write(&p, "Proxy revoke")?;
                log::trace!("revoking proxy #{}", p.borrow().id);
                p.borrow_mut().kind = ObjectKind::Proxy(None);
            }
            Ok(Value::Undefined)
        });
        let result = new_object(Some(&ctx.realm.intrinsics.object_prototype));
        {
            let mut r = result.borrow_mut();
            r.insert_data("proxy", Value::Object(proxy), true, true, true);
            r.insert_data("revoke", Value::Object(revoke), true, true, true);
        }
        Ok(Value::Object(result))
    });
    // Proxy has no `prototype` property.
    ctor.borrow_mut().properties.shift_remove(&PropertyKey::from("prototype"));
    global.borrow_mut().insert_builtin("Proxy", Value::Object(ctor));
}
