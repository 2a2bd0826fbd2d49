//! Object internal methods: `[[Get]]`, `[[Set]]`, `[[DefineOwnProperty]]` and friends.
//!
//! Proxies dispatch to their traps, arrays maintain `length`, strings expose
//! their code units as indices and mapped `arguments` objects alias the
//! parameter bindings of their function.

use crate::core::context::Context;
use crate::core::conversion::{object_description, primitive_to_string, to_number, to_object, to_uint32};
use crate::core::descriptor::{Property, PropertyDescriptor, PropertySlot};
use crate::core::js_error::EvalResult;
use crate::core::property_key::PropertyKey;
use crate::core::scope::BindingRead;
use crate::core::value::{JSObjectData, JSObjectDataPtr, ObjectKind, Value, is_callable, same_value, to_boolean, type_of};
use crate::js_function::call_function;
use crate::js_proxy::{self, ProxyData};
use crate::unicode::{utf16_char_at, utf16_len, utf8_to_utf16};
use crate::{raise_range_error, raise_type_error};
use std::rc::Rc;

/// Result of `[[Set]]` when it does not throw by itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    Done,
    ReadOnly,
    NotExtensible,
    GetterOnly,
    PrimitiveReceiver,
    ProxyRejected,
}

fn proxy_data(obj: &JSObjectDataPtr, operation: &str) -> EvalResult<Option<ProxyData>> {
    match &obj.borrow().kind {
        ObjectKind::Proxy(Some(data)) => Ok(Some(data.clone())),
        ObjectKind::Proxy(None) => Err(raise_type_error!("Cannot perform '{operation}' on a proxy that has been revoked").into()),
        _ => Ok(None),
    }
}

fn key_display(key: &PropertyKey) -> String {
    key.to_string()
}

/// Own data property lookup along the prototype chain that never runs user code.
///
/// Stops at proxies and accessors.
pub fn peek_property(obj: &JSObjectDataPtr, key: &PropertyKey) -> Option<Value> {
    let mut current = obj.clone();
    loop {
        let next = {
            let o = current.borrow();
            if o.is_proxy() {
                return None;
            }
            match o.get_own(key).map(|p| &p.slot) {
                Some(PropertySlot::Data { value, .. }) => return Some(value.clone()),
                Some(PropertySlot::Accessor { .. }) => return None,
                None => o.prototype.clone()?,
            }
        };
        current = next;
    }
}

fn string_index_property(s: &str, key: &PropertyKey) -> Option<Property> {
    let index = key.array_index()? as usize;
    let units = utf8_to_utf16(s);
    let unit = utf16_char_at(&units, index)?;
    Some(Property {
        slot: PropertySlot::Data {
            value: Value::from(String::from_utf16_lossy(&[unit])),
            writable: false,
        },
        enumerable: true,
        configurable: false,
    })
}

/// `[[GetOwnProperty]]`.
pub fn get_own_property(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey) -> EvalResult<Option<Property>> {
    if let Some(data) = proxy_data(obj, "getOwnPropertyDescriptor")? {
        return Ok(js_proxy::proxy_get_own_property(ctx, &data, key)?.map(PropertyDescriptor::into_property));
    }
    let o = obj.borrow();
    match &o.kind {
        ObjectKind::String(s) => {
            if let Some(p) = string_index_property(s, key) {
                return Ok(Some(p));
            }
        }
        ObjectKind::Arguments(Some(mapped)) => {
            if let Some(index) = key.array_index()
                && let Some(Some(name)) = mapped.names.get(index as usize)
                && let Some(mut prop) = o.get_own(key).cloned()
            {
                if let Some(BindingRead::Value(v)) = mapped.scope.read(name)
                    && let PropertySlot::Data { value, .. } = &mut prop.slot
                {
                    *value = v;
                }
                return Ok(Some(prop));
            }
        }
        _ => {}
    }
    Ok(o.get_own(key).cloned())
}

/// `ValidateAndApplyPropertyDescriptor` on an ordinary object.
fn ordinary_define(o: &mut JSObjectData, key: &PropertyKey, desc: PropertyDescriptor) -> bool {
    let Some(current) = o.properties.get_mut(key) else {
        if !o.extensible {
            return false;
        }
        o.properties.insert(key.clone(), desc.into_property());
        return true;
    };
    if !current.configurable {
        if desc.configurable == Some(true) {
            return false;
        }
        if desc.enumerable.is_some_and(|e| e != current.enumerable) {
            return false;
        }
        if !desc.is_generic() && desc.is_accessor() != current.is_accessor() {
            return false;
        }
        match &current.slot {
            PropertySlot::Accessor { get, set } => {
                let same = |a: &Option<Value>, b: &Option<Value>| match (a, b) {
                    (_, None) => true,
                    (cur, Some(new)) => same_value(&cur.clone().unwrap_or_default(), new),
                };
                if !same(get, &desc.get) || !same(set, &desc.set) {
                    return false;
                }
            }
            PropertySlot::Data { value, writable } => {
                if !*writable {
                    if desc.writable == Some(true) {
                        return false;
                    }
                    if let Some(v) = &desc.value
                        && !same_value(v, value)
                    {
                        return false;
                    }
                }
            }
        }
    }
    if let Some(e) = desc.enumerable {
        current.enumerable = e;
    }
    if let Some(c) = desc.configurable {
        current.configurable = c;
    }
    if desc.is_accessor() {
        let (old_get, old_set) = match &current.slot {
            PropertySlot::Accessor { get, set } => (get.clone(), set.clone()),
            PropertySlot::Data { .. } => (None, None),
        };
        current.slot = PropertySlot::Accessor {
            get: match desc.get {
                Some(g) => Some(g).filter(|g| !g.is_undefined()),
                None => old_get,
            },
            set: match desc.set {
                Some(s) => Some(s).filter(|s| !s.is_undefined()),
                None => old_set,
            },
        };
    } else if desc.is_data() {
        let (old_value, old_writable) = match &current.slot {
            PropertySlot::Data { value, writable } => (value.clone(), *writable),
            PropertySlot::Accessor { .. } => (Value::Undefined, false),
        };
        current.slot = PropertySlot::Data {
            value: desc.value.unwrap_or(old_value),
            writable: desc.writable.unwrap_or(old_writable),
        };
    }
    true
}

fn array_set_length(ctx: &Rc<Context>, obj: &JSObjectDataPtr, mut desc: PropertyDescriptor) -> EvalResult<bool> {
    let length_key = PropertyKey::from("length");
    let Some(value) = desc.value.take() else {
        return Ok(ordinary_define(&mut obj.borrow_mut(), &length_key, desc));
    };
    let new_len = to_uint32(ctx, &value)?;
    if to_number(ctx, &value)? != new_len as f64 {
        return Err(raise_range_error!("Invalid array length").into());
    }
    desc.value = Some(Value::Number(new_len as f64));
    let mut o = obj.borrow_mut();
    let old_len = o.array_length();
    if new_len >= old_len {
        return Ok(ordinary_define(&mut o, &length_key, desc));
    }
    let writable = matches!(o.get_own(&length_key).map(|p| &p.slot), Some(PropertySlot::Data { writable: true, .. }));
    if !writable {
        return Ok(false);
    }
    let make_read_only = desc.writable == Some(false);
    desc.writable = None;
    let mut doomed: Vec<(u32, PropertyKey)> = o
        .properties
        .keys()
        .filter_map(|k| k.array_index().filter(|i| *i >= new_len).map(|i| (i, k.clone())))
        .collect();
    doomed.sort_by(|a, b| b.0.cmp(&a.0));
    let mut final_len = new_len;
    for (index, key) in doomed {
        if o.get_own(&key).is_some_and(|p| !p.configurable) {
            final_len = index + 1;
            break;
        }
        o.properties.shift_remove(&key);
    }
    desc.value = Some(Value::Number(final_len as f64));
    if make_read_only {
        desc.writable = Some(false);
    }
    ordinary_define(&mut o, &length_key, desc);
    Ok(final_len == new_len)
}

/// `[[DefineOwnProperty]]`; `false` when the definition is rejected.
pub fn define_own_property(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey, desc: PropertyDescriptor) -> EvalResult<bool> {
    if let Some(data) = proxy_data(obj, "defineProperty")? {
        return js_proxy::proxy_define_own_property(ctx, &data, key, desc);
    }
    ctx.check_object_write(obj, "property definition")?;
    let kind_tag = {
        let o = obj.borrow();
        match &o.kind {
            ObjectKind::Array => 1,
            ObjectKind::String(s) => {
                if let Some(existing) = string_index_property(s, key) {
                    let compatible = desc.configurable != Some(true)
                        && desc.enumerable != Some(false)
                        && !desc.is_accessor()
                        && desc.writable != Some(true)
                        && desc.value.as_ref().is_none_or(|v| match &existing.slot {
                            PropertySlot::Data { value, .. } => same_value(v, value),
                            PropertySlot::Accessor { .. } => false,
                        });
                    return Ok(compatible);
                }
                0
            }
            ObjectKind::Arguments(Some(_)) => 2,
            _ => 0,
        }
    };
    match kind_tag {
        1 => {
            if key.as_str() == Some("length") {
                return array_set_length(ctx, obj, desc);
            }
            if let Some(index) = key.array_index() {
                let mut o = obj.borrow_mut();
                let old_len = o.array_length();
                let length_writable = matches!(
                    o.get_own(&"length".into()).map(|p| &p.slot),
                    Some(PropertySlot::Data { writable: true, .. })
                );
                if index >= old_len && !length_writable {
                    return Ok(false);
                }
                if !ordinary_define(&mut o, key, desc) {
                    return Ok(false);
                }
                if index >= old_len {
                    o.insert_data("length", Value::Number(index as f64 + 1.0), true, false, false);
                }
                return Ok(true);
            }
            Ok(ordinary_define(&mut obj.borrow_mut(), key, desc))
        }
        2 => define_mapped_argument(obj, key, desc),
        _ => Ok(ordinary_define(&mut obj.borrow_mut(), key, desc)),
    }
}

fn define_mapped_argument(obj: &JSObjectDataPtr, key: &PropertyKey, desc: PropertyDescriptor) -> EvalResult<bool> {
    let mut o = obj.borrow_mut();
    let mapped_name = match (&o.kind, key.array_index()) {
        (ObjectKind::Arguments(Some(m)), Some(i)) => m.names.get(i as usize).cloned().flatten().map(|n| (m.scope.clone(), n, i)),
        _ => None,
    };
    let Some((scope, name, index)) = mapped_name else {
        return Ok(ordinary_define(&mut o, key, desc));
    };
    // Pull the live parameter value in so a partial descriptor keeps it.
    let mut desc = desc;
    if desc.value.is_none()
        && desc.writable == Some(false)
        && let Some(BindingRead::Value(v)) = scope.read(&name)
    {
        desc.value = Some(v);
    }
    let value = desc.value.clone();
    let unmap = desc.is_accessor() || desc.writable == Some(false);
    if !ordinary_define(&mut o, key, desc) {
        return Ok(false);
    }
    if let Some(v) = value
        && !unmap
    {
        scope.initialize(&name, v);
    }
    if unmap && let ObjectKind::Arguments(Some(m)) = &mut o.kind {
        m.names[index as usize] = None;
    }
    Ok(true)
}

pub fn define_property_or_throw(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey, desc: PropertyDescriptor) -> EvalResult<()> {
    if define_own_property(ctx, obj, key, desc)? {
        return Ok(());
    }
    if !obj.borrow().extensible && obj.borrow().get_own(key).is_none() {
        return Err(raise_type_error!("Cannot define property {}, object is not extensible", key_display(key)).into());
    }
    Err(raise_type_error!("Cannot redefine property: {}", key_display(key)).into())
}

pub fn create_data_property(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey, value: Value) -> EvalResult<bool> {
    define_own_property(ctx, obj, key, PropertyDescriptor::new_default_data(value))
}

pub fn create_data_property_or_throw(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey, value: Value) -> EvalResult<()> {
    define_property_or_throw(ctx, obj, key, PropertyDescriptor::new_default_data(value))
}

/// `[[GetPrototypeOf]]`.
pub fn get_prototype_of(ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<Option<JSObjectDataPtr>> {
    if let Some(data) = proxy_data(obj, "getPrototypeOf")? {
        return js_proxy::proxy_get_prototype_of(ctx, &data);
    }
    Ok(obj.borrow().prototype.clone())
}

/// `[[SetPrototypeOf]]`; `false` for non-extensible objects and cycles.
pub fn set_prototype_of(ctx: &Rc<Context>, obj: &JSObjectDataPtr, proto: Option<JSObjectDataPtr>) -> EvalResult<bool> {
    if let Some(data) = proxy_data(obj, "setPrototypeOf")? {
        return js_proxy::proxy_set_prototype_of(ctx, &data, proto);
    }
    let same = match (&obj.borrow().prototype, &proto) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    };
    if same {
        return Ok(true);
    }
    if !obj.borrow().extensible {
        return Ok(false);
    }
    let mut cursor = proto.clone();
    while let Some(p) = cursor {
        if Rc::ptr_eq(&p, obj) {
            return Ok(false);
        }
        if p.borrow().is_proxy() {
            break;
        }
        cursor = p.borrow().prototype.clone();
    }
    ctx.check_object_write(obj, "prototype change")?;
    obj.borrow_mut().prototype = proto;
    Ok(true)
}

pub fn is_extensible(ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<bool> {
    if let Some(data) = proxy_data(obj, "isExtensible")? {
        return js_proxy::proxy_is_extensible(ctx, &data);
    }
    Ok(obj.borrow().extensible)
}

pub fn prevent_extensions(ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<bool> {
    if let Some(data) = proxy_data(obj, "preventExtensions")? {
        return js_proxy::proxy_prevent_extensions(ctx, &data);
    }
    if obj.borrow().extensible {
        ctx.check_object_write(obj, "preventExtensions")?;
        obj.borrow_mut().extensible = false;
    }
    Ok(true)
}

/// `[[HasProperty]]`.
pub fn has_property(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey) -> EvalResult<bool> {
    let mut current = obj.clone();
    loop {
        if let Some(data) = proxy_data(&current, "has")? {
            return js_proxy::proxy_has(ctx, &data, key);
        }
        if get_own_property(ctx, &current, key)?.is_some() {
            return Ok(true);
        }
        let next = current.borrow().prototype.clone();
        match next {
            Some(p) => current = p,
            None => return Ok(false),
        }
    }
}

pub fn has_own_property(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey) -> EvalResult<bool> {
    Ok(get_own_property(ctx, obj, key)?.is_some())
}

/// `[[Get]]` with an explicit receiver.
pub fn get_property(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey, receiver: &Value) -> EvalResult<Value> {
    let mut current = obj.clone();
    loop {
        if let Some(data) = proxy_data(&current, "get")? {
            return js_proxy::proxy_get(ctx, &data, key, receiver);
        }
        match get_own_property(ctx, &current, key)? {
            Some(Property {
                slot: PropertySlot::Data { value, .. },
                ..
            }) => return Ok(value),
            Some(Property {
                slot: PropertySlot::Accessor { get, .. },
                ..
            }) => {
                return match get {
                    Some(getter) => call_function(ctx, &getter, receiver, &[]),
                    None => Ok(Value::Undefined),
                };
            }
            None => {
                let next = current.borrow().prototype.clone();
                match next {
                    Some(p) => current = p,
                    None => return Ok(Value::Undefined),
                }
            }
        }
    }
}

/// `GetV`: property read on any value, boxing primitives for the lookup.
pub fn get_value(ctx: &Rc<Context>, base: &Value, key: &PropertyKey) -> EvalResult<Value> {
    let intrinsics = &ctx.realm.intrinsics;
    let proto = match base {
        Value::Object(o) => return get_property(ctx, o, key, base),
        Value::Undefined | Value::Null => {
            return Err(raise_type_error!(
                "Cannot read properties of {} (reading '{}')",
                primitive_to_string(base),
                key_display(key)
            )
            .into());
        }
        Value::String(s) => {
            if key.as_str() == Some("length") {
                return Ok(Value::Number(utf16_len(&utf8_to_utf16(s)) as f64));
            }
            if let Some(Property {
                slot: PropertySlot::Data { value, .. },
                ..
            }) = string_index_property(s, key)
            {
                return Ok(value);
            }
            &intrinsics.string_prototype
        }
        Value::Number(_) => &intrinsics.number_prototype,
        Value::Boolean(_) => &intrinsics.boolean_prototype,
        Value::Symbol(_) => &intrinsics.symbol_prototype,
    };
    get_property(ctx, proto, key, base)
}

/// `GetMethod`: `None` for undefined or null, an error for non-callables.
pub fn get_method(ctx: &Rc<Context>, base: &Value, key: &PropertyKey) -> EvalResult<Option<Value>> {
    let method = get_value(ctx, base, key)?;
    if method.is_nullish() {
        return Ok(None);
    }
    if !method.is_callable() {
        return Err(raise_type_error!("{} is not a function", crate::core::conversion::value_description(&method)).into());
    }
    Ok(Some(method))
}

/// `[[Set]]` reporting why an assignment was refused.
pub fn set_with_outcome(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey, value: Value, receiver: &Value) -> EvalResult<SetOutcome> {
    let mut current = obj.clone();
    let own = loop {
        if let Some(data) = proxy_data(&current, "set")? {
            let ok = js_proxy::proxy_set(ctx, &data, key, value, receiver)?;
            return Ok(if ok { SetOutcome::Done } else { SetOutcome::ProxyRejected });
        }
        if let Some(prop) = get_own_property(ctx, &current, key)? {
            break Some(prop);
        }
        let next = current.borrow().prototype.clone();
        match next {
            Some(p) => current = p,
            None => break None,
        }
    };
    match own.map(|p| p.slot) {
        Some(PropertySlot::Accessor { set, .. }) => match set {
            Some(setter) => {
                call_function(ctx, &setter, receiver, &[value])?;
                Ok(SetOutcome::Done)
            }
            None => Ok(SetOutcome::GetterOnly),
        },
        Some(PropertySlot::Data { writable: false, .. }) => Ok(SetOutcome::ReadOnly),
        _ => {
            let Value::Object(target) = receiver else {
                return Ok(SetOutcome::PrimitiveReceiver);
            };
            match get_own_property(ctx, target, key)? {
                Some(existing) => {
                    match existing.slot {
                        PropertySlot::Accessor { .. } => return Ok(SetOutcome::ReadOnly),
                        PropertySlot::Data { writable: false, .. } => return Ok(SetOutcome::ReadOnly),
                        PropertySlot::Data { .. } => {}
                    }
                    let desc = PropertyDescriptor {
                        value: Some(value),
                        ..Default::default()
                    };
                    Ok(if define_own_property(ctx, target, key, desc)? {
                        SetOutcome::Done
                    } else {
                        SetOutcome::ReadOnly
                    })
                }
                None => Ok(if create_data_property(ctx, target, key, value)? {
                    SetOutcome::Done
                } else if !is_extensible(ctx, target)? {
                    SetOutcome::NotExtensible
                } else {
                    SetOutcome::ReadOnly
                }),
            }
        }
    }
}

pub fn set_property(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey, value: Value, receiver: &Value) -> EvalResult<bool> {
    Ok(set_with_outcome(ctx, obj, key, value, receiver)? == SetOutcome::Done)
}

/// Error for a refused assignment, as raised in strict mode code.
pub fn set_failure(outcome: SetOutcome, base: &Value, key: &PropertyKey) -> crate::JSError {
    let described = match base {
        Value::Object(o) => object_description(o),
        other => primitive_to_string(other).to_string(),
    };
    let k = key_display(key);
    match outcome {
        SetOutcome::Done | SetOutcome::ReadOnly => raise_type_error!("Cannot assign to read only property '{k}' of object '{described}'"),
        SetOutcome::NotExtensible => raise_type_error!("Cannot add property {k}, object is not extensible"),
        SetOutcome::GetterOnly => raise_type_error!("Cannot set property {k} of {described} which has only a getter"),
        SetOutcome::PrimitiveReceiver => raise_type_error!("Cannot create property '{k}' on {} '{described}'", type_of(base)),
        SetOutcome::ProxyRejected => raise_type_error!("'set' on proxy: trap returned falsish for property '{k}'"),
    }
}

/// `PutValue` for a property reference.
pub fn put_value(ctx: &Rc<Context>, base: &Value, key: &PropertyKey, value: Value, strict: bool) -> EvalResult<()> {
    let obj = match base {
        Value::Object(o) => o.clone(),
        Value::Undefined | Value::Null => {
            return Err(raise_type_error!(
                "Cannot set properties of {} (setting '{}')",
                primitive_to_string(base),
                key_display(key)
            )
            .into());
        }
        other => to_object(ctx, other)?,
    };
    let outcome = set_with_outcome(ctx, &obj, key, value, base)?;
    if outcome != SetOutcome::Done && strict {
        return Err(set_failure(outcome, base, key).into());
    }
    Ok(())
}

/// `[[Delete]]`.
pub fn delete_property(ctx: &Rc<Context>, obj: &JSObjectDataPtr, key: &PropertyKey) -> EvalResult<bool> {
    if let Some(data) = proxy_data(obj, "deleteProperty")? {
        return js_proxy::proxy_delete(ctx, &data, key);
    }
    if let ObjectKind::String(s) = &obj.borrow().kind
        && string_index_property(s, key).is_some()
    {
        return Ok(false);
    }
    let configurable = match obj.borrow().get_own(key) {
        None => return Ok(true),
        Some(p) => p.configurable,
    };
    if !configurable {
        return Ok(false);
    }
    ctx.check_object_write(obj, "delete")?;
    let mut o = obj.borrow_mut();
    o.properties.shift_remove(key);
    if let (ObjectKind::Arguments(Some(m)), Some(i)) = (&mut o.kind, key.array_index())
        && let Some(slot) = m.names.get_mut(i as usize)
    {
        *slot = None;
    }
    Ok(true)
}

pub fn delete_failure(obj: &JSObjectDataPtr, key: &PropertyKey) -> crate::JSError {
    raise_type_error!("Cannot delete property '{}' of {}", key_display(key), object_description(obj))
}

/// `[[OwnPropertyKeys]]`: indices ascending, then strings, then symbols, each in creation order.
pub fn own_property_keys(ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<Vec<PropertyKey>> {
    if let Some(data) = proxy_data(obj, "ownKeys")? {
        return js_proxy::proxy_own_keys(ctx, &data);
    }
    Ok(ordinary_own_keys(&obj.borrow()))
}

pub fn ordinary_own_keys(o: &JSObjectData) -> Vec<PropertyKey> {
    let mut indices: Vec<(u32, PropertyKey)> = Vec::new();
    let mut strings = Vec::new();
    let mut symbols = Vec::new();
    if let ObjectKind::String(s) = &o.kind {
        for i in 0..utf16_len(&utf8_to_utf16(s)) {
            indices.push((i as u32, PropertyKey::from(i)));
        }
    }
    for key in o.properties.keys() {
        match key {
            PropertyKey::Symbol(_) => symbols.push(key.clone()),
            PropertyKey::String(_) => match key.array_index() {
                Some(i) => indices.push((i, key.clone())),
                None => strings.push(key.clone()),
            },
        }
    }
    indices.sort_by_key(|(i, _)| *i);
    indices.dedup_by_key(|(i, _)| *i);
    let mut keys: Vec<PropertyKey> = indices.into_iter().map(|(_, k)| k).collect();
    keys.extend(strings);
    keys.extend(symbols);
    keys
}

/// Own enumerable string keys, as used by `Object.keys` and spread.
pub fn enumerable_own_keys(ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<Vec<PropertyKey>> {
    let mut out = Vec::new();
    for key in own_property_keys(ctx, obj)? {
        if key.is_symbol() {
            continue;
        }
        if let Some(p) = get_own_property(ctx, obj, &key)?
            && p.enumerable
        {
            out.push(key);
        }
    }
    Ok(out)
}

/// Keys visited by `for-in`: enumerable string keys along the prototype chain,
/// shadowed names reported once.
pub fn for_in_keys(ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<Vec<Rc<str>>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut current = Some(obj.clone());
    while let Some(o) = current {
        ctx.check_interrupts()?;
        for key in own_property_keys(ctx, &o)? {
            let PropertyKey::String(name) = &key else { continue };
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(p) = get_own_property(ctx, &o, &key)?
                && p.enumerable
            {
                out.push(name.clone());
            }
        }
        current = get_prototype_of(ctx, &o)?;
    }
    Ok(out)
}

/// `CopyDataProperties`, used by object spread and object rest patterns.
pub fn copy_data_properties(ctx: &Rc<Context>, target: &JSObjectDataPtr, source: &Value, excluded: &[PropertyKey]) -> EvalResult<()> {
    if source.is_nullish() {
        return Ok(());
    }
    let from = to_object(ctx, source)?;
    for key in own_property_keys(ctx, &from)? {
        ctx.check_interrupts()?;
        if excluded.contains(&key) {
            continue;
        }
        if let Some(p) = get_own_property(ctx, &from, &key)?
            && p.enumerable
        {
            let value = get_property(ctx, &from, &key, source)?;
            create_data_property_or_throw(ctx, target, &key, value)?;
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegrityLevel {
    Sealed,
    Frozen,
}

pub fn set_integrity_level(ctx: &Rc<Context>, obj: &JSObjectDataPtr, level: IntegrityLevel) -> EvalResult<bool> {
    if !prevent_extensions(ctx, obj)? {
        return Ok(false);
    }
    for key in own_property_keys(ctx, obj)? {
        let mut desc = PropertyDescriptor {
            configurable: Some(false),
            ..Default::default()
        };
        if level == IntegrityLevel::Frozen
            && let Some(p) = get_own_property(ctx, obj, &key)?
            && !p.is_accessor()
        {
            desc.writable = Some(false);
        }
        define_property_or_throw(ctx, obj, &key, desc)?;
    }
    Ok(true)
}

pub fn test_integrity_level(ctx: &Rc<Context>, obj: &JSObjectDataPtr, level: IntegrityLevel) -> EvalResult<bool> {
    if is_extensible(ctx, obj)? {
        return Ok(false);
    }
    for key in own_property_keys(ctx, obj)? {
        if let Some(p) = get_own_property(ctx, obj, &key)? {
            if p.configurable {
                return Ok(false);
            }
            if level == IntegrityLevel::Frozen && matches!(p.slot, PropertySlot::Data { writable: true, .. }) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// `InstanceofOperator`.
pub fn instance_of(ctx: &Rc<Context>, value: &Value, target: &Value) -> EvalResult<bool> {
    let Value::Object(t) = target else {
        return Err(raise_type_error!("Right-hand side of 'instanceof' is not an object").into());
    };
    let key = PropertyKey::Symbol(ctx.realm.intrinsics.symbols.has_instance.clone());
    let handler = get_property(ctx, t, &key, target)?;
    if !handler.is_nullish() {
        let result = call_function(ctx, &handler, target, std::slice::from_ref(value))?;
        return Ok(to_boolean(&result));
    }
    if !is_callable(t) {
        return Err(raise_type_error!("Right-hand side of 'instanceof' is not callable").into());
    }
    ordinary_has_instance(ctx, target, value)
}

/// `OrdinaryHasInstance`.
pub fn ordinary_has_instance(ctx: &Rc<Context>, constructor: &Value, value: &Value) -> EvalResult<bool> {
    let Value::Object(c) = constructor else {
        return Ok(false);
    };
    if !is_callable(c) {
        return Ok(false);
    }
    let bound_target = match c.borrow().callable() {
        Some(crate::core::callable::Callable::Bound(b)) => Some(b.target.clone()),
        _ => None,
    };
    if let Some(target) = bound_target {
        return instance_of(ctx, value, &Value::Object(target));
    }
    let Value::Object(obj) = value else {
        return Ok(false);
    };
    let proto = get_property(ctx, c, &"prototype".into(), constructor)?;
    let Value::Object(proto) = proto else {
        return Err(raise_type_error!(
            "Function has non-object prototype '{}' in instanceof check",
            primitive_to_string(&proto)
        )
        .into());
    };
    let mut current = get_prototype_of(ctx, obj)?;
    while let Some(p) = current {
        if Rc::ptr_eq(&p, &proto) {
            return Ok(true);
        }
        current = get_prototype_of(ctx, &p)?;
    }
    Ok(false)
}

/// The `in` operator.
pub fn has_in(ctx: &Rc<Context>, key: &Value, target: &Value) -> EvalResult<bool> {
    let Value::Object(obj) = target else {
        let shown_key = match key {
            Value::String(s) => format!("'{s}'"),
            other => primitive_to_string(other).to_string(),
        };
        return Err(raise_type_error!(
            "Cannot use 'in' operator to search for {shown_key} in {}",
            primitive_to_string(target)
        )
        .into());
    };
    let key = crate::core::conversion::to_property_key(ctx, key)?;
    has_property(ctx, obj, &key)
}
