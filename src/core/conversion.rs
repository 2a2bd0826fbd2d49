//! Type conversion abstract operations.

use crate::core::context::Context;
use crate::core::js_error::EvalResult;
use crate::core::property::{get_property, peek_property};
use crate::core::property_key::PropertyKey;
use crate::core::value::{
    JSObjectDataPtr, ObjectKind, Value, f64_to_int32, f64_to_integer, f64_to_uint32, new_object_with_kind, number_to_string,
    strict_equals, string_to_number,
};
use crate::js_function::call_function;
use crate::raise_type_error;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreferredType {
    Default,
    Number,
    String,
}

/// `ToString` for values that are not objects.
pub fn primitive_to_string(v: &Value) -> Rc<str> {
    match v {
        Value::Undefined => "undefined".into(),
        Value::Null => "null".into(),
        Value::Boolean(true) => "true".into(),
        Value::Boolean(false) => "false".into(),
        Value::Number(n) => number_to_string(*n).into(),
        Value::String(s) => s.clone(),
        Value::Symbol(s) => format!("Symbol({})", s.description.as_deref().unwrap_or("")).into(),
        Value::Object(_) => "[object Object]".into(),
    }
}

pub fn to_primitive(ctx: &Rc<Context>, v: &Value, hint: PreferredType) -> EvalResult<Value> {
    let Value::Object(obj) = v else {
        return Ok(v.clone());
    };
    let key = PropertyKey::Symbol(ctx.realm.intrinsics.symbols.to_primitive.clone());
    let exotic = get_property(ctx, obj, &key, v)?;
    if !exotic.is_nullish() {
        if !exotic.is_callable() {
            return Err(raise_type_error!("Symbol.toPrimitive is not a function").into());
        }
        let hint_name = match hint {
            PreferredType::Default => "default",
            PreferredType::Number => "number",
            PreferredType::String => "string",
        };
        let result = call_function(ctx, &exotic, v, &[Value::from(hint_name)])?;
        if matches!(result, Value::Object(_)) {
            return Err(raise_type_error!("Cannot convert object to primitive value").into());
        }
        return Ok(result);
    }
    let order = if hint == PreferredType::String {
        ["toString", "valueOf"]
    } else {
        ["valueOf", "toString"]
    };
    for name in order {
        let method = get_property(ctx, obj, &name.into(), v)?;
        if method.is_callable() {
            let result = call_function(ctx, &method, v, &[])?;
            if !matches!(result, Value::Object(_)) {
                return Ok(result);
            }
        }
    }
    Err(raise_type_error!("Cannot convert object to primitive value").into())
}

pub fn to_number(ctx: &Rc<Context>, v: &Value) -> EvalResult<f64> {
    Ok(match v {
        Value::Undefined => f64::NAN,
        Value::Null => 0.0,
        Value::Boolean(b) => *b as u8 as f64,
        Value::Number(n) => *n,
        Value::String(s) => string_to_number(s),
        Value::Symbol(_) => return Err(raise_type_error!("Cannot convert a Symbol value to a number").into()),
        Value::Object(_) => {
            let prim = to_primitive(ctx, v, PreferredType::Number)?;
            return to_number(ctx, &prim);
        }
    })
}

pub fn to_string(ctx: &Rc<Context>, v: &Value) -> EvalResult<Rc<str>> {
    match v {
        Value::Symbol(_) => Err(raise_type_error!("Cannot convert a Symbol value to a string").into()),
        Value::Object(_) => {
            let prim = to_primitive(ctx, v, PreferredType::String)?;
            to_string(ctx, &prim)
        }
        other => Ok(primitive_to_string(other)),
    }
}

pub fn to_property_key(ctx: &Rc<Context>, v: &Value) -> EvalResult<PropertyKey> {
    match v {
        Value::String(s) => Ok(PropertyKey::String(s.clone())),
        Value::Symbol(s) => Ok(PropertyKey::Symbol(s.clone())),
        Value::Number(n) => Ok(PropertyKey::from(*n)),
        Value::Object(_) => {
            let prim = to_primitive(ctx, v, PreferredType::String)?;
            to_property_key(ctx, &prim)
        }
        other => Ok(PropertyKey::String(primitive_to_string(other))),
    }
}

pub fn to_object(ctx: &Rc<Context>, v: &Value) -> EvalResult<JSObjectDataPtr> {
    let intrinsics = &ctx.realm.intrinsics;
    let (proto, kind) = match v {
        Value::Object(o) => return Ok(o.clone()),
        Value::Undefined | Value::Null => {
            return Err(raise_type_error!("Cannot convert undefined or null to object").into());
        }
        Value::Boolean(b) => (&intrinsics.boolean_prototype, ObjectKind::Boolean(*b)),
        Value::Number(n) => (&intrinsics.number_prototype, ObjectKind::Number(*n)),
        Value::String(s) => (&intrinsics.string_prototype, ObjectKind::String(s.clone())),
        Value::Symbol(s) => (&intrinsics.symbol_prototype, ObjectKind::Symbol(s.clone())),
    };
    let obj = new_object_with_kind(Some(proto), kind);
    if let Value::String(s) = v {
        let len = s.encode_utf16().count();
        obj.borrow_mut().insert_data("length", Value::Number(len as f64), false, false, false);
    }
    Ok(obj)
}

pub fn to_int32(ctx: &Rc<Context>, v: &Value) -> EvalResult<i32> {
    Ok(f64_to_int32(to_number(ctx, v)?))
}

pub fn to_uint32(ctx: &Rc<Context>, v: &Value) -> EvalResult<u32> {
    Ok(f64_to_uint32(to_number(ctx, v)?))
}

pub fn to_integer_or_infinity(ctx: &Rc<Context>, v: &Value) -> EvalResult<f64> {
    Ok(f64_to_integer(to_number(ctx, v)?))
}

pub fn to_length(ctx: &Rc<Context>, v: &Value) -> EvalResult<usize> {
    let n = to_integer_or_infinity(ctx, v)?;
    Ok(if n <= 0.0 { 0 } else { n.min(9007199254740991.0) as usize })
}

/// `IsLooselyEqual` (`==`).
pub fn loose_equals(ctx: &Rc<Context>, a: &Value, b: &Value) -> EvalResult<bool> {
    Ok(match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(x), Value::String(s)) => *x == string_to_number(s),
        (Value::String(s), Value::Number(y)) => string_to_number(s) == *y,
        (Value::Boolean(x), _) => return loose_equals(ctx, &Value::Number(*x as u8 as f64), b),
        (_, Value::Boolean(y)) => return loose_equals(ctx, a, &Value::Number(*y as u8 as f64)),
        (Value::Object(_), Value::Object(_)) => strict_equals(a, b),
        (Value::Object(_), _) => {
            let prim = to_primitive(ctx, a, PreferredType::Default)?;
            return loose_equals(ctx, &prim, b);
        }
        (_, Value::Object(_)) => {
            let prim = to_primitive(ctx, b, PreferredType::Default)?;
            return loose_equals(ctx, a, &prim);
        }
        _ => strict_equals(a, b),
    })
}

/// How error messages refer to an object, e.g. `#<Point>` or `[object Array]`.
pub fn object_description(obj: &JSObjectDataPtr) -> String {
    let kind_name = {
        let o = obj.borrow();
        match &o.kind {
            ObjectKind::Array => return "[object Array]".to_string(),
            ObjectKind::Function(_) => return "function".to_string(),
            kind => kind.name(),
        }
    };
    let ctor_name = peek_property(obj, &"constructor".into())
        .and_then(|c| c.as_object().cloned())
        .and_then(|c| peek_property(&c, &"name".into()))
        .and_then(|n| match n {
            Value::String(s) if !s.is_empty() => Some(s.to_string()),
            _ => None,
        });
    format!("#<{}>", ctor_name.unwrap_or_else(|| kind_name.to_string()))
}

/// Short rendering of any value for error messages.
pub fn value_description(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{s}\""),
        Value::Object(o) => object_description(o),
        other => primitive_to_string(other).to_string(),
    }
}
