//! `JSON.parse` and `JSON.stringify`.
//!
//! Parsing goes through `serde_json`; the resulting tree is converted into
//! script values and then walked by the reviver, if any. Serialization
//! follows the script-visible algorithm (`toJSON`, replacers, indentation)
//! and leaves string quoting to `serde_json`.

use crate::core::context::Context;
use crate::core::conversion::{to_integer_or_infinity, to_length, to_number, to_property_key, to_string};
use crate::core::js_error::EvalResult;
use crate::core::property::{create_data_property, delete_property, enumerable_own_keys, get_value};
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, is_array_value, new_object, number_to_string};
use crate::js_array::create_array;
use crate::js_function::{arg, call_function, define_method};
use crate::{JSError, raise_type_error};
use std::rc::Rc;

fn parse_error(text: &str, err: &serde_json::Error) -> JSError {
    let message = match err.classify() {
        serde_json::error::Category::Eof => "Unexpected end of JSON input".to_string(),
        _ if text.trim().is_empty() => "Unexpected end of JSON input".to_string(),
        _ => format!("Unexpected token in JSON at line {} column {}", err.line(), err.column()),
    };
    JSError::SyntaxError {
        message,
        line: err.line() as u32,
        column: err.column() as u32,
    }
}

fn from_json_value(ctx: &Rc<Context>, json: serde_json::Value) -> EvalResult<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => {
            let values = items.into_iter().map(|v| from_json_value(ctx, v)).collect::<EvalResult<Vec<_>>>()?;
            Value::Object(create_array(&ctx.realm.intrinsics, values))
        }
        serde_json::Value::Object(map) => {
            let obj = new_object(Some(&ctx.realm.intrinsics.object_prototype));
            for (key, value) in map {
                let value = from_json_value(ctx, value)?;
                create_data_property(ctx, &obj, &PropertyKey::from(key), value)?;
            }
            Value::Object(obj)
        }
    })
}

/// `InternalizeJSONProperty`.
fn internalize(ctx: &Rc<Context>, holder: &JSObjectDataPtr, key: PropertyKey, reviver: &Value) -> EvalResult<Value> {
    let value = get_value(ctx, &Value::Object(holder.clone()), &key)?;
    if let Value::Object(obj) = &value {
        let keys = if is_array_value(&value) {
            let len = to_length(ctx, &get_value(ctx, &value, &"length".into())?)?;
            (0..len).map(PropertyKey::from).collect()
        } else {
            enumerable_own_keys(ctx, obj)?
        };
        for k in keys {
            let revived = internalize(ctx, obj, k.clone(), reviver)?;
            if revived.is_undefined() {
                delete_property(ctx, obj, &k)?;
            } else {
                create_data_property(ctx, obj, &k, revived)?;
            }
        }
    }
    call_function(ctx, reviver, &Value::Object(holder.clone()), &[Value::from(&key), value])
}

fn json_parse(ctx: &Rc<Context>, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = to_string(ctx, &arg(args, 0))?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| parse_error(&text, &e))?;
    let value = from_json_value(ctx, json)?;
    let reviver = arg(args, 1);
    if !reviver.is_callable() {
        return Ok(value);
    }
    let root = new_object(Some(&ctx.realm.intrinsics.object_prototype));
    create_data_property(ctx, &root, &PropertyKey::from(""), value)?;
    internalize(ctx, &root, PropertyKey::from(""), &reviver)
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

struct Serializer {
    replacer: Option<Value>,
    allow_list: Option<Vec<PropertyKey>>,
    gap: String,
    indent: String,
    stack: Vec<JSObjectDataPtr>,
}

impl Serializer {
    /// `SerializeJSONProperty`. `None` means the property is skipped.
    fn property(&mut self, ctx: &Rc<Context>, holder: &Value, key: &PropertyKey) -> EvalResult<Option<String>> {
        let mut value = get_value(ctx, holder, key)?;
        if matches!(value, Value::Object(_)) {
            let to_json = get_value(ctx, &value, &"toJSON".into())?;
            if to_json.is_callable() {
                value = call_function(ctx, &to_json, &value, &[Value::from(key)])?;
            }
        }
        if let Some(replacer) = &self.replacer {
            value = call_function(ctx, replacer, holder, &[Value::from(key), value])?;
        }
        if let Value::Object(obj) = &value {
            let (is_number, is_string, boolean) = match &obj.borrow().kind {
                ObjectKind::Number(_) => (true, false, None),
                ObjectKind::String(_) => (false, true, None),
                ObjectKind::Boolean(b) => (false, false, Some(*b)),
                _ => (false, false, None),
            };
            if is_number {
                value = Value::Number(to_number(ctx, &value)?);
            } else if is_string {
                value = Value::String(to_string(ctx, &value)?);
            } else if let Some(b) = boolean {
                value = Value::Boolean(b);
            }
        }
        Ok(match &value {
            Value::Null => Some("null".to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::String(s) => Some(quote(s)),
            Value::Number(n) if n.is_finite() => Some(number_to_string(*n)),
            Value::Number(_) => Some("null".to_string()),
            Value::Object(obj) if !value.is_callable() => {
                if is_array_value(&value) {
                    Some(self.array(ctx, obj)?)
                } else {
                    Some(self.object(ctx, obj)?)
                }
            }
            _ => None,
        })
    }

    fn enter(&mut self, obj: &JSObjectDataPtr) -> EvalResult<String> {
        if self.stack.iter().any(|o| Rc::ptr_eq(o, obj)) {
            return Err(raise_type_error!("Converting circular structure to JSON").into());
        }
        self.stack.push(obj.clone());
        let stepback = self.indent.clone();
        self.indent.push_str(&self.gap);
        Ok(stepback)
    }

    fn leave(&mut self, stepback: String) {
        self.stack.pop();
        self.indent = stepback;
    }

    fn wrap(&self, open: char, close: char, parts: Vec<String>, stepback: &str) -> String {
        if parts.is_empty() {
            return format!("{open}{close}");
        }
        if self.gap.is_empty() {
            return format!("{open}{}{close}", parts.join(","));
        }
        let separator = format!(",\n{}", self.indent);
        format!("{open}\n{}{}\n{stepback}{close}", self.indent, parts.join(&separator))
    }

    fn object(&mut self, ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<String> {
        let stepback = self.enter(obj)?;
        let keys = match &self.allow_list {
            Some(list) => list.clone(),
            None => enumerable_own_keys(ctx, obj)?,
        };
        let holder = Value::Object(obj.clone());
        let mut parts = Vec::new();
        for key in keys {
            if let Some(s) = self.property(ctx, &holder, &key)? {
                let colon = if self.gap.is_empty() { ":" } else { ": " };
                parts.push(format!("{}{colon}{s}", quote(&key.to_string())));
            }
        }
        let out = self.wrap('{', '}', parts, &stepback);
        self.leave(stepback);
        Ok(out)
    }

    fn array(&mut self, ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<String> {
        let stepback = self.enter(obj)?;
        let holder = Value::Object(obj.clone());
        let len = to_length(ctx, &get_value(ctx, &holder, &"length".into())?)?;
        let mut parts = Vec::with_capacity(len);
        for i in 0..len {
            ctx.check_interrupts()?;
            let s = self.property(ctx, &holder, &PropertyKey::from(i))?;
            parts.push(s.unwrap_or_else(|| "null".to_string()));
        }
        let out = self.wrap('[', ']', parts, &stepback);
        self.leave(stepback);
        Ok(out)
    }
}

fn allow_list(ctx: &Rc<Context>, replacer: &Value) -> EvalResult<Vec<PropertyKey>> {
    let len = to_length(ctx, &get_value(ctx, replacer, &"length".into())?)?;
    let mut keys: Vec<PropertyKey> = Vec::new();
    for i in 0..len {
        let item = get_value(ctx, replacer, &PropertyKey::from(i))?;
        let key = match &item {
            Value::String(_) | Value::Number(_) => Some(to_property_key(ctx, &item)?),
            Value::Object(o) if matches!(o.borrow().kind, ObjectKind::String(_) | ObjectKind::Number(_)) => {
                Some(PropertyKey::from(to_string(ctx, &item)?))
            }
            _ => None,
        };
        if let Some(key) = key
            && !keys.contains(&key)
        {
            keys.push(key);
        }
    }
    Ok(keys)
}

fn gap_from(ctx: &Rc<Context>, space: &Value) -> EvalResult<String> {
    let space = match space {
        Value::Object(o) => match o.borrow().kind {
            ObjectKind::Number(n) => Value::Number(n),
            ObjectKind::String(ref s) => Value::String(s.clone()),
            _ => space.clone(),
        },
        other => other.clone(),
    };
    Ok(match &space {
        Value::Number(_) => {
            let n = to_integer_or_infinity(ctx, &space)?.clamp(0.0, 10.0) as usize;
            " ".repeat(n)
        }
        Value::String(s) => s.chars().take(10).collect(),
        _ => String::new(),
    })
}

/// `JSON.stringify(value, replacer, space)`; `None` for undefined output.
pub fn stringify(ctx: &Rc<Context>, value: &Value, replacer: &Value, space: &Value) -> EvalResult<Option<String>> {
    let mut serializer = Serializer {
        replacer: None,
        allow_list: None,
        gap: gap_from(ctx, space)?,
        indent: String::new(),
        stack: Vec::new(),
    };
    if replacer.is_callable() {
        serializer.replacer = Some(replacer.clone());
    } else if is_array_value(replacer) {
        serializer.allow_list = Some(allow_list(ctx, replacer)?);
    }
    let wrapper = new_object(Some(&ctx.realm.intrinsics.object_prototype));
    create_data_property(ctx, &wrapper, &PropertyKey::from(""), value.clone())?;
    serializer.property(ctx, &Value::Object(wrapper), &PropertyKey::from(""))
}

pub fn initialize_json(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let json = new_object(Some(&intrinsics.object_prototype));
    define_method(intrinsics, &json, "parse", 2, json_parse);
    define_method(intrinsics, &json, "stringify", 3, |ctx, _this, args| {
        let out = stringify(ctx, &arg(args, 0), &arg(args, 1), &arg(args, 2))?;
        if let Some(s) = &out {
            log::trace!("JSON.stringify produced {} bytes", s.len());
        }
        Ok(out.map(Value::from).unwrap_or_default())
    });
    json.borrow_mut()
        .insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("JSON"), false, false, true);
    global.borrow_mut().insert_builtin("JSON", Value::Object(json));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_control_characters() {
        assert_eq!(quote("a\"b\n"), "\"a\\\"b\\n\"");
        assert_eq!(quote("\u{1}"), "\"\\u0001\"");
    }

    #[test]
    fn eof_errors_read_like_engines() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\":").unwrap_err();
        assert_eq!(parse_error("{\"a\":", &err).message(), "Unexpected end of JSON input");
    }
}
