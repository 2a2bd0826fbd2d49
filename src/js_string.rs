//! `String` and `String.prototype`. Indices and lengths count UTF-16 code units.

use crate::core::context::Context;
use crate::core::conversion::{to_integer_or_infinity, to_length, to_number, to_object, to_string, to_uint32};
use crate::core::js_error::EvalResult;
use crate::core::property::get_value;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, is_js_whitespace, new_object_with_kind, relative_index};
use crate::js_array::create_array;
use crate::js_function::{arg, call_function, define_method, define_symbol_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::js_iterator::create_string_iterator;
use crate::unicode::{code_point_at, utf8_to_utf16, utf16_find, utf16_rfind, utf16_slice, utf16_to_utf8};
use crate::{raise_range_error, raise_type_error};
use std::rc::Rc;

/// Upper bound on the length of strings built by `repeat` and `padStart`.
const MAX_STRING_LENGTH: usize = (1 << 29) - 24;

/// `thisStringValue` for `toString` and `valueOf`.
fn this_string_value(this: &Value, method: &str) -> EvalResult<Rc<str>> {
    match this {
        Value::String(s) => Ok(s.clone()),
        Value::Object(o) => match &o.borrow().kind {
            ObjectKind::String(s) => Ok(s.clone()),
            _ => Err(raise_type_error!("String.prototype.{method} requires that 'this' be a String").into()),
        },
        _ => Err(raise_type_error!("String.prototype.{method} requires that 'this' be a String").into()),
    }
}

/// `ToString(RequireObjectCoercible(this))`.
fn coerced_this(ctx: &Rc<Context>, this: &Value, method: &str) -> EvalResult<Rc<str>> {
    if this.is_nullish() {
        return Err(raise_type_error!("String.prototype.{method} called on null or undefined").into());
    }
    to_string(ctx, this)
}

fn units_of(ctx: &Rc<Context>, this: &Value, method: &str) -> EvalResult<Vec<u16>> {
    Ok(utf8_to_utf16(&coerced_this(ctx, this, method)?))
}

fn string_arg(ctx: &Rc<Context>, args: &[Value], i: usize) -> EvalResult<Vec<u16>> {
    Ok(utf8_to_utf16(&to_string(ctx, &arg(args, i))?))
}

fn position_arg(ctx: &Rc<Context>, args: &[Value], i: usize, default: usize, len: usize) -> EvalResult<usize> {
    match args.get(i) {
        None | Some(Value::Undefined) => Ok(default),
        Some(v) => Ok(to_integer_or_infinity(ctx, v)?.clamp(0.0, len as f64) as usize),
    }
}

fn units_value(units: &[u16]) -> Value {
    Value::from(utf16_to_utf8(units))
}

/// `GetSubstitution` for string patterns: `$$`, `$&`, `` $` `` and `$'`.
fn substitute(matched: &[u16], position: usize, subject: &[u16], replacement: &[u16]) -> Vec<u16> {
    let dollar = b'$' as u16;
    let mut out = Vec::with_capacity(replacement.len());
    let mut i = 0;
    while i < replacement.len() {
        let c = replacement[i];
        if c == dollar && i + 1 < replacement.len() {
            let next = replacement[i + 1];
            match next {
                n if n == dollar => out.push(dollar),
                n if n == b'&' as u16 => out.extend_from_slice(matched),
                n if n == b'`' as u16 => out.extend_from_slice(&subject[..position]),
                n if n == b'\'' as u16 => out.extend_from_slice(&subject[(position + matched.len()).min(subject.len())..]),
                _ => {
                    out.push(c);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

fn replace_impl(ctx: &Rc<Context>, this: &Value, args: &[Value], all: bool) -> EvalResult<Value> {
    let method = if all { "replaceAll" } else { "replace" };
    let subject = units_of(ctx, this, method)?;
    let pattern = string_arg(ctx, args, 0)?;
    let replacer = arg(args, 1);
    let replacement = if replacer.is_callable() { None } else { Some(utf8_to_utf16(&to_string(ctx, &replacer)?)) };
    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(p) = utf16_find(&subject, &pattern, from) {
        positions.push(p);
        if !all {
            break;
        }
        from = p + pattern.len().max(1);
        if from > subject.len() {
            break;
        }
    }
    let subject_value = units_value(&subject);
    let mut out = Vec::with_capacity(subject.len());
    let mut last = 0;
    for p in positions {
        out.extend_from_slice(&subject[last..p]);
        let piece = match &replacement {
            Some(r) => substitute(&pattern, p, &subject, r),
            None => {
                let result = call_function(
                    ctx,
                    &replacer,
                    &Value::Undefined,
                    &[units_value(&pattern), Value::Number(p as f64), subject_value.clone()],
                )?;
                utf8_to_utf16(&to_string(ctx, &result)?)
            }
        };
        out.extend(piece);
        last = p + pattern.len();
    }
    out.extend_from_slice(&subject[last.min(subject.len())..]);
    Ok(units_value(&out))
}

fn pad(ctx: &Rc<Context>, this: &Value, args: &[Value], at_start: bool) -> EvalResult<Value> {
    let s = units_of(ctx, this, if at_start { "padStart" } else { "padEnd" })?;
    let max_length = to_length(ctx, &arg(args, 0))?;
    if max_length <= s.len() {
        return Ok(units_value(&s));
    }
    if max_length > MAX_STRING_LENGTH {
        return Err(raise_range_error!("Invalid string length").into());
    }
    let filler = match arg(args, 1) {
        Value::Undefined => vec![b' ' as u16],
        f => utf8_to_utf16(&to_string(ctx, &f)?),
    };
    if filler.is_empty() {
        return Ok(units_value(&s));
    }
    let fill: Vec<u16> = filler.iter().copied().cycle().take(max_length - s.len()).collect();
    let out = if at_start { [fill, s].concat() } else { [s, fill].concat() };
    Ok(units_value(&out))
}

fn trim(ctx: &Rc<Context>, this: &Value, start: bool, end: bool, method: &str) -> EvalResult<Value> {
    let s = coerced_this(ctx, this, method)?;
    let mut t: &str = &s;
    if start {
        t = t.trim_start_matches(is_js_whitespace);
    }
    if end {
        t = t.trim_end_matches(is_js_whitespace);
    }
    Ok(Value::from(t))
}

fn split(ctx: &Rc<Context>, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let s = units_of(ctx, this, "split")?;
    let limit = match arg(args, 1) {
        Value::Undefined => u32::MAX as usize,
        l => to_uint32(ctx, &l)? as usize,
    };
    let separator = arg(args, 0);
    let mut parts = Vec::new();
    if limit == 0 {
        return Ok(Value::Object(create_array(&ctx.realm.intrinsics, parts)));
    }
    if separator.is_undefined() {
        parts.push(units_value(&s));
        return Ok(Value::Object(create_array(&ctx.realm.intrinsics, parts)));
    }
    let sep = utf8_to_utf16(&to_string(ctx, &separator)?);
    if sep.is_empty() {
        parts.extend(s.iter().take(limit).map(|u| units_value(&[*u])));
        return Ok(Value::Object(create_array(&ctx.realm.intrinsics, parts)));
    }
    let mut start = 0;
    while let Some(p) = utf16_find(&s, &sep, start) {
        parts.push(units_value(&s[start..p]));
        if parts.len() >= limit {
            return Ok(Value::Object(create_array(&ctx.realm.intrinsics, parts)));
        }
        start = p + sep.len();
    }
    parts.push(units_value(&s[start..]));
    Ok(Value::Object(create_array(&ctx.realm.intrinsics, parts)))
}

fn string_raw(ctx: &Rc<Context>, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let cooked = to_object(ctx, &arg(args, 0))?;
    let raw = get_value(ctx, &Value::Object(cooked), &"raw".into())?;
    let raw_obj = to_object(ctx, &raw)?;
    let raw = Value::Object(raw_obj);
    let len = to_length(ctx, &get_value(ctx, &raw, &"length".into())?)?;
    let mut out = String::new();
    for i in 0..len {
        out.push_str(&to_string(ctx, &get_value(ctx, &raw, &PropertyKey::from(i))?)?);
        if i + 1 < len
            && let Some(sub) = args.get(i + 1)
        {
            out.push_str(&to_string(ctx, sub)?);
        }
    }
    Ok(Value::from(out))
}

fn string_value_of_arg(ctx: &Rc<Context>, args: &[Value]) -> EvalResult<Rc<str>> {
    match args.first() {
        None => Ok("".into()),
        Some(v) => to_string(ctx, v),
    }
}

/// String exotic object with its `length`.
pub fn create_string_object(proto: &JSObjectDataPtr, s: Rc<str>) -> JSObjectDataPtr {
    let len = s.encode_utf16().count();
    let obj = new_object_with_kind(Some(proto), ObjectKind::String(s));
    obj.borrow_mut().insert_data("length", Value::Number(len as f64), false, false, false);
    obj
}

pub fn initialize_string(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.string_prototype;
    proto.borrow_mut().insert_data("length", Value::Number(0.0), false, false, false);
    let ctor = new_native_constructor(
        intrinsics,
        "String",
        1,
        |ctx, _this, args| match args.first() {
            Some(Value::Symbol(sym)) => Ok(Value::from(format!("Symbol({})", sym.description.as_deref().unwrap_or("")))),
            _ => Ok(Value::String(string_value_of_arg(ctx, args)?)),
        },
        |ctx, args, new_target| {
            let s = string_value_of_arg(ctx, args)?;
            let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.string_prototype)?;
            Ok(Value::Object(create_string_object(&proto, s)))
        },
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, &ctor, "fromCharCode", 1, |ctx, _this, args| {
        let mut units = Vec::with_capacity(args.len());
        for a in args {
            units.push(to_uint32(ctx, a)? as u16);
        }
        Ok(units_value(&units))
    });
    define_method(intrinsics, &ctor, "fromCodePoint", 1, |ctx, _this, args| {
        let mut out = String::new();
        for a in args {
            let n = to_number(ctx, a)?;
            let c = (n.fract() == 0.0 && (0.0..=1114111.0).contains(&n)).then(|| char::from_u32(n as u32)).flatten();
            match c {
                Some(c) => out.push(c),
                None if n.fract() == 0.0 && (0.0..=1114111.0).contains(&n) => out.push(char::REPLACEMENT_CHARACTER),
                None => return Err(raise_range_error!("Invalid code point {}", crate::core::value::number_to_string(n)).into()),
            }
        }
        Ok(Value::from(out))
    });
    define_method(intrinsics, &ctor, "raw", 1, string_raw);

    define_method(intrinsics, proto, "toString", 0, |_ctx, this, _args| Ok(Value::String(this_string_value(this, "toString")?)));
    define_method(intrinsics, proto, "valueOf", 0, |_ctx, this, _args| Ok(Value::String(this_string_value(this, "valueOf")?)));
    define_method(intrinsics, proto, "at", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "at")?;
        let n = to_integer_or_infinity(ctx, &arg(args, 0))?;
        let index = if n < 0.0 { s.len() as f64 + n } else { n };
        if index < 0.0 || index >= s.len() as f64 {
            return Ok(Value::Undefined);
        }
        Ok(units_value(&[s[index as usize]]))
    });
    define_method(intrinsics, proto, "charAt", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "charAt")?;
        let n = to_integer_or_infinity(ctx, &arg(args, 0))?;
        if n < 0.0 || n >= s.len() as f64 {
            return Ok(Value::from(""));
        }
        Ok(units_value(&[s[n as usize]]))
    });
    define_method(intrinsics, proto, "charCodeAt", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "charCodeAt")?;
        let n = to_integer_or_infinity(ctx, &arg(args, 0))?;
        if n < 0.0 || n >= s.len() as f64 {
            return Ok(Value::Number(f64::NAN));
        }
        Ok(Value::Number(s[n as usize] as f64))
    });
    define_method(intrinsics, proto, "codePointAt", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "codePointAt")?;
        let n = to_integer_or_infinity(ctx, &arg(args, 0))?;
        if n < 0.0 || n >= s.len() as f64 {
            return Ok(Value::Undefined);
        }
        Ok(code_point_at(&s, n as usize).map(|c| Value::Number(c as f64)).unwrap_or_default())
    });
    define_method(intrinsics, proto, "concat", 1, |ctx, this, args| {
        let mut out = coerced_this(ctx, this, "concat")?.to_string();
        for a in args {
            out.push_str(&to_string(ctx, a)?);
        }
        Ok(Value::from(out))
    });
    define_method(intrinsics, proto, "includes", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "includes")?;
        let search = string_arg(ctx, args, 0)?;
        let start = position_arg(ctx, args, 1, 0, s.len())?;
        Ok(Value::Boolean(utf16_find(&s, &search, start).is_some()))
    });
    define_method(intrinsics, proto, "startsWith", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "startsWith")?;
        let search = string_arg(ctx, args, 0)?;
        let start = position_arg(ctx, args, 1, 0, s.len())?;
        Ok(Value::Boolean(s[start..].starts_with(&search)))
    });
    define_method(intrinsics, proto, "endsWith", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "endsWith")?;
        let search = string_arg(ctx, args, 0)?;
        let end = position_arg(ctx, args, 1, s.len(), s.len())?;
        Ok(Value::Boolean(s[..end].ends_with(&search)))
    });
    define_method(intrinsics, proto, "indexOf", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "indexOf")?;
        let search = string_arg(ctx, args, 0)?;
        let start = position_arg(ctx, args, 1, 0, s.len())?;
        Ok(Value::Number(utf16_find(&s, &search, start).map(|i| i as f64).unwrap_or(-1.0)))
    });
    define_method(intrinsics, proto, "lastIndexOf", 1, |ctx, this, args| {
        let s = units_of(ctx, this, "lastIndexOf")?;
        let search = string_arg(ctx, args, 0)?;
        let from = match arg(args, 1) {
            Value::Undefined => s.len(),
            v => {
                let n = to_number(ctx, &v)?;
                if n.is_nan() { s.len() } else { n.trunc().clamp(0.0, s.len() as f64) as usize }
            }
        };
        Ok(Value::Number(utf16_rfind(&s, &search, from).map(|i| i as f64).unwrap_or(-1.0)))
    });
    define_method(intrinsics, proto, "padStart", 2, |ctx, this, args| pad(ctx, this, args, true));
    define_method(intrinsics, proto, "padEnd", 2, |ctx, this, args| pad(ctx, this, args, false));
    define_method(intrinsics, proto, "repeat", 1, |ctx, this, args| {
        let s = coerced_this(ctx, this, "repeat")?;
        let n = to_integer_or_infinity(ctx, &arg(args, 0))?;
        if n < 0.0 || n.is_infinite() {
            return Err(raise_range_error!("Invalid count value: {}", crate::core::value::number_to_string(n)).into());
        }
        if s.is_empty() || n == 0.0 {
            return Ok(Value::from(""));
        }
        if s.encode_utf16().count() as f64 * n > MAX_STRING_LENGTH as f64 {
            return Err(raise_range_error!("Invalid string length").into());
        }
        Ok(Value::from(s.repeat(n as usize)))
    });
    define_method(intrinsics, proto, "replace", 2, |ctx, this, args| replace_impl(ctx, this, args, false));
    define_method(intrinsics, proto, "replaceAll", 2, |ctx, this, args| replace_impl(ctx, this, args, true));
    define_method(intrinsics, proto, "slice", 2, |ctx, this, args| {
        let s = units_of(ctx, this, "slice")?;
        let start = relative_index(to_integer_or_infinity(ctx, &arg(args, 0))?, s.len());
        let end = match arg(args, 1) {
            Value::Undefined => s.len(),
            e => relative_index(to_integer_or_infinity(ctx, &e)?, s.len()),
        };
        Ok(units_value(utf16_slice(&s, start, end)))
    });
    define_method(intrinsics, proto, "substring", 2, |ctx, this, args| {
        let s = units_of(ctx, this, "substring")?;
        let a = position_arg(ctx, args, 0, 0, s.len())?;
        let b = position_arg(ctx, args, 1, s.len(), s.len())?;
        Ok(units_value(utf16_slice(&s, a.min(b), a.max(b))))
    });
    define_method(intrinsics, proto, "substr", 2, |ctx, this, args| {
        let s = units_of(ctx, this, "substr")?;
        let start = relative_index(to_integer_or_infinity(ctx, &arg(args, 0))?, s.len());
        let len = match arg(args, 1) {
            Value::Undefined => s.len(),
            l => to_integer_or_infinity(ctx, &l)?.clamp(0.0, s.len() as f64) as usize,
        };
        Ok(units_value(utf16_slice(&s, start, start.saturating_add(len))))
    });
    define_method(intrinsics, proto, "split", 2, split);
    define_method(intrinsics, proto, "toLowerCase", 0, |ctx, this, _args| {
        Ok(Value::from(coerced_this(ctx, this, "toLowerCase")?.to_lowercase()))
    });
    define_method(intrinsics, proto, "toUpperCase", 0, |ctx, this, _args| {
        Ok(Value::from(coerced_this(ctx, this, "toUpperCase")?.to_uppercase()))
    });
    define_method(intrinsics, proto, "trim", 0, |ctx, this, _args| trim(ctx, this, true, true, "trim"));
    define_method(intrinsics, proto, "trimStart", 0, |ctx, this, _args| trim(ctx, this, true, false, "trimStart"));
    define_method(intrinsics, proto, "trimEnd", 0, |ctx, this, _args| trim(ctx, this, false, true, "trimEnd"));
    define_method(intrinsics, proto, "localeCompare", 1, |ctx, this, args| {
        let s = coerced_this(ctx, this, "localeCompare")?;
        let other = to_string(ctx, &arg(args, 0))?;
        Ok(Value::Number(match s.cmp(&other) {
            std::cmp::Ordering::Less => -1.0,
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Greater => 1.0,
        }))
    });
    define_symbol_method(intrinsics, proto, &intrinsics.symbols.iterator, "[Symbol.iterator]", 0, |ctx, this, _args| {
        let s = coerced_this(ctx, this, "[Symbol.iterator]")?;
        Ok(create_string_iterator(ctx, s))
    });

    global.borrow_mut().insert_builtin("String", Value::Object(ctor));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_patterns() {
        let subject = utf8_to_utf16("abc");
        let matched = utf8_to_utf16("b");
        let out = substitute(&matched, 1, &subject, &utf8_to_utf16("[$&|$`|$'|$$|$1]"));
        assert_eq!(utf16_to_utf8(&out), "[b|a|c|$|$1]");
    }

    #[test]
    fn this_string_value_rejects_non_strings() {
        assert!(this_string_value(&Value::Number(1.0), "valueOf").is_err());
        assert_eq!(&*this_string_value(&Value::from("x"), "valueOf").unwrap(), "x");
    }
}
