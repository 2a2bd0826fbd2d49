//! `Number`, `Number.prototype` and the numeric globals `parseInt`,
//! `parseFloat`, `isNaN` and `isFinite`.

use crate::core::context::Context;
use crate::core::conversion::{to_integer_or_infinity, to_number, to_string};
use crate::core::js_error::EvalResult;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value, is_js_whitespace, new_object_with_kind, number_to_string};
use crate::js_function::{arg, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor, new_native_function};
use crate::{raise_range_error, raise_type_error};
use std::rc::Rc;

const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

/// `thisNumberValue`.
fn this_number_value(this: &Value, method: &str) -> EvalResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Object(o) => match o.borrow().kind {
            ObjectKind::Number(n) => Ok(n),
            _ => Err(raise_type_error!("Number.prototype.{method} requires that 'this' be a Number").into()),
        },
        _ => Err(raise_type_error!("Number.prototype.{method} requires that 'this' be a Number").into()),
    }
}

/// `parseInt(string, radix)`.
pub fn parse_int(input: &str, radix: i32) -> f64 {
    let s = input.trim_start_matches(is_js_whitespace);
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut radix = radix;
    let mut s = s;
    let has_hex_prefix = s.len() >= 2 && (s.starts_with("0x") || s.starts_with("0X"));
    if radix == 0 {
        radix = if has_hex_prefix { 16 } else { 10 };
    } else if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if radix == 16 && has_hex_prefix {
        s = &s[2..];
    }
    let mut value = 0f64;
    let mut any = false;
    for c in s.chars() {
        match c.to_digit(radix as u32) {
            Some(d) => {
                value = value * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    if !any {
        return f64::NAN;
    }
    if negative { -value } else { value }
}

/// `parseFloat(string)`: the longest prefix that is a decimal literal.
pub fn parse_float(input: &str) -> f64 {
    let s = input.trim_start_matches(is_js_whitespace);
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return if bytes.first() == Some(&b'-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - digits_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let dot = i;
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        mantissa_digits += i - dot - 1;
        if mantissa_digits == 0 {
            return f64::NAN;
        }
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    s[..i].parse::<f64>().unwrap_or(f64::NAN)
}

/// Rounds the decimal expansion of a non-negative number to `places`
/// fraction digits, ties away from zero.
fn to_fixed_digits(x: f64, places: usize) -> String {
    let exact = format!("{:.*}", places + 30, x);
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((&exact, ""));
    let mut digits: Vec<u8> = int_part.bytes().chain(frac_part.bytes().take(places)).collect();
    let round_up = frac_part.as_bytes().get(places).is_some_and(|d| *d >= b'5');
    if round_up {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, b'1');
                break;
            }
            i -= 1;
            if digits[i] == b'9' {
                digits[i] = b'0';
            } else {
                digits[i] += 1;
                break;
            }
        }
    }
    let int_len = digits.len() - places;
    let mut out = String::from_utf8_lossy(&digits[..int_len]).into_owned();
    if places > 0 {
        out.push('.');
        out.push_str(&String::from_utf8_lossy(&digits[int_len..]));
    }
    out
}

fn with_sign(x: f64, body: String) -> String {
    if x < 0.0 { format!("-{body}") } else { body }
}

/// `d.ddde+x` form with `fraction` digits after the point.
fn exponential(x: f64, fraction: usize) -> String {
    let formatted = format!("{:.*e}", fraction, x.abs());
    let (mantissa, exp) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    with_sign(x, format!("{mantissa}e{sign}{}", exp.abs()))
}

fn to_radix_string(x: f64, radix: u32) -> String {
    if !x.is_finite() || x == 0.0 {
        return number_to_string(x);
    }
    let negative = x < 0.0;
    let x = x.abs();
    let mut int_part = x.trunc();
    let mut frac = x - int_part;
    let mut int_digits = Vec::new();
    if int_part == 0.0 {
        int_digits.push('0');
    }
    while int_part >= 1.0 {
        let d = (int_part % radix as f64) as u32;
        int_digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        int_part = (int_part / radix as f64).trunc();
    }
    int_digits.reverse();
    let mut out: String = int_digits.into_iter().collect();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..52 {
            frac *= radix as f64;
            let d = frac.trunc() as u32;
            out.push(std::char::from_digit(d, radix).unwrap_or('0'));
            frac -= d as f64;
            if frac == 0.0 {
                break;
            }
        }
    }
    if negative { format!("-{out}") } else { out }
}

fn digits_arg(ctx: &Rc<Context>, args: &[Value], min: f64, max: f64, method: &str) -> EvalResult<usize> {
    let d = to_integer_or_infinity(ctx, &arg(args, 0))?;
    if d < min || d > max {
        return Err(raise_range_error!("{method}() argument must be between {min} and {max}").into());
    }
    Ok(d as usize)
}

fn is_integral(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) if n.is_finite() && n.trunc() == *n => Some(*n),
        _ => None,
    }
}

fn number_construct(ctx: &Rc<Context>, args: &[Value], new_target: &JSObjectDataPtr) -> EvalResult<Value> {
    let n = match args.first() {
        Some(v) => to_number(ctx, v)?,
        None => 0.0,
    };
    let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.number_prototype)?;
    Ok(Value::Object(new_object_with_kind(Some(&proto), ObjectKind::Number(n))))
}

pub fn initialize_number(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.number_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "Number",
        1,
        |ctx, _this, args| match args.first() {
            Some(v) => Ok(Value::Number(to_number(ctx, v)?)),
            None => Ok(Value::Number(0.0)),
        },
        number_construct,
    );
    link_constructor(&ctor, proto);
    {
        let mut c = ctor.borrow_mut();
        let constants = [
            ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
            ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
            ("EPSILON", f64::EPSILON),
            ("MAX_VALUE", f64::MAX),
            ("MIN_VALUE", 5e-324),
            ("NaN", f64::NAN),
            ("POSITIVE_INFINITY", f64::INFINITY),
            ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ];
        for (name, value) in constants {
            c.insert_data(name, Value::Number(value), false, false, false);
        }
    }

    define_method(intrinsics, &ctor, "isFinite", 1, |_ctx, _this, args| {
        Ok(Value::Boolean(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))
    });
    define_method(intrinsics, &ctor, "isNaN", 1, |_ctx, _this, args| {
        Ok(Value::Boolean(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
    });
    define_method(intrinsics, &ctor, "isInteger", 1, |_ctx, _this, args| Ok(Value::Boolean(is_integral(&arg(args, 0)).is_some())));
    define_method(intrinsics, &ctor, "isSafeInteger", 1, |_ctx, _this, args| {
        Ok(Value::Boolean(is_integral(&arg(args, 0)).is_some_and(|n| n.abs() <= MAX_SAFE_INTEGER)))
    });

    let parse_int_fn = new_native_function(intrinsics, "parseInt", 2, |ctx, _this, args| {
        let s = to_string(ctx, &arg(args, 0))?;
        let radix = crate::core::conversion::to_int32(ctx, &arg(args, 1))?;
        Ok(Value::Number(parse_int(&s, radix)))
    });
    let parse_float_fn = new_native_function(intrinsics, "parseFloat", 1, |ctx, _this, args| {
        let s = to_string(ctx, &arg(args, 0))?;
        Ok(Value::Number(parse_float(&s)))
    });
    {
        let mut c = ctor.borrow_mut();
        c.insert_builtin("parseInt", Value::Object(parse_int_fn.clone()));
        c.insert_builtin("parseFloat", Value::Object(parse_float_fn.clone()));
    }

    define_method(intrinsics, proto, "valueOf", 0, |_ctx, this, _args| Ok(Value::Number(this_number_value(this, "valueOf")?)));
    define_method(intrinsics, proto, "toString", 1, |ctx, this, args| {
        let x = this_number_value(this, "toString")?;
        let radix = match arg(args, 0) {
            Value::Undefined => 10.0,
            r => to_integer_or_infinity(ctx, &r)?,
        };
        if !(2.0..=36.0).contains(&radix) {
            return Err(raise_range_error!("toString() radix must be between 2 and 36").into());
        }
        if radix == 10.0 {
            return Ok(Value::from(number_to_string(x)));
        }
        Ok(Value::from(to_radix_string(x, radix as u32)))
    });
    define_method(intrinsics, proto, "toLocaleString", 0, |_ctx, this, _args| {
        Ok(Value::from(number_to_string(this_number_value(this, "toLocaleString")?)))
    });
    define_method(intrinsics, proto, "toFixed", 1, |ctx, this, args| {
        let x = this_number_value(this, "toFixed")?;
        let places = digits_arg(ctx, args, 0.0, 100.0, "toFixed")?;
        if !x.is_finite() || x.abs() >= 1e21 {
            return Ok(Value::from(number_to_string(x)));
        }
        let body = to_fixed_digits(x.abs(), places);
        let negative = x < 0.0 && body.bytes().any(|b| b.is_ascii_digit() && b != b'0');
        Ok(Value::from(if negative { format!("-{body}") } else { body }))
    });
    define_method(intrinsics, proto, "toExponential", 1, |ctx, this, args| {
        let x = this_number_value(this, "toExponential")?;
        if !x.is_finite() {
            return Ok(Value::from(number_to_string(x)));
        }
        if arg(args, 0).is_undefined() {
            // As many digits as needed to represent the value uniquely.
            let shortest = format!("{:e}", x.abs());
            let (mantissa, exp) = shortest.split_once('e').unwrap_or((&shortest, "0"));
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            return Ok(Value::from(with_sign(x, format!("{mantissa}e{sign}{}", exp.abs()))));
        }
        let fraction = digits_arg(ctx, args, 0.0, 100.0, "toExponential")?;
        Ok(Value::from(exponential(x, fraction)))
    });
    define_method(intrinsics, proto, "toPrecision", 1, |ctx, this, args| {
        let x = this_number_value(this, "toPrecision")?;
        if arg(args, 0).is_undefined() || !x.is_finite() {
            return Ok(Value::from(number_to_string(x)));
        }
        let precision = digits_arg(ctx, args, 1.0, 100.0, "toPrecision")?;
        if x == 0.0 {
            let zeros = "0".repeat(precision - 1);
            return Ok(Value::from(if precision > 1 { format!("0.{zeros}") } else { "0".to_string() }));
        }
        let formatted = format!("{:.*e}", precision - 1, x.abs());
        let exp: i32 = formatted.split_once('e').and_then(|(_, e)| e.parse().ok()).unwrap_or(0);
        if exp < -6 || exp >= precision as i32 {
            return Ok(Value::from(exponential(x, precision - 1)));
        }
        let places = (precision as i32 - 1 - exp).max(0) as usize;
        Ok(Value::from(with_sign(x, to_fixed_digits(x.abs(), places))))
    });

    let mut g = global.borrow_mut();
    g.insert_builtin("Number", Value::Object(ctor));
    g.insert_builtin("parseInt", Value::Object(parse_int_fn));
    g.insert_builtin("parseFloat", Value::Object(parse_float_fn));
    drop(g);
    define_method(intrinsics, global, "isNaN", 1, |ctx, _this, args| Ok(Value::Boolean(to_number(ctx, &arg(args, 0))?.is_nan())));
    define_method(intrinsics, global, "isFinite", 1, |ctx, _this, args| {
        Ok(Value::Boolean(to_number(ctx, &arg(args, 0))?.is_finite()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_prefixes_and_radix() {
        assert_eq!(parse_int("  42px", 0), 42.0);
        assert_eq!(parse_int("0x1f", 0), 31.0);
        assert_eq!(parse_int("-ff", 16), -255.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert!(parse_int("z", 10).is_nan());
        assert!(parse_int("1", 37).is_nan());
    }

    #[test]
    fn parse_float_prefix() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("  -.5"), -0.5);
        assert_eq!(parse_float("1e3x"), 1000.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float("-Infinityx"), f64::NEG_INFINITY);
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn fixed_rounds_half_up() {
        assert_eq!(to_fixed_digits(2.5, 0), "3");
        assert_eq!(to_fixed_digits(1.005, 2), "1.00");
        assert_eq!(to_fixed_digits(9.995, 1), "10.0");
        assert_eq!(to_fixed_digits(0.0, 2), "0.00");
    }

    #[test]
    fn radix_conversion() {
        assert_eq!(to_radix_string(255.0, 16), "ff");
        assert_eq!(to_radix_string(-8.0, 2), "-1000");
        assert_eq!(to_radix_string(0.5, 2), "0.1");
    }
}
