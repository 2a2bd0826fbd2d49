use crate::core::context::Context;
use crate::core::conversion::{to_number, to_uint32};
use crate::core::js_error::EvalResult;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, Value, new_object};
use crate::js_function::{arg, define_method};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

thread_local! {
    static RANDOM_STATE: Cell<u64> = Cell::new(random_seed());
}

fn random_seed() -> u64 {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0);
    // xorshift must never start from zero.
    nanos | 1
}

/// xorshift64* mapped onto [0, 1).
fn next_random() -> f64 {
    RANDOM_STATE.with(|state| {
        let mut x = state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        state.set(x);
        let bits = x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
        bits as f64 / (1u64 << 53) as f64
    })
}

fn js_round(x: f64) -> f64 {
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    if (-0.5..0.0).contains(&x) {
        return -0.0;
    }
    (x + 0.5).floor()
}

fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

fn js_sign(x: f64) -> f64 {
    if x.is_nan() || x == 0.0 {
        x
    } else if x > 0.0 {
        1.0
    } else {
        -1.0
    }
}

fn numbers(ctx: &Rc<Context>, args: &[Value]) -> EvalResult<Vec<f64>> {
    args.iter().map(|v| to_number(ctx, v)).collect()
}

fn max_of(values: &[f64]) -> f64 {
    let mut result = f64::NEG_INFINITY;
    for &v in values {
        if v.is_nan() {
            return f64::NAN;
        }
        if v > result || (v == 0.0 && result == 0.0 && result.is_sign_negative()) {
            result = v;
        }
    }
    result
}

fn min_of(values: &[f64]) -> f64 {
    let mut result = f64::INFINITY;
    for &v in values {
        if v.is_nan() {
            return f64::NAN;
        }
        if v < result || (v == 0.0 && result == 0.0 && v.is_sign_negative()) {
            result = v;
        }
    }
    result
}

fn hypot(values: &[f64]) -> f64 {
    if values.iter().any(|v| v.is_infinite()) {
        return f64::INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let largest = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if largest == 0.0 {
        return 0.0;
    }
    largest * values.iter().map(|v| (v / largest).powi(2)).sum::<f64>().sqrt()
}

fn unary(intrinsics: &Intrinsics, math: &JSObjectDataPtr, name: &str, f: fn(f64) -> f64) {
    define_method(intrinsics, math, name, 1, move |ctx, _this, args| Ok(Value::Number(f(to_number(ctx, &arg(args, 0))?))));
}

fn binary(intrinsics: &Intrinsics, math: &JSObjectDataPtr, name: &str, f: fn(f64, f64) -> f64) {
    define_method(intrinsics, math, name, 2, move |ctx, _this, args| {
        let a = to_number(ctx, &arg(args, 0))?;
        let b = to_number(ctx, &arg(args, 1))?;
        Ok(Value::Number(f(a, b)))
    });
}

/// Create the Math object with all mathematical constants and functions
pub fn initialize_math(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let math = new_object(Some(&intrinsics.object_prototype));
    {
        use std::f64::consts;
        let mut m = math.borrow_mut();
        let constants = [
            ("E", consts::E),
            ("LN10", consts::LN_10),
            ("LN2", consts::LN_2),
            ("LOG10E", consts::LOG10_E),
            ("LOG2E", consts::LOG2_E),
            ("PI", consts::PI),
            ("SQRT1_2", consts::FRAC_1_SQRT_2),
            ("SQRT2", consts::SQRT_2),
        ];
        for (name, value) in constants {
            m.insert_data(name, Value::Number(value), false, false, false);
        }
        m.insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("Math"), false, false, true);
    }

    unary(intrinsics, &math, "abs", f64::abs);
    unary(intrinsics, &math, "acos", f64::acos);
    unary(intrinsics, &math, "acosh", f64::acosh);
    unary(intrinsics, &math, "asin", f64::asin);
    unary(intrinsics, &math, "asinh", f64::asinh);
    unary(intrinsics, &math, "atan", f64::atan);
    unary(intrinsics, &math, "atanh", f64::atanh);
    unary(intrinsics, &math, "cbrt", f64::cbrt);
    unary(intrinsics, &math, "ceil", f64::ceil);
    unary(intrinsics, &math, "cos", f64::cos);
    unary(intrinsics, &math, "cosh", f64::cosh);
    unary(intrinsics, &math, "exp", f64::exp);
    unary(intrinsics, &math, "expm1", f64::exp_m1);
    unary(intrinsics, &math, "floor", f64::floor);
    unary(intrinsics, &math, "fround", |x| x as f32 as f64);
    unary(intrinsics, &math, "log", f64::ln);
    unary(intrinsics, &math, "log1p", f64::ln_1p);
    unary(intrinsics, &math, "log10", f64::log10);
    unary(intrinsics, &math, "log2", f64::log2);
    unary(intrinsics, &math, "round", js_round);
    unary(intrinsics, &math, "sign", js_sign);
    unary(intrinsics, &math, "sin", f64::sin);
    unary(intrinsics, &math, "sinh", f64::sinh);
    unary(intrinsics, &math, "sqrt", f64::sqrt);
    unary(intrinsics, &math, "tan", f64::tan);
    unary(intrinsics, &math, "tanh", f64::tanh);
    unary(intrinsics, &math, "trunc", f64::trunc);
    binary(intrinsics, &math, "atan2", f64::atan2);
    binary(intrinsics, &math, "pow", js_pow);

    define_method(intrinsics, &math, "max", 2, |ctx, _this, args| Ok(Value::Number(max_of(&numbers(ctx, args)?))));
    define_method(intrinsics, &math, "min", 2, |ctx, _this, args| Ok(Value::Number(min_of(&numbers(ctx, args)?))));
    define_method(intrinsics, &math, "hypot", 2, |ctx, _this, args| Ok(Value::Number(hypot(&numbers(ctx, args)?))));
    define_method(intrinsics, &math, "clz32", 1, |ctx, _this, args| {
        Ok(Value::Number(to_uint32(ctx, &arg(args, 0))?.leading_zeros() as f64))
    });
    define_method(intrinsics, &math, "imul", 2, |ctx, _this, args| {
        let a = to_uint32(ctx, &arg(args, 0))?;
        let b = to_uint32(ctx, &arg(args, 1))?;
        Ok(Value::Number(a.wrapping_mul(b) as i32 as f64))
    });
    define_method(intrinsics, &math, "random", 0, |_ctx, _this, _args| Ok(Value::Number(next_random())));

    global.borrow_mut().insert_builtin("Math", Value::Object(math));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_matches_script_semantics() {
        assert_eq!(js_round(2.5), 3.0);
        assert_eq!(js_round(-2.5), -2.0);
        assert!(js_round(-0.2).is_sign_negative());
    }

    #[test]
    fn min_max_handle_signed_zero_and_nan() {
        assert!(max_of(&[-0.0, 0.0]).is_sign_positive());
        assert!(min_of(&[0.0, -0.0]).is_sign_negative());
        assert!(max_of(&[1.0, f64::NAN]).is_nan());
        assert_eq!(max_of(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn random_stays_in_unit_interval() {
        for _ in 0..1000 {
            let r = next_random();
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn pow_edge_cases() {
        assert!(js_pow(1.0, f64::NAN).is_nan());
        assert!(js_pow(-1.0, f64::INFINITY).is_nan());
        assert_eq!(js_pow(2.0, 10.0), 1024.0);
    }
}
