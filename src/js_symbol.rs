//! `Symbol`, the global symbol registry and the well-known symbols.

use crate::core::conversion::{primitive_to_string, to_string, value_description};
use crate::core::js_error::EvalResult;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectDataPtr, ObjectKind, SymbolData, Value, next_identity};
use crate::js_function::{arg, define_getter, define_method, define_symbol_method, link_constructor, new_native_constructor};
use crate::raise_type_error;
use std::rc::Rc;

fn this_symbol_value(this: &Value, method: &str) -> EvalResult<Rc<SymbolData>> {
    match this {
        Value::Symbol(s) => Ok(s.clone()),
        Value::Object(o) => match &o.borrow().kind {
            ObjectKind::Symbol(s) => Ok(s.clone()),
            _ => Err(raise_type_error!("Symbol.prototype.{method} requires that 'this' be a Symbol").into()),
        },
        _ => Err(raise_type_error!("Symbol.prototype.{method} requires that 'this' be a Symbol").into()),
    }
}

pub fn initialize_symbol(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.symbol_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "Symbol",
        0,
        |ctx, _this, args| {
            let description = match arg(args, 0) {
                Value::Undefined => None,
                v => Some(to_string(ctx, &v)?),
            };
            Ok(Value::Symbol(SymbolData::new(description)))
        },
        |_ctx, _args, _new_target| Err(raise_type_error!("Symbol is not a constructor").into()),
    );
    link_constructor(&ctor, proto);

    {
        let mut c = ctor.borrow_mut();
        for (name, symbol) in intrinsics.symbols.all() {
            c.insert_data(name, Value::Symbol(symbol.clone()), false, false, false);
        }
    }

    define_method(intrinsics, &ctor, "for", 1, |ctx, _this, args| {
        let key = to_string(ctx, &arg(args, 0))?;
        let mut registry = ctx.realm.symbol_registry.borrow_mut();
        let symbol = registry
            .entry(key.clone())
            .or_insert_with(|| {
                Rc::new(SymbolData {
                    id: next_identity(),
                    description: Some(key),
                    registered: true,
                })
            })
            .clone();
        Ok(Value::Symbol(symbol))
    });
    define_method(intrinsics, &ctor, "keyFor", 1, |_ctx, _this, args| match arg(args, 0) {
        Value::Symbol(s) if s.registered => Ok(s.description.clone().map(Value::String).unwrap_or_default()),
        Value::Symbol(_) => Ok(Value::Undefined),
        other => Err(raise_type_error!("{} is not a symbol", value_description(&other)).into()),
    });

    define_method(intrinsics, proto, "toString", 0, |_ctx, this, _args| {
        let s = this_symbol_value(this, "toString")?;
        Ok(Value::from(primitive_to_string(&Value::Symbol(s))))
    });
    define_method(intrinsics, proto, "valueOf", 0, |_ctx, this, _args| Ok(Value::Symbol(this_symbol_value(this, "valueOf")?)));
    define_getter(intrinsics, proto, "description", |_ctx, this, _args| {
        let s = this_symbol_value(this, "description")?;
        Ok(s.description.clone().map(Value::String).unwrap_or_default())
    });
    let to_primitive = define_symbol_method(
        intrinsics,
        proto,
        &intrinsics.symbols.to_primitive,
        "[Symbol.toPrimitive]",
        1,
        |_ctx, this, _args| Ok(Value::Symbol(this_symbol_value(this, "[Symbol.toPrimitive]")?)),
    );
    {
        let mut p = proto.borrow_mut();
        p.insert_data(PropertyKey::from(&intrinsics.symbols.to_primitive), Value::Object(to_primitive), false, false, true);
        p.insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("Symbol"), false, false, true);
    }

    global.borrow_mut().insert_builtin("Symbol", Value::Object(ctor));
}
