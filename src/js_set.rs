use crate::core::context::Context;
use crate::core::conversion::value_description;
use crate::core::js_error::EvalResult;
use crate::core::property::get_value;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{IterationKind, JSObjectDataPtr, ObjectKind, Value, new_object_with_kind};
use crate::js_function::{arg, call_function, define_getter, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::js_iterator::{create_keyed_iterator, for_each_iterated};
use crate::js_map::{KeyedTable, for_each_entry, this_table, with_table};
use crate::raise_type_error;
use std::rc::Rc;

fn set_construct(ctx: &Rc<Context>, args: &[Value], new_target: &JSObjectDataPtr) -> EvalResult<Value> {
    let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.set_prototype)?;
    let set = Value::Object(new_object_with_kind(Some(&proto), ObjectKind::Set(KeyedTable::default())));
    let iterable = arg(args, 0);
    if iterable.is_nullish() {
        return Ok(set);
    }
    let adder = get_value(ctx, &set, &"add".into())?;
    if !adder.is_callable() {
        return Err(raise_type_error!("'{}' returned for property 'add' of object '#<Set>' is not a function", value_description(&adder)).into());
    }
    for_each_iterated(ctx, &iterable, |value| {
        call_function(ctx, &adder, &set, &[value])?;
        Ok(())
    })?;
    Ok(set)
}

pub fn initialize_set(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.set_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "Set",
        0,
        |_ctx, _this, _args| Err(raise_type_error!("Constructor Set requires 'new'").into()),
        set_construct,
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, proto, "has", 1, |_ctx, this, args| {
        let set = this_table(this, true, "has")?;
        Ok(Value::Boolean(with_table(&set, |t| t.has(&arg(args, 0))).unwrap_or(false)))
    });
    define_method(intrinsics, proto, "add", 1, |ctx, this, args| {
        let set = this_table(this, true, "add")?;
        ctx.check_object_write(&set, "Set.prototype.add")?;
        let value = arg(args, 0);
        with_table(&set, |t| {
            if !t.has(&value) {
                t.set(value.clone(), value);
            }
        });
        Ok(this.clone())
    });
    define_method(intrinsics, proto, "delete", 1, |ctx, this, args| {
        let set = this_table(this, true, "delete")?;
        ctx.check_object_write(&set, "Set.prototype.delete")?;
        Ok(Value::Boolean(with_table(&set, |t| t.delete(&arg(args, 0))).unwrap_or(false)))
    });
    define_method(intrinsics, proto, "clear", 0, |ctx, this, _args| {
        let set = this_table(this, true, "clear")?;
        ctx.check_object_write(&set, "Set.prototype.clear")?;
        with_table(&set, KeyedTable::clear);
        Ok(Value::Undefined)
    });
    define_getter(intrinsics, proto, "size", |_ctx, this, _args| {
        let set = this_table(this, true, "size")?;
        Ok(Value::Number(with_table(&set, |t| t.len()).unwrap_or(0) as f64))
    });
    define_method(intrinsics, proto, "forEach", 1, |ctx, this, args| {
        let set = this_table(this, true, "forEach")?;
        let callback = arg(args, 0);
        if !callback.is_callable() {
            return Err(raise_type_error!("{} is not a function", value_description(&callback)).into());
        }
        let this_arg = arg(args, 1);
        for_each_entry(ctx, &set, |k, _| {
            call_function(ctx, &callback, &this_arg, &[k.clone(), k, this.clone()])?;
            Ok(())
        })?;
        Ok(Value::Undefined)
    });
    define_method(intrinsics, proto, "entries", 0, |ctx, this, _args| {
        let set = this_table(this, true, "entries")?;
        Ok(create_keyed_iterator(ctx, &set, IterationKind::Entries, false))
    });
    let values = define_method(intrinsics, proto, "values", 0, |ctx, this, _args| {
        let set = this_table(this, true, "values")?;
        Ok(create_keyed_iterator(ctx, &set, IterationKind::Values, false))
    });
    {
        let mut p = proto.borrow_mut();
        p.insert_builtin("keys", Value::Object(values.clone()));
        p.insert_builtin(PropertyKey::from(&intrinsics.symbols.iterator), Value::Object(values));
        p.insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("Set"), false, false, true);
    }

    global.borrow_mut().insert_builtin("Set", Value::Object(ctor));
}
