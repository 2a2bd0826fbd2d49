//! `Map` and the insertion-ordered table shared with `Set`.

use crate::core::context::Context;
use crate::core::conversion::value_description;
use crate::core::js_error::EvalResult;
use crate::core::property::get_value;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{IterationKind, JSObjectDataPtr, ObjectKind, Value, new_object_with_kind};
use crate::js_function::{arg, call_function, define_getter, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::js_iterator::{create_keyed_iterator, for_each_iterated};
use crate::raise_type_error;
use std::collections::HashMap;
use std::rc::Rc;

/// Hashable identity of a key under SameValueZero.
#[derive(Clone, PartialEq, Eq, Hash)]
enum TableKey {
    Undefined,
    Null,
    Boolean(bool),
    Number(u64),
    String(Rc<str>),
    Symbol(u64),
    Object(usize),
}

impl TableKey {
    fn of(v: &Value) -> Self {
        match v {
            Value::Undefined => TableKey::Undefined,
            Value::Null => TableKey::Null,
            Value::Boolean(b) => TableKey::Boolean(*b),
            Value::Number(n) if n.is_nan() => TableKey::Number(f64::NAN.to_bits()),
            // -0 and +0 are the same key.
            Value::Number(n) => TableKey::Number((n + 0.0).to_bits()),
            Value::String(s) => TableKey::String(s.clone()),
            Value::Symbol(s) => TableKey::Symbol(s.id),
            Value::Object(o) => TableKey::Object(Rc::as_ptr(o) as *const () as usize),
        }
    }
}

/// Entries in insertion order. Deleted entries leave a hole so that live
/// iterators, which hold a slot index, keep their position.
#[derive(Default)]
pub struct KeyedTable {
    slots: Vec<Option<(Value, Value)>>,
    index: HashMap<TableKey, usize>,
}

impl KeyedTable {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        let slot = *self.index.get(&TableKey::of(key))?;
        self.slots[slot].as_ref().map(|(_, v)| v.clone())
    }

    pub fn has(&self, key: &Value) -> bool {
        self.index.contains_key(&TableKey::of(key))
    }

    pub fn set(&mut self, key: Value, value: Value) {
        let key = match key {
            Value::Number(n) if n == 0.0 => Value::Number(0.0),
            other => other,
        };
        let table_key = TableKey::of(&key);
        if let Some(&slot) = self.index.get(&table_key) {
            self.slots[slot] = Some((key, value));
            return;
        }
        self.index.insert(table_key, self.slots.len());
        self.slots.push(Some((key, value)));
    }

    pub fn delete(&mut self, key: &Value) -> bool {
        match self.index.remove(&TableKey::of(key)) {
            Some(slot) => {
                self.slots[slot] = None;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.index.clear();
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// `None` past the end, `Some(None)` for a deleted slot.
    pub fn entry_at(&self, index: usize) -> Option<Option<(Value, Value)>> {
        self.slots.get(index).map(|slot| slot.clone())
    }

    /// Live entries in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.slots.iter().flatten().cloned().collect()
    }
}

pub(crate) fn this_table(this: &Value, want_set: bool, method: &str) -> EvalResult<JSObjectDataPtr> {
    let type_name = if want_set { "Set" } else { "Map" };
    if let Value::Object(o) = this {
        let matches = match o.borrow().kind {
            ObjectKind::Map(_) => !want_set,
            ObjectKind::Set(_) => want_set,
            _ => false,
        };
        if matches {
            return Ok(o.clone());
        }
    }
    Err(raise_type_error!("Method {type_name}.prototype.{method} called on incompatible receiver {}", value_description(this)).into())
}

/// Runs `f` on the table of a `Map` or `Set` object.
pub(crate) fn with_table<R>(obj: &JSObjectDataPtr, f: impl FnOnce(&mut KeyedTable) -> R) -> Option<R> {
    match &mut obj.borrow_mut().kind {
        ObjectKind::Map(table) | ObjectKind::Set(table) => Some(f(table)),
        _ => None,
    }
}

/// Visits entries in order, observing entries added or removed by the callback.
pub(crate) fn for_each_entry(
    ctx: &Rc<Context>,
    obj: &JSObjectDataPtr,
    mut f: impl FnMut(Value, Value) -> EvalResult<()>,
) -> EvalResult<()> {
    let mut index = 0;
    loop {
        let slot = with_table(obj, |t| t.entry_at(index)).flatten();
        match slot {
            None => return Ok(()),
            Some(None) => {}
            Some(Some((k, v))) => {
                ctx.check_interrupts()?;
                f(k, v)?;
            }
        }
        index += 1;
    }
}

fn map_construct(ctx: &Rc<Context>, args: &[Value], new_target: &JSObjectDataPtr) -> EvalResult<Value> {
    let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.map_prototype)?;
    let map = new_object_with_kind(Some(&proto), ObjectKind::Map(KeyedTable::default()));
    let map_value = Value::Object(map.clone());
    let iterable = arg(args, 0);
    if iterable.is_nullish() {
        return Ok(map_value);
    }
    let adder = get_value(ctx, &map_value, &"set".into())?;
    if !adder.is_callable() {
        return Err(raise_type_error!("'{}' returned for property 'set' of object '#<Map>' is not a function", value_description(&adder)).into());
    }
    for_each_iterated(ctx, &iterable, |entry| {
        if !matches!(entry, Value::Object(_)) {
            return Err(raise_type_error!("Iterator value {} is not an entry object", value_description(&entry)).into());
        }
        let k = get_value(ctx, &entry, &PropertyKey::from(0u32))?;
        let v = get_value(ctx, &entry, &PropertyKey::from(1u32))?;
        call_function(ctx, &adder, &map_value, &[k, v])?;
        Ok(())
    })?;
    Ok(map_value)
}

/// Initialize Map constructor and prototype
pub fn initialize_map(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.map_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "Map",
        0,
        |_ctx, _this, _args| Err(raise_type_error!("Constructor Map requires 'new'").into()),
        map_construct,
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, proto, "get", 1, |_ctx, this, args| {
        let map = this_table(this, false, "get")?;
        Ok(with_table(&map, |t| t.get(&arg(args, 0))).flatten().unwrap_or_default())
    });
    define_method(intrinsics, proto, "has", 1, |_ctx, this, args| {
        let map = this_table(this, false, "has")?;
        Ok(Value::Boolean(with_table(&map, |t| t.has(&arg(args, 0))).unwrap_or(false)))
    });
    define_method(intrinsics, proto, "set", 2, |ctx, this, args| {
        let map = this_table(this, false, "set")?;
        ctx.check_object_write(&map, "Map.prototype.set")?;
        with_table(&map, |t| t.set(arg(args, 0), arg(args, 1)));
        Ok(this.clone())
    });
    define_method(intrinsics, proto, "delete", 1, |ctx, this, args| {
        let map = this_table(this, false, "delete")?;
        ctx.check_object_write(&map, "Map.prototype.delete")?;
        Ok(Value::Boolean(with_table(&map, |t| t.delete(&arg(args, 0))).unwrap_or(false)))
    });
    define_method(intrinsics, proto, "clear", 0, |ctx, this, _args| {
        let map = this_table(this, false, "clear")?;
        ctx.check_object_write(&map, "Map.prototype.clear")?;
        with_table(&map, KeyedTable::clear);
        Ok(Value::Undefined)
    });
    define_getter(intrinsics, proto, "size", |_ctx, this, _args| {
        let map = this_table(this, false, "size")?;
        Ok(Value::Number(with_table(&map, |t| t.len()).unwrap_or(0) as f64))
    });
    define_method(intrinsics, proto, "forEach", 1, |ctx, this, args| {
        let map = this_table(this, false, "forEach")?;
        let callback = arg(args, 0);
        if !callback.is_callable() {
            return Err(raise_type_error!("{} is not a function", value_description(&callback)).into());
        }
        let this_arg = arg(args, 1);
        for_each_entry(ctx, &map, |k, v| {
            call_function(ctx, &callback, &this_arg, &[v, k, this.clone()])?;
            Ok(())
        })?;
        Ok(Value::Undefined)
    });
    define_method(intrinsics, proto, "keys", 0, |ctx, this, _args| {
        let map = this_table(this, false, "keys")?;
        Ok(create_keyed_iterator(ctx, &map, IterationKind::Keys, true))
    });
    define_method(intrinsics, proto, "values", 0, |ctx, this, _args| {
        let map = this_table(this, false, "values")?;
        Ok(create_keyed_iterator(ctx, &map, IterationKind::Values, true))
    });
    let entries = define_method(intrinsics, proto, "entries", 0, |ctx, this, _args| {
        let map = this_table(this, false, "entries")?;
        Ok(create_keyed_iterator(ctx, &map, IterationKind::Entries, true))
    });
    {
        let mut p = proto.borrow_mut();
        p.insert_builtin(PropertyKey::from(&intrinsics.symbols.iterator), Value::Object(entries));
        p.insert_data(PropertyKey::from(&intrinsics.symbols.to_string_tag), Value::from("Map"), false, false, true);
    }

    global.borrow_mut().insert_builtin("Map", Value::Object(ctor));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_with_same_value_zero() {
        let mut table = KeyedTable::default();
        table.set(Value::Number(-0.0), Value::from("zero"));
        table.set(Value::Number(f64::NAN), Value::from("nan"));
        assert_eq!(table.len(), 2);
        assert!(table.has(&Value::Number(0.0)));
        assert!(table.has(&Value::Number(f64::NAN)));
        let (k, _) = table.entries().remove(0);
        assert!(matches!(k, Value::Number(n) if n.is_sign_positive()));
    }

    #[test]
    fn deleted_slots_keep_iteration_positions() {
        let mut table = KeyedTable::default();
        table.set(Value::from("a"), Value::Number(1.0));
        table.set(Value::from("b"), Value::Number(2.0));
        assert!(table.delete(&Value::from("a")));
        assert!(matches!(table.entry_at(0), Some(None)));
        assert!(matches!(table.entry_at(1), Some(Some(_))));
        assert!(table.entry_at(2).is_none());
        table.set(Value::from("a"), Value::Number(3.0));
        let keys: Vec<String> = table.entries().iter().map(|(k, _)| format!("{k:?}")).collect();
        assert_eq!(keys, ["\"b\"", "\"a\""]);
    }

    #[test]
    fn overwrite_keeps_original_position() {
        let mut table = KeyedTable::default();
        table.set(Value::from("x"), Value::Number(1.0));
        table.set(Value::from("y"), Value::Number(2.0));
        table.set(Value::from("x"), Value::Number(3.0));
        let values: Vec<String> = table.entries().iter().map(|(_, v)| format!("{v:?}")).collect();
        assert_eq!(values, ["3", "2"]);
    }
}
