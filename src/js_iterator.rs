//! The iteration protocol and the built-in iterator objects.
//!
//! `%IteratorPrototype%` carries `[Symbol.iterator]() { return this }`; the
//! array, string, map and set iterator prototypes inherit from it and each
//! define a `next` that advances the `IteratorState` slot of the receiver.

use crate::core::context::Context;
use crate::core::conversion::{to_length, value_description};
use crate::core::js_error::{EvalError, EvalResult};
use crate::core::property::{get_property, get_value};
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{IterationKind, IteratorState, JSObjectDataPtr, ObjectKind, Value, new_object, new_object_with_kind, to_boolean};
use crate::js_array::create_array;
use crate::js_function::{call_function, define_method, define_symbol_method};
use crate::raise_type_error;
use std::rc::Rc;

/// `{ [[Iterator]], [[NextMethod]], [[Done]] }`.
pub struct IteratorRecord {
    pub iterator: Value,
    pub next: Value,
    pub done: bool,
}

impl IteratorRecord {
    /// `IteratorStepValue`: the next value, or `None` once exhausted.
    pub fn step(&mut self, ctx: &Rc<Context>) -> EvalResult<Option<Value>> {
        if self.done {
            return Ok(None);
        }
        ctx.check_interrupts()?;
        let result = match call_function(ctx, &self.next, &self.iterator, &[]) {
            Ok(r) => r,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };
        let Value::Object(result_obj) = &result else {
            self.done = true;
            return Err(raise_type_error!("Iterator result {} is not an object", value_description(&result)).into());
        };
        let done = get_property(ctx, result_obj, &"done".into(), &result)?;
        if to_boolean(&done) {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(get_property(ctx, result_obj, &"value".into(), &result)?))
    }

    /// `IteratorClose` for an abrupt exit: calls `return` if present.
    pub fn close(&mut self, ctx: &Rc<Context>) -> EvalResult<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        let Value::Object(iterator) = &self.iterator else {
            return Ok(());
        };
        let ret = get_property(ctx, iterator, &"return".into(), &self.iterator)?;
        if ret.is_nullish() {
            return Ok(());
        }
        let result = call_function(ctx, &ret, &self.iterator, &[])?;
        if !matches!(result, Value::Object(_)) {
            return Err(raise_type_error!("Iterator result {} is not an object", value_description(&result)).into());
        }
        Ok(())
    }

    /// Closes after a failed step of the loop body, keeping the original error.
    pub fn close_on_error(&mut self, ctx: &Rc<Context>, err: EvalError) -> EvalError {
        if err.is_catchable() {
            let _ = self.close(ctx);
        }
        err
    }
}

/// `GetIterator(obj, sync)`.
pub fn get_iterator(ctx: &Rc<Context>, value: &Value) -> EvalResult<IteratorRecord> {
    let key = PropertyKey::from(&ctx.realm.intrinsics.symbols.iterator);
    let method = if value.is_nullish() { Value::Undefined } else { get_value(ctx, value, &key)? };
    if !method.is_callable() {
        return Err(raise_type_error!("{} is not iterable", value_description(value)).into());
    }
    let iterator = call_function(ctx, &method, value, &[])?;
    if !matches!(iterator, Value::Object(_)) {
        return Err(raise_type_error!("Result of the Symbol.iterator method is not an object").into());
    }
    let next = get_value(ctx, &iterator, &"next".into())?;
    Ok(IteratorRecord { iterator, next, done: false })
}

/// Drains an iterable into a list, as spread and `Array.from` do.
pub fn iterable_to_list(ctx: &Rc<Context>, value: &Value) -> EvalResult<Vec<Value>> {
    let mut record = get_iterator(ctx, value)?;
    let mut out = Vec::new();
    while let Some(v) = record.step(ctx)? {
        out.push(v);
    }
    Ok(out)
}

/// Calls `f` for each value, closing the iterator if `f` fails.
pub fn for_each_iterated(ctx: &Rc<Context>, value: &Value, mut f: impl FnMut(Value) -> EvalResult<()>) -> EvalResult<()> {
    let mut record = get_iterator(ctx, value)?;
    while let Some(v) = record.step(ctx)? {
        if let Err(e) = f(v) {
            return Err(record.close_on_error(ctx, e));
        }
    }
    Ok(())
}

/// `CreateIterResultObject`.
pub fn create_iter_result(ctx: &Rc<Context>, value: Value, done: bool) -> Value {
    let obj = new_object(Some(&ctx.realm.intrinsics.object_prototype));
    {
        let mut o = obj.borrow_mut();
        o.insert_data("value", value, true, true, true);
        o.insert_data("done", Value::Boolean(done), true, true, true);
    }
    Value::Object(obj)
}

pub fn create_array_iterator(ctx: &Rc<Context>, target: Value, kind: IterationKind) -> Value {
    let state = IteratorState::Array {
        target,
        index: 0,
        kind,
        done: false,
    };
    Value::Object(new_object_with_kind(
        Some(&ctx.realm.intrinsics.array_iterator_prototype),
        ObjectKind::Iterator(state),
    ))
}

pub fn create_string_iterator(ctx: &Rc<Context>, value: Rc<str>) -> Value {
    let state = IteratorState::String { value, position: 0 };
    Value::Object(new_object_with_kind(
        Some(&ctx.realm.intrinsics.string_iterator_prototype),
        ObjectKind::Iterator(state),
    ))
}

/// Iterator over a `Map` or `Set`; `is_map` picks the prototype.
pub fn create_keyed_iterator(ctx: &Rc<Context>, target: &JSObjectDataPtr, kind: IterationKind, is_map: bool) -> Value {
    let state = IteratorState::Map {
        target: target.clone(),
        index: 0,
        kind,
        done: false,
    };
    let intrinsics = &ctx.realm.intrinsics;
    let proto = if is_map { &intrinsics.map_iterator_prototype } else { &intrinsics.set_iterator_prototype };
    Value::Object(new_object_with_kind(Some(proto), ObjectKind::Iterator(state)))
}

fn pair(ctx: &Rc<Context>, a: Value, b: Value) -> Value {
    Value::Object(create_array(&ctx.realm.intrinsics, vec![a, b]))
}

fn iterator_receiver(this: &Value, name: &str) -> EvalResult<JSObjectDataPtr> {
    match this {
        Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Iterator(_)) => Ok(obj.clone()),
        _ => Err(raise_type_error!("Method {name}.prototype.next called on incompatible receiver {}", value_description(this)).into()),
    }
}

fn array_iterator_next(ctx: &Rc<Context>, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let obj = iterator_receiver(this, "Array Iterator")?;
    let (target, index, kind) = match &obj.borrow().kind {
        ObjectKind::Iterator(IteratorState::Array { done: true, .. }) => return Ok(create_iter_result(ctx, Value::Undefined, true)),
        ObjectKind::Iterator(IteratorState::Array { target, index, kind, .. }) => (target.clone(), *index, *kind),
        _ => return Err(raise_type_error!("next method called on incompatible iterator").into()),
    };
    let length = {
        let len = get_value(ctx, &target, &"length".into())?;
        to_length(ctx, &len)?
    };
    let mut o = obj.borrow_mut();
    let ObjectKind::Iterator(IteratorState::Array { index: slot, done, .. }) = &mut o.kind else {
        return Ok(create_iter_result(ctx, Value::Undefined, true));
    };
    if index >= length {
        *done = true;
        return Ok(create_iter_result(ctx, Value::Undefined, true));
    }
    *slot = index + 1;
    drop(o);
    let value = match kind {
        IterationKind::Keys => Value::Number(index as f64),
        IterationKind::Values => get_value(ctx, &target, &PropertyKey::from(index))?,
        IterationKind::Entries => {
            let v = get_value(ctx, &target, &PropertyKey::from(index))?;
            pair(ctx, Value::Number(index as f64), v)
        }
    };
    Ok(create_iter_result(ctx, value, false))
}

fn string_iterator_next(ctx: &Rc<Context>, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let obj = iterator_receiver(this, "String Iterator")?;
    let mut o = obj.borrow_mut();
    let ObjectKind::Iterator(IteratorState::String { value, position }) = &mut o.kind else {
        return Err(raise_type_error!("next method called on incompatible iterator").into());
    };
    let Some(c) = value[*position..].chars().next() else {
        drop(o);
        return Ok(create_iter_result(ctx, Value::Undefined, true));
    };
    *position += c.len_utf8();
    drop(o);
    Ok(create_iter_result(ctx, Value::from(c.to_string()), false))
}

fn keyed_iterator_next(ctx: &Rc<Context>, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let obj = iterator_receiver(this, "Map Iterator")?;
    let (target, mut index, kind) = match &obj.borrow().kind {
        ObjectKind::Iterator(IteratorState::Map { done: true, .. }) => return Ok(create_iter_result(ctx, Value::Undefined, true)),
        ObjectKind::Iterator(IteratorState::Map { target, index, kind, .. }) => (target.clone(), *index, *kind),
        _ => return Err(raise_type_error!("next method called on incompatible iterator").into()),
    };
    let entry = loop {
        let slot = match &target.borrow().kind {
            ObjectKind::Map(table) | ObjectKind::Set(table) => table.entry_at(index),
            _ => None,
        };
        match slot {
            None => break None,
            Some(None) => index += 1,
            Some(Some(entry)) => {
                index += 1;
                break Some(entry);
            }
        }
    };
    let is_set = matches!(target.borrow().kind, ObjectKind::Set(_));
    if let ObjectKind::Iterator(IteratorState::Map { index: slot, done, .. }) = &mut obj.borrow_mut().kind {
        *slot = index;
        *done = entry.is_none();
    }
    let Some((key, value)) = entry else {
        return Ok(create_iter_result(ctx, Value::Undefined, true));
    };
    let result = match kind {
        IterationKind::Keys => key,
        IterationKind::Values if is_set => key,
        IterationKind::Values => value,
        IterationKind::Entries if is_set => pair(ctx, key.clone(), key),
        IterationKind::Entries => pair(ctx, key, value),
    };
    Ok(create_iter_result(ctx, result, false))
}

pub fn initialize_iterators(intrinsics: &Intrinsics, _global: &JSObjectDataPtr) {
    define_symbol_method(
        intrinsics,
        &intrinsics.iterator_prototype,
        &intrinsics.symbols.iterator,
        "[Symbol.iterator]",
        0,
        |_ctx, this, _args| Ok(this.clone()),
    );
    let tag = PropertyKey::from(&intrinsics.symbols.to_string_tag);
    let prototypes = [
        (&intrinsics.array_iterator_prototype, "Array Iterator"),
        (&intrinsics.string_iterator_prototype, "String Iterator"),
        (&intrinsics.map_iterator_prototype, "Map Iterator"),
        (&intrinsics.set_iterator_prototype, "Set Iterator"),
    ];
    for (proto, name) in prototypes {
        proto.borrow_mut().insert_data(tag.clone(), Value::from(name), false, false, true);
    }
    define_method(intrinsics, &intrinsics.array_iterator_prototype, "next", 0, array_iterator_next);
    define_method(intrinsics, &intrinsics.string_iterator_prototype, "next", 0, string_iterator_next);
    define_method(intrinsics, &intrinsics.map_iterator_prototype, "next", 0, keyed_iterator_next);
    define_method(intrinsics, &intrinsics.set_iterator_prototype, "next", 0, keyed_iterator_next);
}
