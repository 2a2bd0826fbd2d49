//! `Array` and `Array.prototype`.
//!
//! The prototype methods are generic: they work on any array-like receiver
//! through `length` and indexed property access, so they behave the same on
//! arrays, `arguments` objects and proxies.

use crate::core::context::Context;
use crate::core::conversion::{to_integer_or_infinity, to_length, to_object, to_string, value_description};
use crate::core::js_error::EvalResult;
use crate::core::property::{delete_failure, delete_property, get_method, get_property, has_property, put_value};
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{
    IterationKind, JSObjectDataPtr, ObjectKind, Value, is_array_value, new_object_with_kind, relative_index, same_value_zero, strict_equals,
    to_boolean,
};
use crate::js_function::{arg, call_function, define_method, get_prototype_from_constructor, link_constructor, new_native_constructor};
use crate::js_iterator::{create_array_iterator, iterable_to_list};
use crate::{raise_range_error, raise_type_error};
use std::cmp::Ordering;
use std::rc::Rc;

/// Largest index-plus-one an array-like may reach.
const MAX_SAFE_LENGTH: usize = (1usize << 53) - 1;

fn array_with_length(proto: &JSObjectDataPtr, length: usize) -> JSObjectDataPtr {
    let array = new_object_with_kind(Some(proto), ObjectKind::Array);
    array.borrow_mut().insert_data("length", Value::Number(length as f64), true, false, false);
    array
}

/// `CreateArrayFromList`.
pub fn create_array(intrinsics: &Intrinsics, items: Vec<Value>) -> JSObjectDataPtr {
    let array = new_object_with_kind(Some(&intrinsics.array_prototype), ObjectKind::Array);
    {
        let mut a = array.borrow_mut();
        let length = items.len();
        for (i, v) in items.into_iter().enumerate() {
            a.insert_data(i, v, true, true, true);
        }
        a.insert_data("length", Value::Number(length as f64), true, false, false);
    }
    array
}

/// Array built from a list that may contain holes.
fn create_sparse_array(intrinsics: &Intrinsics, items: Vec<Option<Value>>) -> JSObjectDataPtr {
    let array = array_with_length(&intrinsics.array_prototype, items.len());
    {
        let mut a = array.borrow_mut();
        for (i, v) in items.into_iter().enumerate() {
            if let Some(v) = v {
                a.insert_data(i, v, true, true, true);
            }
        }
    }
    array
}

/// `CreateListFromArrayLike`.
pub fn create_list_from_array_like(ctx: &Rc<Context>, value: &Value) -> EvalResult<Vec<Value>> {
    let Value::Object(obj) = value else {
        return Err(raise_type_error!("CreateListFromArrayLike called on non-object").into());
    };
    let len = length_of(ctx, obj)?;
    let mut out = Vec::with_capacity(len.min(1 << 16));
    for i in 0..len {
        out.push(get_index(ctx, obj, i)?);
    }
    Ok(out)
}

fn length_of(ctx: &Rc<Context>, obj: &JSObjectDataPtr) -> EvalResult<usize> {
    let len = get_property(ctx, obj, &"length".into(), &Value::Object(obj.clone()))?;
    to_length(ctx, &len)
}

fn get_index(ctx: &Rc<Context>, obj: &JSObjectDataPtr, index: usize) -> EvalResult<Value> {
    get_property(ctx, obj, &PropertyKey::from(index), &Value::Object(obj.clone()))
}

fn has_index(ctx: &Rc<Context>, obj: &JSObjectDataPtr, index: usize) -> EvalResult<bool> {
    has_property(ctx, obj, &PropertyKey::from(index))
}

fn set_index(ctx: &Rc<Context>, obj: &JSObjectDataPtr, index: usize, value: Value) -> EvalResult<()> {
    put_value(ctx, &Value::Object(obj.clone()), &PropertyKey::from(index), value, true)
}

fn delete_index(ctx: &Rc<Context>, obj: &JSObjectDataPtr, index: usize) -> EvalResult<()> {
    let key = PropertyKey::from(index);
    if !delete_property(ctx, obj, &key)? {
        return Err(delete_failure(obj, &key).into());
    }
    Ok(())
}

fn set_length(ctx: &Rc<Context>, obj: &JSObjectDataPtr, length: usize) -> EvalResult<()> {
    put_value(ctx, &Value::Object(obj.clone()), &"length".into(), Value::Number(length as f64), true)
}

/// Receiver as an object plus its length.
fn receiver(ctx: &Rc<Context>, this: &Value) -> EvalResult<(JSObjectDataPtr, usize)> {
    let obj = to_object(ctx, this)?;
    let len = length_of(ctx, &obj)?;
    Ok((obj, len))
}

/// Elements with holes kept as `None`.
fn snapshot(ctx: &Rc<Context>, obj: &JSObjectDataPtr, len: usize) -> EvalResult<Vec<Option<Value>>> {
    let mut out = Vec::with_capacity(len.min(1 << 16));
    for i in 0..len {
        out.push(if has_index(ctx, obj, i)? { Some(get_index(ctx, obj, i)?) } else { None });
    }
    Ok(out)
}

/// Writes `items` back over the first `old_len` indices and fixes `length`.
fn write_back(ctx: &Rc<Context>, obj: &JSObjectDataPtr, items: Vec<Option<Value>>, old_len: usize) -> EvalResult<()> {
    let new_len = items.len();
    for (i, item) in items.into_iter().enumerate() {
        match item {
            Some(v) => set_index(ctx, obj, i, v)?,
            None => delete_index(ctx, obj, i)?,
        }
    }
    for i in (new_len..old_len).rev() {
        delete_index(ctx, obj, i)?;
    }
    set_length(ctx, obj, new_len)
}

fn callback(args: &[Value]) -> EvalResult<Value> {
    let f = arg(args, 0);
    if !f.is_callable() {
        return Err(raise_type_error!("{} is not a function", value_description(&f)).into());
    }
    Ok(f)
}

fn relative_arg(ctx: &Rc<Context>, args: &[Value], i: usize, len: usize, default: usize) -> EvalResult<usize> {
    match args.get(i) {
        None | Some(Value::Undefined) => Ok(default),
        Some(v) => Ok(relative_index(to_integer_or_infinity(ctx, v)?, len)),
    }
}

/// Calls `f(element, index, array)` for each present element until it returns `Some`.
fn iterate<T>(
    ctx: &Rc<Context>,
    this: &Value,
    args: &[Value],
    reverse: bool,
    mut visit: impl FnMut(Value, usize, Value) -> EvalResult<Option<T>>,
) -> EvalResult<Option<T>> {
    let (obj, len) = receiver(ctx, this)?;
    let f = callback(args)?;
    let this_arg = arg(args, 1);
    let o = Value::Object(obj.clone());
    let order: Box<dyn Iterator<Item = usize>> = if reverse { Box::new((0..len).rev()) } else { Box::new(0..len) };
    for i in order {
        if !has_index(ctx, &obj, i)? {
            continue;
        }
        let element = get_index(ctx, &obj, i)?;
        let result = call_function(ctx, &f, &this_arg, &[element.clone(), Value::Number(i as f64), o.clone()])?;
        if let Some(out) = visit(element, i, result)? {
            return Ok(Some(out));
        }
    }
    Ok(None)
}

/// `find` family; unlike the others these visit holes as undefined.
fn find(ctx: &Rc<Context>, this: &Value, args: &[Value], reverse: bool, want_index: bool) -> EvalResult<Value> {
    let (obj, len) = receiver(ctx, this)?;
    let f = callback(args)?;
    let this_arg = arg(args, 1);
    let o = Value::Object(obj.clone());
    let order: Box<dyn Iterator<Item = usize>> = if reverse { Box::new((0..len).rev()) } else { Box::new(0..len) };
    for i in order {
        let element = get_index(ctx, &obj, i)?;
        let result = call_function(ctx, &f, &this_arg, &[element.clone(), Value::Number(i as f64), o.clone()])?;
        if to_boolean(&result) {
            return Ok(if want_index { Value::Number(i as f64) } else { element });
        }
    }
    Ok(if want_index { Value::Number(-1.0) } else { Value::Undefined })
}

fn reduce(ctx: &Rc<Context>, this: &Value, args: &[Value], reverse: bool) -> EvalResult<Value> {
    let (obj, len) = receiver(ctx, this)?;
    let f = callback(args)?;
    let o = Value::Object(obj.clone());
    let mut indices: Box<dyn Iterator<Item = usize>> = if reverse { Box::new((0..len).rev()) } else { Box::new(0..len) };
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => loop {
            match indices.next() {
                Some(i) if has_index(ctx, &obj, i)? => break get_index(ctx, &obj, i)?,
                Some(_) => continue,
                None => return Err(raise_type_error!("Reduce of empty array with no initial value").into()),
            }
        },
    };
    for i in indices {
        if !has_index(ctx, &obj, i)? {
            continue;
        }
        let element = get_index(ctx, &obj, i)?;
        accumulator = call_function(ctx, &f, &Value::Undefined, &[accumulator, element, Value::Number(i as f64), o.clone()])?;
    }
    Ok(accumulator)
}

fn join_values(ctx: &Rc<Context>, obj: &JSObjectDataPtr, len: usize, separator: &str) -> EvalResult<String> {
    let mut out = String::new();
    for i in 0..len {
        if i > 0 {
            out.push_str(separator);
        }
        let element = get_index(ctx, obj, i)?;
        if !element.is_nullish() {
            out.push_str(&to_string(ctx, &element)?);
        }
    }
    Ok(out)
}

fn flatten_into(ctx: &Rc<Context>, out: &mut Vec<Value>, source: &JSObjectDataPtr, depth: f64) -> EvalResult<()> {
    let len = length_of(ctx, source)?;
    for i in 0..len {
        if !has_index(ctx, source, i)? {
            continue;
        }
        let element = get_index(ctx, source, i)?;
        match &element {
            Value::Object(inner) if depth > 0.0 && is_array_value(&element) => flatten_into(ctx, out, inner, depth - 1.0)?,
            _ => out.push(element),
        }
    }
    Ok(())
}

/// `SortCompare` with undefined already filtered out.
fn sort_compare(ctx: &Rc<Context>, comparator: &Value, a: &Value, b: &Value) -> EvalResult<Ordering> {
    if !comparator.is_undefined() {
        let v = call_function(ctx, comparator, &Value::Undefined, &[a.clone(), b.clone()])?;
        let n = crate::core::conversion::to_number(ctx, &v)?;
        return Ok(if n < 0.0 {
            Ordering::Less
        } else if n > 0.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        });
    }
    let x = to_string(ctx, a)?;
    let y = to_string(ctx, b)?;
    Ok(x.encode_utf16().cmp(y.encode_utf16()))
}

/// Stable merge sort with a fallible comparator.
fn merge_sort(ctx: &Rc<Context>, comparator: &Value, items: Vec<Value>) -> EvalResult<Vec<Value>> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut items = items;
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(ctx, comparator, items)?;
    let right = merge_sort(ctx, comparator, right)?;
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        if sort_compare(ctx, comparator, a, b)? == Ordering::Greater {
            out.extend(right.next());
        } else {
            out.extend(left.next());
        }
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}

/// Sorted values followed by undefineds; holes are dropped and counted.
fn sorted_items(ctx: &Rc<Context>, items: Vec<Option<Value>>, comparator: &Value) -> EvalResult<(Vec<Value>, usize)> {
    let mut values = Vec::new();
    let mut undefined = 0;
    let mut holes = 0;
    for item in items {
        match item {
            None => holes += 1,
            Some(Value::Undefined) => undefined += 1,
            Some(v) => values.push(v),
        }
    }
    let mut sorted = merge_sort(ctx, comparator, values)?;
    sorted.extend(std::iter::repeat_n(Value::Undefined, undefined));
    Ok((sorted, holes))
}

fn comparator_arg(args: &[Value]) -> EvalResult<Value> {
    let comparator = arg(args, 0);
    if !comparator.is_undefined() && !comparator.is_callable() {
        return Err(raise_type_error!("The comparison function must be either a function or undefined").into());
    }
    Ok(comparator)
}

fn splice_parts(ctx: &Rc<Context>, args: &[Value], len: usize) -> EvalResult<(usize, usize, Vec<Value>)> {
    let start = relative_arg(ctx, args, 0, len, 0)?;
    let delete_count = match args.len() {
        0 => 0,
        1 => len - start,
        _ => {
            let n = to_integer_or_infinity(ctx, &args[1])?;
            (n.max(0.0) as usize).min(len - start)
        }
    };
    let items = args.iter().skip(2).cloned().collect();
    Ok((start, delete_count, items))
}

fn array_constructor(ctx: &Rc<Context>, args: &[Value], proto: &JSObjectDataPtr) -> EvalResult<Value> {
    if let [Value::Number(n)] = args {
        let length = *n as u32;
        if length as f64 != *n {
            return Err(raise_range_error!("Invalid array length").into());
        }
        return Ok(Value::Object(array_with_length(proto, length as usize)));
    }
    let array = create_array(&ctx.realm.intrinsics, args.to_vec());
    array.borrow_mut().prototype = Some(proto.clone());
    Ok(Value::Object(array))
}

fn array_from(ctx: &Rc<Context>, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let items = arg(args, 0);
    let map_fn = arg(args, 1);
    if !map_fn.is_undefined() && !map_fn.is_callable() {
        return Err(raise_type_error!("{} is not a function", value_description(&map_fn)).into());
    }
    let this_arg = arg(args, 2);
    let iterator_key = PropertyKey::from(&ctx.realm.intrinsics.symbols.iterator);
    let values = if items.is_nullish() {
        return Err(raise_type_error!("{} is not iterable", value_description(&items)).into());
    } else if get_method(ctx, &items, &iterator_key)?.is_some() {
        iterable_to_list(ctx, &items)?
    } else {
        let obj = to_object(ctx, &items)?;
        create_list_from_array_like(ctx, &Value::Object(obj))?
    };
    let values = if map_fn.is_undefined() {
        values
    } else {
        let mut mapped = Vec::with_capacity(values.len());
        for (i, v) in values.into_iter().enumerate() {
            mapped.push(call_function(ctx, &map_fn, &this_arg, &[v, Value::Number(i as f64)])?);
        }
        mapped
    };
    Ok(Value::Object(create_array(&ctx.realm.intrinsics, values)))
}

pub fn initialize_array(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let proto = &intrinsics.array_prototype;
    let ctor = new_native_constructor(
        intrinsics,
        "Array",
        1,
        |ctx, _this, args| array_constructor(ctx, args, &ctx.realm.intrinsics.array_prototype),
        |ctx, args, new_target| {
            let proto = get_prototype_from_constructor(ctx, new_target, &ctx.realm.intrinsics.array_prototype)?;
            array_constructor(ctx, args, &proto)
        },
    );
    link_constructor(&ctor, proto);

    define_method(intrinsics, &ctor, "isArray", 1, |_ctx, _this, args| Ok(Value::Boolean(is_array_value(&arg(args, 0)))));
    define_method(intrinsics, &ctor, "of", 0, |ctx, _this, args| {
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, args.to_vec())))
    });
    define_method(intrinsics, &ctor, "from", 1, array_from);

    define_method(intrinsics, proto, "at", 1, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let n = to_integer_or_infinity(ctx, &arg(args, 0))?;
        let index = if n < 0.0 { len as f64 + n } else { n };
        if index < 0.0 || index >= len as f64 {
            return Ok(Value::Undefined);
        }
        get_index(ctx, &obj, index as usize)
    });
    define_method(intrinsics, proto, "concat", 1, |ctx, this, args| {
        let first = Value::Object(to_object(ctx, this)?);
        let mut out: Vec<Option<Value>> = Vec::new();
        for item in std::iter::once(&first).chain(args.iter()) {
            match item {
                Value::Object(obj) if is_array_value(item) => {
                    let len = length_of(ctx, obj)?;
                    if out.len() + len > MAX_SAFE_LENGTH {
                        return Err(raise_type_error!("Invalid array length").into());
                    }
                    out.extend(snapshot(ctx, obj, len)?);
                }
                other => out.push(Some(other.clone())),
            }
        }
        Ok(Value::Object(create_sparse_array(&ctx.realm.intrinsics, out)))
    });
    define_method(intrinsics, proto, "entries", 0, |ctx, this, _args| {
        Ok(create_array_iterator(ctx, Value::Object(to_object(ctx, this)?), IterationKind::Entries))
    });
    define_method(intrinsics, proto, "keys", 0, |ctx, this, _args| {
        Ok(create_array_iterator(ctx, Value::Object(to_object(ctx, this)?), IterationKind::Keys))
    });
    let values = define_method(intrinsics, proto, "values", 0, |ctx, this, _args| {
        Ok(create_array_iterator(ctx, Value::Object(to_object(ctx, this)?), IterationKind::Values))
    });
    proto
        .borrow_mut()
        .insert_builtin(PropertyKey::from(&intrinsics.symbols.iterator), Value::Object(values));

    define_method(intrinsics, proto, "every", 1, |ctx, this, args| {
        let failed = iterate(ctx, this, args, false, |_, _, r| Ok((!to_boolean(&r)).then_some(())))?;
        Ok(Value::Boolean(failed.is_none()))
    });
    define_method(intrinsics, proto, "some", 1, |ctx, this, args| {
        let found = iterate(ctx, this, args, false, |_, _, r| Ok(to_boolean(&r).then_some(())))?;
        Ok(Value::Boolean(found.is_some()))
    });
    define_method(intrinsics, proto, "forEach", 1, |ctx, this, args| {
        iterate::<()>(ctx, this, args, false, |_, _, _| Ok(None))?;
        Ok(Value::Undefined)
    });
    define_method(intrinsics, proto, "filter", 1, |ctx, this, args| {
        let mut kept = Vec::new();
        iterate::<()>(ctx, this, args, false, |element, _, r| {
            if to_boolean(&r) {
                kept.push(element);
            }
            Ok(None)
        })?;
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, kept)))
    });
    define_method(intrinsics, proto, "map", 1, |ctx, this, args| {
        let (_, len) = receiver(ctx, this)?;
        let mut mapped: Vec<Option<Value>> = vec![None; len];
        iterate::<()>(ctx, this, args, false, |_, i, r| {
            mapped[i] = Some(r);
            Ok(None)
        })?;
        Ok(Value::Object(create_sparse_array(&ctx.realm.intrinsics, mapped)))
    });
    define_method(intrinsics, proto, "flatMap", 1, |ctx, this, args| {
        let mut results = Vec::new();
        iterate::<()>(ctx, this, args, false, |_, _, r| {
            results.push(r);
            Ok(None)
        })?;
        let mut out = Vec::new();
        for r in results {
            match &r {
                Value::Object(inner) if is_array_value(&r) => flatten_into(ctx, &mut out, inner, 0.0)?,
                _ => out.push(r),
            }
        }
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, out)))
    });
    define_method(intrinsics, proto, "find", 1, |ctx, this, args| find(ctx, this, args, false, false));
    define_method(intrinsics, proto, "findIndex", 1, |ctx, this, args| find(ctx, this, args, false, true));
    define_method(intrinsics, proto, "findLast", 1, |ctx, this, args| find(ctx, this, args, true, false));
    define_method(intrinsics, proto, "findLastIndex", 1, |ctx, this, args| find(ctx, this, args, true, true));
    define_method(intrinsics, proto, "reduce", 1, |ctx, this, args| reduce(ctx, this, args, false));
    define_method(intrinsics, proto, "reduceRight", 1, |ctx, this, args| reduce(ctx, this, args, true));
    define_method(intrinsics, proto, "flat", 0, |ctx, this, args| {
        let obj = to_object(ctx, this)?;
        let depth = match arg(args, 0) {
            Value::Undefined => 1.0,
            d => to_integer_or_infinity(ctx, &d)?,
        };
        let mut out = Vec::new();
        flatten_into(ctx, &mut out, &obj, depth)?;
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, out)))
    });
    define_method(intrinsics, proto, "includes", 1, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let target = arg(args, 0);
        let start = relative_arg(ctx, args, 1, len, 0)?;
        for i in start..len {
            if same_value_zero(&get_index(ctx, &obj, i)?, &target) {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    });
    define_method(intrinsics, proto, "indexOf", 1, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let target = arg(args, 0);
        let start = relative_arg(ctx, args, 1, len, 0)?;
        for i in start..len {
            if has_index(ctx, &obj, i)? && strict_equals(&get_index(ctx, &obj, i)?, &target) {
                return Ok(Value::Number(i as f64));
            }
        }
        Ok(Value::Number(-1.0))
    });
    define_method(intrinsics, proto, "lastIndexOf", 1, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        if len == 0 {
            return Ok(Value::Number(-1.0));
        }
        let target = arg(args, 0);
        let from = match args.get(1) {
            None => len as f64 - 1.0,
            Some(v) => {
                let n = to_integer_or_infinity(ctx, v)?;
                if n < 0.0 { len as f64 + n } else { n.min(len as f64 - 1.0) }
            }
        };
        let mut i = from;
        while i >= 0.0 {
            let index = i as usize;
            if has_index(ctx, &obj, index)? && strict_equals(&get_index(ctx, &obj, index)?, &target) {
                return Ok(Value::Number(i));
            }
            i -= 1.0;
        }
        Ok(Value::Number(-1.0))
    });
    define_method(intrinsics, proto, "join", 1, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let separator = match arg(args, 0) {
            Value::Undefined => ",".into(),
            s => to_string(ctx, &s)?,
        };
        Ok(Value::from(join_values(ctx, &obj, len, &separator)?))
    });
    define_method(intrinsics, proto, "toString", 0, |ctx, this, _args| {
        let obj = to_object(ctx, this)?;
        let receiver = Value::Object(obj.clone());
        let join = get_property(ctx, &obj, &"join".into(), &receiver)?;
        if join.is_callable() {
            return call_function(ctx, &join, &receiver, &[]);
        }
        Ok(Value::from(format!("[object {}]", obj.borrow().kind.name())))
    });
    define_method(intrinsics, proto, "slice", 2, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let start = relative_arg(ctx, args, 0, len, 0)?;
        let end = relative_arg(ctx, args, 1, len, len)?;
        let mut out = Vec::new();
        for i in start..end.max(start) {
            out.push(if has_index(ctx, &obj, i)? { Some(get_index(ctx, &obj, i)?) } else { None });
        }
        Ok(Value::Object(create_sparse_array(&ctx.realm.intrinsics, out)))
    });
    define_method(intrinsics, proto, "toReversed", 0, |ctx, this, _args| {
        let (obj, len) = receiver(ctx, this)?;
        let mut out = Vec::with_capacity(len);
        for i in (0..len).rev() {
            out.push(get_index(ctx, &obj, i)?);
        }
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, out)))
    });
    define_method(intrinsics, proto, "toSorted", 1, |ctx, this, args| {
        let comparator = comparator_arg(args)?;
        let (obj, len) = receiver(ctx, this)?;
        let items = (0..len).map(|i| get_index(ctx, &obj, i).map(Some)).collect::<EvalResult<Vec<_>>>()?;
        let (sorted, _) = sorted_items(ctx, items, &comparator)?;
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, sorted)))
    });
    define_method(intrinsics, proto, "toSpliced", 2, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let (start, delete_count, items) = splice_parts(ctx, args, len)?;
        let mut out = Vec::with_capacity(len - delete_count + items.len());
        for i in 0..start {
            out.push(get_index(ctx, &obj, i)?);
        }
        out.extend(items);
        for i in start + delete_count..len {
            out.push(get_index(ctx, &obj, i)?);
        }
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, out)))
    });
    define_method(intrinsics, proto, "with", 2, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let n = to_integer_or_infinity(ctx, &arg(args, 0))?;
        let index = if n < 0.0 { len as f64 + n } else { n };
        if index < 0.0 || index >= len as f64 {
            return Err(raise_range_error!("Invalid index : {n}").into());
        }
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            out.push(if i == index as usize { arg(args, 1) } else { get_index(ctx, &obj, i)? });
        }
        Ok(Value::Object(create_array(&ctx.realm.intrinsics, out)))
    });

    define_method(intrinsics, proto, "push", 1, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        if len + args.len() > MAX_SAFE_LENGTH {
            return Err(raise_type_error!("Pushing {} elements on an array-like of length {len} is disallowed", args.len()).into());
        }
        for (i, v) in args.iter().enumerate() {
            set_index(ctx, &obj, len + i, v.clone())?;
        }
        set_length(ctx, &obj, len + args.len())?;
        Ok(Value::Number((len + args.len()) as f64))
    });
    define_method(intrinsics, proto, "pop", 0, |ctx, this, _args| {
        let (obj, len) = receiver(ctx, this)?;
        if len == 0 {
            set_length(ctx, &obj, 0)?;
            return Ok(Value::Undefined);
        }
        let last = get_index(ctx, &obj, len - 1)?;
        delete_index(ctx, &obj, len - 1)?;
        set_length(ctx, &obj, len - 1)?;
        Ok(last)
    });
    define_method(intrinsics, proto, "shift", 0, |ctx, this, _args| {
        let (obj, len) = receiver(ctx, this)?;
        if len == 0 {
            set_length(ctx, &obj, 0)?;
            return Ok(Value::Undefined);
        }
        let mut items = snapshot(ctx, &obj, len)?;
        let first = items.remove(0).unwrap_or_default();
        write_back(ctx, &obj, items, len)?;
        Ok(first)
    });
    define_method(intrinsics, proto, "unshift", 1, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        if args.is_empty() {
            set_length(ctx, &obj, len)?;
            return Ok(Value::Number(len as f64));
        }
        let mut items: Vec<Option<Value>> = args.iter().cloned().map(Some).collect();
        items.extend(snapshot(ctx, &obj, len)?);
        let new_len = items.len();
        write_back(ctx, &obj, items, len)?;
        Ok(Value::Number(new_len as f64))
    });
    define_method(intrinsics, proto, "splice", 2, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let (start, delete_count, inserted) = splice_parts(ctx, args, len)?;
        let mut items = snapshot(ctx, &obj, len)?;
        let removed: Vec<Option<Value>> = items.splice(start..start + delete_count, inserted.into_iter().map(Some)).collect();
        write_back(ctx, &obj, items, len)?;
        Ok(Value::Object(create_sparse_array(&ctx.realm.intrinsics, removed)))
    });
    define_method(intrinsics, proto, "reverse", 0, |ctx, this, _args| {
        let (obj, len) = receiver(ctx, this)?;
        let mut items = snapshot(ctx, &obj, len)?;
        items.reverse();
        write_back(ctx, &obj, items, len)?;
        Ok(Value::Object(obj))
    });
    define_method(intrinsics, proto, "fill", 1, |ctx, this, args| {
        let (obj, len) = receiver(ctx, this)?;
        let start = relative_arg(ctx, args, 1, len, 0)?;
        let end = relative_arg(ctx, args, 2, len, len)?;
        for i in start..end.max(start) {
            set_index(ctx, &obj, i, arg(args, 0))?;
        }
        Ok(Value::Object(obj))
    });
    define_method(intrinsics, proto, "sort", 1, |ctx, this, args| {
        let comparator = comparator_arg(args)?;
        let (obj, len) = receiver(ctx, this)?;
        let items = snapshot(ctx, &obj, len)?;
        let (sorted, holes) = sorted_items(ctx, items, &comparator)?;
        let mut out: Vec<Option<Value>> = sorted.into_iter().map(Some).collect();
        out.extend(std::iter::repeat_n(None, holes));
        write_back(ctx, &obj, out, len)?;
        Ok(Value::Object(obj))
    });

    global.borrow_mut().insert_builtin("Array", Value::Object(ctor));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realm::Realm;

    #[test]
    fn created_arrays_have_hidden_length() {
        let realm = Realm::new();
        let array = create_array(&realm.intrinsics, vec![Value::Number(1.0), Value::Number(2.0)]);
        let a = array.borrow();
        assert_eq!(a.array_length(), 2);
        let length = a.get_own(&"length".into()).map(|p| (p.enumerable, p.configurable));
        assert_eq!(length, Some((false, false)));
    }

    #[test]
    fn sort_is_stable_and_puts_undefined_last() {
        let realm = Realm::new();
        let ctx = realm.base_context();
        let items = vec![Some(Value::Undefined), Some(Value::from("b")), None, Some(Value::from("a"))];
        let (sorted, holes) = sorted_items(&ctx, items, &Value::Undefined).unwrap();
        assert_eq!(holes, 1);
        let rendered: Vec<String> = sorted.iter().map(|v| format!("{v:?}")).collect();
        assert_eq!(rendered, vec!["\"a\"", "\"b\"", "undefined"]);
    }
}
