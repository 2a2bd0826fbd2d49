//! Classification of native functions for side-effect-free evaluation.

use crate::core::callable::Callable;
use crate::core::context::Context;
use crate::core::descriptor::PropertySlot;
use crate::core::metadata::WeakIdentityMap;
use crate::core::property_key::PropertyKey;
use crate::core::value::{JSObjectDataPtr, ObjectKind, Value};
use crate::{JSError, raise_side_effect};
use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SideEffectFlags: u8 {
        /// Observable effects are limited to the conditions below.
        const PURE = 1;
        /// Only pure when the receiver was created during the evaluation.
        const RECEIVER_TEMPORARY = 1 << 1;
        /// Only pure when the first argument was created during the evaluation.
        const ARG0_TEMPORARY = 1 << 2;
        /// Invokes the first argument; it must itself be callable without effects.
        const ARG0_CALLBACK = 1 << 3;
        /// Invokes the receiver (`call`, `apply`); it must be callable without effects.
        const RECEIVER_CALLBACK = 1 << 4;
    }
}

const PURE_CALLBACK: SideEffectFlags = SideEffectFlags::PURE.union(SideEffectFlags::ARG0_CALLBACK);
const PURE_ON_TEMPORARY: SideEffectFlags = SideEffectFlags::PURE.union(SideEffectFlags::RECEIVER_TEMPORARY);

/// Built-ins known not to mutate state that outlives the evaluation.
///
/// Paths name a property reached from the global object; a `get ` prefix
/// selects the getter of an accessor.
pub const DEFAULT_PURE_FUNCTIONS: &[(&str, SideEffectFlags)] = &[
    ("Object", SideEffectFlags::PURE),
    ("Object.keys", SideEffectFlags::PURE),
    ("Object.values", SideEffectFlags::PURE),
    ("Object.entries", SideEffectFlags::PURE),
    ("Object.getPrototypeOf", SideEffectFlags::PURE),
    ("Object.getOwnPropertyNames", SideEffectFlags::PURE),
    ("Object.getOwnPropertySymbols", SideEffectFlags::PURE),
    ("Object.getOwnPropertyDescriptor", SideEffectFlags::PURE),
    ("Object.getOwnPropertyDescriptors", SideEffectFlags::PURE),
    ("Object.is", SideEffectFlags::PURE),
    ("Object.isFrozen", SideEffectFlags::PURE),
    ("Object.isSealed", SideEffectFlags::PURE),
    ("Object.isExtensible", SideEffectFlags::PURE),
    ("Object.create", SideEffectFlags::PURE),
    ("Object.fromEntries", SideEffectFlags::PURE),
    ("Object.assign", SideEffectFlags::PURE.union(SideEffectFlags::ARG0_TEMPORARY)),
    ("Object.freeze", SideEffectFlags::PURE.union(SideEffectFlags::ARG0_TEMPORARY)),
    ("Object.defineProperty", SideEffectFlags::PURE.union(SideEffectFlags::ARG0_TEMPORARY)),
    ("Object.setPrototypeOf", SideEffectFlags::PURE.union(SideEffectFlags::ARG0_TEMPORARY)),
    ("Object.prototype.hasOwnProperty", SideEffectFlags::PURE),
    ("Object.prototype.isPrototypeOf", SideEffectFlags::PURE),
    ("Object.prototype.propertyIsEnumerable", SideEffectFlags::PURE),
    ("Object.prototype.toString", SideEffectFlags::PURE),
    ("Object.prototype.toLocaleString", SideEffectFlags::PURE),
    ("Object.prototype.valueOf", SideEffectFlags::PURE),
    ("Object.hasOwn", SideEffectFlags::PURE),
    ("Function.prototype.toString", SideEffectFlags::PURE),
    ("Function.prototype[Symbol.hasInstance]", SideEffectFlags::PURE),
    ("Function.prototype.bind", SideEffectFlags::PURE),
    ("Function.prototype.call", SideEffectFlags::PURE.union(SideEffectFlags::RECEIVER_CALLBACK)),
    ("Function.prototype.apply", SideEffectFlags::PURE.union(SideEffectFlags::RECEIVER_CALLBACK)),
    ("Array", SideEffectFlags::PURE),
    ("Array.isArray", SideEffectFlags::PURE),
    ("Array.of", SideEffectFlags::PURE),
    ("Array.from", PURE_CALLBACK),
    ("Array.prototype.at", SideEffectFlags::PURE),
    ("Array.prototype.concat", SideEffectFlags::PURE),
    ("Array.prototype.entries", SideEffectFlags::PURE),
    ("Array.prototype.keys", SideEffectFlags::PURE),
    ("Array.prototype.values", SideEffectFlags::PURE),
    ("Array.prototype.every", PURE_CALLBACK),
    ("Array.prototype.some", PURE_CALLBACK),
    ("Array.prototype.filter", PURE_CALLBACK),
    ("Array.prototype.find", PURE_CALLBACK),
    ("Array.prototype.findIndex", PURE_CALLBACK),
    ("Array.prototype.findLast", PURE_CALLBACK),
    ("Array.prototype.findLastIndex", PURE_CALLBACK),
    ("Array.prototype.flat", SideEffectFlags::PURE),
    ("Array.prototype.flatMap", PURE_CALLBACK),
    ("Array.prototype.forEach", PURE_CALLBACK),
    ("Array.prototype.includes", SideEffectFlags::PURE),
    ("Array.prototype.indexOf", SideEffectFlags::PURE),
    ("Array.prototype.lastIndexOf", SideEffectFlags::PURE),
    ("Array.prototype.join", SideEffectFlags::PURE),
    ("Array.prototype.map", PURE_CALLBACK),
    ("Array.prototype.reduce", PURE_CALLBACK),
    ("Array.prototype.reduceRight", PURE_CALLBACK),
    ("Array.prototype.slice", SideEffectFlags::PURE),
    ("Array.prototype.toString", SideEffectFlags::PURE),
    ("Array.prototype.toReversed", SideEffectFlags::PURE),
    ("Array.prototype.toSorted", PURE_CALLBACK),
    ("Array.prototype.toSpliced", SideEffectFlags::PURE),
    ("Array.prototype.with", SideEffectFlags::PURE),
    ("Array.prototype.push", PURE_ON_TEMPORARY),
    ("Array.prototype.pop", PURE_ON_TEMPORARY),
    ("Array.prototype.shift", PURE_ON_TEMPORARY),
    ("Array.prototype.unshift", PURE_ON_TEMPORARY),
    ("Array.prototype.splice", PURE_ON_TEMPORARY),
    ("Array.prototype.reverse", PURE_ON_TEMPORARY),
    ("Array.prototype.fill", PURE_ON_TEMPORARY),
    ("Array.prototype.sort", PURE_ON_TEMPORARY.union(SideEffectFlags::ARG0_CALLBACK)),
    ("Array.prototype[Symbol.iterator]", SideEffectFlags::PURE),
    ("%IteratorPrototype%[Symbol.iterator]", SideEffectFlags::PURE),
    ("%ArrayIteratorPrototype%.next", PURE_ON_TEMPORARY),
    ("%StringIteratorPrototype%.next", PURE_ON_TEMPORARY),
    ("%MapIteratorPrototype%.next", PURE_ON_TEMPORARY),
    ("%SetIteratorPrototype%.next", PURE_ON_TEMPORARY),
    ("String", SideEffectFlags::PURE),
    ("String.fromCharCode", SideEffectFlags::PURE),
    ("String.fromCodePoint", SideEffectFlags::PURE),
    ("String.raw", SideEffectFlags::PURE),
    ("String.prototype.at", SideEffectFlags::PURE),
    ("String.prototype.charAt", SideEffectFlags::PURE),
    ("String.prototype.charCodeAt", SideEffectFlags::PURE),
    ("String.prototype.codePointAt", SideEffectFlags::PURE),
    ("String.prototype.concat", SideEffectFlags::PURE),
    ("String.prototype.endsWith", SideEffectFlags::PURE),
    ("String.prototype.includes", SideEffectFlags::PURE),
    ("String.prototype.indexOf", SideEffectFlags::PURE),
    ("String.prototype.lastIndexOf", SideEffectFlags::PURE),
    ("String.prototype.padEnd", SideEffectFlags::PURE),
    ("String.prototype.padStart", SideEffectFlags::PURE),
    ("String.prototype.repeat", SideEffectFlags::PURE),
    ("String.prototype.replace", SideEffectFlags::PURE),
    ("String.prototype.replaceAll", SideEffectFlags::PURE),
    ("String.prototype.slice", SideEffectFlags::PURE),
    ("String.prototype.split", SideEffectFlags::PURE),
    ("String.prototype.startsWith", SideEffectFlags::PURE),
    ("String.prototype.substring", SideEffectFlags::PURE),
    ("String.prototype.toLowerCase", SideEffectFlags::PURE),
    ("String.prototype.toUpperCase", SideEffectFlags::PURE),
    ("String.prototype.toString", SideEffectFlags::PURE),
    ("String.prototype.trim", SideEffectFlags::PURE),
    ("String.prototype.trimEnd", SideEffectFlags::PURE),
    ("String.prototype.trimStart", SideEffectFlags::PURE),
    ("String.prototype.valueOf", SideEffectFlags::PURE),
    ("String.prototype[Symbol.iterator]", SideEffectFlags::PURE),
    ("Number", SideEffectFlags::PURE),
    ("Number.isFinite", SideEffectFlags::PURE),
    ("Number.isInteger", SideEffectFlags::PURE),
    ("Number.isNaN", SideEffectFlags::PURE),
    ("Number.isSafeInteger", SideEffectFlags::PURE),
    ("Number.parseFloat", SideEffectFlags::PURE),
    ("Number.parseInt", SideEffectFlags::PURE),
    ("Number.prototype.toFixed", SideEffectFlags::PURE),
    ("Number.prototype.toString", SideEffectFlags::PURE),
    ("Number.prototype.valueOf", SideEffectFlags::PURE),
    ("Boolean", SideEffectFlags::PURE),
    ("Boolean.prototype.toString", SideEffectFlags::PURE),
    ("Boolean.prototype.valueOf", SideEffectFlags::PURE),
    ("Symbol", SideEffectFlags::PURE),
    ("Symbol.prototype.toString", SideEffectFlags::PURE),
    ("get Symbol.prototype.description", SideEffectFlags::PURE),
    ("parseInt", SideEffectFlags::PURE),
    ("parseFloat", SideEffectFlags::PURE),
    ("isNaN", SideEffectFlags::PURE),
    ("isFinite", SideEffectFlags::PURE),
    ("Math.abs", SideEffectFlags::PURE),
    ("Math.ceil", SideEffectFlags::PURE),
    ("Math.floor", SideEffectFlags::PURE),
    ("Math.round", SideEffectFlags::PURE),
    ("Math.trunc", SideEffectFlags::PURE),
    ("Math.sign", SideEffectFlags::PURE),
    ("Math.sqrt", SideEffectFlags::PURE),
    ("Math.cbrt", SideEffectFlags::PURE),
    ("Math.pow", SideEffectFlags::PURE),
    ("Math.min", SideEffectFlags::PURE),
    ("Math.max", SideEffectFlags::PURE),
    ("Math.hypot", SideEffectFlags::PURE),
    ("Math.log", SideEffectFlags::PURE),
    ("Math.log2", SideEffectFlags::PURE),
    ("Math.log10", SideEffectFlags::PURE),
    ("Math.exp", SideEffectFlags::PURE),
    ("Math.sin", SideEffectFlags::PURE),
    ("Math.cos", SideEffectFlags::PURE),
    ("Math.tan", SideEffectFlags::PURE),
    ("Math.atan", SideEffectFlags::PURE),
    ("Math.atan2", SideEffectFlags::PURE),
    ("JSON.stringify", SideEffectFlags::PURE),
    ("JSON.parse", SideEffectFlags::PURE),
    ("Error", SideEffectFlags::PURE),
    ("TypeError", SideEffectFlags::PURE),
    ("RangeError", SideEffectFlags::PURE),
    ("ReferenceError", SideEffectFlags::PURE),
    ("SyntaxError", SideEffectFlags::PURE),
    ("Error.prototype.toString", SideEffectFlags::PURE),
    ("Map", SideEffectFlags::PURE),
    ("Map.prototype.get", SideEffectFlags::PURE),
    ("Map.prototype.has", SideEffectFlags::PURE),
    ("Map.prototype.keys", SideEffectFlags::PURE),
    ("Map.prototype.values", SideEffectFlags::PURE),
    ("Map.prototype.entries", SideEffectFlags::PURE),
    ("Map.prototype.forEach", PURE_CALLBACK),
    ("Map.prototype.set", PURE_ON_TEMPORARY),
    ("Map.prototype.delete", PURE_ON_TEMPORARY),
    ("Map.prototype.clear", PURE_ON_TEMPORARY),
    ("get Map.prototype.size", SideEffectFlags::PURE),
    ("Set", SideEffectFlags::PURE),
    ("Set.prototype.has", SideEffectFlags::PURE),
    ("Set.prototype.values", SideEffectFlags::PURE),
    ("Set.prototype.entries", SideEffectFlags::PURE),
    ("Set.prototype.forEach", PURE_CALLBACK),
    ("Set.prototype.add", PURE_ON_TEMPORARY),
    ("Set.prototype.delete", PURE_ON_TEMPORARY),
    ("Set.prototype.clear", PURE_ON_TEMPORARY),
    ("get Set.prototype.size", SideEffectFlags::PURE),
    ("WeakMap", SideEffectFlags::PURE),
    ("WeakMap.prototype.get", SideEffectFlags::PURE),
    ("WeakMap.prototype.has", SideEffectFlags::PURE),
    ("WeakMap.prototype.set", PURE_ON_TEMPORARY),
    ("WeakSet", SideEffectFlags::PURE),
    ("WeakSet.prototype.has", SideEffectFlags::PURE),
    ("WeakSet.prototype.add", PURE_ON_TEMPORARY),
    ("WeakRef.prototype.deref", SideEffectFlags::PURE),
    ("Reflect.get", SideEffectFlags::PURE),
    ("Reflect.has", SideEffectFlags::PURE),
    ("Reflect.ownKeys", SideEffectFlags::PURE),
    ("Reflect.getPrototypeOf", SideEffectFlags::PURE),
    ("Reflect.getOwnPropertyDescriptor", SideEffectFlags::PURE),
    ("Reflect.isExtensible", SideEffectFlags::PURE),
    ("Reflect.apply", SideEffectFlags::PURE.union(SideEffectFlags::ARG0_CALLBACK)),
    ("Promise.resolve", SideEffectFlags::PURE),
    ("Promise.reject", SideEffectFlags::PURE),
];

/// Identity-keyed classification of native functions.
#[derive(Default)]
pub struct SideEffectTable {
    entries: WeakIdentityMap<SideEffectFlags>,
}

impl SideEffectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding [`DEFAULT_PURE_FUNCTIONS`] resolved against `global`.
    pub fn with_defaults(global: &JSObjectDataPtr, intrinsics: &crate::core::realm::Intrinsics) -> Self {
        let table = Self::new();
        for (path, flags) in DEFAULT_PURE_FUNCTIONS {
            if !table.register_path(global, intrinsics, path, *flags) {
                log::debug!("side-effect table: no built-in at {path}");
            }
        }
        table
    }

    pub fn register(&self, function: &JSObjectDataPtr, flags: SideEffectFlags) {
        self.entries.insert(function, flags);
    }

    /// Resolves `path` (see [`DEFAULT_PURE_FUNCTIONS`]) and registers the function found.
    pub fn register_path(&self, global: &JSObjectDataPtr, intrinsics: &crate::core::realm::Intrinsics, path: &str, flags: SideEffectFlags) -> bool {
        match resolve_path(global, intrinsics, path) {
            Some(function) => {
                self.register(&function, flags);
                true
            }
            None => false,
        }
    }

    pub fn flags_for(&self, function: &JSObjectDataPtr) -> Option<SideEffectFlags> {
        self.entries.get(function)
    }
}

fn resolve_path(global: &JSObjectDataPtr, intrinsics: &crate::core::realm::Intrinsics, path: &str) -> Option<JSObjectDataPtr> {
    let (getter, path) = match path.strip_prefix("get ") {
        Some(rest) => (true, rest),
        None => (false, path),
    };
    let segments = path_segments(path);
    let mut parts = segments.iter();
    let first = parts.next()?;
    let mut current = match *first {
        "%IteratorPrototype%" => intrinsics.iterator_prototype.clone(),
        "%ArrayIteratorPrototype%" => intrinsics.array_iterator_prototype.clone(),
        "%StringIteratorPrototype%" => intrinsics.string_iterator_prototype.clone(),
        "%MapIteratorPrototype%" => intrinsics.map_iterator_prototype.clone(),
        "%SetIteratorPrototype%" => intrinsics.set_iterator_prototype.clone(),
        name => global.borrow().own_data_value(&PropertyKey::from(name))?.as_object()?.clone(),
    };
    let rest: Vec<&str> = parts.copied().collect();
    for (i, part) in rest.iter().enumerate() {
        let key = match part.strip_prefix("[Symbol.").and_then(|s| s.strip_suffix(']')) {
            Some(name) => {
                let (_, symbol) = intrinsics.symbols.all().into_iter().find(|(n, _)| *n == name)?;
                PropertyKey::Symbol(symbol.clone())
            }
            None => PropertyKey::from(*part),
        };
        let last = i + 1 == rest.len();
        let next = {
            let obj = current.borrow();
            match obj.get_own(&key).map(|p| &p.slot) {
                Some(PropertySlot::Accessor { get: Some(g), .. }) if last && getter => g.as_object()?.clone(),
                Some(PropertySlot::Data { value, .. }) if !getter || !last => value.as_object()?.clone(),
                _ => return None,
            }
        };
        current = next;
    }
    Some(current)
}

/// Splits `Array.prototype[Symbol.iterator]` into `Array`, `prototype` and
/// `[Symbol.iterator]`; dots inside brackets do not separate segments.
fn path_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    for (i, c) in path.char_indices() {
        match c {
            '[' => {
                if depth == 0 && i > start {
                    segments.push(&path[start..i]);
                    start = i;
                }
                depth += 1;
            }
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    segments.push(&path[start..=i]);
                    start = i + 1;
                }
            }
            '.' if depth == 0 => {
                if i > start {
                    segments.push(&path[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < path.len() {
        segments.push(&path[start..]);
    }
    segments
}

/// Decides whether calling `function` may run during a dry run.
///
/// User functions are always allowed; their bodies run under the same
/// checks. Natives must be classified as pure and meet their conditions.
pub fn check_call(ctx: &Context, function: &JSObjectDataPtr, this: &Value, args: &[Value]) -> Result<(), JSError> {
    let Some(table) = &ctx.side_effects else {
        return Ok(());
    };
    let callable = match &function.borrow().kind {
        ObjectKind::Function(c) => c.clone(),
        ObjectKind::Proxy(_) => return Ok(()),
        _ => return Ok(()),
    };
    match callable {
        Callable::Closure(_) => Ok(()),
        Callable::Bound(bound) => {
            let mut all = bound.args.clone();
            all.extend_from_slice(args);
            check_call(ctx, &bound.target, &bound.this, &all)
        }
        Callable::Native(native) => {
            let Some(flags) = table.flags_for(function) else {
                return Err(raise_side_effect!("call to {} may have side effects", display_name(&native.name)));
            };
            if !flags.contains(SideEffectFlags::PURE) {
                return Err(raise_side_effect!("call to {} may have side effects", display_name(&native.name)));
            }
            if flags.contains(SideEffectFlags::RECEIVER_TEMPORARY)
                && let Value::Object(o) = this
                && !ctx.is_temporary(o.borrow().id)
            {
                return Err(raise_side_effect!("{} would modify an object that outlives the evaluation", display_name(&native.name)));
            }
            if flags.contains(SideEffectFlags::ARG0_TEMPORARY)
                && let Some(Value::Object(o)) = args.first()
                && !ctx.is_temporary(o.borrow().id)
            {
                return Err(raise_side_effect!("{} would modify an object that outlives the evaluation", display_name(&native.name)));
            }
            if flags.contains(SideEffectFlags::ARG0_CALLBACK)
                && let Some(Value::Object(callback)) = args.first()
            {
                check_call(ctx, callback, &Value::Undefined, &[])?;
            }
            if flags.contains(SideEffectFlags::RECEIVER_CALLBACK)
                && let Value::Object(target) = this
            {
                let (inner_this, inner_args) = match args.split_first() {
                    Some((t, rest)) => (t.clone(), rest.to_vec()),
                    None => (Value::Undefined, Vec::new()),
                };
                check_call(ctx, target, &inner_this, &inner_args)?;
            }
            Ok(())
        }
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "anonymous function" } else { name }
}

#[cfg(test)]
mod tests {
    use super::path_segments;

    #[test]
    fn bracketed_symbol_keys_stay_whole() {
        assert_eq!(path_segments("Array.prototype[Symbol.iterator]"), vec!["Array", "prototype", "[Symbol.iterator]"]);
        assert_eq!(path_segments("%IteratorPrototype%[Symbol.iterator]"), vec!["%IteratorPrototype%", "[Symbol.iterator]"]);
        assert_eq!(path_segments("Math.max"), vec!["Math", "max"]);
    }
}
