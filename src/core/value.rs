use crate::core::callable::Callable;
use crate::core::descriptor::{Property, PropertySlot};
use crate::core::property_key::PropertyKey;
use crate::js_function::MappedArguments;
use crate::js_map::KeyedTable;
use crate::js_promise::PromiseData;
use crate::js_proxy::ProxyData;
use crate::js_weakmap::WeakTable;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

pub type JSObjectDataPtr = Rc<RefCell<JSObjectData>>;
pub type WeakObjectPtr = Weak<RefCell<JSObjectData>>;

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique identity for objects, scopes and symbols.
///
/// Identities grow monotonically, so anything allocated after an evaluation
/// started has an identity at or above that evaluation's watermark.
pub fn next_identity() -> u64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// The next identity that will be handed out.
pub fn identity_watermark() -> u64 {
    NEXT_IDENTITY.load(Ordering::Relaxed)
}

#[derive(Debug)]
pub struct SymbolData {
    pub id: u64,
    pub description: Option<Rc<str>>,
    /// Created through `Symbol.for`.
    pub registered: bool,
}

impl SymbolData {
    pub fn new(description: Option<Rc<str>>) -> Rc<SymbolData> {
        Rc::new(SymbolData {
            id: next_identity(),
            description,
            registered: false,
        })
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Rc<SymbolData>),
    Object(JSObjectDataPtr),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&JSObjectDataPtr> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Value::Object(o) => is_callable(o),
            _ => false,
        }
    }

    pub fn is_constructor(&self) -> bool {
        match self {
            Value::Object(o) => is_constructor(o),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<JSObjectDataPtr> for Value {
    fn from(o: JSObjectDataPtr) -> Self {
        Value::Object(o)
    }
}

impl From<&PropertyKey> for Value {
    fn from(key: &PropertyKey) -> Self {
        match key {
            PropertyKey::String(s) => Value::String(s.clone()),
            PropertyKey::Symbol(s) => Value::Symbol(s.clone()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Symbol(s) => write!(f, "Symbol({})", s.description.as_deref().unwrap_or("")),
            Value::Object(o) => match o.try_borrow() {
                Ok(data) => write!(f, "{data:?}"),
                Err(_) => write!(f, "[object (borrowed)]"),
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationKind {
    Keys,
    Values,
    Entries,
}

/// Internal state of the built-in iterator objects.
#[derive(Debug)]
pub enum IteratorState {
    Array {
        target: Value,
        index: usize,
        kind: IterationKind,
        done: bool,
    },
    String {
        value: Rc<str>,
        /// Byte offset of the next code point.
        position: usize,
    },
    Map {
        target: JSObjectDataPtr,
        index: usize,
        kind: IterationKind,
        done: bool,
    },
}

/// Internal slots distinguishing exotic and built-in objects.
pub enum ObjectKind {
    Ordinary,
    Array,
    Function(Callable),
    Error,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Symbol(Rc<SymbolData>),
    /// `Some` for sloppy-mode arguments aliased to parameter bindings.
    Arguments(Option<MappedArguments>),
    Promise(PromiseData),
    /// `None` once revoked.
    Proxy(Option<ProxyData>),
    Map(KeyedTable),
    Set(KeyedTable),
    WeakMap(WeakTable),
    WeakSet(WeakTable),
    WeakRef(WeakObjectPtr),
    Iterator(IteratorState),
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::Boolean(_) => "Boolean",
            ObjectKind::Number(_) => "Number",
            ObjectKind::String(_) => "String",
            ObjectKind::Symbol(_) => "Symbol",
            ObjectKind::Arguments(_) => "Arguments",
            ObjectKind::Promise(_) => "Promise",
            ObjectKind::Proxy(_) => "Proxy",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::WeakMap(_) => "WeakMap",
            ObjectKind::WeakSet(_) => "WeakSet",
            ObjectKind::WeakRef(_) => "WeakRef",
            ObjectKind::Iterator(_) => "Iterator",
        }
    }
}

pub struct JSObjectData {
    pub id: u64,
    pub properties: IndexMap<PropertyKey, Property>,
    pub prototype: Option<JSObjectDataPtr>,
    pub extensible: bool,
    pub kind: ObjectKind,
}

impl fmt::Debug for JSObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[object {}#{}]", self.kind.name(), self.id)
    }
}

impl JSObjectData {
    pub fn new(prototype: Option<JSObjectDataPtr>, kind: ObjectKind) -> Self {
        JSObjectData {
            id: next_identity(),
            properties: IndexMap::new(),
            prototype,
            extensible: true,
            kind,
        }
    }

    pub fn get_own(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Inserts or overwrites an own data property without any checks.
    pub fn insert_data(&mut self, key: impl Into<PropertyKey>, value: Value, writable: bool, enumerable: bool, configurable: bool) {
        self.properties.insert(
            key.into(),
            Property {
                slot: PropertySlot::Data { value, writable },
                enumerable,
                configurable,
            },
        );
    }

    /// Built-in style property: writable, non-enumerable, configurable.
    pub fn insert_builtin(&mut self, key: impl Into<PropertyKey>, value: Value) {
        self.insert_data(key, value, true, false, true);
    }

    pub fn insert_accessor(&mut self, key: impl Into<PropertyKey>, get: Option<Value>, set: Option<Value>, enumerable: bool, configurable: bool) {
        self.properties.insert(
            key.into(),
            Property {
                slot: PropertySlot::Accessor { get, set },
                enumerable,
                configurable,
            },
        );
    }

    /// Value of an own data property, ignoring accessors.
    pub fn own_data_value(&self, key: &PropertyKey) -> Option<Value> {
        match self.properties.get(key).map(|p| &p.slot) {
            Some(PropertySlot::Data { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array)
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, ObjectKind::Proxy(_))
    }

    pub fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            ObjectKind::Function(c) => Some(c),
            _ => None,
        }
    }

    /// Array `length`, read from the own `length` data property.
    pub fn array_length(&self) -> u32 {
        match self.own_data_value(&PropertyKey::from("length")) {
            Some(Value::Number(n)) => n as u32,
            _ => 0,
        }
    }
}

pub fn new_object(prototype: Option<&JSObjectDataPtr>) -> JSObjectDataPtr {
    Rc::new(RefCell::new(JSObjectData::new(prototype.cloned(), ObjectKind::Ordinary)))
}

pub fn new_object_with_kind(prototype: Option<&JSObjectDataPtr>, kind: ObjectKind) -> JSObjectDataPtr {
    Rc::new(RefCell::new(JSObjectData::new(prototype.cloned(), kind)))
}

pub fn is_callable(obj: &JSObjectDataPtr) -> bool {
    match &obj.borrow().kind {
        ObjectKind::Function(_) => true,
        ObjectKind::Proxy(Some(p)) => p.callable,
        _ => false,
    }
}

pub fn is_constructor(obj: &JSObjectDataPtr) -> bool {
    match &obj.borrow().kind {
        ObjectKind::Function(c) => c.is_constructor(),
        ObjectKind::Proxy(Some(p)) => p.constructable,
        _ => false,
    }
}

pub fn is_array_value(v: &Value) -> bool {
    match v {
        Value::Object(o) => match &o.borrow().kind {
            ObjectKind::Array => true,
            ObjectKind::Proxy(Some(p)) => is_array_value(&Value::Object(p.target.clone())),
            _ => false,
        },
        _ => false,
    }
}

pub fn type_of(v: &Value) -> &'static str {
    match v {
        Value::Undefined => "undefined",
        Value::Null => "object",
        Value::Boolean(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Symbol(_) => "symbol",
        Value::Object(o) => {
            if is_callable(o) {
                "function"
            } else {
                "object"
            }
        }
    }
}

pub fn to_boolean(v: &Value) -> bool {
    match v {
        Value::Undefined | Value::Null => false,
        Value::Boolean(b) => *b,
        Value::Number(n) => !(*n == 0.0 || n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Symbol(_) | Value::Object(_) => true,
    }
}

pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x.id == y.id,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => strict_equals(a, b),
    }
}

pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_nan() && y.is_nan() {
                true
            } else {
                x == y && x.is_sign_negative() == y.is_sign_negative()
            }
        }
        _ => strict_equals(a, b),
    }
}

pub fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// `StringToNumber`: the numeric value of a string literal.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(is_js_whitespace);
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match t.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => 10,
    };
    if radix != 10 {
        let digits = &t[2..];
        if digits.is_empty() {
            return f64::NAN;
        }
        let mut value = 0f64;
        for c in digits.chars() {
            match c.to_digit(radix) {
                Some(d) => value = value * radix as f64 + d as f64,
                None => return f64::NAN,
            }
        }
        return value;
    }
    if !t.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// `Number::toString` for radix 10.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }
    // Shortest round-trip digits and exponent, e.g. "1.2345e6".
    let formatted = format!("{n:e}");
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let k = digits.len() as i32;
    let point = exponent + 1;
    if k <= point && point <= 21 {
        let mut s = digits;
        s.extend(std::iter::repeat_n('0', (point - k) as usize));
        s
    } else if 0 < point && point <= 21 {
        format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let e = point - 1;
        let sign = if e < 0 { '-' } else { '+' };
        if k == 1 {
            format!("{digits}e{sign}{}", e.abs())
        } else {
            format!("{}.{}e{sign}{}", &digits[..1], &digits[1..], e.abs())
        }
    }
}

pub fn f64_to_int32(n: f64) -> i32 {
    f64_to_uint32(n) as i32
}

pub fn f64_to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let modulo = n.trunc().rem_euclid(4294967296.0);
    modulo as u32
}

/// `ToIntegerOrInfinity` for an already-converted number.
pub fn f64_to_integer(n: f64) -> f64 {
    if n.is_nan() { 0.0 } else { n.trunc() + 0.0 }
}

/// Resolves a relative index argument (as used by `slice`, `at`, ...) against `len`.
pub fn relative_index(n: f64, len: usize) -> usize {
    let n = f64_to_integer(n);
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_formatting_matches_js() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(1.5e-10), "1.5e-10");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn string_conversions() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
        assert_eq!(f64_to_int32(4294967297.0), 1);
        assert_eq!(f64_to_int32(-1.0), -1);
    }
}
