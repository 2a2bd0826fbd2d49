//! The `console` object and the compact value inspector used to print
//! console arguments and REPL results.
//!
//! Formatting never runs script code: accessors print as `[Getter]`,
//! proxies print their target and nothing is converted through `toString`.

use crate::core::context::{ConsoleLevel, Context};
use crate::core::descriptor::PropertySlot;
use crate::core::js_error::{EvalResult, create_error};
use crate::core::property::ordinary_own_keys;
use crate::core::property_key::PropertyKey;
use crate::core::realm::Intrinsics;
use crate::core::value::{JSObjectData, JSObjectDataPtr, ObjectKind, Value, new_object, number_to_string, string_to_number, to_boolean};
use crate::js_function::{arg, define_method, function_name_of};
use crate::js_promise::PromiseState;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;
use std::time::Instant;

const MAX_DEPTH: usize = 2;
const MAX_ITEMS: usize = 100;

/// Renders a value the way a console shows it, with strings quoted.
pub fn format_value(value: &Value) -> String {
    let mut out = String::new();
    Inspector { seen: Vec::new() }.write(&mut out, value, 0);
    out
}

/// Like [`format_value`] but leaves a top-level string unquoted.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => format_value(other),
    }
}

fn quote_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn format_key(key: &PropertyKey) -> String {
    match key {
        PropertyKey::String(s) if is_identifier(s) || key.array_index().is_some() => s.to_string(),
        PropertyKey::String(s) => quote_string(s),
        PropertyKey::Symbol(_) => format!("[{key}]"),
    }
}

struct Inspector {
    seen: Vec<JSObjectDataPtr>,
}

impl Inspector {
    fn write(&mut self, out: &mut String, value: &Value, depth: usize) {
        match value {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Number(n) if *n == 0.0 && n.is_sign_negative() => out.push_str("-0"),
            Value::Number(n) => out.push_str(&number_to_string(*n)),
            Value::String(s) => out.push_str(&quote_string(s)),
            Value::Symbol(s) => {
                let _ = write!(out, "Symbol({})", s.description.as_deref().unwrap_or(""));
            }
            Value::Object(obj) => self.write_object(out, obj, depth),
        }
    }

    fn write_object(&mut self, out: &mut String, obj: &JSObjectDataPtr, depth: usize) {
        if self.seen.iter().any(|o| Rc::ptr_eq(o, obj)) {
            out.push_str("[Circular]");
            return;
        }
        let shape = match obj.try_borrow() {
            Ok(data) => Shape::of(&data),
            Err(_) => {
                out.push_str("[object]");
                return;
            }
        };
        let too_deep = depth > MAX_DEPTH;
        let shows_as_array = shape.is_array();
        match shape {
            Shape::Function { is_class } => {
                let name = function_name_of(obj);
                let label = match (is_class, name.is_empty()) {
                    (true, true) => "[class (anonymous)]".to_string(),
                    (true, false) => format!("[class {name}]"),
                    (false, true) => "[Function (anonymous)]".to_string(),
                    (false, false) => format!("[Function: {name}]"),
                };
                out.push_str(&label);
            }
            Shape::Text(text) => out.push_str(&text),
            Shape::Proxy(target) => self.write_object(out, &target, depth),
            Shape::Promise(state) => {
                let mut item = String::new();
                match state {
                    PromiseState::Pending => item.push_str("<pending>"),
                    PromiseState::Fulfilled(v) => self.write(&mut item, &v, depth + 1),
                    PromiseState::Rejected(v) => {
                        item.push_str("<rejected> ");
                        self.write(&mut item, &v, depth + 1);
                    }
                }
                let _ = write!(out, "Promise {{ {item} }}");
            }
            _ if too_deep => out.push_str(if shows_as_array { "[Array]" } else { "[Object]" }),
            Shape::Keyed { entries, is_map } => {
                let mut items = Vec::new();
                self.seen.push(obj.clone());
                for (k, v) in entries.iter().take(MAX_ITEMS) {
                    let mut item = String::new();
                    self.write(&mut item, k, depth + 1);
                    if is_map {
                        item.push_str(" => ");
                        self.write(&mut item, v, depth + 1);
                    }
                    items.push(item);
                }
                self.seen.pop();
                let _ = write!(out, "{}({}) {}", if is_map { "Map" } else { "Set" }, entries.len(), wrap('{', '}', &items));
            }
            Shape::Plain { prefix, fields, is_array, length } => {
                let mut items = Vec::new();
                let mut next_index = 0u32;
                self.seen.push(obj.clone());
                for (key, value) in fields {
                    if items.len() >= MAX_ITEMS {
                        items.push("...".to_string());
                        break;
                    }
                    let mut item = String::new();
                    match key.array_index().filter(|_| is_array) {
                        Some(index) => {
                            if index > next_index {
                                items.push(empty_items((index - next_index) as usize));
                            }
                            next_index = index + 1;
                        }
                        None => {
                            item.push_str(&format_key(&key));
                            item.push_str(": ");
                        }
                    }
                    match value {
                        FieldValue::Data(v) => self.write(&mut item, &v, depth + 1),
                        FieldValue::Accessor(label) => item.push_str(label),
                    }
                    items.push(item);
                }
                self.seen.pop();
                if is_array && length > next_index && items.len() < MAX_ITEMS {
                    items.push(empty_items((length - next_index) as usize));
                }
                out.push_str(&prefix);
                out.push_str(&if is_array { wrap('[', ']', &items) } else { wrap('{', '}', &items) });
            }
        }
    }
}

enum FieldValue {
    Data(Value),
    Accessor(&'static str),
}

/// What the inspector needs from an object, copied out of its borrow.
enum Shape {
    Function { is_class: bool },
    Text(String),
    Proxy(JSObjectDataPtr),
    Promise(PromiseState),
    Keyed { entries: Vec<(Value, Value)>, is_map: bool },
    Plain { prefix: String, fields: Vec<(PropertyKey, FieldValue)>, is_array: bool, length: u32 },
}

impl Shape {
    fn of(data: &JSObjectData) -> Shape {
        match &data.kind {
            ObjectKind::Function(callable) => Shape::Function {
                is_class: callable.as_closure().is_some_and(|c| c.meta.is_class_constructor()),
            },
            ObjectKind::Error => Shape::Text(error_text(data)),
            ObjectKind::Proxy(Some(proxy)) => Shape::Proxy(proxy.target.clone()),
            ObjectKind::Proxy(None) => Shape::Text("<Revoked Proxy>".to_string()),
            ObjectKind::Number(n) => Shape::Text(format!("[Number: {}]", number_to_string(*n))),
            ObjectKind::Boolean(b) => Shape::Text(format!("[Boolean: {b}]")),
            ObjectKind::String(s) => Shape::Text(format!("[String: {}]", quote_string(s))),
            ObjectKind::Symbol(s) => Shape::Text(format!("[Symbol: Symbol({})]", s.description.as_deref().unwrap_or(""))),
            ObjectKind::WeakMap(_) => Shape::Text("WeakMap { <items unknown> }".to_string()),
            ObjectKind::WeakSet(_) => Shape::Text("WeakSet { <items unknown> }".to_string()),
            ObjectKind::WeakRef(_) => Shape::Text("WeakRef { <target> }".to_string()),
            ObjectKind::Iterator(_) => Shape::Text("Object [Iterator] {}".to_string()),
            ObjectKind::Promise(promise) => Shape::Promise(promise.state.clone()),
            ObjectKind::Map(table) => Shape::Keyed { entries: table.entries(), is_map: true },
            ObjectKind::Set(table) => Shape::Keyed { entries: table.entries(), is_map: false },
            _ => {
                let mut fields = Vec::new();
                for key in ordinary_own_keys(data) {
                    let Some(prop) = data.get_own(&key) else { continue };
                    if !prop.enumerable {
                        continue;
                    }
                    let value = match &prop.slot {
                        PropertySlot::Data { value, .. } => FieldValue::Data(value.clone()),
                        PropertySlot::Accessor { get, set } => FieldValue::Accessor(match (get.is_some(), set.is_some()) {
                            (true, true) => "[Getter/Setter]",
                            (true, false) => "[Getter]",
                            _ => "[Setter]",
                        }),
                    };
                    fields.push((key, value));
                }
                let is_array = data.is_array();
                Shape::Plain {
                    prefix: object_prefix(&data.prototype, is_array),
                    fields,
                    is_array,
                    length: if is_array { data.array_length() } else { 0 },
                }
            }
        }
    }

    fn is_array(&self) -> bool {
        matches!(self, Shape::Plain { is_array: true, .. })
    }
}

fn error_text(data: &JSObjectData) -> String {
    if let Some(Value::String(stack)) = data.own_data_value(&"stack".into()) {
        return stack.to_string();
    }
    match data.own_data_value(&"message".into()) {
        Some(Value::String(m)) if !m.is_empty() => format!("Error: {m}"),
        _ => "Error".to_string(),
    }
}

fn empty_items(n: usize) -> String {
    if n == 1 { "<1 empty item>".to_string() } else { format!("<{n} empty items>") }
}

fn wrap(open: char, close: char, items: &[String]) -> String {
    if items.is_empty() {
        format!("{open}{close}")
    } else {
        format!("{open} {} {close}", items.join(", "))
    }
}

/// `ClassName ` for instances of user classes, empty for plain objects and arrays.
fn object_prefix(prototype: &Option<JSObjectDataPtr>, is_array: bool) -> String {
    let Some(proto) = prototype else {
        return "[Object: null prototype] ".to_string();
    };
    let Ok(p) = proto.try_borrow() else {
        return String::new();
    };
    let Some(Value::Object(ctor)) = p.own_data_value(&"constructor".into()) else {
        return String::new();
    };
    drop(p);
    if Rc::ptr_eq(&ctor, proto) {
        return String::new();
    }
    let name = function_name_of(&ctor);
    match &*name {
        "Object" | "" => String::new(),
        "Array" if is_array => String::new(),
        other => format!("{other} "),
    }
}

/// Applies `%s`-style substitutions from a leading format string, then
/// appends the remaining arguments separated by spaces.
pub fn format_args(args: &[Value]) -> String {
    let mut out = String::new();
    let mut rest = args;
    if let Some(Value::String(format)) = args.first()
        && args.len() > 1
        && format.contains('%')
    {
        let mut next = 1;
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let Some(&spec) = chars.peek() else {
                out.push('%');
                break;
            };
            match spec {
                '%' => {
                    chars.next();
                    out.push('%');
                }
                's' | 'd' | 'i' | 'f' | 'o' | 'O' | 'j' | 'c' if next < args.len() => {
                    chars.next();
                    let value = &args[next];
                    next += 1;
                    match spec {
                        's' => out.push_str(&display_value(value)),
                        'd' | 'i' => {
                            let n = console_number(value);
                            out.push_str(&number_to_string(if n.is_finite() { n.trunc() } else { n }));
                        }
                        'f' => out.push_str(&number_to_string(console_number(value))),
                        'c' => {}
                        _ => out.push_str(&format_value(value)),
                    }
                }
                _ => out.push('%'),
            }
        }
        rest = &args[next..];
        if !rest.is_empty() {
            out.push(' ');
        }
    }
    let tail: Vec<String> = rest.iter().map(display_value).collect();
    out.push_str(&tail.join(" "));
    out
}

fn console_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::String(s) => string_to_number(s),
        Value::Boolean(b) => *b as u8 as f64,
        Value::Null => 0.0,
        _ => f64::NAN,
    }
}

fn label_arg(args: &[Value]) -> String {
    match args.first() {
        None | Some(Value::Undefined) => "default".to_string(),
        Some(v) => display_value(v),
    }
}

#[derive(Default)]
struct ConsoleState {
    indent: Cell<usize>,
    counts: RefCell<HashMap<String, u64>>,
    timers: RefCell<HashMap<String, Instant>>,
}

impl ConsoleState {
    fn emit(&self, ctx: &Rc<Context>, level: ConsoleLevel, message: &str) {
        let pad = "  ".repeat(self.indent.get());
        if pad.is_empty() {
            ctx.console(level, message);
        } else {
            let indented: Vec<String> = message.lines().map(|l| format!("{pad}{l}")).collect();
            ctx.console(level, &indented.join("\n"));
        }
    }
}

fn level_method(intrinsics: &Intrinsics, console: &JSObjectDataPtr, state: &Rc<ConsoleState>, name: &str, level: ConsoleLevel) {
    let state = state.clone();
    define_method(intrinsics, console, name, 0, move |ctx, _this, args| {
        state.emit(ctx, level, &format_args(args));
        Ok(Value::Undefined)
    });
}

fn elapsed_label(state: &ConsoleState, label: &str, remove: bool) -> Option<String> {
    let mut timers = state.timers.borrow_mut();
    let started = if remove { timers.remove(label)? } else { *timers.get(label)? };
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    Some(format!("{label}: {ms:.3}ms"))
}

/// Create the console object with logging functions
pub fn initialize_console(intrinsics: &Intrinsics, global: &JSObjectDataPtr) {
    let console = new_object(Some(&intrinsics.object_prototype));
    let state = Rc::new(ConsoleState::default());

    level_method(intrinsics, &console, &state, "log", ConsoleLevel::Log);
    level_method(intrinsics, &console, &state, "info", ConsoleLevel::Info);
    level_method(intrinsics, &console, &state, "warn", ConsoleLevel::Warn);
    level_method(intrinsics, &console, &state, "error", ConsoleLevel::Error);
    level_method(intrinsics, &console, &state, "debug", ConsoleLevel::Debug);

    let s = state.clone();
    define_method(intrinsics, &console, "dir", 0, move |ctx, _this, args| {
        s.emit(ctx, ConsoleLevel::Log, &format_value(&arg(args, 0)));
        Ok(Value::Undefined)
    });
    let s = state.clone();
    define_method(intrinsics, &console, "trace", 0, move |ctx, _this, args| {
        let error = create_error(ctx, "Error", &format_args(args));
        let stack = match error.borrow().own_data_value(&"stack".into()) {
            Some(Value::String(stack)) => stack.to_string(),
            _ => String::new(),
        };
        let trace = stack.strip_prefix("Error").map(|rest| format!("Trace{rest}")).unwrap_or(stack);
        s.emit(ctx, ConsoleLevel::Log, &trace);
        Ok(Value::Undefined)
    });
    let s = state.clone();
    define_method(intrinsics, &console, "assert", 0, move |ctx, _this, args| {
        if to_boolean(&arg(args, 0)) {
            return Ok(Value::Undefined);
        }
        let detail = format_args(args.get(1..).unwrap_or_default());
        let message = if detail.is_empty() { "Assertion failed".to_string() } else { format!("Assertion failed: {detail}") };
        s.emit(ctx, ConsoleLevel::Error, &message);
        Ok(Value::Undefined)
    });
    let s = state.clone();
    define_method(intrinsics, &console, "count", 0, move |ctx, _this, args| {
        let label = label_arg(args);
        let count = {
            let mut counts = s.counts.borrow_mut();
            let count = counts.entry(label.clone()).or_insert(0);
            *count += 1;
            *count
        };
        s.emit(ctx, ConsoleLevel::Log, &format!("{label}: {count}"));
        Ok(Value::Undefined)
    });
    let s = state.clone();
    define_method(intrinsics, &console, "countReset", 0, move |_ctx, _this, args| {
        s.counts.borrow_mut().remove(&label_arg(args));
        Ok(Value::Undefined)
    });
    for name in ["group", "groupCollapsed"] {
        let s = state.clone();
        define_method(intrinsics, &console, name, 0, move |ctx, _this, args| -> EvalResult<Value> {
            if !args.is_empty() {
                s.emit(ctx, ConsoleLevel::Log, &format_args(args));
            }
            s.indent.set(s.indent.get() + 1);
            Ok(Value::Undefined)
        });
    }
    let s = state.clone();
    define_method(intrinsics, &console, "groupEnd", 0, move |_ctx, _this, _args| {
        s.indent.set(s.indent.get().saturating_sub(1));
        Ok(Value::Undefined)
    });
    let s = state.clone();
    define_method(intrinsics, &console, "time", 0, move |_ctx, _this, args| {
        s.timers.borrow_mut().insert(label_arg(args), Instant::now());
        Ok(Value::Undefined)
    });
    for (name, remove) in [("timeLog", false), ("timeEnd", true)] {
        let s = state.clone();
        define_method(intrinsics, &console, name, 0, move |ctx, _this, args| {
            let label = label_arg(args);
            match elapsed_label(&s, &label, remove) {
                Some(line) => s.emit(ctx, ConsoleLevel::Log, &line),
                None => s.emit(ctx, ConsoleLevel::Warn, &format!("Timer '{label}' does not exist")),
            }
            Ok(Value::Undefined)
        });
    }

    global.borrow_mut().insert_builtin("console", Value::Object(console));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_specifiers() {
        let args = [Value::from("%s is %d years, 100%%"), Value::from("Ann"), Value::Number(41.7)];
        assert_eq!(format_args(&args), "Ann is 41 years, 100%");
        let args = [Value::from("%s"), Value::from("a"), Value::Number(1.0)];
        assert_eq!(format_args(&args), "a 1");
    }

    #[test]
    fn primitives_inspect_like_a_console() {
        assert_eq!(format_value(&Value::Number(-0.0)), "-0");
        assert_eq!(format_value(&Value::from("it's")), "\"it's\"");
        assert_eq!(display_value(&Value::from("raw")), "raw");
        assert_eq!(format_value(&Value::Undefined), "undefined");
    }

    #[test]
    fn keys_quote_only_when_needed() {
        assert_eq!(format_key(&PropertyKey::from("ok_1")), "ok_1");
        assert_eq!(format_key(&PropertyKey::from("a-b")), "'a-b'");
        assert_eq!(format_key(&PropertyKey::from("3")), "3");
    }
}
