use jsconsole::{EvaluateOptions, JSError, Realm, display_value, evaluate, evaluate_to_value};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn uncaught(script: &str) -> String {
    match evaluate_to_value(script) {
        Err(e @ JSError::Thrown { .. }) => e.to_string(),
        other => panic!("{script}: expected a thrown value, got {other:?}"),
    }
}

fn eval(script: &str) -> String {
    match evaluate_to_value(script) {
        Ok(v) => display_value(&v),
        Err(e) => panic!("{script}: {e}"),
    }
}

#[test]
fn uncaught_error_reports_every_frame() {
    let text = uncaught("function f() {\n  throw new Error('boom');\n}\nf()");
    assert_eq!(text, "Uncaught Error: boom\n    at f (<console>:2:9)\n    at <anonymous> (<console>:4:1)");
}

#[test]
fn engine_errors_are_stamped_in_the_failing_frame() {
    let text = uncaught("function g() {\n  return null.x;\n}\ng()");
    assert!(text.starts_with("Uncaught TypeError: "), "{text}");
    assert!(text.contains("\n    at g (<console>:2:3)\n    at <anonymous> (<console>:4:1)"), "{text}");
}

#[test]
fn native_frames_render_without_a_location() {
    let text = uncaught("[1].map(function cb() { throw new TypeError('in callback'); })");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Uncaught TypeError: in callback");
    assert!(lines[1].starts_with("    at cb (<console>:1:"), "{text}");
    assert_eq!(lines[2], "    at map (native)");

    let text = uncaught("JSON.parse('{')");
    assert!(text.starts_with("Uncaught SyntaxError: "), "{text}");
    assert!(text.contains("    at parse (native)"), "{text}");
}

#[test]
fn anonymous_functions_render_as_anonymous() {
    let text = uncaught("(() => { throw new RangeError('r'); })()");
    assert!(text.starts_with("Uncaught RangeError: r\n    at <anonymous> (<console>:1:"), "{text}");
}

#[test]
fn rethrow_keeps_the_original_stack() {
    let script = "function a() { throw new Error('x'); }\nfunction b() { try { a(); } catch (e) { throw e; } }\nb()";
    let text = uncaught(script);
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[1].starts_with("    at a (<console>:1:"), "{text}");
    assert!(lines[2].starts_with("    at b (<console>:2:"), "{text}");
}

#[test]
fn stack_is_visible_to_the_script() {
    let v = eval("function deep() { return new Error('seen').stack; } deep().split('\\n').slice(0, 2).join('|')");
    assert!(v.starts_with("Error: seen|    at deep (<console>:1:"), "{v}");
}

#[test]
fn capture_stack_trace_on_a_plain_object() {
    let v = eval("const o = { name: 'Custom', message: 'm' }; Error.captureStackTrace(o); o.stack");
    let lines: Vec<&str> = v.lines().collect();
    assert_eq!(lines[0], "Custom: m");
    assert_eq!(lines.len(), 2, "{v}");
    assert!(lines[1].starts_with("    at <anonymous> (<console>:1:"), "{v}");
    assert_eq!(eval("const p = {}; Error.captureStackTrace(p); Object.getOwnPropertyDescriptor(p, 'stack').enumerable"), "false");
}

#[test]
fn capture_stack_trace_hides_frames_above_the_given_function() {
    let script = r#"
        function outer() { return inner(); }
        function inner() { const o = { name: 'E', message: '' }; Error.captureStackTrace(o, inner); return o.stack; }
        outer()
    "#;
    let v = eval(script);
    assert!(!v.contains("at inner"), "{v}");
    assert!(v.contains("at outer"), "{v}");
    assert!(v.starts_with("E\n"), "{v}");
}

#[test]
fn thrown_primitives_are_described_plainly() {
    assert_eq!(uncaught("throw 'just a string'"), "Uncaught just a string");
    assert_eq!(uncaught("throw 42"), "Uncaught 42");
    let err = evaluate_to_value("throw { code: 7 }").unwrap_err();
    match err {
        JSError::Thrown { value, .. } => assert_eq!(display_value(&value), "{ code: 7 }"),
        other => panic!("{other:?}"),
    }
}

#[test]
fn filename_option_appears_in_frames() {
    let options = EvaluateOptions::default().filename("app.js");
    let err = evaluate("throw new Error('f')", options).unwrap_err();
    assert!(err.to_string().contains("(app.js:1:"), "{err}");
}

#[test]
fn subclassed_errors_use_their_own_name() {
    let script = r#"
        class ValidationError extends Error {
            constructor(message) { super(message); this.name = 'ValidationError'; }
        }
        const e = new ValidationError('bad input');
        [e instanceof Error, e.toString(), e.stack.split('\n')[0]].join('|')
    "#;
    // The stack header is taken when the base constructor runs, before `name` is assigned.
    assert_eq!(eval(script), "true|ValidationError: bad input|Error: bad input");
}

#[test]
fn stack_overflow_is_reported_as_range_error() {
    let realm = Realm::new();
    realm.set_max_call_depth(16);
    let err = evaluate("function loop() { loop(); } loop()", EvaluateOptions::default().realm(realm)).unwrap_err();
    assert!(err.to_string().starts_with("Uncaught RangeError: Maximum call stack size exceeded"), "{err}");
}

#[test]
fn error_cause_is_kept() {
    assert_eq!(eval("new Error('outer', { cause: 'inner' }).cause"), "inner");
}
