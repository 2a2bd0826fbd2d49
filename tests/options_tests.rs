use jsconsole::{
    DebugSink, EvaluateOptions, JSError, JSObjectData, ObjectKind, PropertyKey, Scope, SourceInfo, Span, Value, display_value, evaluate,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

#[derive(Default)]
struct Recorder {
    statements: RefCell<Vec<u32>>,
    breakpoints: RefCell<Vec<(String, u32)>>,
}

impl DebugSink for Recorder {
    fn statement(&self, _source: &SourceInfo, span: Span) {
        self.statements.borrow_mut().push(span.line);
    }

    fn debugger(&self, source: &SourceInfo, span: Span) {
        self.breakpoints.borrow_mut().push((source.filename.to_string(), span.line));
    }
}

#[test]
fn options_from_json() {
    let options = EvaluateOptions::from_json(&json!({
        "timeoutMillis": 10,
        "throwOnSideEffect": false,
        "filename": "repl.js",
        "unknown": [1, 2, 3]
    }))
    .unwrap();
    let err = evaluate("while (true) {}", options.clone()).unwrap_err();
    assert!(matches!(err, JSError::Timeout { millis: 10 }), "{err:?}");
    let err = evaluate("throw new Error('where')", options).unwrap_err();
    assert!(err.to_string().contains("(repl.js:1:"), "{err}");
}

#[test]
fn from_json_dry_run_and_strict() {
    let options = EvaluateOptions::from_json(&json!({ "throwOnSideEffect": true })).unwrap();
    assert!(matches!(evaluate("globalThis.x = 1", options), Err(JSError::PossibleSideEffect { .. })));

    let options = EvaluateOptions::from_json(&json!({ "strict": true, "timeoutMillis": null })).unwrap();
    let err = evaluate("notDeclared = 1", options).unwrap_err();
    assert!(err.to_string().contains("ReferenceError"), "{err}");
}

#[test]
fn from_json_rejects_malformed_options() {
    for bad in [json!([]), json!("x"), json!({ "timeoutMillis": -1 }), json!({ "timeoutMillis": 1.5 }), json!({ "strict": "yes" })] {
        let err = EvaluateOptions::from_json(&bad).unwrap_err();
        assert!(matches!(err, JSError::TypeError { .. }), "{bad}: {err:?}");
    }
}

#[test]
fn host_supplied_global_object() {
    let global = Rc::new(RefCell::new(JSObjectData::new(None, ObjectKind::Ordinary)));
    global.borrow_mut().insert_data("hostValue", Value::Number(7.0), true, true, true);
    let options = EvaluateOptions::default().global_object(global.clone());
    let v = evaluate("var added = typeof Math; hostValue * 6", options).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "42");
    let added = global.borrow().own_data_value(&PropertyKey::from("added"));
    assert!(matches!(added, Some(Value::String(ref s)) if &**s == "object"));
}

#[test]
fn custom_global_scope_isolates_lexical_bindings() {
    let realm = jsconsole::Realm::new();
    let scope = Scope::new_global(realm.global_object.clone());
    let options = EvaluateOptions::default().realm(realm.clone()).global_scope(scope.clone());
    evaluate("let isolated = 1;", options.clone()).unwrap();
    assert!(scope.binding_names().iter().any(|n| &**n == "isolated"));
    assert!(realm.global_scope.binding_names().iter().all(|n| &**n != "isolated"));
    let v = evaluate("typeof isolated", EvaluateOptions::default().realm(realm)).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "undefined");
}

#[test]
fn strict_option_applies_to_sloppy_source() {
    let options = EvaluateOptions::default().strict(true);
    let err = evaluate("undeclared = 1", options).unwrap_err();
    assert!(err.to_string().contains("undeclared is not defined"), "{err}");
}

#[test]
fn debug_sink_sees_statements_and_breakpoints() {
    let sink = Rc::new(Recorder::default());
    let script = "let a = 1;\nif (a) {\n  a = 2;\n}\ndebugger;\na";
    let options = EvaluateOptions::default().debug_sink(sink.clone()).filename("dbg.js");
    let v = evaluate(script, options).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "2");
    let mut lines = sink.statements.borrow().clone();
    lines.dedup();
    assert_eq!(lines, vec![1, 2, 3, 5, 6]);
    assert_eq!(*sink.breakpoints.borrow(), vec![("dbg.js".to_string(), 5)]);
}

#[test]
fn timeout_does_not_fire_for_quick_scripts() {
    let options = EvaluateOptions::new().timeout(Duration::from_secs(5));
    let v = evaluate("[1, 2, 3].map(x => x * x).join()", options).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "1,4,9");
}

#[test]
fn syntax_errors_report_a_position() {
    let err = evaluate("let x = ;", EvaluateOptions::default()).unwrap_err();
    match err {
        JSError::SyntaxError { line, column, .. } => assert_eq!((line, column), (1, 9)),
        other => panic!("{other:?}"),
    }
    let err = evaluate("\n\n  )", EvaluateOptions::default()).unwrap_err();
    assert!(matches!(err, JSError::SyntaxError { line: 3, column: 3, .. }), "{err:?}");
}
