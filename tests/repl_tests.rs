use jsconsole::{JSError, Repl, display_value, format_value};
use std::time::Duration;

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

#[test]
fn repl_persists_values_between_calls() {
    let repl = Repl::new();
    repl.eval("class Point { constructor(x) { this.x = x; } }").unwrap();
    repl.eval("const origin = new Point(0);").unwrap();
    let v = repl.eval("origin").unwrap();
    assert_eq!(format_value(&v), "Point { x: 0 }");
    let err = repl.eval("const origin = 1;").unwrap_err();
    assert!(err.to_string().contains("Identifier 'origin' has already been declared"), "{err}");
}

#[test]
fn errors_leave_earlier_state_intact() {
    let repl = Repl::new();
    repl.eval("var kept = 'yes';").unwrap();
    assert!(matches!(repl.eval("kept.missing.deeper"), Err(JSError::Thrown { .. })));
    assert!(matches!(repl.eval("let = ;"), Err(JSError::SyntaxError { .. })));
    assert_eq!(display_value(&repl.eval("kept").unwrap()), "yes");
}

#[test]
fn top_level_await_in_the_repl() {
    let repl = Repl::new();
    let v = repl.eval("const r = await new Promise(ok => setTimeout(() => ok('later'), 5)); r").unwrap();
    assert_eq!(display_value(&v), "later");
    assert_eq!(display_value(&repl.eval("r.length").unwrap()), "5");
}

#[test]
fn repl_timeout_applies_per_entry() {
    let repl = Repl::new().with_timeout(Some(Duration::from_millis(20)));
    assert!(matches!(repl.eval("for (;;) {}"), Err(JSError::Timeout { .. })));
    assert_eq!(display_value(&repl.eval("1 + 1").unwrap()), "2");
}

#[test]
fn strict_repl_rejects_implicit_globals() {
    let repl = Repl::new().with_strict(true);
    let err = repl.eval("implicit = 1").unwrap_err();
    assert!(err.to_string().contains("implicit is not defined"), "{err}");
}

#[test]
fn completions_include_builtins_and_user_bindings() {
    let repl = Repl::new();
    repl.eval("let mathHelper = 1;").unwrap();
    let names = repl.completions("Mat");
    assert!(names.contains(&"Math".to_string()), "{names:?}");
    assert_eq!(repl.completions("mathH"), vec!["mathHelper".to_string()]);
    assert!(repl.completions("hasOwn").contains(&"hasOwnProperty".to_string()));
}

#[test]
fn preview_never_runs_side_effects() {
    let repl = Repl::new();
    repl.eval("var log = [];").unwrap();
    assert!(repl.preview("log.push(1)").is_none());
    assert!(repl.preview("while (true) {}").is_none());
    assert_eq!(repl.preview("log.length + 40").map(|v| display_value(&v)).as_deref(), Some("40"));
    assert_eq!(display_value(&repl.eval("log.length").unwrap()), "0");
}
