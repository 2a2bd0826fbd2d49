use jsconsole::{EvaluateOptions, Evaluation, JSError, Realm, display_value, evaluate};
use std::time::{Duration, Instant};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn with_timeout(script: &str, millis: u64) -> Result<jsconsole::Value, JSError> {
    evaluate(script, EvaluateOptions::default().timeout(Duration::from_millis(millis)))?.into_value()
}

#[test]
fn infinite_loop_times_out() {
    let started = Instant::now();
    let err = with_timeout("while (true) {}", 10).unwrap_err();
    assert!(matches!(err, JSError::Timeout { millis: 10 }), "{err:?}");
    assert!(err.is_internal());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn timeout_is_not_catchable() {
    let script = r#"
        var caught = false;
        try { while (true) {} } catch (e) { caught = true; }
        caught
    "#;
    let realm = Realm::new();
    let options = EvaluateOptions::default().realm(realm.clone()).timeout(Duration::from_millis(10));
    let err = evaluate(script, options).and_then(Evaluation::into_value).unwrap_err();
    assert!(matches!(err, JSError::Timeout { .. }), "{err:?}");
    let caught = evaluate("caught", EvaluateOptions::default().realm(realm)).unwrap().into_value().unwrap();
    assert_eq!(display_value(&caught), "false");
}

#[test]
fn timeout_skips_finally_blocks() {
    let script = r#"
        var cleaned = false;
        try { for (;;) {} } finally { cleaned = true; }
    "#;
    let realm = Realm::new();
    let options = EvaluateOptions::default().realm(realm.clone()).timeout(Duration::from_millis(10));
    assert!(matches!(evaluate(script, options), Err(JSError::Timeout { .. })));
    let cleaned = evaluate("cleaned", EvaluateOptions::default().realm(realm)).unwrap().into_value().unwrap();
    assert_eq!(display_value(&cleaned), "false");
}

#[test]
fn recursion_and_iteration_are_both_bounded() {
    let err = with_timeout("function spin() { for (const x of [1, 2, 3]) {} return spin2(); } function spin2() { while (1) {} } spin()", 10).unwrap_err();
    assert!(matches!(err, JSError::Timeout { .. }), "{err:?}");
    let err = with_timeout("const it = { [Symbol.iterator]() { return { next: () => ({ done: false, value: 1 }) }; } }; [...it]", 10).unwrap_err();
    assert!(matches!(err, JSError::Timeout { .. }), "{err:?}");
}

#[test]
fn short_scripts_finish_within_the_timeout() {
    let v = with_timeout("let s = 0; for (let i = 0; i < 100; i++) s += i; s", 5_000).unwrap();
    assert_eq!(display_value(&v), "4950");
}

#[test]
fn pending_evaluation_honors_the_timeout() {
    let script = "await new Promise(r => setTimeout(r, 10000)); 'late'";
    let evaluation = evaluate(script, EvaluateOptions::default().timeout(Duration::from_millis(30))).unwrap();
    assert!(evaluation.is_pending());
    let started = Instant::now();
    let err = evaluation.into_value().unwrap_err();
    assert!(matches!(err, JSError::Timeout { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn interrupt_handle_stops_a_running_loop() {
    let realm = Realm::new();
    let handle = realm.interrupt_handle();
    let interrupter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(30));
        handle.interrupt();
    });
    let script = "var n = 0; try { while (true) { n++; } } catch (e) { 'caught' }";
    let err = evaluate(script, EvaluateOptions::default().realm(realm.clone())).unwrap_err();
    interrupter.join().unwrap();
    assert!(matches!(err, JSError::Interrupted), "{err:?}");

    // The next evaluation starts with a cleared flag.
    let n = evaluate("n > 0", EvaluateOptions::default().realm(realm)).unwrap().into_value().unwrap();
    assert_eq!(display_value(&n), "true");
}
