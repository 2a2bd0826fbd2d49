use jsconsole::{ConsoleLevel, DebugSink, EvaluateOptions, Evaluation, JSError, Realm, display_value, evaluate, evaluate_to_value};
use std::cell::RefCell;
use std::rc::Rc;

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn eval(script: &str) -> String {
    match evaluate_to_value(script) {
        Ok(v) => display_value(&v),
        Err(e) => panic!("{script}: {e}"),
    }
}

#[derive(Default)]
struct Captured {
    lines: RefCell<Vec<(ConsoleLevel, String)>>,
}

impl DebugSink for Captured {
    fn console(&self, level: ConsoleLevel, message: &str) {
        self.lines.borrow_mut().push((level, message.to_string()));
    }
}

#[test]
fn synchronous_programs_complete_immediately() {
    let evaluation = evaluate("Promise.resolve(1); 2 + 2", EvaluateOptions::default()).unwrap();
    assert!(!evaluation.is_pending());
    match evaluation {
        Evaluation::Complete(output) => assert_eq!(display_value(&output.value), "4"),
        Evaluation::Pending(_) => unreachable!(),
    }
}

#[test]
fn microtasks_drain_before_evaluate_returns() {
    let realm = Realm::new();
    let options = || EvaluateOptions::default().realm(realm.clone());
    evaluate("var order = []; Promise.resolve().then(() => order.push('micro')); order.push('sync');", options()).unwrap();
    let v = evaluate("order.join()", options()).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "sync,micro");
}

#[test]
fn top_level_await_suspends_the_evaluation() {
    let evaluation = evaluate("const v = await Promise.resolve(5); v * 2", EvaluateOptions::default()).unwrap();
    assert!(evaluation.is_pending());
    assert_eq!(display_value(&evaluation.into_value().unwrap()), "10");
}

#[test]
fn await_resumes_in_job_order() {
    let script = r#"
        const log = [];
        Promise.resolve().then(() => log.push(1)).then(() => log.push(3));
        Promise.resolve().then(() => log.push(2));
        await null;
        log.push('after');
        log.join()
    "#;
    assert_eq!(eval(script), "1,2,after");
}

#[test]
fn timers_fire_in_deadline_order() {
    let script = r#"
        const log = [];
        setTimeout(() => log.push('t2'), 20);
        setTimeout(() => log.push('t1'), 5);
        setTimeout(() => log.push('t0'), 0);
        await new Promise(r => setTimeout(r, 40));
        log.join()
    "#;
    assert_eq!(eval(script), "t0,t1,t2");
}

#[test]
fn cleared_timers_never_fire() {
    let script = r#"
        let hit = false;
        const id = setTimeout(() => { hit = true; }, 5);
        clearTimeout(id);
        await new Promise(r => setTimeout(r, 20));
        hit
    "#;
    assert_eq!(eval(script), "false");
}

#[test]
fn intervals_repeat_until_cleared() {
    let script = r#"
        let n = 0;
        await new Promise(r => {
            const id = setInterval(() => { if (++n === 3) { clearInterval(id); r(); } }, 1);
        });
        n
    "#;
    assert_eq!(eval(script), "3");
}

#[test]
fn queue_microtask_runs_before_timers() {
    let script = r#"
        const log = [];
        setTimeout(() => log.push('timer'), 0);
        queueMicrotask(() => log.push('micro'));
        await new Promise(r => setTimeout(r, 5));
        log.join()
    "#;
    assert_eq!(eval(script), "micro,timer");
}

#[test]
fn awaiting_a_promise_that_never_settles_stalls() {
    let err = evaluate_to_value("await new Promise(() => {})").unwrap_err();
    assert!(matches!(err, JSError::Stalled), "{err:?}");
    assert!(err.is_internal());
}

#[test]
fn rejections_are_catchable_after_await() {
    assert_eq!(eval("try { await Promise.reject(new Error('no')); } catch (e) { e.message }"), "no");
    let err = evaluate_to_value("await Promise.reject(new TypeError('t'))").unwrap_err();
    assert!(matches!(err, JSError::Thrown { .. }), "{err:?}");
    assert!(err.to_string().starts_with("Uncaught TypeError: t"), "{err}");
}

#[test]
fn async_functions_return_promises() {
    assert_eq!(eval("async function f() { await null; return 7; } await f()"), "7");
    assert_eq!(eval("await (async () => { throw 1; })().catch(x => x + 1)"), "2");
    assert_eq!(eval("async function g() {} Object.prototype.toString.call(g())"), "[object Promise]");
}

#[test]
fn combinators() {
    assert_eq!(eval("(await Promise.all([1, Promise.resolve(2), new Promise(r => setTimeout(() => r(3), 5))])).join()"), "1,2,3");
    let settled = "(await Promise.allSettled([Promise.resolve(1), Promise.reject('x')])).map(r => r.status + ':' + (r.value ?? r.reason)).join()";
    assert_eq!(eval(settled), "fulfilled:1,rejected:x");
    assert_eq!(eval("await Promise.race([new Promise(r => setTimeout(() => r('slow'), 30)), Promise.resolve('fast')])"), "fast");
    assert_eq!(eval("await Promise.any([Promise.reject(1), Promise.resolve(2)])"), "2");
    let any_rejected = "try { await Promise.any([Promise.reject(1), Promise.reject(2)]); } catch (e) { e.name + ':' + e.errors.join() }";
    assert_eq!(eval(any_rejected), "AggregateError:1,2");
}

#[test]
fn finally_passes_values_through() {
    let script = r#"
        let ran = false;
        const v = await Promise.resolve('kept').finally(() => { ran = true; return 'ignored'; });
        v + ':' + ran
    "#;
    assert_eq!(eval(script), "kept:true");
}

#[test]
fn with_resolvers_exposes_the_functions() {
    assert_eq!(eval("const { promise, resolve } = Promise.withResolvers(); resolve(9); await promise"), "9");
}

#[test]
fn thenables_are_adopted() {
    assert_eq!(eval("await { then(ok) { ok('from thenable'); } }"), "from thenable");
}

#[test]
fn event_loop_runs_leftover_timers() {
    let realm = Realm::new();
    let options = || EvaluateOptions::default().realm(realm.clone());
    evaluate("var fired = 0; setTimeout(() => { fired++; }, 5); setTimeout(() => { fired++; }, 10);", options()).unwrap();
    assert!(realm.has_pending_work());
    realm.run_event_loop().unwrap();
    assert!(!realm.has_pending_work());
    let v = evaluate("fired", options()).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "2");
}

#[test]
fn pending_evaluation_is_a_future() {
    let evaluation = evaluate("await new Promise(r => setTimeout(() => r('done'), 5))", EvaluateOptions::default()).unwrap();
    let Evaluation::Pending(pending) = evaluation else {
        panic!("expected a pending evaluation");
    };
    let v = futures::executor::block_on(pending).unwrap();
    assert_eq!(display_value(&v), "done");
}

#[test]
fn unhandled_rejections_are_reported_to_the_console() {
    let sink = Rc::new(Captured::default());
    let options = EvaluateOptions::default().debug_sink(sink.clone());
    evaluate("Promise.reject(new Error('lost')); Promise.reject(1).catch(() => {}); 'done'", options).unwrap();
    let lines = sink.lines.borrow();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(matches!(lines[0].0, ConsoleLevel::Error));
    assert!(lines[0].1.starts_with("Uncaught (in promise) Error: lost"), "{lines:?}");
}

#[test]
fn errors_thrown_by_timer_callbacks_are_logged() {
    let sink = Rc::new(Captured::default());
    let options = EvaluateOptions::default().debug_sink(sink.clone());
    let script = "setTimeout(() => { throw new RangeError('late'); }, 1); await new Promise(r => setTimeout(r, 10)); 'survived'";
    let v = evaluate(script, options).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "survived");
    let lines = sink.lines.borrow();
    assert!(lines.iter().any(|(_, l)| l.starts_with("Uncaught RangeError: late")), "{lines:?}");
}
