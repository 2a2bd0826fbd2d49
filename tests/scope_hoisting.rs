use jsconsole::{EvaluateOptions, JSError, Realm, Value, display_value, evaluate, evaluate_to_value};

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

fn eval_err(script: &str) -> JSError {
    match evaluate_to_value(script) {
        Ok(v) => panic!("{script}: expected an error, got {v:?}"),
        Err(e) => e,
    }
}

#[test]
fn var_is_declared_on_global_before_its_statement_runs() {
    let script = r#"
        {
            const d = Object.getOwnPropertyDescriptor(global, 'x');
            var x = 1;
            [d.value === undefined, d.writable, d.enumerable, d.configurable].join()
        }
    "#;
    assert_eq!(eval(script), "true,true,true,false");
}

#[test]
fn let_read_before_declaration_is_in_tdz() {
    let err = eval_err("x; let x;");
    assert!(err.to_string().contains("before initialization"), "{err}");
    assert!(matches!(err, JSError::Thrown { .. }));

    let v = evaluate_to_value("x; var x;").unwrap();
    assert!(matches!(v, Value::Undefined));
}

#[test]
fn tdz_error_is_a_catchable_reference_error() {
    let script = "try { y; let y = 1; } catch (e) { e instanceof ReferenceError }";
    assert_eq!(eval(&format!("{{ {script} }}")), "true");
    assert_eq!(eval("let r; try { z; } catch (e) { r = e.constructor === ReferenceError } let z = 2; r"), "true");
}

#[test]
fn let_loop_closures_capture_each_iteration() {
    let script = r#"
        const fns = [];
        for (let i = 0; i < 3; i++) fns.push(() => i);
        fns.map(f => f()).join()
    "#;
    assert_eq!(eval(script), "0,1,2");
}

#[test]
fn var_loop_closures_share_one_binding() {
    let script = r#"
        const fns = [];
        for (var i = 0; i < 3; i++) fns.push(() => i);
        fns.map(f => f()).join()
    "#;
    assert_eq!(eval(script), "3,3,3");
}

#[test]
fn lexical_redeclaration_is_an_error() {
    let err = eval_err("let a = 1; let a = 2;");
    assert!(err.to_string().contains("SyntaxError: Identifier 'a' has already been declared"), "{err}");
    assert_eq!(eval("var b = 1; var b = 2; b"), "2");
}

#[test]
fn sloppy_block_function_is_copied_to_the_var_scope_on_exit() {
    let script = r#"
        const before = typeof f;
        { function f() { return 1; } }
        [before, typeof f, f()].join()
    "#;
    assert_eq!(eval(script), "undefined,function,1");
}

#[test]
fn sloppy_block_function_copy_reflects_value_at_exit() {
    let script = r#"
        {
            function g() { return 'first'; }
            g = function () { return 'second'; };
        }
        g()
    "#;
    // The lexical binding was reassigned, the copy is taken when the block completes.
    assert_eq!(eval(script), "second");
}

#[test]
fn strict_block_function_stays_in_its_block() {
    let script = r#"
        'use strict';
        { function h() {} }
        typeof h
    "#;
    assert_eq!(eval(script), "undefined");
}

#[test]
fn sloppy_function_as_if_branch_behaves_like_a_braced_one() {
    assert_eq!(eval("if (true) function h() { return 'h'; } typeof h + ':' + h()"), "function:h");
    assert_eq!(eval("if (false) ; else function k() {} typeof k"), "function");
    assert_eq!(eval("var before = typeof skipped; if (false) function skipped() {} before + ',' + typeof skipped"), "undefined,undefined");
}

#[test]
fn assignment_to_undeclared_name() {
    assert_eq!(eval("implicitGlobal = 5; globalThis.implicitGlobal"), "5");
    let err = eval_err("'use strict'; undeclaredStrict = 1;");
    assert!(err.to_string().contains("undeclaredStrict is not defined"), "{err}");
}

#[test]
fn read_only_global_assignment() {
    assert_eq!(eval("undefined = 1; typeof undefined"), "undefined");
    let err = eval_err("'use strict'; NaN = 1;");
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn const_assignment_throws() {
    let err = eval_err("const c = 1; c = 2;");
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn function_declarations_are_hoisted_with_their_value() {
    assert_eq!(eval("const r = early(); function early() { return 'ok'; } r"), "ok");
}

#[test]
fn closures_see_later_assignments() {
    let script = r#"
        function counter() {
            let n = 0;
            return { inc: () => ++n, get: () => n };
        }
        const c = counter();
        c.inc(); c.inc();
        c.get()
    "#;
    assert_eq!(eval(script), "2");
}

#[test]
fn realm_keeps_bindings_across_evaluations() {
    let realm = Realm::new();
    let options = || EvaluateOptions::default().realm(realm.clone());
    evaluate("let kept = 40; var alsoKept = 2;", options()).unwrap();
    let v = evaluate("kept + alsoKept", options()).unwrap().into_value().unwrap();
    assert!(matches!(v, Value::Number(n) if n == 42.0));
    let names = realm.global_scope.binding_names();
    assert!(names.iter().any(|n| &**n == "kept"));
}
