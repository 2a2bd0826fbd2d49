use jsconsole::{EvaluateOptions, Realm, display_value, evaluate, evaluate_to_value};

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

#[test]
fn to_string_returns_the_exact_source_slice() {
    assert_eq!(eval("function f(){return 1}; f.toString()"), "function f(){return 1}");
    assert_eq!(eval("function  spaced ( a,b )  {\n  return a }\nspaced.toString()"), "function  spaced ( a,b )  {\n  return a }");
    assert_eq!(eval("const a = (x) =>  x + 1; a.toString()"), "(x) =>  x + 1");
    assert_eq!(eval("({ m(a) { return a } }).m.toString()"), "m(a) { return a }");
    assert_eq!(eval("(async function named() { await 1 }).toString()"), "async function named() { await 1 }");
}

#[test]
fn native_and_bound_functions_render_as_native_code() {
    assert_eq!(eval("Math.max.toString()"), "function max() { [native code] }");
    assert_eq!(eval("(function () {}).bind(null).toString()"), "function () { [native code] }");
}

#[test]
fn name_and_length() {
    assert_eq!(eval("function g(a, b = 1, ...c) {} [g.name, g.length].join()"), "g,1");
    assert_eq!(eval("const h = function () {}; const k = () => {}; [h.name, k.name].join()"), "h,k");
    assert_eq!(eval("const o = { method() {}, ['comp' + 'uted']: () => 0 }; [o.method.name, o.computed.name].join()"), "method,computed");
    assert_eq!(eval("function rest(...args) {} rest.length"), "0");
}

#[test]
fn sloppy_arguments_alias_simple_parameters() {
    assert_eq!(eval("function f(a) { arguments[0] = 2; return a; } f(1)"), "2");
    assert_eq!(eval("function f(a) { a = 3; return arguments[0]; } f(1)"), "3");
    assert_eq!(eval("function f(a) { 'use strict'; arguments[0] = 2; return a; } f(1)"), "1");
    assert_eq!(eval("function f(a = 0) { arguments[0] = 2; return a; } f(1)"), "1");
    assert_eq!(eval("function f(a) { return arguments.length; } f(1, 2, 3)"), "3");
}

#[test]
fn this_binding_depends_on_function_kind() {
    assert_eq!(eval("function t() { return this; } t() === globalThis"), "true");
    assert_eq!(eval("function s() { 'use strict'; return this; } typeof s()"), "undefined");
    assert_eq!(eval("function b() { return typeof this; } b.call(5)"), "object");
    assert_eq!(eval("const o = { v: 1, m() { return [1].map(() => this.v); } }; o.m()[0]"), "1");
}

#[test]
fn bind_call_and_apply() {
    let script = r#"
        function add(a, b) { return a + b + (this && this.base || 0); }
        const inc = add.bind(null, 1);
        [inc(2), inc.name, inc.length, add.call({ base: 10 }, 1, 2), add.apply({ base: 100 }, [1, 2])].join()
    "#;
    assert_eq!(eval(script), "3,bound add,1,13,103");
}

#[test]
fn bound_constructor_ignores_bound_this() {
    let script = r#"
        function P(x) { this.x = x; }
        const BP = P.bind({ ignored: true }, 4);
        const p = new BP();
        [p.x, p instanceof P, p.ignored].join()
    "#;
    assert_eq!(eval(script), "4,true,");
}

#[test]
fn default_parameters_see_earlier_parameters() {
    assert_eq!(eval("function f(a, b = a * 2, c = () => a + b) { return c(); } f(3)"), "9");
}

#[test]
fn destructured_parameters() {
    let script = r#"
        function f({ a, b: [x, , y = 5] = [] }, ...rest) { return [a, x, y, rest.length].join(); }
        f({ a: 1, b: [2, 3] }, 'r1', 'r2')
    "#;
    assert_eq!(eval(script), "1,2,5,2");
}

#[test]
fn recursion_beyond_the_depth_limit_is_a_range_error() {
    let realm = Realm::new();
    realm.set_max_call_depth(40);
    let script = r#"
        function r(n) { return r(n + 1); }
        try { r(0); } catch (e) { (e instanceof RangeError) + ':' + e.message }
    "#;
    let v = evaluate(script, EvaluateOptions::default().realm(realm)).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "true:Maximum call stack size exceeded");
}

#[test]
fn default_depth_limit_throws_instead_of_overflowing() {
    let script = r#"
        function r() { r(); }
        try { r(); } catch (e) { e.name + ':' + e.message }
    "#;
    assert_eq!(eval(script), "RangeError:Maximum call stack size exceeded");
    assert_eq!(eval("var d = 0; function f() { d++; if (d < 200) f(); } f(); d"), "200");
}

#[test]
fn deep_recursion_through_getters_and_constructors() {
    let script = r#"
        const o = { get down() { return this.n-- > 0 ? this.down : 'bottom'; }, n: 100 };
        class Node { constructor(k) { this.next = k > 0 ? new Node(k - 1) : null; } }
        let len = 0;
        for (let p = new Node(100); p; p = p.next) len++;
        o.down + ':' + len
    "#;
    assert_eq!(eval(script), "bottom:101");
}

#[test]
fn calling_a_non_function_names_the_callee() {
    let err = evaluate_to_value("const o = {}; o.missing()").unwrap_err();
    assert!(err.to_string().contains("TypeError: o.missing is not a function"), "{err}");
}

#[test]
fn generator_functions_are_unsupported() {
    let err = evaluate_to_value("function* gen() { yield 1; } gen()").unwrap_err();
    assert!(err.is_internal(), "{err:?}");
    assert!(matches!(err, jsconsole::JSError::Unsupported { .. }));
}

#[test]
fn immediately_invoked_and_nested_closures() {
    let script = r#"
        const make = (function () {
            let secret = 'inner';
            return function (suffix) { return () => secret + suffix; };
        })();
        make('!')()
    "#;
    assert_eq!(eval(script), "inner!");
}
