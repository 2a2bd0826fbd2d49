use jsconsole::{JSError, display_value, evaluate_to_value};

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
fn switch_falls_through_and_honors_default_position() {
    let script = r#"
        function classify(x) {
            const out = [];
            switch (x) {
                case 1: out.push('one');
                default: out.push('default');
                case 2: out.push('two'); break;
                case 3: out.push('three');
            }
            return out.join('+');
        }
        [classify(1), classify(2), classify(3), classify(9)].join('|')
    "#;
    assert_eq!(eval(script), "one+default+two|two|three|default+two");
    assert_eq!(eval("switch ('1') { case 1: 'number'; break; case '1': 'string'; }"), "string");
}

#[test]
fn labeled_break_and_continue() {
    let script = r#"
        const hits = [];
        outer: for (let i = 0; i < 3; i++) {
            for (let j = 0; j < 3; j++) {
                if (j === 1) continue outer;
                if (i === 2) break outer;
                hits.push(i + '' + j);
            }
        }
        block: { hits.push('in'); break block; hits.push('never'); }
        hits.join()
    "#;
    assert_eq!(eval(script), "00,10,in");
}

#[test]
fn loop_completion_values() {
    assert_eq!(eval("let i = 0; while (i < 3) { i++; }"), "2");
    assert_eq!(eval("let n = 0; do { n += 2; } while (n < 5); n"), "6");
    assert_eq!(eval("1; for (const x of []) { x; }"), "undefined");
}

#[test]
fn for_in_walks_enumerable_keys_including_inherited() {
    let script = r#"
        const base = { inherited: 1 };
        const o = Object.create(base);
        o.b = 1; o[2] = 1; o.a = 1;
        Object.defineProperty(o, 'hidden', { value: 1, enumerable: false });
        const keys = [];
        for (const k in o) keys.push(k);
        keys.join()
    "#;
    assert_eq!(eval(script), "2,b,a,inherited");
    assert_eq!(eval("let n = 0; for (const k in null) n++; for (const k in undefined) n++; n"), "0");
}

#[test]
fn finally_overrides_and_preserves_completions() {
    assert_eq!(eval("function f() { try { return 'try'; } finally { return 'finally'; } } f()"), "finally");
    assert_eq!(eval("function f() { try { throw 1; } catch (e) { return 'caught'; } finally { } } f()"), "caught");
    let script = r#"
        const log = [];
        function g() { try { return log.push('body'); } finally { log.push('cleanup'); } }
        g();
        log.join()
    "#;
    assert_eq!(eval(script), "body,cleanup");
    assert_eq!(eval("function h() { for (;;) { try { break; } finally { return 'from finally'; } } } h()"), "from finally");
}

#[test]
fn catch_binding_forms() {
    assert_eq!(eval("try { throw { code: 4, msg: 'x' }; } catch ({ code, msg }) { code + msg }"), "4x");
    assert_eq!(eval("try { throw 1; } catch { 'no binding' }"), "no binding");
    assert_eq!(eval("let e = 'outer'; try { throw 'inner'; } catch (e) { } e"), "outer");
}

#[test]
fn optional_chaining_short_circuits_the_whole_chain() {
    let script = r#"
        let calls = 0;
        const effect = () => { calls++; return 'k'; };
        const o = null;
        const a = o?.deep[effect()].more;
        const b = o?.method(effect());
        const c = ({ f: null }).f?.();
        [a, b, c, calls].join()
    "#;
    assert_eq!(eval(script), ",,,0");
    assert_eq!(eval("const o = { m() { return this.v; }, v: 5 }; o?.m()"), "5");
    assert_eq!(eval("const o = { a: { b: 0 } }; o?.a?.b ?? 'fallback'"), "0");
}

#[test]
fn nullish_and_logical_assignment() {
    let script = r#"
        const o = { a: 0, b: null, c: 'set' };
        let evaluated = 0;
        const rhs = (v) => { evaluated++; return v; };
        o.a ||= rhs(1);
        o.b ??= rhs(2);
        o.c ??= rhs(3);
        o.c &&= rhs('and');
        [o.a, o.b, o.c, evaluated].join()
    "#;
    assert_eq!(eval(script), "1,2,and,3");
    assert_eq!(eval("[null ?? 'd', 0 ?? 'd', '' || 'e', 1 && 2].join()"), "d,0,e,2");
}

#[test]
fn logical_assignment_on_frozen_objects_skips_the_write() {
    assert_eq!(eval("'use strict'; const o = Object.freeze({ a: 1 }); o.a ||= 2; o.a"), "1");
}

#[test]
fn operators() {
    assert_eq!(eval("[2 ** 3 ** 2, (-2) ** 2, 7 % -3, -7 % 3, 5 / 0, -5 / 0].join()"), "512,4,1,-1,Infinity,-Infinity");
    assert_eq!(eval("[1 << 31, -1 >>> 28, ~5, 6 & 3, 6 | 3, 6 ^ 3, -16 >> 2].join()"), "-2147483648,15,-6,2,7,5,-4");
    assert_eq!(eval("['5' * '2', '5' + 2, '5' - 2, true + 1, [] + {}, null + 1, undefined + 1].join()"), "10,52,3,2,[object Object],1,NaN");
    assert_eq!(eval("[1 < 2 < 3, 3 > 2 > 1, '10' < '9', 10 < 9, null == undefined, null === undefined, NaN == NaN].join()"), "true,false,true,false,true,false,false");
    assert_eq!(eval("let x = 1; const y = (x++, x++, x); [x, y, void 0, typeof undeclaredThing].join()"), "3,3,,undefined");
}

#[test]
fn instanceof_and_in() {
    assert_eq!(eval("class A {} class B extends A {} [new B() instanceof A, [] instanceof Object, 'length' in [], 0 in [1]].join()"), "true,true,true,true");
    assert_eq!(eval("const Even = { [Symbol.hasInstance](n) { return n % 2 === 0; } }; [2 instanceof Even, 3 instanceof Even].join()"), "true,false");
    let err = evaluate_to_value("'a' in 'abc'").unwrap_err();
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn destructuring_assignment_and_defaults() {
    let script = r#"
        let a, b, rest;
        [a, b = 'dflt', ...rest] = [1, undefined, 3, 4];
        let x, y;
        ({ x, y: { z: y } = { z: 'nested' } } = { x: 'X' });
        [a, b, rest.join('+'), x, y].join()
    "#;
    assert_eq!(eval(script), "1,dflt,3+4,X,nested");
    assert_eq!(eval("let p = 1, q = 2; [p, q] = [q, p]; p + ':' + q"), "2:1");
    assert_eq!(eval("const { a, ...others } = { a: 1, b: 2, c: 3 }; Object.keys(others).join()"), "b,c");
    let err = evaluate_to_value("const { a } = null;").unwrap_err();
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn spread_in_calls_and_literals() {
    assert_eq!(eval("function sum(...n) { return n.reduce((a, b) => a + b, 0); } sum(...[1, 2], 3, ...new Set([4]))"), "10");
    assert_eq!(eval("[...'hi', ...[1, 2]].join()"), "h,i,1,2");
    let err = evaluate_to_value("[...{}]").unwrap_err();
    assert!(err.to_string().contains("is not iterable"), "{err}");
}

#[test]
fn getters_run_for_every_read_in_conditions() {
    let script = r#"
        let reads = 0;
        const o = { get v() { reads++; return reads < 3; } };
        while (o.v) {}
        reads
    "#;
    assert_eq!(eval(script), "3");
}

#[test]
fn comma_in_for_headers_and_update_expressions() {
    assert_eq!(eval("let out = ''; for (let i = 0, j = 3; i < j; i++, j--) out += i + '' + j + ' '; out.trim()"), "03 12");
    assert_eq!(eval("const o = { n: 1 }; const before = o.n++; const after = ++o.n; [before, after, o.n].join()"), "1,3,3");
}

#[test]
fn with_statement_is_rejected() {
    let err = evaluate_to_value("with ({}) {}").unwrap_err();
    assert!(matches!(err, JSError::SyntaxError { .. } | JSError::Unsupported { .. }), "{err:?}");
}

#[test]
fn empty_template_substitution_is_a_syntax_error() {
    let err = evaluate_to_value("`a${}b`").unwrap_err();
    assert!(matches!(&err, JSError::SyntaxError { message, .. } if message == "Unexpected token '}'"), "{err:?}");
}
