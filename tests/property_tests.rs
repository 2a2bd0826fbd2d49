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

fn eval_err(script: &str) -> JSError {
    match evaluate_to_value(script) {
        Ok(v) => panic!("{script}: expected an error, got {v:?}"),
        Err(e) => e,
    }
}

#[test]
fn proto_in_literal_sets_the_prototype() {
    let script = r#"
        const p = { greet() { return 'hi'; } };
        const o = { __proto__: p, own: 1 };
        [o.greet(), Object.getPrototypeOf(o) === p, Object.keys(o).join()].join('|')
    "#;
    assert_eq!(eval(script), "hi|true|own");
    assert_eq!(eval("Object.getPrototypeOf({ __proto__: null }) === null"), "true");
    assert_eq!(eval("Object.keys({ ['__proto__']: 1 }).join()"), "__proto__");
}

#[test]
fn own_keys_order_integers_first() {
    assert_eq!(eval("Object.keys({ b: 1, 2: 1, a: 1, 1: 1 }).join()"), "1,2,b,a");
    let script = "const s = Symbol('s'); const o = { [s]: 1, z: 2, 0: 3 }; Reflect.ownKeys(o).map(String).join()";
    assert_eq!(eval(script), "0,z,Symbol(s)");
}

#[test]
fn array_holes_are_absent_indices() {
    assert_eq!(eval("const a = [1, , 3]; [a.length, 1 in a, Object.keys(a).join('+')].join()"), "3,false,0+2");
    assert_eq!(eval("const a = [1, 2, 3]; a.length = 1; [a.join(), 2 in a].join()"), "1,false");
    assert_eq!(eval("const a = []; a[4] = 'x'; a.length"), "5");
}

#[test]
fn accessors_receive_the_receiver() {
    let script = r#"
        const base = { get doubled() { return this.v * 2; }, set doubled(x) { this.v = x / 2; } };
        const child = Object.create(base);
        child.v = 3;
        const before = child.doubled;
        child.doubled = 20;
        [before, child.v, Object.hasOwn(base, 'v')].join()
    "#;
    assert_eq!(eval(script), "6,10,false");
}

#[test]
fn getter_only_property_ignores_sloppy_writes() {
    assert_eq!(eval("const o = { get g() { return 1; } }; o.g = 5; o.g"), "1");
    let err = eval_err("'use strict'; const o = { get g() { return 1; } }; o.g = 5;");
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn define_property_defaults_to_locked_attributes() {
    let script = r#"
        const o = {};
        Object.defineProperty(o, 'x', { value: 1 });
        o.x = 2;
        const d = Object.getOwnPropertyDescriptor(o, 'x');
        [o.x, d.writable, d.enumerable, d.configurable, Object.keys(o).length].join()
    "#;
    assert_eq!(eval(script), "1,false,false,false,0");
    let err = eval_err("const o = {}; Object.defineProperty(o, 'x', { value: 1 }); Object.defineProperty(o, 'x', { value: 2 });");
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn frozen_and_sealed_objects() {
    let script = r#"
        'use strict';
        const o = Object.freeze({ a: 1, nested: { b: 1 } });
        let threw = false;
        try { o.a = 2; } catch (e) { threw = e instanceof TypeError; }
        o.nested.b = 2;
        [threw, o.a, o.nested.b, Object.isFrozen(o), Object.isSealed(o)].join()
    "#;
    assert_eq!(eval(script), "true,1,2,true,true");
    let script = "const s = Object.seal({ a: 1 }); s.a = 2; s.b = 3; delete s.a; [s.a, 'b' in s, Object.isExtensible(s)].join()";
    assert_eq!(eval(script), "2,false,false");
}

#[test]
fn delete_semantics() {
    assert_eq!(eval("const o = { a: 1 }; [delete o.a, 'a' in o, delete o.missing].join()"), "true,false,true");
    assert_eq!(eval("delete Math.PI"), "false");
    let err = eval_err("'use strict'; delete Math.PI;");
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn spread_and_assign_copy_own_enumerable_properties() {
    let script = r#"
        const proto = { inherited: 1 };
        const src = Object.create(proto);
        src.own = 2;
        Object.defineProperty(src, 'hidden', { value: 3, enumerable: false });
        const a = { ...src };
        const b = Object.assign({}, src, null, { extra: 4 });
        [Object.keys(a).join(), Object.keys(b).join()].join('|')
    "#;
    assert_eq!(eval(script), "own|own,extra");
}

#[test]
fn entries_and_from_entries() {
    assert_eq!(eval("Object.entries({ a: 1, b: 2 }).map(([k, v]) => k + v).join()"), "a1,b2");
    assert_eq!(eval("const o = Object.fromEntries(new Map([['x', 1], ['y', 2]])); o.x + o.y"), "3");
}

#[test]
fn proxy_traps_intercept_operations() {
    let script = r#"
        const log = [];
        const target = { a: 1 };
        const p = new Proxy(target, {
            get(t, k, r) { log.push('get ' + String(k)); return k in t ? t[k] : 'default'; },
            set(t, k, v) { log.push('set ' + k); t[k] = v * 10; return true; },
            has(t, k) { return k === 'virtual' || k in t; },
            deleteProperty(t, k) { log.push('delete ' + k); return delete t[k]; },
        });
        p.b = 2;
        const read = [p.a, p.b, p.missing];
        const has = ['virtual' in p, 'nope' in p];
        delete p.a;
        [read.join(), has.join(), log.join(';'), Object.keys(target).join()].join('|')
    "#;
    assert_eq!(
        eval(script),
        "1,20,default|true,false|set b;get a;get b;get missing;delete a|b"
    );
}

#[test]
fn proxy_without_traps_forwards_to_the_target() {
    assert_eq!(eval("const t = { x: 1 }; const p = new Proxy(t, {}); p.y = 2; [p.x, t.y, Object.keys(p).join()].join()"), "1,2,x,y");
}

#[test]
fn proxy_invariants_are_enforced() {
    let script = r#"
        const t = {};
        Object.defineProperty(t, 'fixed', { value: 1, writable: false, configurable: false });
        const p = new Proxy(t, { get() { return 2; } });
        try { p.fixed; 'no error' } catch (e) { e instanceof TypeError }
    "#;
    assert_eq!(eval(script), "true");
}

#[test]
fn callable_proxies_and_revocation() {
    let script = r#"
        const f = new Proxy(function (a, b) { return a + b; }, {
            apply(target, thisArg, args) { return target(...args) * 2; },
        });
        const { proxy, revoke } = Proxy.revocable({ v: 1 }, {});
        const before = proxy.v;
        revoke();
        let revoked = false;
        try { proxy.v; } catch (e) { revoked = e instanceof TypeError; }
        [f(1, 2), typeof f, before, revoked].join()
    "#;
    assert_eq!(eval(script), "6,function,1,true");
}

#[test]
fn reflect_mirrors_internal_methods() {
    let script = r#"
        class Point { constructor(x) { this.x = x; } }
        const p = Reflect.construct(Point, [3]);
        const o = {};
        [
            p.x,
            Reflect.has(p, 'x'),
            Reflect.apply(Math.max, null, [1, 5, 2]),
            Reflect.defineProperty(o, 'k', { value: 1 }),
            Reflect.set(o, 'k', 2),
            Reflect.getPrototypeOf(p) === Point.prototype,
            Reflect.ownKeys(p).join(),
        ].join()
    "#;
    assert_eq!(eval(script), "3,true,5,true,false,true,x");
}

#[test]
fn symbols_as_property_keys() {
    let script = r#"
        const tag = Symbol('tag');
        const o = { [tag]: 'hidden', visible: 1 };
        [o[tag], Object.keys(o).length, Object.getOwnPropertySymbols(o).length, JSON.stringify(o)].join('|')
    "#;
    assert_eq!(eval(script), "hidden|1|1|{\"visible\":1}");
    assert_eq!(eval("Symbol.for('k') === Symbol.for('k') && Symbol('k') !== Symbol('k')"), "true");
}

#[test]
fn primitive_property_access() {
    assert_eq!(eval("'abc'.length + [1, 2].length + (5).toString().length"), "6");
    let err = eval_err("undefined.x");
    assert!(err.to_string().contains("Cannot read properties of undefined"), "{err}");
}
