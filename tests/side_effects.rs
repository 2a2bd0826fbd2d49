use jsconsole::{EvaluateOptions, JSError, PropertyKey, Realm, SideEffectFlags, SideEffectTable, Value, display_value, evaluate};
use std::rc::Rc;

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn run(realm: &Rc<Realm>, script: &str) -> Result<Value, JSError> {
    evaluate(script, EvaluateOptions::default().realm(realm.clone()))?.into_value()
}

fn dry_run(realm: &Rc<Realm>, script: &str) -> Result<Value, JSError> {
    evaluate(script, EvaluateOptions::default().realm(realm.clone()).throw_on_side_effect(true))?.into_value()
}

fn assert_side_effect(result: Result<Value, JSError>) {
    match result {
        Err(JSError::PossibleSideEffect { .. }) => {}
        other => panic!("expected a possible side effect, got {other:?}"),
    }
}

fn global_has(realm: &Realm, name: &str) -> bool {
    realm.global_object.borrow().get_own(&PropertyKey::from(name)).is_some()
}

#[test]
fn writing_a_global_property_is_refused_and_leaves_it_untouched() {
    let realm = Realm::new();
    run(&realm, "var globalObj = { b: 1 };").unwrap();
    assert_side_effect(dry_run(&realm, "globalObj.a = 1"));
    assert_eq!(display_value(&run(&realm, "'a' in globalObj").unwrap()), "false");

    assert_side_effect(dry_run(&realm, "fresh = 1"));
    assert!(!global_has(&realm, "fresh"));
}

#[test]
fn reads_and_pure_builtins_are_allowed() {
    let realm = Realm::new();
    run(&realm, "var data = { items: [3, 1, 2], name: 'list' };").unwrap();
    let v = dry_run(&realm, "data.items.map(x => x * 2).filter(x => x > 2).join('-') + data.name.toUpperCase()").unwrap();
    assert_eq!(display_value(&v), "6-4LIST");
    let v = dry_run(&realm, "JSON.stringify(Object.keys(data)) + Math.max(...data.items)").unwrap();
    assert_eq!(display_value(&v), "[\"items\",\"name\"]3");
}

#[test]
fn mutating_temporaries_is_allowed() {
    let realm = Realm::new();
    let script = r#"
        const acc = [];
        for (let i = 0; i < 3; i++) acc.push(i * i);
        const m = new Map([['k', 1]]);
        m.set('k', m.get('k') + 1);
        const o = {};
        o.total = acc.reduce((a, b) => a + b, 0);
        o.total + m.get('k')
    "#;
    assert_eq!(display_value(&dry_run(&realm, script).unwrap()), "7");
}

#[test]
fn declarations_do_not_leak_out_of_a_dry_run() {
    let realm = Realm::new();
    let v = dry_run(&realm, "var leaked = 1; let alsoLeaked = 2; function leakedFn() {} leaked + alsoLeaked").unwrap();
    assert_eq!(display_value(&v), "3");
    assert!(!global_has(&realm, "leaked"));
    assert!(!global_has(&realm, "leakedFn"));
    assert!(realm.global_scope.binding_names().iter().all(|n| &**n != "alsoLeaked"));
}

#[test]
fn mutating_builtins_on_existing_objects_is_refused() {
    let realm = Realm::new();
    run(&realm, "var arr = [1, 2]; var m = new Map();").unwrap();
    assert_side_effect(dry_run(&realm, "arr.push(3)"));
    assert_side_effect(dry_run(&realm, "m.set('a', 1)"));
    assert_side_effect(dry_run(&realm, "delete arr[0]"));
    assert_side_effect(dry_run(&realm, "Object.freeze(arr)"));
    assert_eq!(display_value(&run(&realm, "arr.length + m.size").unwrap()), "2");
}

#[test]
fn unclassified_natives_are_refused() {
    let realm = Realm::new();
    assert_side_effect(dry_run(&realm, "console.log('hi')"));
    assert_side_effect(dry_run(&realm, "setTimeout(() => {}, 10)"));
    assert!(realm.timers.borrow().is_empty());
}

#[test]
fn callbacks_of_pure_builtins_are_checked() {
    let realm = Realm::new();
    run(&realm, "var log = [];").unwrap();
    assert_side_effect(dry_run(&realm, "[1, 2].map(console.log)"));
    // User callbacks run under the same checks.
    assert_side_effect(dry_run(&realm, "[1, 2].forEach(x => log.push(x))"));
    assert_eq!(display_value(&run(&realm, "log.length").unwrap()), "0");
}

#[test]
fn user_functions_run_under_the_same_checks() {
    let realm = Realm::new();
    run(&realm, "var counter = 0; function bump() { counter++; return counter; } function twice(x) { return x * 2; }").unwrap();
    assert_eq!(display_value(&dry_run(&realm, "twice(21)").unwrap()), "42");
    assert_side_effect(dry_run(&realm, "bump()"));
    assert_eq!(display_value(&run(&realm, "counter").unwrap()), "0");
}

#[test]
fn await_is_refused_in_a_dry_run() {
    let realm = Realm::new();
    assert_side_effect(dry_run(&realm, "await 1"));
}

#[test]
fn custom_table_classifies_host_functions() {
    let realm = Realm::new();
    run(&realm, "var answer = () => 42;").unwrap();
    // A table without any entries refuses even pure built-ins.
    let empty = Rc::new(SideEffectTable::new());
    let options = EvaluateOptions::default()
        .realm(realm.clone())
        .throw_on_side_effect(true)
        .side_effect_table(empty.clone());
    assert_side_effect(evaluate("Math.abs(-1)", options.clone()).and_then(|e| e.into_value()));

    let abs = match run(&realm, "Math.abs").unwrap() {
        Value::Object(f) => f,
        other => panic!("{other:?}"),
    };
    empty.register(&abs, SideEffectFlags::PURE);
    let v = evaluate("Math.abs(-1) + answer()", options).unwrap().into_value().unwrap();
    assert_eq!(display_value(&v), "43");
}

#[test]
fn thrown_errors_in_a_dry_run_are_ordinary_exceptions() {
    let realm = Realm::new();
    let err = dry_run(&realm, "null.x").unwrap_err();
    assert!(matches!(err, JSError::Thrown { .. }), "{err:?}");
    assert!(err.to_string().contains("TypeError"));
}

#[test]
fn symbol_keyed_builtins_are_classified() {
    let realm = Realm::new();
    run(&realm, "function F() {} var made = new F(); var word = 'ab';").unwrap();
    let cases = [
        ("made instanceof F", "true"),
        ("[...'ab'].join()", "a,b"),
        ("let out = ''; for (const c of word) out += c + c; out", "aabb"),
        ("Array.from('ab').length", "2"),
        ("[...[1, 2].entries()].join('|')", "0,1|1,2"),
        ("[...new Map([[1, 'x']]).keys()].join()", "1"),
    ];
    for (script, expected) in cases {
        match dry_run(&realm, script) {
            Ok(v) => assert_eq!(display_value(&v), expected, "{script}"),
            Err(e) => panic!("{script}: {e:?}"),
        }
    }
}
