use jsconsole::{EvaluateOptions, JSObjectDataPtr, Metadata, PromiseState, Realm, Value, display_value, evaluate};
use std::rc::Rc;

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).is_test(true).try_init();
}

fn object(realm: &Rc<Realm>, script: &str) -> JSObjectDataPtr {
    match evaluate(script, EvaluateOptions::default().realm(realm.clone())).unwrap().into_value().unwrap() {
        Value::Object(obj) => obj,
        other => panic!("{script}: expected an object, got {other:?}"),
    }
}

#[test]
fn promise_slots() {
    let realm = Realm::new();
    let pending = object(&realm, "new Promise(() => {})");
    let info = realm.metadata.promise_info(&pending).unwrap();
    assert!(matches!(info.state, PromiseState::Pending));
    assert!(!info.handled);

    let fulfilled = object(&realm, "Promise.resolve(41 + 1)");
    match realm.metadata.promise_info(&fulfilled).unwrap().state {
        PromiseState::Fulfilled(v) => assert_eq!(display_value(&v), "42"),
        other => panic!("{other:?}"),
    }

    let rejected = object(&realm, "var r = Promise.reject('why'); r.catch(() => {}); r");
    let info = realm.metadata.promise_info(&rejected).unwrap();
    assert!(matches!(info.state, PromiseState::Rejected(Value::String(ref s)) if &**s == "why"));
    assert!(info.handled);

    let plain = object(&realm, "({})");
    assert!(realm.metadata.promise_info(&plain).is_none());
}

#[test]
fn proxy_slots_and_revocation() {
    let realm = Realm::new();
    let target = object(&realm, "var t = { a: 1 }; var h = {}; var pair = Proxy.revocable(t, h); t");
    let handler = object(&realm, "h");
    let proxy = object(&realm, "pair.proxy");
    let info = realm.metadata.proxy_info(&proxy).unwrap();
    assert!(!info.revoked);
    assert!(Rc::ptr_eq(info.target.as_ref().unwrap(), &target));
    assert!(Rc::ptr_eq(info.handler.as_ref().unwrap(), &handler));

    evaluate("pair.revoke()", EvaluateOptions::default().realm(realm.clone())).unwrap();
    let info = realm.metadata.proxy_info(&proxy).unwrap();
    assert!(info.revoked);
    assert!(info.target.is_none() && info.handler.is_none());
    assert!(realm.metadata.proxy_info(&target).is_none());
}

#[test]
fn user_function_details() {
    let realm = Realm::new();
    let arrow = object(&realm, "var add = async (a, b) => a + b; add");
    let info = realm.metadata.function_info(&arrow).unwrap();
    assert_eq!(&*info.name, "add");
    assert_eq!(info.source_text.as_deref(), Some("async (a, b) => a + b"));
    assert!(info.is_arrow && info.is_async);
    assert!(!info.is_native && !info.constructable && !info.is_class);

    let class = object(&realm, "class Shape { area() { return 0; } } Shape");
    let info = realm.metadata.function_info(&class).unwrap();
    assert!(info.is_class && info.constructable);
    assert_eq!(info.source_text.as_deref(), Some("class Shape { area() { return 0; } }"));

    let method = object(&realm, "Shape.prototype.area");
    let proto = object(&realm, "Shape.prototype");
    let info = realm.metadata.function_info(&method).unwrap();
    assert!(Rc::ptr_eq(info.home_object.as_ref().unwrap(), &proto));
    assert!(!info.constructable);
}

#[test]
fn native_and_bound_function_details() {
    let realm = Realm::new();
    let native = object(&realm, "Math.max");
    let info = realm.metadata.function_info(&native).unwrap();
    assert!(info.is_native);
    assert_eq!(&*info.name, "max");
    assert!(info.source_text.is_none());

    let target = object(&realm, "var base = function (a, b) { return a + b; }; base");
    let bound = object(&realm, "base.bind('ctx', 1)");
    let info = realm.metadata.function_info(&bound).unwrap();
    assert_eq!(&*info.name, "bound base");
    assert!(Rc::ptr_eq(info.bound_target.as_ref().unwrap(), &target));
    assert_eq!(info.bound_this.as_ref().map(display_value).as_deref(), Some("ctx"));
    assert_eq!(info.bound_args.len(), 1);

    let plain = object(&realm, "({})");
    assert!(realm.metadata.function_info(&plain).is_none());
}

#[test]
fn weak_collection_contents() {
    let realm = Realm::new();
    let map = object(&realm, "var k1 = { id: 1 }; var k2 = { id: 2 }; var wm = new WeakMap([[k1, 'one'], [k2, 'two']]); wm");
    let k1 = object(&realm, "k1");
    let mut entries = realm.metadata.weak_collection_entries(&map).unwrap();
    assert_eq!(entries.len(), 2);
    entries.retain(|e| Rc::ptr_eq(&e.key, &k1));
    assert_eq!(entries[0].value.as_ref().map(display_value).as_deref(), Some("one"));

    let set = object(&realm, "var ws = new WeakSet([k1]); ws");
    let entries = realm.metadata.weak_collection_entries(&set).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].value.is_none());

    let plain = object(&realm, "new Map()");
    assert!(realm.metadata.weak_collection_entries(&plain).is_none());
}

#[test]
fn global_binding_names_are_sorted() {
    let realm = Realm::new();
    evaluate("let zeta = 1; const alpha = 2; class Mid {} var notABinding = 3;", EvaluateOptions::default().realm(realm.clone())).unwrap();
    let names: Vec<String> = realm.global_scope.binding_names().iter().map(|n| n.to_string()).collect();
    assert_eq!(names, vec!["Mid", "alpha", "zeta"]);
}

#[test]
fn caller_supplied_metadata_records_functions() {
    let realm = Realm::new();
    let metadata = Rc::new(Metadata::new());
    let options = EvaluateOptions::default().realm(realm.clone()).metadata(metadata.clone());
    let func = match evaluate("(function traced(x) { return x; })", options).unwrap().into_value().unwrap() {
        Value::Object(f) => f,
        other => panic!("{other:?}"),
    };
    assert!(metadata.function_metadata(&func).is_some());
    assert!(realm.metadata.function_metadata(&func).is_none());
    let info = metadata.function_info(&func).unwrap();
    assert_eq!(info.source_text.as_deref(), Some("function traced(x) { return x; }"));
}
