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
fn derived_constructor_without_super_throws() {
    let err = eval_err("class A {} class B extends A { constructor() {} } new B()");
    let text = err.to_string();
    assert!(text.contains("ReferenceError: Must call super constructor"), "{text}");
}

#[test]
fn this_before_super_throws() {
    let err = eval_err("class A {} class B extends A { constructor() { this.x = 1; super(); } } new B()");
    assert!(err.to_string().contains("Must call super constructor"), "{err}");
}

#[test]
fn second_super_call_throws() {
    let err = eval_err("class A {} class B extends A { constructor() { super(); super(); } } new B()");
    assert!(err.to_string().contains("may only be called once"), "{err}");
}

#[test]
fn super_inside_arrow_binds_this() {
    let script = r#"
        class A { constructor(v) { this.v = v; } }
        class B extends A { constructor() { const init = () => super(7); init(); this.w = this.v + 1; } }
        const b = new B();
        b.v + b.w
    "#;
    assert_eq!(eval(script), "15");
}

#[test]
fn derived_constructor_may_return_an_object() {
    let script = r#"
        class A {}
        class B extends A { constructor() { return { replaced: true }; } }
        new B().replaced
    "#;
    assert_eq!(eval(script), "true");
}

#[test]
fn default_derived_constructor_forwards_arguments() {
    let script = r#"
        class Point { constructor(x, y) { this.x = x; this.y = y; } }
        class Named extends Point {}
        const p = new Named(1, 2);
        [p.x, p.y, p instanceof Point, Object.getPrototypeOf(Named) === Point].join()
    "#;
    assert_eq!(eval(script), "1,2,true,true");
}

#[test]
fn methods_getters_and_super_property_access() {
    let script = r#"
        class Animal {
            constructor(name) { this.name = name; }
            speak() { return this.name + ' makes a sound'; }
            get kind() { return 'animal'; }
            static create(name) { return new this(name); }
        }
        class Dog extends Animal {
            speak() { return super.speak() + ' (woof)'; }
            get kind() { return 'dog/' + super.kind; }
        }
        const d = Dog.create('Rex');
        [d.speak(), d.kind, d.constructor.name].join('|')
    "#;
    assert_eq!(eval(script), "Rex makes a sound (woof)|dog/animal|Dog");
}

#[test]
fn class_constructor_requires_new() {
    let err = eval_err("class C {} C()");
    assert!(err.to_string().contains("Class constructor C cannot be invoked without 'new'"), "{err}");
}

#[test]
fn fields_initialize_in_definition_order() {
    let script = r#"
        const order = [];
        class C {
            a = order.push('a');
            static s = order.push('static s');
            b = order.push('b');
            static { order.push('static block'); }
        }
        new C();
        order.join()
    "#;
    assert_eq!(eval(script), "static s,static block,a,b");
}

#[test]
fn private_members() {
    let script = r#"
        class Counter {
            #count = 0;
            static #instances = 0;
            constructor() { Counter.#instances++; }
            #step() { return 1; }
            get #doubled() { return this.#count * 2; }
            inc() { this.#count += this.#step(); return this; }
            get doubled() { return this.#doubled; }
            static instances() { return Counter.#instances; }
            static isCounter(o) { return #count in o; }
        }
        const c = new Counter().inc().inc();
        new Counter();
        [c.doubled, Counter.instances(), Counter.isCounter(c), Counter.isCounter({})].join()
    "#;
    assert_eq!(eval(script), "4,2,true,false");
}

#[test]
fn private_access_on_foreign_object_throws() {
    let script = "class P { #x = 1; static read(o) { return o.#x; } } P.read({})";
    let err = eval_err(script);
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn private_method_is_not_writable() {
    let script = "class P { #m() {} poke() { this.#m = 1; } } new P().poke()";
    let err = eval_err(script);
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn private_getter_without_setter_throws_on_write() {
    let script = "class P { get #g() { return 1; } poke() { this.#g = 2; } } new P().poke()";
    let err = eval_err(script);
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn extends_null_and_non_constructor_heritage() {
    assert_eq!(eval("class N extends null {} Object.getPrototypeOf(N.prototype) === null"), "true");
    let err = eval_err("class X extends 5 {}");
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn class_source_text_round_trips() {
    let script = "class  K { m() { return 1 } }\nK.toString()";
    assert_eq!(eval(script), "class  K { m() { return 1 } }");
}

#[test]
fn new_target_follows_the_derived_class() {
    let script = r#"
        class Base { constructor() { this.made = new.target.name; } }
        class Leaf extends Base {}
        new Leaf().made
    "#;
    assert_eq!(eval(script), "Leaf");
}

#[test]
fn duplicate_private_names_fail_when_the_class_is_evaluated() {
    let script = r#"
        let reached = false;
        reached = true;
        let outcome;
        try { class Twice { #a = 1; #a() {} } } catch (e) { outcome = e.name + ':' + e.message; }
        reached + '|' + outcome
    "#;
    assert_eq!(eval(script), "true|SyntaxError:Identifier '#a' has already been declared");
    assert_eq!(eval("class Pair { get #v() { return 1; } set #v(x) {} read() { return this.#v; } } new Pair().read()"), "1");
    assert_eq!(eval("try { class S { static #s; #s; } } catch (e) { e instanceof SyntaxError }"), "true");
}
