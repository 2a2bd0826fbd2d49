use jsconsole::{ConsoleLevel, DebugSink, EvaluateOptions, display_value, evaluate, evaluate_to_value, format_value};
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

fn inspect(script: &str) -> String {
    match evaluate_to_value(script) {
        Ok(v) => format_value(&v),
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

fn console_output(script: &str) -> Vec<(ConsoleLevel, String)> {
    let sink = Rc::new(Captured::default());
    evaluate(script, EvaluateOptions::default().debug_sink(sink.clone())).unwrap().into_value().unwrap();
    sink.lines.take()
}

#[test]
fn json_stringify() {
    assert_eq!(eval("JSON.stringify({ a: [1, { b: 2 }], c: undefined, d: () => 1, e: null })"), r#"{"a":[1,{"b":2}],"e":null}"#);
    assert_eq!(eval("JSON.stringify({ a: [1] }, null, 2)"), "{\n  \"a\": [\n    1\n  ]\n}");
    assert_eq!(eval("JSON.stringify({ toJSON() { return 'x'; } })"), "\"x\"");
    assert_eq!(eval("JSON.stringify({ a: 1, b: 2, c: 3 }, ['a', 'c'])"), r#"{"a":1,"c":3}"#);
    assert_eq!(eval("JSON.stringify('line\\nbreak \"q\"')"), r#""line\nbreak \"q\"""#);
    assert_eq!(eval("JSON.stringify([NaN, Infinity, undefined])"), "[null,null,null]");
    assert_eq!(eval("typeof JSON.stringify(undefined)"), "undefined");
    let err = evaluate_to_value("const o = {}; o.self = o; JSON.stringify(o)").unwrap_err();
    assert!(err.to_string().contains("Converting circular structure to JSON"), "{err}");
}

#[test]
fn json_parse() {
    assert_eq!(eval("const v = JSON.parse('{\"a\":[1,2,{\"b\":null}],\"c\":\"\\\\u0041\"}'); [v.a.length, v.a[2].b, v.c].join()"), "3,,A");
    assert_eq!(eval("JSON.parse('{\"a\":1,\"b\":[1,2]}', (k, v) => typeof v === 'number' ? v * 2 : v).b.join()"), "2,4");
    assert_eq!(eval("Object.keys(JSON.parse('{\"z\":1,\"a\":2}')).join()"), "z,a");
    for bad in ["'{'", "'[1,]'", "\"{'a':1}\"", "'01'"] {
        let script = format!("try {{ JSON.parse({bad}); 'parsed' }} catch (e) {{ e.name }}");
        assert_eq!(eval(&script), "SyntaxError", "{bad}");
    }
}

#[test]
fn map_keeps_insertion_order_and_same_value_zero_keys() {
    assert_eq!(eval("const m = new Map([[1, 'a'], [2, 'b']]); m.delete(1); m.set(1, 'c'); [...m.keys()].join()"), "2,1");
    assert_eq!(eval("const m = new Map([[NaN, 1], [-0, 'z']]); [m.get(NaN), m.get(0), m.size].join()"), "1,z,2");
    assert_eq!(eval("const k = {}; const m = new Map(); m.set(k, 1).set({}, 2); [m.get(k), m.has({}), m.size].join()"), "1,false,2");
}

#[test]
fn map_iteration_sees_entries_added_during_iteration() {
    let script = r#"
        const m = new Map([[1, 1]]);
        const seen = [];
        m.forEach((v, k) => { seen.push(k); if (k < 3) m.set(k + 1, 1); });
        const it = m.keys();
        it.next();
        m.delete(2);
        [seen.join(), it.next().value].join('|')
    "#;
    assert_eq!(eval(script), "1,2,3|3");
}

#[test]
fn sets() {
    assert_eq!(eval("const s = new Set([1, 2, 2, 3, '3']); [s.size, [...s].join(), s.has('3')].join('|')"), "4|1,2,3,3|true");
    assert_eq!(eval("const s = new Set(['a']); s.add('b'); s.delete('a'); [...s.entries()].map(e => e.join(':')).join()"), "b:b");
}

#[test]
fn weak_collections_and_refs() {
    assert_eq!(eval("const k = {}; const wm = new WeakMap([[k, 1]]); [wm.get(k), wm.has({}), new WeakRef(k).deref() === k].join()"), "1,false,true");
    assert_eq!(eval("const ws = new WeakSet(); const o = {}; ws.add(o); [ws.has(o), ws.delete(o), ws.has(o)].join()"), "true,true,false");
    assert_eq!(eval("try { new WeakMap().set(1, 1); } catch (e) { e.name }"), "TypeError");
}

#[test]
fn math() {
    assert_eq!(eval("[Math.max(), Math.min(), Math.max(1, NaN), Math.round(-2.5), Math.round(2.5)].join()"), "-Infinity,Infinity,NaN,-2,3");
    assert_eq!(eval("[Math.hypot(3, 4), Math.sign(-3), Math.trunc(-4.7), Math.cbrt(27), Math.clz32(1)].join()"), "5,-1,-4,3,31");
    assert_eq!(eval("const r = Math.random(); r >= 0 && r < 1"), "true");
    assert_eq!(eval("Object.prototype.toString.call(Math)"), "[object Math]");
}

#[test]
fn number_formatting() {
    assert_eq!(eval("[(255).toString(16), (255).toString(2), (-7.5).toString(2)].join()"), "ff,11111111,-111.1");
    assert_eq!(eval("String(0.1 + 0.2)"), "0.30000000000000004");
    assert_eq!(eval("[1e21, 1e-7, 123e-20, -0, 2 ** 53].map(String).join()"), "1e+21,1e-7,1.23e-18,0,9007199254740992");
    assert_eq!(eval("[(1.005).toFixed(2), (1.25).toFixed(1), (0).toFixed(2), (-1.5).toFixed(0)].join()"), "1.00,1.3,0.00,-2");
    assert_eq!(eval("[(123.456).toPrecision(4), (12345).toExponential(2), (0.00001).toPrecision(1)].join()"), "123.5,1.23e+4,0.00001");
    let err = evaluate_to_value("(1).toFixed(101)").unwrap_err();
    assert!(err.to_string().contains("RangeError"), "{err}");
}

#[test]
fn number_parsing() {
    assert_eq!(eval("[Number('  12  '), Number('0x1f'), Number(''), Number('1e3'), Number('12px')].join()"), "12,31,0,1000,NaN");
    assert_eq!(eval("[parseInt('08'), parseInt('1f', 16), parseInt('  -42abc'), parseFloat('3.14abc'), parseFloat('.5')].join()"), "8,31,-42,3.14,0.5");
    assert_eq!(eval("[Number.isInteger(5.0), Number.isSafeInteger(2 ** 53), isNaN('x'), Number.isNaN('x')].join()"), "true,false,true,false");
}

#[test]
fn string_methods() {
    assert_eq!(eval("['abc'.padStart(5, '-'), 'a-b-c'.split('-', 2).join(), 'aaa'.replaceAll('a', 'b'), 'x'.repeat(3), ' hi '.trim()].join('|')"), "--abc|a,b|bbb|xxx|hi");
    assert_eq!(eval("['abc'.replace('b', '[$&$&]'), 'a1b2'.replace('1', m => m * 10), 'abc'.at(-1), 'héllo'.toUpperCase()].join('|')"), "a[bb]c|a10b2|c|HÉLLO");
    assert_eq!(eval("['abcdef'.slice(-3, -1), 'abcdef'.substring(4, 1), 'abc'.indexOf('c', 1), 'abca'.lastIndexOf('a')].join()"), "de,bcd,2,3");
    assert_eq!(eval("['a,b'.split(''), 'abc'.split()].map(a => a.length).join()"), "3,1");
}

#[test]
fn strings_index_by_utf16_code_units() {
    assert_eq!(eval("const s = 'a😀b'; [s.length, s.charCodeAt(1), s.codePointAt(1), s.slice(1, 3) === '😀', [...s].length].join()"), "4,55357,128512,true,3");
    assert_eq!(eval("String.fromCodePoint(128512) === '😀' && String.fromCharCode(72, 105) === 'Hi'"), "true");
}

#[test]
fn template_literals() {
    assert_eq!(eval("const n = 2; `${n} + ${n} = ${n + n}`"), "2 + 2 = 4");
    assert_eq!(eval("String.raw`a\\n${1}`"), "a\\n1");
    assert_eq!(eval("function tag(s, ...v) { return s.raw.join('|') + v.join(); } tag`x${1}y${2}z`"), "x|y|z1,2");
}

#[test]
fn array_methods() {
    assert_eq!(eval("[10, 9, 1].sort().join()"), "1,10,9");
    assert_eq!(eval("[3, 1, 2].sort((a, b) => b - a).join()"), "3,2,1");
    let stable = "[{k: 1, v: 'a'}, {k: 0, v: 'b'}, {k: 1, v: 'c'}].sort((x, y) => x.k - y.k).map(o => o.v).join('')";
    assert_eq!(eval(stable), "bac");
    assert_eq!(eval("[[1, [2, [3, [4]]]].flat(Infinity).join(), [NaN].includes(NaN), [NaN].indexOf(NaN)].join('|')"), "1,2,3,4|true|-1");
    assert_eq!(eval("const a = [1, 2, 3, 4]; const removed = a.splice(1, 2, 'x'); [a.join(), removed.join()].join('|')"), "1,x,4|2,3");
    assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i * 2).join()"), "0,2,4");
    assert_eq!(eval("const a = [3, 1, 2]; [a.toSorted().join(), a.join(), a.with(0, 9).join()].join('|')"), "1,2,3|3,1,2|9,1,2");
    assert_eq!(eval("[1, 2, 3].reduceRight((acc, x) => acc + x, '')"), "321");
    assert_eq!(eval("[1, 2, 3, 4].findLast(x => x % 2 === 1)"), "3");
    let err = evaluate_to_value("[].reduce((a, b) => a + b)").unwrap_err();
    assert!(err.to_string().contains("TypeError"), "{err}");
}

#[test]
fn iteration_protocols() {
    let script = r#"
        const range = { from: 1, to: 3, [Symbol.iterator]() {
            let cur = this.from, last = this.to;
            return { next: () => cur <= last ? { value: cur++, done: false } : { value: undefined, done: true } };
        } };
        const out = [];
        for (const x of range) out.push(x);
        const [first, ...others] = range;
        [out.join(), first, others.join(), Array.from(range).length].join('|')
    "#;
    assert_eq!(eval(script), "1,2,3|1|2,3|3");
    assert_eq!(eval("const m = new Map([['a', 1]]); let s = ''; for (const [k, v] of m) s += k + v; s"), "a1");
}

#[test]
fn console_methods_reach_the_sink() {
    let lines = console_output(
        r#"
        console.log('%s is %d', 'x', 4.7, 'extra');
        console.group('G');
        console.info('inner');
        console.groupEnd();
        console.warn('outer', { a: 1 }, [1, 'two']);
        console.count(); console.count();
        console.assert(1 === 1, 'fine');
        console.assert(false, 'bad');
        "#,
    );
    let texts: Vec<&str> = lines.iter().map(|(_, l)| l.as_str()).collect();
    assert_eq!(
        texts,
        vec!["x is 4 extra", "G", "  inner", "outer { a: 1 } [ 1, 'two' ]", "default: 1", "default: 2", "Assertion failed: bad"]
    );
    assert_eq!(lines[2].0, ConsoleLevel::Info);
    assert_eq!(lines[3].0, ConsoleLevel::Warn);
    assert_eq!(lines[6].0, ConsoleLevel::Error);
}

#[test]
fn console_trace_prints_the_stack() {
    let lines = console_output("function where() { console.trace('here'); } where()");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].1.starts_with("Trace: here\n"), "{:?}", lines[0].1);
    assert!(lines[0].1.contains("at where (<console>:1:"), "{:?}", lines[0].1);
}

#[test]
fn inspector_formatting() {
    assert_eq!(inspect("({ a: 1, b: 'x', 'needs quotes': true })"), "{ a: 1, b: 'x', 'needs quotes': true }");
    assert_eq!(inspect("[1, , 3, , , 6]"), "[ 1, <1 empty item>, 3, <2 empty items>, 6 ]");
    assert_eq!(inspect("new Map([['k', { v: 1 }]])"), "Map(1) { 'k' => { v: 1 } }");
    assert_eq!(inspect("new Set([1, 'a'])"), "Set(2) { 1, 'a' }");
    assert_eq!(inspect("class P { constructor() { this.x = 1; } } new P()"), "P { x: 1 }");
    assert_eq!(inspect("({ a: { b: { c: { d: 1 } } } })"), "{ a: { b: { c: [Object] } } }");
    assert_eq!(inspect("const o = { name: 'o' }; o.self = o; o"), "{ name: 'o', self: [Circular] }");
    assert_eq!(inspect("({ get g() { return 1; } })"), "{ g: [Getter] }");
    assert_eq!(inspect("[function named() {}, () => {}, class K {}]"), "[ [Function: named], [Function (anonymous)], [class K] ]");
    assert_eq!(inspect("Object.create(null)"), "[Object: null prototype] {}");
    assert_eq!(inspect("Promise.resolve(2)"), "Promise { 2 }");
    assert_eq!(inspect("[-0, 'it\\'s', Symbol('s')]"), "[ -0, \"it's\", Symbol(s) ]");
}

#[test]
fn global_object_aliases() {
    assert_eq!(eval("globalThis === global && typeof globalThis.Math"), "object");
    assert_eq!(eval("[typeof undefined, typeof NaN, Infinity > 0].join()"), "undefined,number,true");
}
