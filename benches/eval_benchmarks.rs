use criterion::{Criterion, criterion_group, criterion_main};
use jsconsole::{EvaluateOptions, Realm, evaluate, evaluate_to_value};
use std::hint::black_box;

// cargo bench --profile dev

// Initialize logger for benchmark so `RUST_LOG` is honored.
#[ctor::ctor]
fn __init_bench_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default()).try_init();
}

fn benchmark_evaluation(c: &mut Criterion) {
    c.bench_function("closures_and_calls", |b| {
        b.iter(|| {
            let script = r#"
                function makeCounter() { let n = 0; return () => ++n; }
                const next = makeCounter();
                let total = 0;
                for (let i = 0; i < 200; i++) total += next();
                total
            "#;
            let _ = black_box(evaluate_to_value(script));
        })
    });

    c.bench_function("property_access", |b| {
        b.iter(|| {
            let script = r#"
                const points = [];
                for (let i = 0; i < 100; i++) points.push({ x: i, y: i * 2 });
                points.reduce((acc, p) => acc + p.x * p.y, 0)
            "#;
            let _ = black_box(evaluate_to_value(script));
        })
    });

    c.bench_function("class_instances", |b| {
        b.iter(|| {
            let script = r#"
                class V { #x; constructor(x) { this.#x = x; } get x() { return this.#x; } plus(o) { return new V(this.#x + o.x); } }
                let v = new V(0);
                for (let i = 0; i < 100; i++) v = v.plus(new V(1));
                v.x
            "#;
            let _ = black_box(evaluate_to_value(script));
        })
    });

    c.bench_function("promise_chain_with_await", |b| {
        b.iter(|| {
            let script = r#"
                let p = Promise.resolve(1);
                for (let i = 0; i < 50; i++) p = p.then(x => x + 1);
                await p
            "#;
            let _ = black_box(evaluate_to_value(script));
        })
    });

    // Reuses one realm so only parsing and evaluation are measured.
    let realm = Realm::new();
    c.bench_function("dry_run_preview", |b| {
        b.iter(|| {
            let options = EvaluateOptions::default().realm(realm.clone()).throw_on_side_effect(true);
            let _ = black_box(evaluate("[1, 2, 3].map(x => x * 2).join('-')", options));
        })
    });
}

criterion_group!(benches, benchmark_evaluation);
criterion_main!(benches);
