use criterion::{black_box, criterion_group, criterion_main, Criterion};

use civet_engine::{Engine, EngineConfig};
use civet_ir::{BodyAtom, ChcSystem, Rule, SystemBuilder};
use civet_smt::backends::BoundedSolver;
use civet_smt::sorts::Sort;
use civet_smt::terms::Term;

/// The unreachable counter used across the test suites.
fn unreachable_counter() -> ChcSystem {
    let mut builder = SystemBuilder::new();
    let p = builder.declare_relation("P", vec![Sort::Int]);
    let bad = builder.declare_relation("Bad", vec![]);
    builder.add_rule(Rule {
        head: p,
        head_args: vec![Term::var("x")],
        body: vec![],
        constraint: Term::var("x").eq(Term::int(0)),
        vars: vec![("x".to_string(), Sort::Int)],
        name: Some("start".to_string()),
    });
    builder.add_rule(Rule {
        head: p,
        head_args: vec![Term::var("y")],
        body: vec![BodyAtom {
            relation: p,
            args: vec![Term::var("x")],
        }],
        constraint: Term::var("y").eq(Term::var("x").add(Term::int(1))),
        vars: vec![
            ("x".to_string(), Sort::Int),
            ("y".to_string(), Sort::Int),
        ],
        name: Some("tick".to_string()),
    });
    builder.add_rule(Rule {
        head: bad,
        head_args: vec![],
        body: vec![BodyAtom {
            relation: p,
            args: vec![Term::var("x")],
        }],
        constraint: Term::var("x").lt(Term::int(0)),
        vars: vec![("x".to_string(), Sort::Int)],
        name: Some("violation".to_string()),
    });
    builder.set_query(bad);
    builder.finish().expect("well-formed")
}

fn bench_unsat_counter(c: &mut Criterion) {
    c.bench_function("engine_unsat_counter", |b| {
        b.iter(|| {
            let mut engine = Engine::new(
                black_box(unreachable_counter()),
                BoundedSolver::default(),
                EngineConfig::default(),
            );
            engine.solve().expect("solve")
        })
    });
}

fn bench_frame_construction(c: &mut Criterion) {
    c.bench_function("engine_frame_construction", |b| {
        b.iter(|| civet_engine::FrameSet::new(black_box(&unreachable_counter())))
    });
}

criterion_group!(benches, bench_unsat_counter, bench_frame_construction);
criterion_main!(benches);
