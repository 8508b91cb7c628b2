#![allow(dead_code)]

use civet_engine::{Engine, EngineConfig};
use civet_ir::{BodyAtom, ChcSystem, Rule, SystemBuilder};
use civet_smt::backends::BoundedSolver;
use civet_smt::sorts::Sort;
use civet_smt::terms::Term;

pub fn engine(system: ChcSystem) -> Engine<BoundedSolver> {
    engine_with(system, EngineConfig::default())
}

pub fn engine_with(system: ChcSystem, config: EngineConfig) -> Engine<BoundedSolver> {
    Engine::new(system, BoundedSolver::default(), config)
}

fn int_var(name: &str) -> (String, Sort) {
    (name.to_string(), Sort::Int)
}

/// Init() :- true.  Query() :- Init().  The query is trivially reachable.
pub fn reachable_pair() -> ChcSystem {
    let mut builder = SystemBuilder::new();
    let init = builder.declare_relation("Init", vec![]);
    let query = builder.declare_relation("Query", vec![]);
    builder.add_rule(Rule {
        head: init,
        head_args: vec![],
        body: vec![],
        constraint: Term::bool(true),
        vars: vec![],
        name: Some("init".to_string()),
    });
    builder.add_rule(Rule {
        head: query,
        head_args: vec![],
        body: vec![BodyAtom {
            relation: init,
            args: vec![],
        }],
        constraint: Term::bool(true),
        vars: vec![],
        name: Some("step".to_string()),
    });
    builder.set_query(query);
    builder.finish().expect("well-formed")
}

/// Init() :- true.  Mid() :- Init().  Query() :- Mid().
pub fn reachable_chain() -> ChcSystem {
    let mut builder = SystemBuilder::new();
    let init = builder.declare_relation("Init", vec![]);
    let mid = builder.declare_relation("Mid", vec![]);
    let query = builder.declare_relation("Query", vec![]);
    builder.add_rule(Rule {
        head: init,
        head_args: vec![],
        body: vec![],
        constraint: Term::bool(true),
        vars: vec![],
        name: Some("init".to_string()),
    });
    builder.add_rule(Rule {
        head: mid,
        head_args: vec![],
        body: vec![BodyAtom {
            relation: init,
            args: vec![],
        }],
        constraint: Term::bool(true),
        vars: vec![],
        name: Some("first".to_string()),
    });
    builder.add_rule(Rule {
        head: query,
        head_args: vec![],
        body: vec![BodyAtom {
            relation: mid,
            args: vec![],
        }],
        constraint: Term::bool(true),
        vars: vec![],
        name: Some("second".to_string()),
    });
    builder.set_query(query);
    builder.finish().expect("well-formed")
}

/// Init(x) :- x = 3.  P(y) :- Init(x), y = x + 1.  Query() :- P(z), z >= 4.
pub fn reachable_values() -> ChcSystem {
    let mut builder = SystemBuilder::new();
    let init = builder.declare_relation("Init", vec![Sort::Int]);
    let p = builder.declare_relation("P", vec![Sort::Int]);
    let query = builder.declare_relation("Query", vec![]);
    builder.add_rule(Rule {
        head: init,
        head_args: vec![Term::var("x")],
        body: vec![],
        constraint: Term::var("x").eq(Term::int(3)),
        vars: vec![int_var("x")],
        name: Some("init".to_string()),
    });
    builder.add_rule(Rule {
        head: p,
        head_args: vec![Term::var("y")],
        body: vec![BodyAtom {
            relation: init,
            args: vec![Term::var("x")],
        }],
        constraint: Term::var("y").eq(Term::var("x").add(Term::int(1))),
        vars: vec![int_var("x"), int_var("y")],
        name: Some("incr".to_string()),
    });
    builder.add_rule(Rule {
        head: query,
        head_args: vec![],
        body: vec![BodyAtom {
            relation: p,
            args: vec![Term::var("z")],
        }],
        constraint: Term::var("z").ge(Term::int(4)),
        vars: vec![int_var("z")],
        name: Some("check".to_string()),
    });
    builder.set_query(query);
    builder.finish().expect("well-formed")
}

/// The unreachable counter:
/// Init(x) :- true.  P(x) :- x >= 0, Init(x).  P(y) :- P(x), y = x + 1.
/// Bad() :- P(x), x < 0.  The counter never drops below zero.
pub fn unreachable_counter() -> ChcSystem {
    let mut builder = SystemBuilder::new();
    let init = builder.declare_relation("Init", vec![Sort::Int]);
    let p = builder.declare_relation("P", vec![Sort::Int]);
    let bad = builder.declare_relation("Bad", vec![]);
    builder.add_rule(Rule {
        head: init,
        head_args: vec![Term::var("x")],
        body: vec![],
        constraint: Term::bool(true),
        vars: vec![int_var("x")],
        name: Some("init".to_string()),
    });
    builder.add_rule(Rule {
        head: p,
        head_args: vec![Term::var("x")],
        body: vec![BodyAtom {
            relation: init,
            args: vec![Term::var("x")],
        }],
        constraint: Term::var("x").ge(Term::int(0)),
        vars: vec![int_var("x")],
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
        vars: vec![int_var("x"), int_var("y")],
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
        vars: vec![int_var("x")],
        name: Some("violation".to_string()),
    });
    builder.set_query(bad);
    builder.finish().expect("well-formed")
}

/// Parameterized counter: starts at `start`, increases by `step`, asks
/// whether `Bad() :- P(x), x >= target` (reachable) or `x < start`
/// (unreachable) fires.
pub fn counter_with_target(start: i64, step: i64, target: i64, above: bool) -> ChcSystem {
    let mut builder = SystemBuilder::new();
    let p = builder.declare_relation("P", vec![Sort::Int]);
    let bad = builder.declare_relation("Bad", vec![]);
    builder.add_rule(Rule {
        head: p,
        head_args: vec![Term::var("x")],
        body: vec![],
        constraint: Term::var("x").eq(Term::int(start)),
        vars: vec![int_var("x")],
        name: Some("start".to_string()),
    });
    builder.add_rule(Rule {
        head: p,
        head_args: vec![Term::var("y")],
        body: vec![BodyAtom {
            relation: p,
            args: vec![Term::var("x")],
        }],
        constraint: Term::var("y").eq(Term::var("x").add(Term::int(step))),
        vars: vec![int_var("x"), int_var("y")],
        name: Some("tick".to_string()),
    });
    let check = if above {
        Term::var("x").ge(Term::int(target))
    } else {
        Term::var("x").lt(Term::int(target))
    };
    builder.add_rule(Rule {
        head: bad,
        head_args: vec![],
        body: vec![BodyAtom {
            relation: p,
            args: vec![Term::var("x")],
        }],
        constraint: check,
        vars: vec![int_var("x")],
        name: Some("check".to_string()),
    });
    builder.set_query(bad);
    builder.finish().expect("well-formed")
}
