//! Verdict stability: obligation ordering and restarts change the search,
//! never the answer.

mod common;

use civet_engine::{EngineConfig, SolveResult, TieBreak};

fn solve_with(config: EngineConfig, reachable: bool) -> SolveResult {
    let system = if reachable {
        common::reachable_chain()
    } else {
        common::unreachable_counter()
    };
    let mut engine = common::engine_with(system, config);
    engine.solve().expect("solve")
}

#[test]
fn verdicts_are_identical_under_either_tie_break_policy() {
    for reachable in [true, false] {
        let fifo = solve_with(
            EngineConfig {
                tie_break: TieBreak::InsertionOrder,
                ..EngineConfig::default()
            },
            reachable,
        );
        let lifo = solve_with(
            EngineConfig {
                tie_break: TieBreak::ReverseInsertion,
                ..EngineConfig::default()
            },
            reachable,
        );
        assert_eq!(fifo.verdict_class(), lifo.verdict_class());
        assert_eq!(
            fifo.verdict_class(),
            if reachable { "sat" } else { "unsat" }
        );
    }
}

#[test]
fn verdicts_are_identical_with_and_without_restarts() {
    for reachable in [true, false] {
        let eager_restarts = solve_with(
            EngineConfig {
                restart_threshold: Some(1),
                ..EngineConfig::default()
            },
            reachable,
        );
        let no_restarts = solve_with(
            EngineConfig {
                restart_threshold: None,
                ..EngineConfig::default()
            },
            reachable,
        );
        assert_eq!(eager_restarts.verdict_class(), no_restarts.verdict_class());
    }
}

/// Restarts discard only traversal order: everything the restart-free run
/// learns is still a valid certificate for the restarting run's instance.
#[test]
fn restarts_do_not_invalidate_learned_content() {
    let mut reference = common::engine_with(
        common::unreachable_counter(),
        EngineConfig {
            restart_threshold: None,
            ..EngineConfig::default()
        },
    );
    assert_eq!(reference.solve().expect("solve"), SolveResult::Unsat);
    let reference_cert = reference.invariant_certificate().expect("certificate");

    let mut restarting = common::engine_with(
        common::unreachable_counter(),
        EngineConfig {
            restart_threshold: Some(1),
            ..EngineConfig::default()
        },
    );
    assert_eq!(restarting.solve().expect("solve"), SolveResult::Unsat);
    assert!(restarting.stats().restarts > 0, "restarts actually happened");
    let restarting_cert = restarting.invariant_certificate().expect("certificate");

    // Both runs close the proof; the query relation is excluded in both
    // certificates.
    for cert in [&reference_cert, &restarting_cert] {
        let bad = cert
            .invariants
            .iter()
            .find(|inv| inv.relation == "Bad")
            .expect("Bad is covered");
        assert_eq!(bad.formula, civet_smt::terms::Term::bool(false));
    }
}

#[test]
fn repeated_runs_are_bit_for_bit_reproducible() {
    let first = solve_with(EngineConfig::default(), false);
    let second = solve_with(EngineConfig::default(), false);
    assert_eq!(first, second);

    let mut a = common::engine(common::unreachable_counter());
    let mut b = common::engine(common::unreachable_counter());
    a.solve().expect("solve");
    b.solve().expect("solve");
    assert_eq!(a.stats().queries, b.stats().queries);
    assert_eq!(a.stats().lemmas, b.stats().lemmas);
    assert_eq!(a.stats().max_depth, b.stats().max_depth);
}
