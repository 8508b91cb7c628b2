//! Reachable instances: SAT verdicts and ground witness extraction.

mod common;

use civet_engine::SolveResult;
use civet_smt::model::Value;

#[test]
fn trivially_reachable_query_is_sat() {
    let mut engine = common::engine(common::reachable_pair());
    let result = engine.solve().expect("solve");
    assert_eq!(result, SolveResult::Sat);
    assert_eq!(result.verdict_class(), "sat");
}

#[test]
fn ground_answer_lists_rule_instantiations_leaves_first() {
    let mut engine = common::engine(common::reachable_pair());
    assert_eq!(engine.solve().expect("solve"), SolveResult::Sat);

    let answer = engine
        .get_ground_sat_answer()
        .expect("reconstruction")
        .expect("present after SAT");
    let relations: Vec<&str> = answer.iter().map(|g| g.relation.as_str()).collect();
    assert_eq!(relations, vec!["Init", "Query"]);
    assert!(answer.iter().all(|g| g.args.is_empty()));
}

#[test]
fn two_step_chain_produces_a_three_step_witness() {
    let mut engine = common::engine(common::reachable_chain());
    assert_eq!(engine.solve().expect("solve"), SolveResult::Sat);

    let answer = engine
        .get_ground_sat_answer()
        .expect("reconstruction")
        .expect("present after SAT");
    let relations: Vec<&str> = answer.iter().map(|g| g.relation.as_str()).collect();
    assert_eq!(relations, vec!["Init", "Mid", "Query"]);
}

#[test]
fn witness_values_are_consistent_along_the_derivation() {
    let mut engine = common::engine(common::reachable_values());
    assert_eq!(engine.solve().expect("solve"), SolveResult::Sat);

    let answer = engine
        .get_ground_sat_answer()
        .expect("reconstruction")
        .expect("present after SAT");
    assert_eq!(answer.len(), 3);
    assert_eq!(answer[0].relation, "Init");
    assert_eq!(answer[0].args, vec![Value::Int(3)]);
    assert_eq!(answer[1].relation, "P");
    assert_eq!(answer[1].args, vec![Value::Int(4)]);
    assert_eq!(answer[2].relation, "Query");
    assert!(answer[2].args.is_empty());
}

#[test]
fn ground_answer_is_absent_without_a_sat_verdict() {
    let mut engine = common::engine(common::unreachable_counter());
    assert_eq!(engine.solve().expect("solve"), SolveResult::Unsat);
    assert!(engine
        .get_ground_sat_answer()
        .expect("reconstruction")
        .is_none());
}

#[test]
fn counter_reaches_a_target_above_its_start() {
    let mut engine = common::engine(common::counter_with_target(0, 1, 3, true));
    assert_eq!(engine.solve().expect("solve"), SolveResult::Sat);

    let answer = engine
        .get_ground_sat_answer()
        .expect("reconstruction")
        .expect("present after SAT");
    // The counter climbs one step at a time; the last P value must meet the
    // target and the first must be the start value.
    let p_values: Vec<i64> = answer
        .iter()
        .filter(|g| g.relation == "P")
        .filter_map(|g| match g.args.as_slice() {
            [Value::Int(n)] => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(p_values.first(), Some(&0));
    assert!(p_values.last().is_some_and(|last| *last >= 3));
    assert!(p_values.windows(2).all(|w| w[1] == w[0] + 1));
}
