//! Property tests tying the term evaluator and the bounded backend together.

use proptest::prelude::*;

use civet_smt::backends::BoundedSolver;
use civet_smt::model::evaluate_bool;
use civet_smt::solver::{CheckResult, TheorySolver};
use civet_smt::sorts::Sort;
use civet_smt::terms::Term;

fn arb_int_expr() -> impl Strategy<Value = Term> {
    let leaf = prop_oneof![
        (-3i64..=3).prop_map(Term::int),
        Just(Term::var("x")),
        Just(Term::var("y")),
    ];
    leaf.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(a, b)| a.add(b)),
            (inner.clone(), inner).prop_map(|(a, b)| a.sub(b)),
        ]
    })
}

fn arb_formula() -> impl Strategy<Value = Term> {
    let atom = (arb_int_expr(), arb_int_expr(), 0..5u8).prop_map(|(a, b, op)| match op {
        0 => a.eq(b),
        1 => a.lt(b),
        2 => a.le(b),
        3 => a.gt(b),
        _ => a.ge(b),
    });
    atom.prop_recursive(2, 12, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 1..3).prop_map(Term::and),
            proptest::collection::vec(inner.clone(), 1..3).prop_map(Term::or),
            inner.prop_map(Term::not),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sat_models_actually_satisfy_the_formula(formula in arb_formula()) {
        let mut solver = BoundedSolver::new(4);
        solver.declare_var("x", &Sort::Int).expect("declare");
        solver.declare_var("y", &Sort::Int).expect("declare");
        solver.assert(&formula).expect("assert");

        if let CheckResult::Sat(model) = solver.check(&[], &[]).expect("check") {
            prop_assert!(evaluate_bool(&formula, &model).expect("evaluable"));
        }
    }

    #[test]
    fn simplification_preserves_satisfying_models(formula in arb_formula()) {
        let mut solver = BoundedSolver::new(4);
        solver.declare_var("x", &Sort::Int).expect("declare");
        solver.declare_var("y", &Sort::Int).expect("declare");
        solver.assert(&formula).expect("assert");

        if let CheckResult::Sat(model) = solver.check(&[], &[]).expect("check") {
            let simplified = formula.simplify();
            prop_assert!(evaluate_bool(&simplified, &model).expect("evaluable"));
        }
    }
}
