use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::{evaluate_bool, EvalError, Model, Value};
use crate::solver::{CheckResult, TheorySolver};
use crate::sorts::Sort;
use crate::terms::Term;

/// Reference oracle: backtracking enumeration over a bounded integer domain.
///
/// Integers range over `[-bound, bound]`; variables are branched in
/// declaration order and every partial assignment is pruned as soon as some
/// assertion already evaluates to false, so equality-chained queries stay
/// cheap. Every answer (the chosen model, the minimized unsat core) is
/// deterministic. `Unsat` answers are decided only within the configured
/// domain, which is why this backend is a testing and reference vehicle,
/// not a production oracle — callers needing completeness swap in a real
/// SMT service behind the same trait.
///
/// Unsat cores are minimized by deletion: each assumption is dropped in
/// turn and kept out if the remaining set is still unsatisfiable. A search
/// that exceeds the node budget answers `Unknown` rather than guessing.
#[derive(Debug, Clone)]
pub struct BoundedSolver {
    bound: i64,
    node_limit: u64,
    decls: Vec<(String, Sort)>,
    asserts: Vec<Term>,
}

/// Transport-level failures of the bounded backend.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("variable `{0}` used before declaration")]
    UndeclaredVariable(String),
    #[error("variable `{0}` redeclared with a different sort")]
    ConflictingDeclaration(String),
    #[error("assumption `{0}` is not a declared boolean variable")]
    InvalidAssumption(String),
}

enum Abort {
    Budget,
    Eval(EvalError),
}

impl Default for BoundedSolver {
    fn default() -> Self {
        Self::new(8)
    }
}

impl BoundedSolver {
    pub fn new(bound: i64) -> Self {
        Self {
            bound: bound.max(0),
            node_limit: 2_000_000,
            decls: Vec::new(),
            asserts: Vec::new(),
        }
    }

    /// Cap on visited search nodes before the backend answers `Unknown`.
    pub fn with_node_limit(mut self, node_limit: u64) -> Self {
        self.node_limit = node_limit.max(1);
        self
    }

    fn sort_of(&self, name: &str) -> Option<Sort> {
        self.decls
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, sort)| *sort)
    }

    /// First satisfying assignment in enumeration order, if any.
    fn search(
        &self,
        forced: &BTreeMap<String, Value>,
        visits: &mut u64,
    ) -> Result<Option<Model>, Abort> {
        let free: Vec<(String, Sort)> = self
            .decls
            .iter()
            .filter(|(name, _)| !forced.contains_key(name))
            .cloned()
            .collect();

        let mut env = Model::new();
        for (name, value) in forced {
            env.insert(name.clone(), *value);
        }
        self.search_rec(&free, 0, &mut env, visits)
    }

    fn search_rec(
        &self,
        free: &[(String, Sort)],
        idx: usize,
        env: &mut Model,
        visits: &mut u64,
    ) -> Result<Option<Model>, Abort> {
        *visits += 1;
        if *visits > self.node_limit {
            return Err(Abort::Budget);
        }

        if idx == free.len() {
            for assertion in &self.asserts {
                match evaluate_bool(assertion, env) {
                    Ok(true) => {}
                    Ok(false) => return Ok(None),
                    Err(e) => return Err(Abort::Eval(e)),
                }
            }
            return Ok(Some(env.clone()));
        }

        // Prune: an assertion that already evaluates to false under the
        // partial assignment rules out the whole subtree. An assertion that
        // cannot be evaluated yet is simply retried deeper.
        for assertion in &self.asserts {
            if let Ok(false) = evaluate_bool(assertion, env) {
                return Ok(None);
            }
        }

        let (name, sort) = &free[idx];
        match sort {
            Sort::Bool => {
                for value in [false, true] {
                    env.insert(name.clone(), Value::Bool(value));
                    if let Some(model) = self.search_rec(free, idx + 1, env, visits)? {
                        return Ok(Some(model));
                    }
                }
            }
            Sort::Int => {
                for value in -self.bound..=self.bound {
                    env.insert(name.clone(), Value::Int(value));
                    if let Some(model) = self.search_rec(free, idx + 1, env, visits)? {
                        return Ok(Some(model));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Deletion-based minimization; a probe that runs out of budget keeps
    /// its assumption, so the result is always a superset of a minimal core.
    fn minimize_core(&self, assumptions: &[String]) -> Vec<String> {
        let mut core: Vec<String> = assumptions.to_vec();
        let mut i = 0;
        while i < core.len() {
            let mut candidate: BTreeMap<String, Value> = BTreeMap::new();
            for (j, name) in core.iter().enumerate() {
                if j != i {
                    candidate.insert(name.clone(), Value::Bool(true));
                }
            }
            let mut visits = 0u64;
            match self.search(&candidate, &mut visits) {
                Ok(None) => {
                    core.remove(i);
                }
                Ok(Some(_)) | Err(_) => i += 1,
            }
        }
        core
    }

    fn validate_declared(&self, term: &Term) -> Result<(), BackendError> {
        for name in term.free_vars() {
            if self.sort_of(&name).is_none() {
                return Err(BackendError::UndeclaredVariable(name));
            }
        }
        Ok(())
    }
}

impl TheorySolver for BoundedSolver {
    type Error = BackendError;

    fn declare_var(&mut self, name: &str, sort: &Sort) -> Result<(), Self::Error> {
        match self.sort_of(name) {
            None => {
                self.decls.push((name.to_string(), *sort));
                Ok(())
            }
            Some(existing) if existing == *sort => Ok(()),
            Some(_) => Err(BackendError::ConflictingDeclaration(name.to_string())),
        }
    }

    fn assert(&mut self, term: &Term) -> Result<(), Self::Error> {
        self.validate_declared(term)?;
        self.asserts.push(term.clone());
        Ok(())
    }

    fn check(
        &mut self,
        assumptions: &[String],
        _model_vars: &[(&str, &Sort)],
    ) -> Result<CheckResult, Self::Error> {
        let mut forced: BTreeMap<String, Value> = BTreeMap::new();
        for name in assumptions {
            match self.sort_of(name) {
                Some(Sort::Bool) => {
                    forced.insert(name.clone(), Value::Bool(true));
                }
                _ => return Err(BackendError::InvalidAssumption(name.clone())),
            }
        }

        let mut visits = 0u64;
        match self.search(&forced, &mut visits) {
            Ok(Some(model)) => Ok(CheckResult::Sat(model)),
            Ok(None) => Ok(CheckResult::Unsat(self.minimize_core(assumptions))),
            Err(Abort::Budget) => Ok(CheckResult::Unknown(format!(
                "search budget of {} nodes exceeded",
                self.node_limit
            ))),
            Err(Abort::Eval(e)) => Ok(CheckResult::Unknown(format!("evaluation failed: {e}"))),
        }
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.decls.clear();
        self.asserts.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_var(solver: &mut BoundedSolver, name: &str) {
        solver.declare_var(name, &Sort::Int).expect("declare");
    }

    fn bool_var(solver: &mut BoundedSolver, name: &str) {
        solver.declare_var(name, &Sort::Bool).expect("declare");
    }

    #[test]
    fn finds_the_first_model_in_enumeration_order() {
        let mut solver = BoundedSolver::new(4);
        int_var(&mut solver, "x");
        solver
            .assert(&Term::var("x").ge(Term::int(2)))
            .expect("assert");
        match solver.check(&[], &[]).expect("check") {
            CheckResult::Sat(model) => assert_eq!(model.get_int("x"), Some(2)),
            other => panic!("expected sat, got {other:?}"),
        }
    }

    #[test]
    fn equality_chains_are_solved_without_exhausting_the_budget() {
        // Eight chained variables would be 17^8 assignments without pruning.
        let mut solver = BoundedSolver::new(8).with_node_limit(10_000);
        for i in 0..8 {
            int_var(&mut solver, &format!("x{i}"));
        }
        solver
            .assert(&Term::var("x0").eq(Term::int(1)))
            .expect("assert");
        for i in 1..8 {
            solver
                .assert(
                    &Term::var(format!("x{i}"))
                        .eq(Term::var(format!("x{}", i - 1)).add(Term::int(1))),
                )
                .expect("assert");
        }
        match solver.check(&[], &[]).expect("check") {
            CheckResult::Sat(model) => assert_eq!(model.get_int("x7"), Some(8)),
            other => panic!("expected sat, got {other:?}"),
        }
    }

    #[test]
    fn unsat_core_is_minimized_by_deletion() {
        let mut solver = BoundedSolver::new(8);
        int_var(&mut solver, "x");
        bool_var(&mut solver, "a");
        bool_var(&mut solver, "b");
        bool_var(&mut solver, "c");
        solver
            .assert(&Term::var("a").implies(Term::var("x").ge(Term::int(5))))
            .expect("assert");
        solver
            .assert(&Term::var("b").implies(Term::var("x").le(Term::int(3))))
            .expect("assert");
        solver
            .assert(&Term::var("c").implies(Term::var("x").ge(Term::int(0))))
            .expect("assert");

        let assumptions = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        match solver.check(&assumptions, &[]).expect("check") {
            CheckResult::Unsat(core) => {
                assert_eq!(core, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected unsat, got {other:?}"),
        }
    }

    #[test]
    fn an_exhausted_budget_is_unknown_not_a_guess() {
        let mut solver = BoundedSolver::new(8).with_node_limit(50);
        for i in 0..4 {
            int_var(&mut solver, &format!("x{i}"));
        }
        // Nothing prunes here, so the search must visit the whole tree.
        solver
            .assert(&Term::var("x3").ge(Term::int(9)))
            .expect("assert");
        match solver.check(&[], &[]).expect("check") {
            CheckResult::Unknown(reason) => assert!(reason.contains("budget")),
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn undeclared_variable_in_assertion_is_a_transport_error() {
        let mut solver = BoundedSolver::new(4);
        let err = solver
            .assert(&Term::var("ghost").ge(Term::int(0)))
            .expect_err("assert must fail");
        assert_eq!(err, BackendError::UndeclaredVariable("ghost".to_string()));
    }

    #[test]
    fn non_boolean_assumption_is_rejected() {
        let mut solver = BoundedSolver::new(4);
        int_var(&mut solver, "x");
        let err = solver
            .check(&["x".to_string()], &[])
            .expect_err("check must fail");
        assert_eq!(err, BackendError::InvalidAssumption("x".to_string()));
    }

    #[test]
    fn reset_clears_declarations_and_assertions() {
        let mut solver = BoundedSolver::new(4);
        int_var(&mut solver, "x");
        solver
            .assert(&Term::var("x").ge(Term::int(0)))
            .expect("assert");
        solver.reset().expect("reset");
        match solver.check(&[], &[]).expect("check") {
            CheckResult::Sat(model) => assert!(model.is_empty()),
            other => panic!("expected sat over the empty theory, got {other:?}"),
        }
    }
}
