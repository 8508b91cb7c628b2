use crate::model::Model;
use crate::sorts::Sort;
use crate::terms::Term;

/// Outcome of a satisfiability check under assumptions.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    /// Satisfiable; the model covers the variables the caller asked for.
    Sat(Model),
    /// Unsatisfiable; the core is the subset of assumption names implicated
    /// in the refutation.
    Unsat(Vec<String>),
    /// The backend could not decide the query.
    Unknown(String),
}

/// Abstract theory-solver interface consumed by the engine.
///
/// The engine treats this oracle as a blocking, possibly internally-parallel
/// service. Transport failures surface through `Self::Error`; an indecisive
/// answer is `CheckResult::Unknown`, never an error.
pub trait TheorySolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &Sort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &Term) -> Result<(), Self::Error>;

    /// Check satisfiability of the asserted constraints with the given
    /// boolean assumption variables forced true.
    ///
    /// On `Sat`, the returned model assigns at least `model_vars`. On
    /// `Unsat`, the returned core is a subset of `assumptions` sufficient
    /// for unsatisfiability.
    fn check(
        &mut self,
        assumptions: &[String],
        model_vars: &[(&str, &Sort)],
    ) -> Result<CheckResult, Self::Error>;

    /// Drop all declarations and assertions.
    fn reset(&mut self) -> Result<(), Self::Error>;
}
