use thiserror::Error;

/// Hard failures of the engine.
///
/// Only transport-level problems surface here (a backend that cannot be
/// spoken to, a witness that cannot be reconstructed). An indecisive oracle
/// answer is a [`crate::result::SolveResult::Unknown`] verdict, never an
/// error, and malformed input is rejected by `civet-ir` before an engine
/// exists.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("solver error: {0}")]
    Solver(String),
}
