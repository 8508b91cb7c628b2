use thiserror::Error;

/// Rejection reasons for malformed CHC systems.
///
/// Every variant is detected by [`crate::SystemBuilder::finish`], before an
/// engine can be constructed; search never observes a malformed rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChcError {
    #[error("duplicate relation name `{0}`")]
    DuplicateRelation(String),
    #[error("rule {rule}: undeclared relation referenced at {position}")]
    UndeclaredRelation { rule: usize, position: String },
    #[error("rule {rule}: unbound variable `{var}`")]
    UnboundVariable { rule: usize, var: String },
    #[error("rule {rule}: `{relation}` applied to {got} arguments, expected {expected}")]
    ArityMismatch {
        rule: usize,
        relation: String,
        got: usize,
        expected: usize,
    },
    #[error("rule {rule}: {context} has sort {got}, expected {expected}")]
    SortMismatch {
        rule: usize,
        context: String,
        got: String,
        expected: String,
    },
    #[error("rule {rule}: variable `{var}` declared twice")]
    DuplicateVariable { rule: usize, var: String },
    #[error("no query relation was designated")]
    MissingQuery,
}
