#![doc = include_str!("../README.md")]

pub mod errors;
pub mod system;
mod validation;

pub use errors::ChcError;
pub use system::{BodyAtom, ChcSystem, Relation, RelationId, Rule, RuleId, SystemBuilder};
