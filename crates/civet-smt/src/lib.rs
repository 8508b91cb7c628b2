#![doc = include_str!("../README.md")]

pub mod backends;
pub mod model;
pub mod project;
pub mod solver;
pub mod sorts;
pub mod terms;

pub use model::{Model, Value};
pub use solver::{CheckResult, TheorySolver};
pub use sorts::Sort;
pub use terms::Term;
