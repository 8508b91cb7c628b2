#![doc = include_str!("../README.md")]

pub mod config;
pub mod derivation;
pub mod engine;
pub mod error;
pub mod frames;
pub mod generalize;
pub mod obligation;
pub mod result;

pub use config::{EngineConfig, TieBreak};
pub use engine::Engine;
pub use error::EngineError;
pub use frames::{FrameSet, QueryOutcome, INFINITE_LEVEL};
pub use result::{EngineStats, GroundInstance, InvariantCertificate, SolveResult};
