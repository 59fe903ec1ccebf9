//! Reference model for model-based testing.
//!
//! The model captures WHAT the gateway and store do, not HOW.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Single-threaded: one operation at a time, no locks
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod session;
mod world;

pub use operation::{ClientId, Operation, OperationError, OperationResult, SmallText};
pub use session::ModelSession;
pub use world::{ModelConfig, ModelMessage, ModelWorld, ObservableState};
