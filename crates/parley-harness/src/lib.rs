//! Model-based testing harness for Parley.
//!
//! The `model` module is a reference implementation of the chat semantics:
//! sessions, posting policy and the ordered log, with none of the locking,
//! storage or transport. Operations are applied to both the model and the
//! real gateway, and their results and observable states are compared.
//!
//! The `workload` module turns a seed into a reproducible operation
//! sequence for soak tests and fuzzing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod workload;

pub use model::{
    ClientId, ModelConfig, ModelMessage, ModelSession, ModelWorld, ObservableState, Operation,
    OperationError, OperationResult, SmallText,
};
pub use workload::Workload;
