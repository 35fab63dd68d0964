// This module contains the definition of `Election`.
mod election;

// Re-exports.
pub use election::{Election, NodeState};
