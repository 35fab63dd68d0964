// This module contains the definition of `NodeId`, the id sources and the
// port allocator.
pub mod id;

// This module contains the run configuration and the input-file parser.
pub mod config;

// This module contains the definition of `Message`.
pub mod message;

// This module contains the textual message codec.
pub mod codec;

// This module contains the election state machine.
pub mod protocol;

// This module contains the driver, the per-node activities and the framed
// connection plumbing.
pub mod run;

// This module contains the per-run diagnostic sink.
pub mod sink;

use color_eyre::eyre::Report;

pub type RunResult<T> = Result<T, Report>;
