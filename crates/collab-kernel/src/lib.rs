//! Collab Kernel: the mathematical model of a collaborative design task.
//!
//! Several designers jointly search a shared input space toward a hidden
//! target output. Each designer controls a disjoint subset of the inputs and
//! observes a disjoint subset of the outputs through a fixed linear coupling.
//!
//! This crate covers:
//! - Generation of well-posed, partitioned linear tasks ([`LinearTaskGenerator`])
//! - The task and action data model ([`Task`], [`Action`])
//! - Error, convergence and attribution metrics over action histories ([`metrics`])
//!
//! Everything here is synchronous and free of I/O. Randomness is always
//! injected by the caller.

pub mod config;
pub mod error;
pub mod generator;
pub mod linalg;
pub mod metrics;
pub mod task;

pub use config::{CouplingMode, GeneratorConfig};
pub use error::{Result, TaskError};
pub use generator::{LinearTaskGenerator, Partition, even_partition};
pub use metrics::ActionView;
pub use task::{Action, DesignerId, Task};
