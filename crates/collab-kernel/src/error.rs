//! Error types for task construction and generation.

use thiserror::Error;

use crate::task::DesignerId;

/// Errors raised when a task is malformed or cannot be generated.
///
/// Metric queries never produce these: a designer-scoped query for an
/// unknown designer yields empty vectors and zero norms instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("task must have at least one designer")]
    NoDesigners,

    #[error("designer {0} is listed more than once")]
    DuplicateDesigner(DesignerId),

    #[error("task size must be at least 1")]
    EmptyTask,

    #[error("{field} has length {actual}, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field}[{index}] references designer {designer}, which is not on the task")]
    UnknownDesigner {
        field: &'static str,
        index: usize,
        designer: DesignerId,
    },

    #[error("{field} declares {declared} variables for designer {designer}, but {actual} are assigned")]
    CountMismatch {
        field: &'static str,
        designer: DesignerId,
        declared: usize,
        actual: usize,
    },

    #[error("{field} contains a non-finite value at index {index}")]
    NonFinite { field: &'static str, index: usize },

    /// Rejection sampling for the target did not find an admissible draw.
    #[error("no target with every solution component above {threshold} after {attempts} attempts")]
    TargetSearchExhausted { attempts: usize, threshold: f64 },

    #[error("task is already complete")]
    AlreadyComplete,
}

/// Result alias for kernel operations.
pub type Result<T> = std::result::Result<T, TaskError>;
