//! Configuration types for task generation.

use serde::{Deserialize, Serialize};

/// How inputs are coupled to outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouplingMode {
    /// Dense orthonormal coupling: every output depends on every input.
    #[default]
    Coupled,
    /// Signed identity: each output depends on exactly one input.
    Uncoupled,
}

impl CouplingMode {
    pub fn from_coupled(is_coupled: bool) -> Self {
        if is_coupled {
            Self::Coupled
        } else {
            Self::Uncoupled
        }
    }

    pub fn is_coupled(self) -> bool {
        self == Self::Coupled
    }
}

/// Generator configuration.
///
/// Loaded from JSON alongside session plans; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Coupling construction mode
    pub coupling: CouplingMode,
    /// Every solution component must exceed this in absolute value
    pub solution_threshold: f64,
    /// Upper bound on target rejection-sampling draws
    pub max_target_attempts: usize,
    /// Random seed for reproducibility (None for random)
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            coupling: CouplingMode::Coupled,
            solution_threshold: 0.20,
            max_target_attempts: 100_000,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn coupled() -> Self {
        Self::default()
    }

    pub fn uncoupled() -> Self {
        Self {
            coupling: CouplingMode::Uncoupled,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
