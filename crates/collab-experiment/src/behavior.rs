//! Random-walk design behavior.
//!
//! A baseline search policy: at every step, nudge one randomly chosen input
//! up or down by a randomly chosen step size, clamped to the input bounds,
//! until the task is solved. Used to sanity-check generated tasks and to
//! produce synthetic action histories for the metrics.

use anyhow::{Result, bail};
use collab_kernel::{Action, Task};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for the random walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomWalkConfig {
    /// Candidate step magnitudes, chosen uniformly
    pub step_sizes: Vec<f64>,
    /// Inputs are clamped to [-bound, bound]
    pub bound: f64,
    /// Give up after this many appended actions
    pub max_steps: usize,
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            step_sizes: vec![0.01, 0.1],
            bound: 1.0,
            max_steps: 1_000_000,
        }
    }
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WalkOutcome {
    /// The task was solved and marked complete.
    Solved { steps: usize },
    /// The step budget ran out first.
    StepLimit { steps: usize },
}

impl WalkOutcome {
    pub fn steps(self) -> usize {
        match self {
            Self::Solved { steps } | Self::StepLimit { steps } => steps,
        }
    }

    pub fn is_solved(self) -> bool {
        matches!(self, Self::Solved { .. })
    }
}

/// Random-walk policy driving a single task.
pub struct RandomWalk {
    config: RandomWalkConfig,
}

impl RandomWalk {
    pub fn new(config: RandomWalkConfig) -> Self {
        Self { config }
    }

    /// Walk `task` until it is solved within `error_tol` or the step budget
    /// is spent.
    ///
    /// The task must already be started (it needs an initialization action).
    /// `now` supplies the timestamp, in milliseconds, for each appended
    /// action and for completion.
    pub fn run<R: Rng>(
        &self,
        task: &mut Task,
        error_tol: f64,
        mut now: impl FnMut() -> f64,
        rng: &mut R,
    ) -> Result<WalkOutcome> {
        if self.config.step_sizes.is_empty() {
            bail!("random walk needs at least one step size");
        }
        let Some(mut design) = task.last_action().map(|a| a.input.clone()) else {
            bail!("task has no initialization action");
        };

        let size = task.size();
        let bound = self.config.bound;
        let mut steps = 0;

        while !task.is_solved(error_tol) {
            if steps >= self.config.max_steps {
                warn!(steps = steps, "Random walk hit step limit");
                return Ok(WalkOutcome::StepLimit { steps });
            }

            let variable = rng.random_range(0..size);
            let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
            let step = self
                .config
                .step_sizes
                .choose(rng)
                .copied()
                .unwrap_or_default();

            design[variable] = (design[variable] + sign * step).clamp(-bound, bound);
            task.push_action(Action::new(now(), design.clone()))?;
            steps += 1;

            if steps % 10_000 == 0 {
                debug!(
                    steps = steps,
                    error = task.views().last().map_or(0.0, |v| v.error_norm(None)),
                    "Random walk progress"
                );
            }
        }

        if !task.is_complete() {
            task.complete(now())?;
        }
        info!(steps = steps, "Random walk solved task");
        Ok(WalkOutcome::Solved { steps })
    }
}
