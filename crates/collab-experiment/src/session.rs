//! Sessions and rounds: the containers an experiment is run from.
//!
//! A session holds the error tolerance and an ordered list of training and
//! experimental rounds. Each round assigns groups of designers to tasks,
//! one task per group.

use std::path::Path;

use anyhow::{Context, Result, bail};
use collab_kernel::{CouplingMode, DesignerId, GeneratorConfig, LinearTaskGenerator, Task};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_num_designers() -> usize {
    4
}

fn default_error_tol() -> f64 {
    0.05
}

fn default_coupled() -> bool {
    true
}

/// An experimental session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub name: String,
    /// Number of designer seats
    #[serde(default = "default_num_designers")]
    pub num_designers: usize,
    /// Every error component must fall strictly below this for a task to be solved
    #[serde(default = "default_error_tol")]
    pub error_tol: f64,
    #[serde(default)]
    pub training: Vec<Round>,
    #[serde(default)]
    pub rounds: Vec<Round>,
}

/// A round of tasks played at the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub name: String,
    /// Designer groups, one per task
    pub assignments: Vec<Vec<DesignerId>>,
    pub tasks: Vec<Task>,
    /// Time limit in milliseconds
    pub max_time: Option<f64>,
}

/// Where a round sits in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKey {
    Training(usize),
    Experimental(usize),
}

/// Plan for generating one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundPlan {
    pub name: String,
    /// Task size N
    pub size: usize,
    pub assignments: Vec<Vec<DesignerId>>,
    #[serde(default = "default_coupled")]
    pub coupled: bool,
    /// Time limit in seconds
    #[serde(default)]
    pub max_time: Option<f64>,
}

/// Plan for generating a whole session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPlan {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_num_designers")]
    pub num_designers: usize,
    #[serde(default = "default_error_tol")]
    pub error_tol: f64,
    /// Random seed shared by every round (None for random)
    #[serde(default)]
    pub seed: Option<u64>,
    /// Threshold and attempt bound for target sampling; coupling comes from each round
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub training: Vec<RoundPlan>,
    #[serde(default)]
    pub rounds: Vec<RoundPlan>,
}

impl SessionPlan {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading session plan {}", path.display()))?;
        let plan: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing session plan {}", path.display()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Reject settings that generation would not honor.
    ///
    /// Every round draws from the stream seeded by `seed`, so a seed inside
    /// the `generator` block has no effect.
    pub fn validate(&self) -> Result<()> {
        if let Some(seed) = self.generator.seed {
            bail!("generator.seed ({seed}) is not used; set the plan's top-level seed instead");
        }
        Ok(())
    }
}

impl Round {
    /// Generate a round with one task per assignment, drawing from `rng`.
    pub fn generate<R: Rng>(
        plan: &RoundPlan,
        generator: &GeneratorConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let config = GeneratorConfig {
            coupling: CouplingMode::from_coupled(plan.coupled),
            ..generator.clone()
        };
        let tasks = LinearTaskGenerator::new(config)
            .generate_batch(&plan.assignments, plan.size, rng)
            .with_context(|| format!("generating round '{}'", plan.name))?;

        info!(
            round = %plan.name,
            tasks = tasks.len(),
            size = plan.size,
            coupled = plan.coupled,
            "Generated round"
        );

        Ok(Self {
            name: plan.name.clone(),
            assignments: plan.assignments.clone(),
            tasks,
            max_time: plan.max_time.map(|seconds| seconds * 1000.0),
        })
    }

    /// The task the designer is assigned to in this round.
    pub fn designer_task(&self, designer: DesignerId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.has_designer(designer))
    }

    pub fn designer_task_mut(&mut self, designer: DesignerId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.has_designer(designer))
    }

    /// True once every task in the round is complete.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(Task::is_complete)
    }
}

impl Session {
    /// Generate a session from a plan.
    ///
    /// All rounds draw from a single random stream seeded by the plan, so the
    /// same plan and seed always produce the same session.
    pub fn generate(plan: &SessionPlan) -> Result<Self> {
        plan.validate()?;
        let mut rng: Box<dyn RngCore> = match plan.seed {
            Some(seed) => Box::new(ChaCha8Rng::seed_from_u64(seed)),
            None => Box::new(rand::rng()),
        };

        let training = plan
            .training
            .iter()
            .map(|round| Round::generate(round, &plan.generator, &mut rng))
            .collect::<Result<Vec<_>>>()?;
        let rounds = plan
            .rounds
            .iter()
            .map(|round| Round::generate(round, &plan.generator, &mut rng))
            .collect::<Result<Vec<_>>>()?;

        let session = Self {
            name: plan.name.clone(),
            num_designers: plan.num_designers,
            error_tol: plan.error_tol,
            training,
            rounds,
        };
        session.validate()?;
        Ok(session)
    }

    /// Check cross-references the task model cannot see on its own.
    ///
    /// Each round needs one task per assignment with matching designers, and
    /// every designer must be a valid seat index.
    pub fn validate(&self) -> Result<()> {
        if self.error_tol.is_nan() || self.error_tol <= 0.0 {
            bail!("error_tol must be positive, got {}", self.error_tol);
        }
        for round in self.training.iter().chain(&self.rounds) {
            if round.assignments.len() != round.tasks.len() {
                bail!(
                    "round '{}' has {} assignments but {} tasks",
                    round.name,
                    round.assignments.len(),
                    round.tasks.len()
                );
            }
            for (assignment, task) in round.assignments.iter().zip(&round.tasks) {
                if assignment.as_slice() != task.designers() {
                    bail!(
                        "round '{}' assigns {:?} but the task lists {:?}",
                        round.name,
                        assignment,
                        task.designers()
                    );
                }
                if let Some(d) = assignment
                    .iter()
                    .find(|&&d| d as usize >= self.num_designers)
                {
                    bail!(
                        "round '{}' assigns designer {} but the session has {} seats",
                        round.name,
                        d,
                        self.num_designers
                    );
                }
            }
        }
        Ok(())
    }

    /// True if the task's last action is within this session's tolerance.
    pub fn is_solved(&self, task: &Task) -> bool {
        task.is_solved(self.error_tol)
    }

    /// Look up a round by name, training rounds first.
    pub fn find_round(&self, name: &str) -> Option<RoundKey> {
        self.training
            .iter()
            .position(|r| r.name == name)
            .map(RoundKey::Training)
            .or_else(|| {
                self.rounds
                    .iter()
                    .position(|r| r.name == name)
                    .map(RoundKey::Experimental)
            })
    }

    pub fn round(&self, key: RoundKey) -> Option<&Round> {
        match key {
            RoundKey::Training(i) => self.training.get(i),
            RoundKey::Experimental(i) => self.rounds.get(i),
        }
    }

    pub fn round_mut(&mut self, key: RoundKey) -> Option<&mut Round> {
        match key {
            RoundKey::Training(i) => self.training.get_mut(i),
            RoundKey::Experimental(i) => self.rounds.get_mut(i),
        }
    }

    /// The round that follows `key`: training rounds in order, then the
    /// experimental rounds. `None` after the last experimental round.
    pub fn next_round(&self, key: RoundKey) -> Option<RoundKey> {
        match key {
            RoundKey::Training(i) if i + 1 < self.training.len() => Some(RoundKey::Training(i + 1)),
            RoundKey::Training(_) => (!self.rounds.is_empty()).then_some(RoundKey::Experimental(0)),
            RoundKey::Experimental(i) if i + 1 < self.rounds.len() => {
                Some(RoundKey::Experimental(i + 1))
            }
            RoundKey::Experimental(_) => None,
        }
    }

    /// Save the session to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a session from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading session {}", path.display()))?;
        let session: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing session {}", path.display()))?;
        session.validate()?;
        Ok(session)
    }
}
