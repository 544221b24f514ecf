//! Linear task generator.
//!
//! Builds a square coupling matrix (dense orthonormal or signed diagonal),
//! partitions inputs and outputs among designers, and rejection-samples a
//! unit target whose solution stays away from the all-zero starting point
//! along every axis.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::{CouplingMode, GeneratorConfig};
use crate::error::{Result, TaskError};
use crate::linalg::{self, Matrix};
use crate::task::{self, DesignerId, Task};

/// Explicit ownership of inputs and outputs. `None` means split evenly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub inputs: Option<Vec<DesignerId>>,
    pub outputs: Option<Vec<DesignerId>>,
}

/// Split indices `0..size` into contiguous near-equal blocks, one per designer.
///
/// Index `i` goes to block `i // (size / D)`, floor division on `f64` with the
/// block width rounded to a double. Where the width is inexact this can land
/// one block lower than `i * D / size` in integers. Blocks are capped at `D - 1`.
pub fn even_partition(designers: &[DesignerId], size: usize) -> Vec<DesignerId> {
    if designers.is_empty() {
        return Vec::new();
    }
    let d = designers.len();
    let width = size as f64 / d as f64;
    (0..size)
        .map(|i| {
            let block = floor_div(i as f64, width) as usize;
            designers[block.min(d - 1)]
        })
        .collect()
}

/// Floor division of non-negative `a` by positive `b`, computed from the
/// exact remainder so that `a` sitting just below a multiple of `b` stays in
/// the lower block.
fn floor_div(a: f64, b: f64) -> f64 {
    let rem = a % b;
    let div = (a - rem) / b;
    let floor = div.floor();
    if div - floor > 0.5 { floor + 1.0 } else { floor }
}

/// Generator for linear design tasks.
pub struct LinearTaskGenerator {
    config: GeneratorConfig,
}

impl LinearTaskGenerator {
    /// Create a new generator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate an evenly partitioned task using the configured seed.
    pub fn generate(&self, designers: &[DesignerId], size: usize) -> Result<Task> {
        let mut rng: Box<dyn RngCore> = match self.config.seed {
            Some(seed) => Box::new(ChaCha8Rng::seed_from_u64(seed)),
            None => Box::new(rand::rng()),
        };
        self.generate_with_rng(designers, size, &Partition::default(), &mut rng)
    }

    /// Generate a task drawing all randomness from `rng`.
    ///
    /// The returned task has no actions and no timing fields; seeding the
    /// history is up to the caller.
    pub fn generate_with_rng<R: Rng>(
        &self,
        designers: &[DesignerId],
        size: usize,
        partition: &Partition,
        rng: &mut R,
    ) -> Result<Task> {
        task::validate_designers(designers)?;
        if size == 0 {
            return Err(TaskError::EmptyTask);
        }

        let inputs = partition
            .inputs
            .clone()
            .unwrap_or_else(|| even_partition(designers, size));
        let outputs = partition
            .outputs
            .clone()
            .unwrap_or_else(|| even_partition(designers, size));
        let num_inputs = designers
            .iter()
            .map(|&d| task::count_owned(&inputs, d))
            .collect();
        let num_outputs = designers
            .iter()
            .map(|&d| task::count_owned(&outputs, d))
            .collect();

        let coupling = self.coupling_matrix(size, rng);
        let target = self.sample_target(&coupling, rng)?;

        debug!(
            size = size,
            designers = designers.len(),
            coupled = self.config.coupling.is_coupled(),
            "Generated task"
        );

        // Validation catches explicit partitions of the wrong length or with
        // designers that are not on the task.
        Task::new(
            designers.to_vec(),
            num_inputs,
            num_outputs,
            coupling,
            target,
            inputs,
            outputs,
        )
    }

    /// Generate one evenly partitioned task per designer group.
    pub fn generate_batch<R: Rng>(
        &self,
        assignments: &[Vec<DesignerId>],
        size: usize,
        rng: &mut R,
    ) -> Result<Vec<Task>> {
        assignments
            .iter()
            .map(|designers| {
                self.generate_with_rng(designers, size, &Partition::default(), rng)
            })
            .collect()
    }

    /// Draw the coupling matrix for the configured mode.
    pub fn coupling_matrix<R: Rng>(&self, size: usize, rng: &mut R) -> Matrix {
        match self.config.coupling {
            CouplingMode::Coupled => {
                let draw: Matrix = (0..size)
                    .map(|_| (0..size).map(|_| rng.random::<f64>()).collect())
                    .collect();
                linalg::orthonormalize(&draw)
            }
            CouplingMode::Uncoupled => {
                let signs: Vec<f64> = (0..size)
                    .map(|_| if rng.random_bool(0.5) { 1.0 } else { -1.0 })
                    .collect();
                (0..size)
                    .map(|i| {
                        (0..size)
                            .map(|j| if i == j { signs[i] } else { 0.0 })
                            .collect()
                    })
                    .collect()
            }
        }
    }

    /// Rejection-sample a unit target whose solution `Mᵗ·y` has every
    /// component above the threshold in absolute value.
    pub fn sample_target<R: Rng>(
        &self,
        coupling: &[Vec<f64>],
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        let size = coupling.len();
        let threshold = self.config.solution_threshold;

        for attempt in 1..=self.config.max_target_attempts {
            let draw: Vec<f64> = (0..size).map(|_| rng.random_range(-1.0..1.0)).collect();
            let length = linalg::norm(&draw);
            if length == 0.0 {
                continue;
            }
            let target: Vec<f64> = draw.iter().map(|x| x / length).collect();
            let solution = linalg::mat_t_vec(coupling, &target);
            if solution.iter().all(|x| x.abs() > threshold) {
                debug!(attempts = attempt, "Accepted target");
                return Ok(target);
            }
        }

        Err(TaskError::TargetSearchExhausted {
            attempts: self.config.max_target_attempts,
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(config: GeneratorConfig, seed: u64) -> Task {
        LinearTaskGenerator::new(config.with_seed(seed))
            .generate(&[0, 1], 4)
            .unwrap()
    }

    #[test]
    fn test_even_partition_exact_split() {
        assert_eq!(even_partition(&[0, 1], 4), vec![0, 0, 1, 1]);
        assert_eq!(even_partition(&[7], 3), vec![7, 7, 7]);
    }

    #[test]
    fn test_even_partition_uneven_split() {
        assert_eq!(even_partition(&[0, 1], 5), vec![0, 0, 0, 1, 1]);
        assert_eq!(even_partition(&[0, 1, 2], 7), vec![0, 0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_even_partition_inexact_block_width() {
        // 10 / 6 is not a double; index 5 sits just below 3 * width.
        assert_eq!(
            even_partition(&[0, 1, 2, 3, 4, 5], 10),
            vec![0, 0, 1, 1, 2, 2, 3, 4, 4, 5]
        );
    }

    #[test]
    fn test_floor_div_uses_exact_remainder() {
        let width = 10.0 / 6.0;
        assert_eq!(floor_div(5.0, width), 2.0);
        assert_eq!(floor_div(6.0, width), 3.0);
        assert_eq!(floor_div(4.0, 2.0), 2.0);
        assert_eq!(floor_div(0.0, 2.5), 0.0);
    }

    #[test]
    fn test_even_partition_more_designers_than_indices() {
        assert_eq!(even_partition(&[0, 1, 2], 2), vec![0, 1]);
    }

    #[test]
    fn test_generated_structure() {
        let task = seeded(GeneratorConfig::coupled(), 42);
        assert_eq!(task.size(), 4);
        assert_eq!(task.inputs(), &[0, 0, 1, 1]);
        assert_eq!(task.outputs(), &[0, 0, 1, 1]);
        assert_eq!(task.num_inputs(), &[2, 2]);
        assert_eq!(task.num_outputs(), &[2, 2]);
        assert!(task.actions().is_empty());
        assert_eq!(task.time_start(), None);
    }

    #[test]
    fn test_coupled_matrix_is_orthonormal() {
        let task = seeded(GeneratorConfig::coupled(), 7);
        assert!(linalg::is_orthonormal(task.coupling(), 1e-9));
    }

    #[test]
    fn test_uncoupled_matrix_is_signed_diagonal() {
        let task = seeded(GeneratorConfig::uncoupled(), 7);
        for (i, row) in task.coupling().iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                if i == j {
                    assert!(value == 1.0 || value == -1.0);
                } else {
                    assert_eq!(value, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_target_is_unit_and_solution_clears_threshold() {
        for seed in 0..10 {
            let task = seeded(GeneratorConfig::coupled(), seed);
            assert!((linalg::norm(task.target()) - 1.0).abs() < 1e-12);
            assert!(task.solution().iter().all(|x| x.abs() > 0.20));
        }
    }

    #[test]
    fn test_reproducible_with_seed() {
        let a = seeded(GeneratorConfig::coupled(), 12345);
        let b = seeded(GeneratorConfig::coupled(), 12345);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_produce_different_tasks() {
        let a = seeded(GeneratorConfig::coupled(), 1);
        let b = seeded(GeneratorConfig::coupled(), 2);
        assert_ne!(a.coupling(), b.coupling());
    }

    #[test]
    fn test_explicit_partition() {
        let partition = Partition {
            inputs: Some(vec![1, 0, 1]),
            outputs: None,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let task = LinearTaskGenerator::new(GeneratorConfig::uncoupled())
            .generate_with_rng(&[0, 1], 3, &partition, &mut rng)
            .unwrap();
        assert_eq!(task.inputs(), &[1, 0, 1]);
        assert_eq!(task.num_inputs(), &[1, 2]);
        assert_eq!(task.outputs(), &[0, 0, 1]);
    }

    #[test]
    fn test_explicit_partition_with_unknown_designer_fails() {
        let partition = Partition {
            inputs: Some(vec![0, 5]),
            outputs: None,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = LinearTaskGenerator::new(GeneratorConfig::uncoupled())
            .generate_with_rng(&[0, 1], 2, &partition, &mut rng)
            .unwrap_err();
        assert!(matches!(err, TaskError::UnknownDesigner { designer: 5, .. }));
    }

    #[test]
    fn test_explicit_partition_with_wrong_length_fails() {
        let partition = Partition {
            inputs: None,
            outputs: Some(vec![0]),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = LinearTaskGenerator::new(GeneratorConfig::coupled())
            .generate_with_rng(&[0], 2, &partition, &mut rng)
            .unwrap_err();
        assert!(matches!(err, TaskError::LengthMismatch { field: "outputs", .. }));
    }

    #[test]
    fn test_impossible_threshold_exhausts_attempts() {
        // A unit target cannot have every component above 1 in magnitude.
        let config = GeneratorConfig {
            solution_threshold: 1.0,
            max_target_attempts: 50,
            seed: Some(1),
            ..GeneratorConfig::uncoupled()
        };
        let err = LinearTaskGenerator::new(config)
            .generate(&[0], 2)
            .unwrap_err();
        assert_eq!(
            err,
            TaskError::TargetSearchExhausted {
                attempts: 50,
                threshold: 1.0
            }
        );
    }

    #[test]
    fn test_rejects_bad_designers_and_size() {
        let generator = LinearTaskGenerator::new(GeneratorConfig::default().with_seed(1));
        assert_eq!(generator.generate(&[], 2), Err(TaskError::NoDesigners));
        assert_eq!(
            generator.generate(&[2, 2], 2),
            Err(TaskError::DuplicateDesigner(2))
        );
        assert_eq!(generator.generate(&[0], 0), Err(TaskError::EmptyTask));
    }

    #[test]
    fn test_batch_generates_one_task_per_group() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let tasks = LinearTaskGenerator::new(GeneratorConfig::coupled())
            .generate_batch(&[vec![0], vec![1, 2]], 4, &mut rng)
            .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].designers(), &[0]);
        assert_eq!(tasks[1].num_inputs(), &[2, 2]);
    }
}
