//! Task and Action: the data model of a single collaborative design task.
//!
//! A task couples an input vector to an output vector through a fixed square
//! matrix. Each designer owns a subset of the inputs and a subset of the
//! outputs, encoded as flat owner arrays (`inputs[i]` is the designer that
//! owns input `i`). The action history is append-only.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};
use crate::linalg::{self, Matrix};
use crate::metrics::{self, ActionView};

/// Identifier of a designer participating in a task.
pub type DesignerId = u32;

/// A full-state snapshot of the input vector at one point in time.
///
/// Actions hold no reference to their task; derived quantities (error,
/// deltas, attribution) are computed through [`Task::view`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Timestamp in milliseconds.
    pub time: f64,
    /// The complete input vector after this action.
    pub input: Vec<f64>,
}

impl Action {
    pub fn new(time: f64, input: Vec<f64>) -> Self {
        Self { time, input }
    }

    /// The initialization action: all inputs at zero.
    pub fn zeros(time: f64, size: usize) -> Self {
        Self::new(time, vec![0.0; size])
    }
}

/// Unvalidated wire form of a task, used on the way in.
#[derive(Deserialize)]
struct RawTask {
    designers: Vec<DesignerId>,
    num_inputs: Vec<usize>,
    num_outputs: Vec<usize>,
    coupling: Matrix,
    target: Vec<f64>,
    inputs: Vec<DesignerId>,
    outputs: Vec<DesignerId>,
    #[serde(default)]
    time_start: Option<f64>,
    #[serde(default)]
    time_complete: Option<f64>,
    /// Older session files write `null` for an empty history.
    #[serde(default)]
    actions: Option<Vec<Action>>,
    #[serde(default)]
    score: Option<f64>,
}

impl TryFrom<RawTask> for Task {
    type Error = TaskError;

    fn try_from(raw: RawTask) -> Result<Self> {
        let mut task = Task::new(
            raw.designers,
            raw.num_inputs,
            raw.num_outputs,
            raw.coupling,
            raw.target,
            raw.inputs,
            raw.outputs,
        )?;
        task.time_start = raw.time_start;
        task.time_complete = raw.time_complete;
        task.score = raw.score;
        for action in raw.actions.unwrap_or_default() {
            task.push_action(action)?;
        }
        Ok(task)
    }
}

/// A collaborative design task.
///
/// Constructed fully formed (by the generator or by deserialization) and
/// validated on construction. Only the action history and the timing fields
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTask")]
pub struct Task {
    designers: Vec<DesignerId>,
    num_inputs: Vec<usize>,
    num_outputs: Vec<usize>,
    coupling: Matrix,
    target: Vec<f64>,
    inputs: Vec<DesignerId>,
    outputs: Vec<DesignerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_complete: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
}

impl Task {
    /// Create a task from its structural parameters.
    ///
    /// Fails if the designers are empty or repeated, if any array disagrees
    /// with the size `N = target.len()`, if an owner array references an
    /// unknown designer, or if the declared per-designer counts do not match
    /// the owner arrays.
    pub fn new(
        designers: Vec<DesignerId>,
        num_inputs: Vec<usize>,
        num_outputs: Vec<usize>,
        coupling: Matrix,
        target: Vec<f64>,
        inputs: Vec<DesignerId>,
        outputs: Vec<DesignerId>,
    ) -> Result<Self> {
        let task = Self {
            designers,
            num_inputs,
            num_outputs,
            coupling,
            target,
            inputs,
            outputs,
            time_start: None,
            time_complete: None,
            actions: Vec::new(),
            score: None,
        };
        task.validate()?;
        Ok(task)
    }

    fn validate(&self) -> Result<()> {
        validate_designers(&self.designers)?;

        let n = self.target.len();
        if n == 0 {
            return Err(TaskError::EmptyTask);
        }
        check_finite("target", &self.target)?;

        check_len("coupling", n, self.coupling.len())?;
        for row in &self.coupling {
            check_len("coupling row", n, row.len())?;
            check_finite("coupling", row)?;
        }

        let d = self.designers.len();
        check_len("num_inputs", d, self.num_inputs.len())?;
        check_len("num_outputs", d, self.num_outputs.len())?;
        check_len("inputs", n, self.inputs.len())?;
        check_len("outputs", n, self.outputs.len())?;

        check_owners("inputs", &self.inputs, &self.designers, &self.num_inputs)?;
        check_owners("outputs", &self.outputs, &self.designers, &self.num_outputs)?;
        Ok(())
    }

    /// Task size `N`.
    pub fn size(&self) -> usize {
        self.target.len()
    }

    pub fn designers(&self) -> &[DesignerId] {
        &self.designers
    }

    pub fn num_inputs(&self) -> &[usize] {
        &self.num_inputs
    }

    pub fn num_outputs(&self) -> &[usize] {
        &self.num_outputs
    }

    pub fn coupling(&self) -> &[Vec<f64>] {
        &self.coupling
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Owner of each input index.
    pub fn inputs(&self) -> &[DesignerId] {
        &self.inputs
    }

    /// Owner of each output index.
    pub fn outputs(&self) -> &[DesignerId] {
        &self.outputs
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn time_start(&self) -> Option<f64> {
        self.time_start
    }

    pub fn time_complete(&self) -> Option<f64> {
        self.time_complete
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn has_designer(&self, designer: DesignerId) -> bool {
        self.designers.contains(&designer)
    }

    /// Number of inputs owned by `designer`, zero if not on the task.
    pub fn designer_num_inputs(&self, designer: DesignerId) -> usize {
        self.designers
            .iter()
            .position(|&d| d == designer)
            .map_or(0, |i| self.num_inputs[i])
    }

    /// Number of outputs owned by `designer`, zero if not on the task.
    pub fn designer_num_outputs(&self, designer: DesignerId) -> usize {
        self.designers
            .iter()
            .position(|&d| d == designer)
            .map_or(0, |i| self.num_outputs[i])
    }

    /// Target restricted to the outputs owned by `designer`.
    pub fn designer_target(&self, designer: DesignerId) -> Vec<f64> {
        metrics::restrict(&self.target, &self.outputs, Some(designer))
    }

    /// The zero-error input vector `x* = Mᵗ·y*`.
    pub fn solution(&self) -> Vec<f64> {
        linalg::mat_t_vec(&self.coupling, &self.target)
    }

    /// Elapsed milliseconds from start to completion, `None` while incomplete.
    pub fn duration(&self) -> Option<f64> {
        match (self.time_start, self.time_complete) {
            (Some(start), Some(complete)) => Some(complete - start),
            _ => None,
        }
    }

    /// Record the start time set by the surrounding harness.
    pub fn set_time_start(&mut self, time: f64) {
        self.time_start = Some(time);
    }

    /// Start the task at `time` and seed the history with an all-zero
    /// initialization action if it is still empty.
    pub fn start(&mut self, time: f64) -> Result<()> {
        self.time_start = Some(time);
        if self.actions.is_empty() {
            self.push_action(Action::zeros(time, self.size()))?;
        }
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.time_start.is_some()
    }

    /// Record the external score summary.
    pub fn set_score(&mut self, score: f64) {
        self.score = Some(score);
    }

    /// Mark the task complete. Completion is terminal.
    pub fn complete(&mut self, time: f64) -> Result<()> {
        if self.time_complete.is_some() {
            return Err(TaskError::AlreadyComplete);
        }
        self.time_complete = Some(time);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.time_complete.is_some()
    }

    /// Append an action and return its index.
    pub fn push_action(&mut self, action: Action) -> Result<usize> {
        check_len("action input", self.size(), action.input.len())?;
        check_finite("action input", &action.input)?;
        self.actions.push(action);
        Ok(self.actions.len() - 1)
    }

    /// The most recent action, if any.
    pub fn last_action(&self) -> Option<&Action> {
        self.actions.last()
    }

    /// A view of the action at `index` for metric queries.
    pub fn view(&self, index: usize) -> Option<ActionView<'_>> {
        (index < self.actions.len()).then(|| ActionView::new(self, index))
    }

    /// Views of every action in order.
    pub fn views(&self) -> impl Iterator<Item = ActionView<'_>> {
        (0..self.actions.len()).map(move |i| ActionView::new(self, i))
    }

    /// True if the last action brings every error component strictly inside
    /// `error_tol`. False when no action exists.
    pub fn is_solved(&self, error_tol: f64) -> bool {
        metrics::is_solved(self, error_tol)
    }

    /// Number of actions that changed the (designer-scoped) input.
    pub fn count_actions(&self, designer: Option<DesignerId>) -> usize {
        metrics::count_actions(self, designer)
    }

    /// Number of actions that strictly reduced the (designer-scoped) error norm.
    pub fn count_productive_actions(&self, designer: Option<DesignerId>) -> usize {
        metrics::count_productive_actions(self, designer)
    }

    /// Sum of per-step input-delta norms.
    pub fn cumulative_input_distance_norm(&self, designer: Option<DesignerId>) -> f64 {
        metrics::cumulative_input_distance_norm(self, designer)
    }

    /// Sum of per-action error norms.
    pub fn cumulative_error_norm(&self, designer: Option<DesignerId>) -> f64 {
        metrics::cumulative_error_norm(self, designer)
    }
}

/// Check that the designer list is non-empty and has no repeats.
pub(crate) fn validate_designers(designers: &[DesignerId]) -> Result<()> {
    if designers.is_empty() {
        return Err(TaskError::NoDesigners);
    }
    for (i, d) in designers.iter().enumerate() {
        if designers[..i].contains(d) {
            return Err(TaskError::DuplicateDesigner(*d));
        }
    }
    Ok(())
}

/// Check that every owner is a known designer and the counts agree.
pub(crate) fn check_owners(
    field: &'static str,
    owners: &[DesignerId],
    designers: &[DesignerId],
    declared: &[usize],
) -> Result<()> {
    if let Some((index, &designer)) = owners
        .iter()
        .enumerate()
        .find(|(_, d)| !designers.contains(d))
    {
        return Err(TaskError::UnknownDesigner {
            field,
            index,
            designer,
        });
    }
    for (&designer, &declared) in designers.iter().zip(declared) {
        let actual = count_owned(owners, designer);
        if actual != declared {
            return Err(TaskError::CountMismatch {
                field,
                designer,
                declared,
                actual,
            });
        }
    }
    Ok(())
}

pub(crate) fn count_owned(owners: &[DesignerId], designer: DesignerId) -> usize {
    owners.iter().filter(|&&d| d == designer).count()
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(TaskError::LengthMismatch {
            field,
            expected,
            actual,
        })
    }
}

fn check_finite(field: &'static str, values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(TaskError::NonFinite { field, index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> Task {
        Task::new(
            vec![0],
            vec![2],
            vec![2],
            vec![vec![1.0, 0.0], vec![0.0, -1.0]],
            vec![0.5, -0.5],
            vec![0, 0],
            vec![0, 0],
        )
        .unwrap()
    }

    #[test]
    fn test_solution_is_transpose_times_target() {
        let task = two_by_two();
        assert_eq!(task.solution(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_duration_sentinel_until_complete() {
        let mut task = two_by_two();
        assert_eq!(task.duration(), None);
        task.set_time_start(1_000.0);
        assert_eq!(task.duration(), None);
        task.complete(4_500.0).unwrap();
        assert_eq!(task.duration(), Some(3_500.0));
    }

    #[test]
    fn test_complete_is_terminal() {
        let mut task = two_by_two();
        task.complete(10.0).unwrap();
        assert_eq!(task.complete(20.0), Err(TaskError::AlreadyComplete));
        assert_eq!(task.time_complete(), Some(10.0));
    }

    #[test]
    fn test_start_seeds_initialization_action() {
        let mut task = two_by_two();
        task.start(500.0).unwrap();
        assert!(task.is_started());
        assert_eq!(task.actions(), &[Action::zeros(500.0, 2)]);

        // Restarting keeps the existing history.
        task.start(600.0).unwrap();
        assert_eq!(task.actions().len(), 1);
        assert_eq!(task.time_start(), Some(600.0));
    }

    #[test]
    fn test_push_action_checks_length() {
        let mut task = two_by_two();
        assert_eq!(task.push_action(Action::zeros(0.0, 2)), Ok(0));
        assert_eq!(
            task.push_action(Action::new(1.0, vec![0.1])),
            Err(TaskError::LengthMismatch {
                field: "action input",
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(task.actions().len(), 1);
    }

    #[test]
    fn test_push_action_rejects_nan() {
        let mut task = two_by_two();
        let err = task
            .push_action(Action::new(0.0, vec![0.0, f64::NAN]))
            .unwrap_err();
        assert_eq!(
            err,
            TaskError::NonFinite {
                field: "action input",
                index: 1
            }
        );
    }

    #[test]
    fn test_rejects_empty_designers() {
        let err = Task::new(vec![], vec![], vec![], vec![vec![1.0]], vec![1.0], vec![0], vec![0])
            .unwrap_err();
        assert_eq!(err, TaskError::NoDesigners);
    }

    #[test]
    fn test_rejects_duplicate_designers() {
        let err = Task::new(
            vec![1, 1],
            vec![1, 0],
            vec![1, 0],
            vec![vec![1.0]],
            vec![1.0],
            vec![1],
            vec![1],
        )
        .unwrap_err();
        assert_eq!(err, TaskError::DuplicateDesigner(1));
    }

    #[test]
    fn test_rejects_unknown_owner() {
        let err = Task::new(
            vec![0, 1],
            vec![1, 1],
            vec![1, 1],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![0.5, 0.5],
            vec![0, 7],
            vec![0, 1],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TaskError::UnknownDesigner {
                field: "inputs",
                index: 1,
                designer: 7
            }
        );
    }

    #[test]
    fn test_rejects_count_mismatch() {
        let err = Task::new(
            vec![0, 1],
            vec![1, 1],
            vec![2, 0],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![0.5, 0.5],
            vec![0, 1],
            vec![0, 1],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TaskError::CountMismatch {
                field: "outputs",
                designer: 0,
                declared: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_rejects_ragged_coupling() {
        let err = Task::new(
            vec![0],
            vec![2],
            vec![2],
            vec![vec![1.0, 0.0], vec![0.0]],
            vec![0.5, 0.5],
            vec![0, 0],
            vec![0, 0],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TaskError::LengthMismatch {
                field: "coupling row",
                ..
            }
        ));
    }

    #[test]
    fn test_designer_counts_and_target_projection() {
        let task = Task::new(
            vec![3, 5],
            vec![1, 2],
            vec![2, 1],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
            vec![0.1, 0.2, 0.3],
            vec![3, 5, 5],
            vec![3, 3, 5],
        )
        .unwrap();
        assert_eq!(task.designer_num_inputs(5), 2);
        assert_eq!(task.designer_num_outputs(5), 1);
        assert_eq!(task.designer_num_inputs(9), 0);
        assert_eq!(task.designer_target(3), vec![0.1, 0.2]);
        assert!(task.designer_target(9).is_empty());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{
            "designers": [0],
            "num_inputs": [2],
            "num_outputs": [2],
            "coupling": [[1.0, 0.0], [0.0, 1.0]],
            "target": [0.5, 0.5],
            "inputs": [0, 1],
            "outputs": [0, 0]
        }"#;
        let err = serde_json::from_str::<Task>(json).unwrap_err();
        assert!(err.to_string().contains("inputs[1]"));
    }

    #[test]
    fn test_wire_form_omits_unset_fields() {
        let task = two_by_two();
        let value = serde_json::to_value(&task).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 7);
        assert!(!object.contains_key("actions"));
        assert!(!object.contains_key("time_start"));
    }

    #[test]
    fn test_round_trip_with_history() {
        let mut task = two_by_two();
        task.set_time_start(100.0);
        task.push_action(Action::zeros(100.0, 2)).unwrap();
        task.push_action(Action::new(150.0, vec![0.25, 0.0])).unwrap();
        task.complete(200.0).unwrap();
        task.set_score(42.0);

        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }
}
