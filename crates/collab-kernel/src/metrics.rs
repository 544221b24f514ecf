//! Metrics over a task's action history: error, attribution and cumulative
//! statistics.
//!
//! Every quantity is a pure function of the task's structural parameters
//! and its action list. Per-action quantities are reached through
//! [`ActionView`], which pairs a task with an explicit action index so the
//! predecessor of an action is always `index - 1`.
//!
//! Designer scoping works by boolean masking of the flat owner arrays: a
//! designer-scoped vector contains only the entries owned by that designer,
//! in index order. A designer that owns nothing (or is not on the task)
//! yields empty vectors and zero norms.

use crate::linalg;
use crate::task::{Action, DesignerId, Task};

/// Keep the entries of `values` whose owner is `designer`, or all of them
/// when `designer` is `None`.
pub fn restrict(values: &[f64], owners: &[DesignerId], designer: Option<DesignerId>) -> Vec<f64> {
    match designer {
        None => values.to_vec(),
        Some(designer) => values
            .iter()
            .zip(owners)
            .filter(|(_, owner)| **owner == designer)
            .map(|(v, _)| *v)
            .collect(),
    }
}

/// Encode an optional index the way attribution deltas expect (`-1` for none).
fn signed(index: Option<usize>) -> i64 {
    index.map_or(-1, |i| i as i64)
}

/// An action in the context of its owning task.
#[derive(Debug, Clone, Copy)]
pub struct ActionView<'a> {
    task: &'a Task,
    index: usize,
}

impl<'a> ActionView<'a> {
    pub(crate) fn new(task: &'a Task, index: usize) -> Self {
        Self { task, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn action(&self) -> &'a Action {
        &self.task.actions()[self.index]
    }

    /// The preceding action's view, `None` for the initialization action.
    pub fn previous(&self) -> Option<ActionView<'a>> {
        self.index
            .checked_sub(1)
            .map(|index| ActionView::new(self.task, index))
    }

    /// Milliseconds since the task started, `None` if no start time is set.
    pub fn elapsed_time(&self) -> Option<f64> {
        self.task.time_start().map(|start| self.action().time - start)
    }

    /// `M · input`, optionally restricted to the outputs owned by `designer`.
    pub fn output(&self, designer: Option<DesignerId>) -> Vec<f64> {
        let output = linalg::mat_vec(self.task.coupling(), &self.action().input);
        restrict(&output, self.task.outputs(), designer)
    }

    /// `output - target` under the same restriction.
    pub fn error(&self, designer: Option<DesignerId>) -> Vec<f64> {
        let target = restrict(self.task.target(), self.task.outputs(), designer);
        linalg::sub(&self.output(designer), &target)
    }

    pub fn error_norm(&self, designer: Option<DesignerId>) -> f64 {
        linalg::norm(&self.error(designer))
    }

    /// True if every unrestricted error component is strictly below `error_tol`.
    pub fn is_solved(&self, error_tol: f64) -> bool {
        self.error(None).iter().all(|e| e.abs() < error_tol)
    }

    /// The input vector, optionally restricted to the inputs owned by `designer`.
    pub fn input(&self, designer: Option<DesignerId>) -> Vec<f64> {
        restrict(&self.action().input, self.task.inputs(), designer)
    }

    /// Change in input relative to the previous action. All zeros for the
    /// initialization action.
    pub fn input_delta(&self, designer: Option<DesignerId>) -> Vec<f64> {
        let input = self.input(designer);
        match self.previous() {
            Some(previous) => linalg::sub(&input, &previous.input(designer)),
            None => vec![0.0; input.len()],
        }
    }

    /// Index of the first changed input, `None` if nothing changed.
    ///
    /// With a designer scope the index is into the designer's restricted
    /// vector, not the full input vector.
    pub fn input_index(&self, designer: Option<DesignerId>) -> Option<usize> {
        self.input_delta(designer).iter().position(|&d| d != 0.0)
    }

    /// Designer owning the changed input.
    ///
    /// `None` for the initialization action and for an action that changed
    /// nothing.
    pub fn input_designer(&self) -> Option<DesignerId> {
        if self.index == 0 {
            return None;
        }
        self.input_index(None).map(|i| self.task.inputs()[i])
    }

    /// Change of `input_index` relative to the previous action.
    ///
    /// Zero for the first two actions. A missing index counts as `-1`.
    pub fn input_delta_index(&self, designer: Option<DesignerId>) -> i64 {
        match self.previous() {
            Some(previous) if self.index > 1 => {
                signed(self.input_index(designer)) - signed(previous.input_index(designer))
            }
            _ => 0,
        }
    }

    /// Change of `input_designer` relative to the previous action.
    ///
    /// Zero for the first two actions. A missing designer counts as `-1`.
    pub fn input_delta_designer(&self) -> i64 {
        let as_signed = |d: Option<DesignerId>| d.map_or(-1, i64::from);
        match self.previous() {
            Some(previous) if self.index > 1 => {
                as_signed(self.input_designer()) - as_signed(previous.input_designer())
            }
            _ => 0,
        }
    }

    /// Euclidean norm of `input_delta`.
    pub fn input_delta_size(&self, designer: Option<DesignerId>) -> f64 {
        linalg::norm(&self.input_delta(designer))
    }
}

/// True if the task's last action is solved within `error_tol`.
pub fn is_solved(task: &Task, error_tol: f64) -> bool {
    task.actions()
        .len()
        .checked_sub(1)
        .and_then(|last| task.view(last))
        .is_some_and(|view| view.is_solved(error_tol))
}

/// Number of adjacent action pairs whose (designer-scoped) input differs.
pub fn count_actions(task: &Task, designer: Option<DesignerId>) -> usize {
    task.views()
        .filter_map(|view| view.previous().map(|previous| (view, previous)))
        .filter(|(view, previous)| view.input(designer) != previous.input(designer))
        .count()
}

/// Number of adjacent action pairs where the error norm strictly decreased.
pub fn count_productive_actions(task: &Task, designer: Option<DesignerId>) -> usize {
    task.views()
        .filter_map(|view| view.previous().map(|previous| (view, previous)))
        .filter(|(view, previous)| view.error_norm(designer) < previous.error_norm(designer))
        .count()
}

/// Sum of per-step input-delta norms. The initialization action contributes zero.
pub fn cumulative_input_distance_norm(task: &Task, designer: Option<DesignerId>) -> f64 {
    task.views().map(|view| view.input_delta_size(designer)).sum()
}

/// Sum of per-action error norms.
pub fn cumulative_error_norm(task: &Task, designer: Option<DesignerId>) -> f64 {
    task.views().map(|view| view.error_norm(designer)).sum()
}
