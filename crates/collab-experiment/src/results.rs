//! Per-task report over a replayed session.
//!
//! Captures, for every task of the experimental rounds:
//! - Task size and designer group
//! - Score and completion time
//! - Action counts (all and productive)
//! - Cumulative input distance and cumulative error

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use collab_kernel::Task;
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Round-name suffixes that only describe the group size.
const GROUP_SUFFIXES: [&str; 2] = [" (Individual)", " (Pair)"];

/// Summary row for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    /// 1-based position of the round
    pub order: usize,
    pub round: String,
    /// Task size N
    pub size: usize,
    pub num_designers: usize,
    /// 1-based designer labels joined with '+'
    pub designers: String,
    /// Score in seconds
    pub score: Option<f64>,
    /// Completion time in seconds
    pub duration: Option<f64>,
    pub actions: usize,
    pub productive_actions: usize,
    pub cumulative_distance: f64,
    pub cumulative_error: f64,
}

impl TaskReport {
    pub fn from_task(order: usize, round: &str, task: &Task) -> Self {
        Self {
            order,
            round: short_round_name(round),
            size: task.num_inputs().iter().sum(),
            num_designers: task.designers().len(),
            designers: task
                .designers()
                .iter()
                .map(|d| (d + 1).to_string())
                .collect::<Vec<_>>()
                .join("+"),
            score: task.score().map(|s| s / 1000.0),
            duration: task.duration().map(|ms| ms / 1000.0),
            actions: task.count_actions(None),
            productive_actions: task.count_productive_actions(None),
            cumulative_distance: task.cumulative_input_distance_norm(None),
            cumulative_error: task.cumulative_error_norm(None),
        }
    }
}

/// Strip group-size suffixes from a round name.
pub fn short_round_name(name: &str) -> String {
    GROUP_SUFFIXES
        .iter()
        .fold(name.to_string(), |acc, suffix| acc.replace(suffix, ""))
}

/// Report rows for every task of the session's experimental rounds.
pub fn session_report(session: &Session) -> Vec<TaskReport> {
    session
        .rounds
        .iter()
        .enumerate()
        .flat_map(|(i, round)| {
            round
                .tasks
                .iter()
                .map(move |task| TaskReport::from_task(i + 1, &round.name, task))
        })
        .collect()
}

/// Render the report as a right-aligned comma-separated table.
pub fn render_table(session_name: &str, reports: &[TaskReport]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{session_name}");
    let _ = writeln!(
        out,
        "{:>5},{:>10},{:>25},{:>3},{:>3},{:>10},{:>10},{:>10},{:>10},{:>10},{:>10}",
        "Order",
        "Designers",
        "Name",
        "N",
        "n",
        "Score",
        "Time (s)",
        "Actions",
        "Productive",
        "Distance",
        "Error"
    );
    for r in reports {
        let score = r.score.map_or_else(|| "0".to_string(), |s| format!("{s:.0}"));
        let duration = r.duration.map_or_else(String::new, |d| format!("{d:.2}"));
        let _ = writeln!(
            out,
            "{:>5},{:>10},{:>25},{:>3},{:>3},{:>10},{:>10},{:>10},{:>10},{:>10.2},{:>10.2}",
            r.order,
            r.designers,
            r.round,
            r.size,
            r.num_designers,
            score,
            duration,
            r.actions,
            r.productive_actions,
            r.cumulative_distance,
            r.cumulative_error
        );
    }
    out
}

/// Save report rows to a JSON file.
pub fn save_report(reports: &[TaskReport], path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(reports)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Format a duration in milliseconds for display.
pub fn format_duration(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{:.0}ms", ms)
    } else if ms < 60_000.0 {
        format!("{:.1}s", ms / 1000.0)
    } else {
        format!("{:.1}m", ms / 60_000.0)
    }
}
