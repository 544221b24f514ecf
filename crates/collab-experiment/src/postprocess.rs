//! Replay of experiment server logs into task action histories.
//!
//! The server writes one event per line as `time;message;json`, where `time`
//! is milliseconds since the epoch. Replaying a log against the session it
//! was recorded from fills in each task's start time, action history and
//! completion time.
//!
//! Events:
//! - `load`: session name (informational)
//! - `round`: round name; the round becomes current and its tasks start
//! - `action`: `{"designer": d, "x": [...]}`, designer `d` set its inputs
//! - `complete`: a task object (task solved) or a round name (informational)

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use collab_kernel::{Action, DesignerId, Task};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::session::{RoundKey, Session};

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<time>-?\d+(?:\.\d+)?);(?P<message>[^;]*);(?P<payload>.*)$")
        .expect("log line pattern is valid")
});

/// A single parsed log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Milliseconds since the epoch
    pub time: f64,
    pub message: String,
    pub payload: Value,
}

impl LogEvent {
    /// Parse one `time;message;json` line.
    pub fn parse(line: &str) -> Result<Self> {
        let caps = LINE
            .captures(line)
            .ok_or_else(|| anyhow!("not a log event: {line:?}"))?;
        let time = caps["time"]
            .parse()
            .with_context(|| format!("bad timestamp in {line:?}"))?;
        let payload = serde_json::from_str(&caps["payload"])
            .with_context(|| format!("bad payload in {line:?}"))?;
        Ok(Self {
            time,
            message: caps["message"].to_string(),
            payload,
        })
    }
}

/// Payload of an `action` event.
#[derive(Debug, Deserialize)]
struct DesignerInput {
    designer: DesignerId,
    x: Vec<f64>,
}

/// Counters describing what a replay did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub lines: usize,
    pub rounds: usize,
    pub actions: usize,
    pub completions: usize,
    pub skipped: usize,
}

/// Replays log events onto a session.
pub struct PostProcessor<'a> {
    session: &'a mut Session,
    current: Option<RoundKey>,
    stats: ReplayStats,
}

impl<'a> PostProcessor<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            current: None,
            stats: ReplayStats::default(),
        }
    }

    /// Replay a whole log. Malformed lines and events that reference unknown
    /// rounds or designers are logged and skipped.
    pub fn replay(mut self, log: &str) -> ReplayStats {
        for line in log.lines().filter(|l| !l.trim().is_empty()) {
            self.stats.lines += 1;
            match LogEvent::parse(line) {
                Ok(event) => self.apply(&event),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed log line");
                    self.stats.skipped += 1;
                }
            }
        }
        self.stats
    }

    /// Apply one event.
    pub fn apply(&mut self, event: &LogEvent) {
        let applied = match event.message.as_str() {
            "round" => self.on_round(event),
            "action" => self.on_action(event),
            "complete" => self.on_complete(event),
            "load" => Ok(()),
            other => Err(anyhow!("unknown event '{other}'")),
        };
        if let Err(e) = applied {
            warn!(time = event.time, error = %e, "Skipping log event");
            self.stats.skipped += 1;
        }
    }

    fn on_round(&mut self, event: &LogEvent) -> Result<()> {
        let name = event
            .payload
            .as_str()
            .ok_or_else(|| anyhow!("round event without a name"))?;
        let key = self
            .session
            .find_round(name)
            .ok_or_else(|| anyhow!("unknown round '{name}'"))?;
        let round = self
            .session
            .round_mut(key)
            .ok_or_else(|| anyhow!("unknown round '{name}'"))?;

        for task in round.tasks.iter_mut().filter(|t| !t.is_started()) {
            task.start(event.time)?;
        }
        debug!(round = name, "Round started");
        self.current = Some(key);
        self.stats.rounds += 1;
        Ok(())
    }

    fn on_action(&mut self, event: &LogEvent) -> Result<()> {
        let input: DesignerInput = serde_json::from_value(event.payload.clone())
            .context("action payload")?;
        let task = self.current_task(input.designer)?;
        if !task.is_started() {
            task.start(event.time)?;
        }

        let mut design = task
            .last_action()
            .map(|a| a.input.clone())
            .ok_or_else(|| anyhow!("task has no initialization action"))?;
        overwrite_owned(&mut design, task.inputs(), input.designer, &input.x);
        task.push_action(Action::new(event.time, design))?;
        self.stats.actions += 1;
        Ok(())
    }

    fn on_complete(&mut self, event: &LogEvent) -> Result<()> {
        // Round completion carries only the round name.
        let Some(designers) = event.payload.get("designers") else {
            return Ok(());
        };
        let designers: Vec<DesignerId> =
            serde_json::from_value(designers.clone()).context("complete payload")?;
        let first = designers
            .first()
            .copied()
            .ok_or_else(|| anyhow!("completed task has no designers"))?;

        let task = self.current_task(first)?;
        if task.designers() != designers.as_slice() {
            return Err(anyhow!(
                "completed task designers {:?} do not match {:?}",
                designers,
                task.designers()
            ));
        }
        if !task.is_complete() {
            task.complete(event.time)?;
            self.stats.completions += 1;
        }
        Ok(())
    }

    fn current_task(&mut self, designer: DesignerId) -> Result<&mut Task> {
        let key = self.current.ok_or_else(|| anyhow!("no round is active"))?;
        self.session
            .round_mut(key)
            .and_then(|round| round.designer_task_mut(designer))
            .ok_or_else(|| anyhow!("designer {designer} has no task in the current round"))
    }
}

/// Write `values` into the entries of `design` owned by `designer`, in index
/// order. Extra values are ignored; missing ones leave entries unchanged.
fn overwrite_owned(design: &mut [f64], owners: &[DesignerId], designer: DesignerId, values: &[f64]) {
    let owned = design
        .iter_mut()
        .zip(owners)
        .filter(|(_, owner)| **owner == designer)
        .map(|(slot, _)| slot);
    for (slot, &value) in owned.zip(values) {
        *slot = value;
    }
}

/// Replay `log` onto `session` and return the replay counters.
pub fn replay(session: &mut Session, log: &str) -> ReplayStats {
    PostProcessor::new(session).replay(log)
}
