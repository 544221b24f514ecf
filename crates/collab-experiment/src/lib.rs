//! Collab Experiment: the harness around the collaborative design kernel.
//!
//! This crate turns kernel tasks into runnable experiments:
//! - Sessions and rounds generated from JSON plans and persisted as JSON
//! - Replay of experiment server logs into task action histories
//! - A random-walk baseline policy for synthetic runs
//! - Per-task reports of counts, distances and errors

pub mod behavior;
pub mod postprocess;
pub mod results;
pub mod session;

pub use behavior::{RandomWalk, RandomWalkConfig, WalkOutcome};
pub use postprocess::{LogEvent, PostProcessor, ReplayStats, replay};
pub use results::{TaskReport, render_table, session_report};
pub use session::{Round, RoundKey, RoundPlan, Session, SessionPlan};
