//! Transient state of one active run.
//!
//! Everything a run accumulates (per-node outcomes, consumed events, and
//! warnings) lives in a [`RunSession`] value owned by the orchestrator for
//! the duration of a single `dry_run`. The session only exists while a run is
//! active, so there is no "cleared between runs" state to get wrong; it is
//! snapshotted into a [`DryRunReport`] and dropped on every exit path.

use chrono::Utc;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::event::{RunWarning, StepEvent};
use crate::outcome::NodeOutcome;
use crate::types::NodeKey;

/// Clock override used for deterministic tests and virtual-time simulation.
pub type NowFn = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Options for one `run`/`dry_run` call.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Abandon the run when it exceeds this duration. No timeout by default.
    pub timeout: Option<Duration>,
    /// Epoch-ms clock override; the system wall clock when absent.
    pub now: Option<NowFn>,
}

impl RunOptions {
    /// Default options: no timeout, system wall clock.
    #[must_use]
    pub fn new() -> Self {
        RunOptions::default()
    }

    /// Arm a timeout for the run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the clock every time-reading operation observes.
    #[must_use]
    pub fn with_now(mut self, now: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.now = Some(Arc::new(now));
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("timeout", &self.timeout)
            .field("now_override", &self.now.is_some())
            .finish()
    }
}

/// What `dry_run` hands back: computed outcomes plus everything a `run`
/// would commit.
///
/// `new_events` are the consumed events of the run: externally supplied
/// events the bodies replayed plus events synthesized for captures, each
/// enriched with the live metadata of the step that touched it. Embedders
/// persist these for auditing; `run` appends them to the instance log.
#[derive(Clone, Debug)]
pub struct DryRunReport {
    /// Outcome of every node the schedule reached.
    pub values: FxHashMap<NodeKey, NodeOutcome>,
    /// Events a `run` would commit, in consumption order.
    pub new_events: Vec<StepEvent>,
    /// Non-fatal observations (replay drift and the like).
    pub warnings: Vec<RunWarning>,
    /// True when the run was abandoned by its timeout; nothing is committed.
    pub timed_out: bool,
}

/// Accumulator owned by one active run.
pub(crate) struct RunSession {
    pub(crate) opts: RunOptions,
    /// Stack of node-key path prefixes; one entry deep in this engine.
    pub(crate) stack: Vec<NodeKey>,
    pub(crate) results: FxHashMap<NodeKey, NodeOutcome>,
    pub(crate) consumed: Vec<StepEvent>,
    pub(crate) warnings: Vec<RunWarning>,
}

impl RunSession {
    pub(crate) fn new(opts: RunOptions) -> Self {
        RunSession {
            opts,
            stack: Vec::with_capacity(1),
            results: FxHashMap::default(),
            consumed: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The run's clock: the `now` override when present, wall time otherwise.
    pub(crate) fn now_ms(&self) -> i64 {
        match &self.opts.now {
            Some(now) => now(),
            None => Utc::now().timestamp_millis(),
        }
    }

    pub(crate) fn into_report(self, timed_out: bool) -> DryRunReport {
        DryRunReport {
            values: self.results,
            new_events: self.consumed,
            warnings: self.warnings,
            timed_out,
        }
    }
}
