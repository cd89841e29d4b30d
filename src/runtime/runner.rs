//! Run orchestration: `dry_run`, `run`, and the commit phase.
//!
//! A dry run computes everything and commits nothing; `run` is a dry run
//! followed by an atomic commit of the consumed events and saga checkpoints.
//! Both refuse to start while another run is active on the instance, and both
//! release the guard on every exit path, including cancellation.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::atomic::Ordering;
use thiserror::Error;
use tracing::instrument;

use crate::event::StepEvent;
use crate::outcome::NodeOutcome;
use crate::runtime::scheduler::run_schedule;
use crate::runtime::session::{DryRunReport, RunOptions, RunSession};
use crate::snapshot::SagaSnapshot;
use crate::types::NodeKey;
use crate::workflow::Workflow;

/// Errors that escape the run surface. Per-node failures never do; they are
/// reported as outcomes.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("a run is already active on this workflow instance")]
    #[diagnostic(
        code(loomflow::runner::already_running),
        help("Workflow instances execute one run at a time; await the active run, or fork the workflow for an independent instance.")
    )]
    AlreadyRunning,

    #[error("run exceeded its configured timeout")]
    #[diagnostic(
        code(loomflow::runner::timeout),
        help("Nothing was committed. Raise RunOptions::timeout, or re-run; replay will fast-forward completed work.")
    )]
    Timeout,
}

/// Clears the running flag when the run ends, however it ends.
struct RunGuard<'a>(&'a std::sync::atomic::AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Workflow {
    fn acquire_run(&self) -> Result<RunGuard<'_>, RunnerError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(RunnerError::AlreadyRunning);
        }
        Ok(RunGuard(&self.running))
    }

    /// Execute the schedule without committing anything.
    ///
    /// Returns every node's outcome, the events a `run` would commit
    /// (enriched with live step metadata), warnings, and whether the run was
    /// abandoned by its timeout.
    ///
    /// # Errors
    ///
    /// [`RunnerError::AlreadyRunning`] when another run is active on this
    /// instance.
    #[instrument(skip_all, fields(incoming = incoming.len()))]
    pub async fn dry_run(
        &self,
        incoming: &[StepEvent],
        opts: RunOptions,
    ) -> Result<DryRunReport, RunnerError> {
        let _guard = self.acquire_run()?;
        Ok(self.dry_run_locked(incoming, opts).await)
    }

    /// Execute the schedule and commit its effects.
    ///
    /// Commit appends every consumed event to the instance log and persists a
    /// checkpoint for every saga that suspended mid-loop, then returns the
    /// outcome map. The commit is atomic: a timeout or an overlapping-run
    /// error leaves the instance untouched.
    ///
    /// # Errors
    ///
    /// [`RunnerError::AlreadyRunning`] while another run is active;
    /// [`RunnerError::Timeout`] when `opts.timeout` fired.
    #[instrument(skip_all, fields(incoming = incoming.len()))]
    pub async fn run(
        &self,
        incoming: &[StepEvent],
        opts: RunOptions,
    ) -> Result<FxHashMap<NodeKey, NodeOutcome>, RunnerError> {
        let _guard = self.acquire_run()?;
        let report = self.dry_run_locked(incoming, opts).await;
        if report.timed_out {
            return Err(RunnerError::Timeout);
        }

        let mut state = self.state.write();
        for event in &report.new_events {
            state.events.append(event.clone());
        }
        for (key, outcome) in &report.values {
            if let NodeOutcome::Interrupted {
                value: Some(value),
                event_idx: Some(idx),
                ..
            } = outcome
            {
                state.snapshots.put(
                    key.clone(),
                    SagaSnapshot {
                        event_index: *idx,
                        value: value.clone(),
                    },
                );
            }
        }
        drop(state);

        Ok(report.values)
    }

    async fn dry_run_locked(&self, incoming: &[StepEvent], opts: RunOptions) -> DryRunReport {
        // Read a consistent view of the committed state up front; nothing
        // holds the lock across an await.
        let (events, snapshots) = {
            let state = self.state.read();
            (state.events.clone(), state.snapshots.clone())
        };
        let order = self.topological_sort();
        let mut session = RunSession::new(opts.clone());

        let timed_out = match opts.timeout {
            Some(limit) => tokio::time::timeout(
                limit,
                run_schedule(
                    &self.table.nodes,
                    &order,
                    &events,
                    &snapshots,
                    incoming,
                    &mut session,
                ),
            )
            .await
            .is_err(),
            None => {
                run_schedule(
                    &self.table.nodes,
                    &order,
                    &events,
                    &snapshots,
                    incoming,
                    &mut session,
                )
                .await;
                false
            }
        };

        if timed_out {
            tracing::warn!("run abandoned by timeout; transient results discarded");
        }
        session.into_report(timed_out)
    }
}
