//! ```text
//! WorkflowBuilder ──► Workflow ──► run / dry_run
//!                      │             │
//!                      │             ├─► scheduler (topological pass)
//!                      │             │       └─► executor ◄─► StepResolver
//!                      │             │                │
//!                      │             │         NodeCtx ◄─ node body (step / capture / sagas)
//!                      │             │
//!                      │             └─► commit ─► EventLog + SnapshotStore
//!                      │
//!                      └─► spawn / fork share the immutable node table
//! ```
//!
//! Loomflow is a durable, interruptible workflow engine: a typed DAG of
//! compute nodes whose bodies may suspend on external input, wall-clock
//! deadlines, captured side effects, and saga iterations. Suspension is
//! resumed by re-executing the node against a persisted event log; a
//! deterministic replay protocol makes node bodies idempotent across
//! resumptions. The engine holds the log in memory and is embeddable as a
//! plain library: no CLI, no environment, no storage of its own.

pub mod builder;
pub mod context;
pub mod event;
pub mod node;
pub mod outcome;
pub mod runtime;
pub mod signal;
pub mod snapshot;
pub mod types;
pub mod workflow;
