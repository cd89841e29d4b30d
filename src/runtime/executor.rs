//! Drives a single node to completion, suspension, or failure.
//!
//! The executor owns the re-execution discipline that makes captures look
//! synchronous: every time a deferred side effect resolves, its value is
//! recorded as an event and the body runs again from the top, now finding the
//! event during replay. A body therefore executes O(captures) times per run,
//! which is why bodies must be deterministic against their event prefix.

use rustc_hash::FxHashMap;

use crate::context::NodeCtx;
use crate::event::{FullStepContext, RunWarning, StepEvent};
use crate::node::{NodeSpec, SagaAction};
use crate::outcome::NodeOutcome;
use crate::runtime::resolver::StepResolver;
use crate::runtime::session::RunSession;
use crate::signal::{NodeError, Signal};
use crate::snapshot::SagaSnapshot;

/// Upper bound on deferred captures resolved within one node execution.
pub(crate) const MAX_PROMISES: usize = 1000;

pub(crate) struct ExecutionOutput {
    pub(crate) outcome: NodeOutcome,
    pub(crate) consumed: Vec<StepEvent>,
    pub(crate) warnings: Vec<RunWarning>,
}

impl ExecutionOutput {
    fn bare(outcome: NodeOutcome) -> Self {
        ExecutionOutput {
            outcome,
            consumed: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Execute one node against its recorded history plus this run's incoming
/// events.
///
/// `persisted` is the node's committed log slice, `incoming` the events of
/// this run addressed to the node, both in replay order.
pub(crate) async fn execute_node(
    spec: &NodeSpec,
    persisted: &[StepEvent],
    incoming: &[StepEvent],
    snapshot: Option<&SagaSnapshot>,
    session: &RunSession,
) -> ExecutionOutput {
    // A dependency is satisfied by a completed node or by a suspended saga
    // that has published a partial value.
    let mut unsatisfied = Vec::new();
    let mut deps = FxHashMap::default();
    for dep in spec.dependencies() {
        match session.results.get(dep).and_then(NodeOutcome::value) {
            Some(value) => {
                deps.insert(dep.clone(), value.clone());
            }
            None => unsatisfied.push(dep.clone()),
        }
    }
    if !unsatisfied.is_empty() {
        return ExecutionOutput::bare(NodeOutcome::Pending {
            nodes: unsatisfied,
        });
    }

    let restore = if spec.is_saga() { snapshot } else { None };
    let deadline_armed = session.opts.timeout.is_some();
    let mut synthesized: Vec<StepEvent> = Vec::new();
    let mut resolved_effects = 0usize;

    loop {
        let mut resolver = StepResolver::new(persisted, incoming, &synthesized);
        if let Some(snap) = restore {
            resolver.set_cursor(snap.event_index);
        }
        let ctx = NodeCtx::new(
            session.stack.clone(),
            deps.clone(),
            resolver,
            session.opts.now.clone(),
        );

        // A checkpointed saga resumes mid-loop; its compute step already ran
        // in the execution that wrote the checkpoint.
        let computed = match restore {
            Some(snap) => Ok(snap.value.clone()),
            None => spec.body.compute(&ctx).await,
        };

        let mut checkpoint: Option<(usize, serde_json::Value)> = None;
        let flowed = match computed {
            Ok(value) => match &spec.saga {
                Some(saga) => {
                    let mut value = value;
                    loop {
                        checkpoint = Some((ctx.cursor(), value.clone()));
                        match saga.turn(&ctx, value.clone()).await {
                            Ok(turn) => {
                                value = turn.value;
                                if turn.action == SagaAction::Halt {
                                    break Ok(value);
                                }
                                if deadline_armed {
                                    // Keep the orchestrator's timeout race
                                    // live across long saga loops.
                                    tokio::task::yield_now().await;
                                }
                            }
                            Err(signal) => break Err(signal),
                        }
                    }
                }
                None => Ok(value),
            },
            Err(signal) => Err(signal),
        };

        match flowed {
            Ok(value) => {
                let (consumed, _, warnings) = ctx.into_resolver().into_parts();
                return ExecutionOutput {
                    outcome: NodeOutcome::Done { value },
                    consumed,
                    warnings,
                };
            }
            Err(Signal::Input(input)) => {
                let (consumed, _, warnings) = ctx.into_resolver().into_parts();
                let (value, event_idx) = match checkpoint {
                    Some((idx, value)) => (Some(value), (idx > 0).then_some(idx)),
                    None => (None, None),
                };
                return ExecutionOutput {
                    outcome: NodeOutcome::Interrupted {
                        step: FullStepContext::from_context(input.path, input.context),
                        value,
                        event_idx,
                        wait_until: input.wait_until,
                    },
                    consumed,
                    warnings,
                };
            }
            Err(Signal::Failure(error)) => {
                // Events consumed before the failure still commit: captures
                // that already executed must replay on the next run.
                let (consumed, _, warnings) = ctx.into_resolver().into_parts();
                return ExecutionOutput {
                    outcome: NodeOutcome::Failed { error },
                    consumed,
                    warnings,
                };
            }
            Err(Signal::Effect(effect)) => {
                let (mut consumed, fresh, warnings) = ctx.into_resolver().into_parts();
                synthesized.extend(fresh);
                match effect.future.await {
                    Ok(value) => {
                        let mut event =
                            StepEvent::new(effect.path, value, session.now_ms());
                        if !effect.context.inputs.is_empty() {
                            event.inputs = Some(effect.context.inputs.clone());
                        }
                        resolved_effects += 1;
                        if resolved_effects >= MAX_PROMISES {
                            // The effect already ran; record its event so it
                            // is never re-executed, then fail the node.
                            let mut enriched = event.clone();
                            enriched.context = Some(effect.context);
                            consumed.push(enriched);
                            return ExecutionOutput {
                                outcome: NodeOutcome::Failed {
                                    error: NodeError::msg(
                                        "Too many promises in a single step!",
                                    ),
                                },
                                consumed,
                                warnings,
                            };
                        }
                        synthesized.push(event);
                        // Re-execute the body; replay now observes the event.
                    }
                    Err(error) => {
                        return ExecutionOutput {
                            outcome: NodeOutcome::Failed { error },
                            consumed,
                            warnings,
                        };
                    }
                }
            }
        }
    }
}
