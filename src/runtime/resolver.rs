//! Replay resolution for one node execution.
//!
//! A [`StepResolver`] owns a cursor over the concatenation
//! `persisted ++ incoming ++ synthesized` and answers the body's step calls
//! positionally: a matching event is returned, a mismatching event is a
//! deterministic-replay violation, and running past the end is a suspension.
//! One resolver lives for exactly one execution attempt of one node; the
//! executor builds a fresh one before every attempt.

use serde_json::Value;

use crate::event::{RunWarning, StepContext, StepEvent};
use crate::signal::{InputSignal, NodeError, Signal};
use crate::types::{NodeKey, StepPath};

pub(crate) struct StepResolver {
    /// `persisted ++ incoming ++ synthesized`, in replay order.
    events: Vec<StepEvent>,
    /// Events below this position are already committed and never re-recorded.
    persisted_len: usize,
    cursor: usize,
    /// Uncommitted events this execution consumed, enriched with live context.
    consumed: Vec<StepEvent>,
    /// Events synthesized by synchronous captures during this attempt.
    fresh: Vec<StepEvent>,
    warnings: Vec<RunWarning>,
}

impl StepResolver {
    pub(crate) fn new(
        persisted: &[StepEvent],
        incoming: &[StepEvent],
        synthesized: &[StepEvent],
    ) -> Self {
        let mut events = Vec::with_capacity(persisted.len() + incoming.len() + synthesized.len());
        events.extend_from_slice(persisted);
        events.extend_from_slice(incoming);
        events.extend_from_slice(synthesized);
        StepResolver {
            events,
            persisted_len: persisted.len(),
            cursor: 0,
            consumed: Vec::new(),
            fresh: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    /// Jump the cursor forward, used when resuming a saga from its checkpoint.
    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.events.len());
    }

    /// Answer one step call from the body.
    pub(crate) fn resolve(
        &mut self,
        stack: &[NodeKey],
        context: &StepContext,
    ) -> Result<Value, Signal> {
        let full = StepPath::from_stack(stack, &context.key);
        if self.cursor >= self.events.len() {
            return Err(Signal::Input(InputSignal {
                path: full,
                context: context.clone(),
                wait_until: None,
            }));
        }

        let position = self.cursor;
        self.cursor += 1;
        let event = &self.events[position];

        if event.path != full {
            // The body diverged from its recorded history.
            return Err(Signal::Failure(NodeError::msg(format!(
                "Expected event {} but got {} instead",
                full, event.path
            ))));
        }

        if let Some(stored) = &event.inputs {
            if *stored != context.inputs {
                tracing::warn!(path = %full, "step inputs changed since the event was recorded");
                self.warnings.push(RunWarning::ContextUpdated {
                    path: full.clone(),
                    stored: stored.clone(),
                    live: context.inputs.clone(),
                });
            }
        }

        let value = event.value.clone();
        if position >= self.persisted_len {
            let mut enriched = event.clone();
            enriched.context = Some(context.clone());
            if !context.inputs.is_empty() {
                enriched.inputs = Some(context.inputs.clone());
            }
            self.consumed.push(enriched);
        }
        Ok(value)
    }

    /// Record an event for a synchronously captured side effect and consume
    /// it in place, so the body continues as if it had been replayed.
    pub(crate) fn synthesize(
        &mut self,
        path: StepPath,
        context: &StepContext,
        value: Value,
        recorded_at: i64,
    ) {
        let mut event = StepEvent::new(path, value, recorded_at);
        if !context.inputs.is_empty() {
            event.inputs = Some(context.inputs.clone());
        }
        self.events.push(event.clone());
        self.cursor = self.events.len();
        self.fresh.push(event.clone());

        let mut enriched = event;
        enriched.context = Some(context.clone());
        self.consumed.push(enriched);
    }

    /// Tear down after an attempt: (consumed events, sync-captured events,
    /// warnings).
    pub(crate) fn into_parts(self) -> (Vec<StepEvent>, Vec<StepEvent>, Vec<RunWarning>) {
        (self.consumed, self.fresh, self.warnings)
    }
}
