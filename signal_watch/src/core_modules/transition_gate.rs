// THEORY:
// The `TransitionGate` is the memory of the signal watcher. Verdicts from the
// classifier are raw observations; the gate decides which of them are *events*.
//
// Key architectural principles:
// 1.  **Strict Progression**: Each region walks Unlit -> Red -> Yellow -> Green and
//     stops there. At any moment exactly one colour (or none, once green) is the
//     permitted next step, as reported by `SequenceFlags::next_expected`. Every
//     other verdict, including repeats and out-of-order colours, is dropped
//     without an event.
// 2.  **Atomic Acceptance**: Accepting means "append the event, then set the
//     flag". The flag is only set after the sink reports success, so a failed
//     write leaves the region exactly as it was and the same verdict can be
//     accepted on a later tick.
// 3.  **No Private State**: The gate keeps no per-region bookkeeping of its own.
//     Flags live in the `RegionStore`; the gate only owns the sink and the clock.

use crate::core_modules::event_sink::{EventSink, SinkError, TransitionEvent};
use crate::core_modules::region::{RegionId, SignalColor};
use crate::core_modules::region_store::RegionStore;
use crate::error::WatchResult;
use chrono::{Local, NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

/// Source of wall-clock timestamps for accepted transitions.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time, truncated to whole seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// What the gate did with a verdict.
#[derive(Debug)]
pub enum GateDecision {
    /// The verdict was the permitted next colour and has been recorded.
    Accepted(TransitionEvent),
    /// The verdict was not the permitted next colour. `expected` is what would
    /// have been accepted, `None` once the region is terminal.
    Ignored {
        color: SignalColor,
        expected: Option<SignalColor>,
    },
    /// The verdict was acceptable but the sink failed. No flag was set.
    Deferred { color: SignalColor, error: SinkError },
}

impl GateDecision {
    pub fn accepted(&self) -> Option<&TransitionEvent> {
        match self {
            GateDecision::Accepted(event) => Some(event),
            _ => None,
        }
    }
}

/// Enforces "at most once, in order" logging of colour transitions.
pub struct TransitionGate<K, C = SystemClock> {
    sink: K,
    clock: C,
}

impl<K: EventSink> TransitionGate<K, SystemClock> {
    pub fn new(sink: K) -> Self {
        Self {
            sink,
            clock: SystemClock,
        }
    }
}

impl<K: EventSink, C: Clock> TransitionGate<K, C> {
    pub fn with_clock(sink: K, clock: C) -> Self {
        Self { sink, clock }
    }

    /// Applies the progression table to one verdict for one region.
    ///
    /// Only fails when `region_id` is unknown to `store`; sink failures are
    /// reported as `GateDecision::Deferred`.
    pub fn on_verdict(
        &mut self,
        store: &mut RegionStore,
        region_id: RegionId,
        color: SignalColor,
    ) -> WatchResult<GateDecision> {
        let expected = store.get(region_id)?.flags.next_expected();
        if expected != Some(color) {
            debug!(region = %region_id, %color, ?expected, "verdict ignored");
            return Ok(GateDecision::Ignored { color, expected });
        }

        let event = TransitionEvent {
            color,
            changed_at: self.clock.now(),
            region_id,
        };

        if let Err(error) = self.sink.append(&event) {
            warn!(region = %region_id, %color, %error, "transition not recorded; will retry on next matching verdict");
            return Ok(GateDecision::Deferred { color, error });
        }

        store.update_flags(region_id, |flags| flags.mark(color))?;
        info!(region = %region_id, %color, at = %event.changed_at, "transition recorded");
        Ok(GateDecision::Accepted(event))
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    /// Gives up the gate, returning the sink so it can be closed.
    pub fn into_sink(self) -> K {
        self.sink
    }
}
