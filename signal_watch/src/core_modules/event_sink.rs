// THEORY:
// The `event_sink` module is the boundary between the watcher and whatever durably
// records its findings. The core only ever appends; it never reads events back.
//
// Key architectural principles:
// 1.  **Immutable Records**: A `TransitionEvent` is created once by the transition
//     gate and handed to the sink by reference. Nothing mutates it afterwards.
// 2.  **Explicit Lifecycle**: `ensure_schema` is idempotent and is run once when a
//     sink is opened. `close` consumes the sink, so a connection can be released
//     at most once.
// 3.  **Reportable Failure**: `append` returns a `SinkError` instead of panicking.
//     The gate treats a failed append as "not recorded" and leaves the region's
//     flags untouched.

use crate::core_modules::region::{RegionId, SignalColor};
use chrono::NaiveDateTime;
use thiserror::Error;

/// Format used when a timestamp is persisted as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An accepted colour change for a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub color: SignalColor,
    /// Local wall-clock time at which the transition was accepted.
    pub changed_at: NaiveDateTime,
    pub region_id: RegionId,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored colour label {0:?} is not red, yellow or green")]
    UnknownColor(String),

    #[error("stored timestamp {0:?} is malformed")]
    BadTimestamp(String),

    #[error("event sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for transition events.
pub trait EventSink {
    /// Creates the backing schema if it does not exist yet. Safe to call repeatedly.
    fn ensure_schema(&mut self) -> Result<(), SinkError>;

    /// Durably records one event.
    fn append(&mut self, event: &TransitionEvent) -> Result<(), SinkError>;

    /// Releases the underlying connection.
    fn close(self) -> Result<(), SinkError>
    where
        Self: Sized;
}

/// Keeps events in memory. Used for dry runs without a database and in tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Vec<TransitionEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TransitionEvent] {
        &self.events
    }
}

impl EventSink for MemorySink {
    fn ensure_schema(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn append(&mut self, event: &TransitionEvent) -> Result<(), SinkError> {
        self.events.push(event.clone());
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        Ok(())
    }
}
