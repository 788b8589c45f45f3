use crate::core_modules::event_sink::SinkError;
use crate::core_modules::region::RegionId;
use thiserror::Error;

/// Errors surfaced by the signal watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// A region identifier did not resolve. Regions are never deleted, so this
    /// means the id came from somewhere else.
    #[error("region {0} not found")]
    RegionNotFound(RegionId),

    #[error("event sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("frame source failed: {0}")]
    Source(String),

    #[error("frame source produced no frame for {0} consecutive ticks")]
    SourceStalled(u32),

    #[error("display surface failed: {0}")]
    Surface(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type WatchResult<T> = Result<T, WatchError>;
