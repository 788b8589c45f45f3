// THEORY:
// This file is the main entry point for the `signal_watch` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (like the `live_tester` harness).
//
// The primary goal is to export the `Controller` and its collaborators
// (`FrameSource`, `Surface`, `PointerQueue`, the event sinks) as the high-level
// interface for watching lamp-style signals. The analysis internals live in
// `core_modules`: pixel heuristics, region geometry, shape extraction, colour
// classification, the region editor and the transition gate.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use crate::config::{SourceSpec, WatchConfig};
pub use crate::core_modules::color_classifier::{ColorBand, ColorClassifier, Verdict};
pub use crate::core_modules::event_sink::{EventSink, MemorySink, SinkError, TransitionEvent};
pub use crate::core_modules::region::{Point, Rect, Region, RegionId, SequenceFlags, SignalColor};
pub use crate::core_modules::region_editor::{EditOutcome, EditorState, PointerEvent, RegionEditor};
pub use crate::core_modules::region_store::RegionStore;
pub use crate::core_modules::sqlite_sink::SqliteSink;
pub use crate::core_modules::transition_gate::{Clock, GateDecision, SystemClock, TransitionGate};
pub use crate::error::{WatchError, WatchResult};
pub use crate::pipeline::{
    Controller, ExitReason, FramePoll, FrameSource, Overlay, OverlayKind, PointerQueue, RunStats,
    Surface, SurfaceControl, TickReport,
};
