// THEORY:
// The `pipeline` module is the top-level API of the signal watcher. The `Controller`
// ties the region store, editor, classifier and transition gate into a single
// per-frame step, and `run` wraps that step in the capture/display loop.
//
// Per tick, in order:
// 1.  **Edit**: Pointer events queued since the last tick are drained into the
//     `RegionEditor` in arrival order. Pointer callbacks only ever *enqueue*, so
//     region geometry never changes in the middle of a classification pass.
// 2.  **Snapshot**: The store's region list is copied once.
// 3.  **Classify & Gate**: Each region in the snapshot is classified against the
//     frame; any verdict goes straight through the `TransitionGate`.
//
// The loop owns its two external resources for its whole lifetime: the frame
// source and the event sink. Both are consumed on exit, whichever way the loop
// ends, so each is released exactly once.

use crate::core_modules::color_classifier::{ColorClassifier, Verdict};
use crate::core_modules::event_sink::{EventSink, TransitionEvent};
use crate::core_modules::region::{Rect, RegionId, SequenceFlags};
use crate::core_modules::region_editor::{EditOutcome, PointerEvent, RegionEditor};
use crate::core_modules::region_store::RegionStore;
use crate::core_modules::transition_gate::{Clock, GateDecision, SystemClock, TransitionGate};
use crate::error::{WatchError, WatchResult};
use image::RgbImage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// One pull from a frame source.
#[derive(Debug, Clone)]
pub enum FramePoll {
    Frame(RgbImage),
    /// No frame this time; the source may recover.
    Missed,
    /// The source is exhausted.
    End,
}

/// Synchronous supplier of frames.
pub trait FrameSource {
    fn next_frame(&mut self) -> WatchResult<FramePoll>;

    /// Releases the capture device.
    fn release(self) -> WatchResult<()>
    where
        Self: Sized;
}

/// Operator intent reported by the display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceControl {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    /// A committed region and its progression so far.
    Region { id: RegionId, flags: SequenceFlags },
    /// The rectangle currently being drawn.
    Provisional,
}

/// A rectangle to draw over the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    pub rect: Rect,
    pub kind: OverlayKind,
}

/// Where frames are shown and operator commands come from.
pub trait Surface {
    fn present(&mut self, frame: &RgbImage, overlays: &[Overlay]) -> WatchResult<()>;

    /// Polls for operator input once per loop iteration.
    fn poll(&mut self) -> WatchResult<SurfaceControl>;
}

/// Thread-safe FIFO between the display layer's pointer callback and the loop.
#[derive(Debug, Clone, Default)]
pub struct PointerQueue {
    inner: Arc<Mutex<VecDeque<PointerEvent>>>,
}

impl PointerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: PointerEvent) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(event);
    }

    /// Takes every queued event, oldest first.
    pub fn drain(&self) -> Vec<PointerEvent> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything that happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub edits: Vec<EditOutcome>,
    pub verdicts: Vec<Verdict>,
    pub decisions: Vec<GateDecision>,
}

impl TickReport {
    pub fn accepted(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.decisions.iter().filter_map(GateDecision::accepted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    OperatorQuit,
    SourceEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub missed_frames: u64,
    pub events_recorded: u64,
    pub exit: ExitReason,
}

/// The driving loop's state: the region store and the three components that
/// work on it.
pub struct Controller<K, C = SystemClock> {
    store: RegionStore,
    editor: RegionEditor,
    classifier: ColorClassifier,
    gate: TransitionGate<K, C>,
    pointer_queue: PointerQueue,
    max_consecutive_misses: u32,
}

impl<K: EventSink> Controller<K, SystemClock> {
    pub fn new(sink: K) -> Self {
        Self::with_gate(TransitionGate::new(sink))
    }
}

impl<K: EventSink, C: Clock> Controller<K, C> {
    pub fn with_gate(gate: TransitionGate<K, C>) -> Self {
        Self {
            store: RegionStore::new(),
            editor: RegionEditor::new(),
            classifier: ColorClassifier::new(),
            gate,
            pointer_queue: PointerQueue::new(),
            max_consecutive_misses: crate::config::DEFAULT_MAX_MISSES,
        }
    }

    pub fn with_max_consecutive_misses(mut self, misses: u32) -> Self {
        self.max_consecutive_misses = misses;
        self
    }

    /// A handle for the display layer to push pointer events into.
    pub fn pointer_queue(&self) -> PointerQueue {
        self.pointer_queue.clone()
    }

    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    pub fn editor(&self) -> &RegionEditor {
        &self.editor
    }

    pub fn gate(&self) -> &TransitionGate<K, C> {
        &self.gate
    }

    /// Runs one full tick against `frame`.
    pub fn tick(&mut self, frame: &RgbImage) -> WatchResult<TickReport> {
        let mut report = TickReport::default();

        // --- Stage 1: Apply queued pointer events ---
        for event in self.pointer_queue.drain() {
            report.edits.push(self.editor.handle(event, &mut self.store)?);
        }

        // --- Stage 2: Snapshot ---
        let snapshot = self.store.list();

        // --- Stage 3: Classify and gate, in snapshot order ---
        for region in &snapshot {
            let Some(verdict) = self.classifier.classify(frame, region) else {
                continue;
            };
            debug!(region = %verdict.region_id, color = %verdict.color, "verdict");
            report.verdicts.push(verdict);
            let decision = self
                .gate
                .on_verdict(&mut self.store, verdict.region_id, verdict.color)?;
            report.decisions.push(decision);
        }

        Ok(report)
    }

    /// Rectangles to draw for the current state: every region, then the
    /// rectangle being drawn, if any.
    pub fn overlays(&self) -> Vec<Overlay> {
        let mut overlays: Vec<Overlay> = self
            .store
            .list()
            .into_iter()
            .map(|region| Overlay {
                rect: region.bounds(),
                kind: OverlayKind::Region {
                    id: region.id,
                    flags: region.flags,
                },
            })
            .collect();
        if let Some(rect) = self.editor.provisional() {
            overlays.push(Overlay {
                rect,
                kind: OverlayKind::Provisional,
            });
        }
        overlays
    }

    /// Drives the capture/display loop until the operator quits, the source
    /// ends or an unrecoverable error occurs. The source is released and the
    /// sink closed on every exit path; the first error encountered is returned.
    pub fn run<S, D>(mut self, mut source: S, surface: &mut D) -> WatchResult<RunStats>
    where
        S: FrameSource,
        D: Surface,
    {
        let outcome = self.drive(&mut source, surface);

        let released = source.release();
        let closed = self.gate.into_sink().close().map_err(WatchError::from);

        let stats = outcome?;
        released?;
        closed?;
        info!(
            ticks = stats.ticks,
            missed = stats.missed_frames,
            events = stats.events_recorded,
            exit = ?stats.exit,
            "watch loop finished"
        );
        Ok(stats)
    }

    fn drive<S, D>(&mut self, source: &mut S, surface: &mut D) -> WatchResult<RunStats>
    where
        S: FrameSource,
        D: Surface,
    {
        let mut ticks = 0;
        let mut missed_frames = 0;
        let mut events_recorded = 0;
        let mut consecutive_misses = 0;

        let exit = loop {
            match source.next_frame()? {
                FramePoll::Frame(frame) => {
                    consecutive_misses = 0;
                    let report = self.tick(&frame)?;
                    ticks += 1;
                    events_recorded += report.accepted().count() as u64;
                    surface.present(&frame, &self.overlays())?;
                }
                FramePoll::Missed => {
                    missed_frames += 1;
                    consecutive_misses += 1;
                    warn!(consecutive = consecutive_misses, "frame source missed a frame");
                    if consecutive_misses >= self.max_consecutive_misses {
                        return Err(WatchError::SourceStalled(consecutive_misses));
                    }
                }
                FramePoll::End => break ExitReason::SourceEnded,
            }

            if surface.poll()? == SurfaceControl::Quit {
                break ExitReason::OperatorQuit;
            }
        };

        Ok(RunStats {
            ticks,
            missed_frames,
            events_recorded,
            exit,
        })
    }
}
