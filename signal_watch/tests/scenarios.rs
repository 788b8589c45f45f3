use chrono::{NaiveDate, NaiveDateTime};
use image::{Rgb, RgbImage};
use signal_watch::{
    Clock, ColorClassifier, Controller, EventSink, ExitReason, FramePoll, FrameSource, Overlay,
    Point, PointerEvent, RegionStore, SignalColor, SinkError, SqliteSink, Surface, SurfaceControl,
    TransitionEvent, TransitionGate, WatchError, WatchResult,
};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

// 10 degrees, saturation 200, value 200: packed HSV (5, 200, 200).
const DIM_RED: Rgb<u8> = Rgb([200, 69, 43]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|date| date.and_hms_opt(7, 30, 0))
            .unwrap()
    }
}

fn blank() -> RgbImage {
    RgbImage::new(160, 120)
}

fn paint(frame: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    for yy in y..y + height {
        for xx in x..x + width {
            frame.put_pixel(xx, yy, color);
        }
    }
}

fn wide_bar(color: Rgb<u8>) -> RgbImage {
    let mut frame = blank();
    paint(&mut frame, 15, 15, 40, 15, color);
    frame
}

fn tall_bar(color: Rgb<u8>) -> RgbImage {
    let mut frame = blank();
    paint(&mut frame, 15, 15, 15, 40, color);
    frame
}

fn draw(controller: &Controller<SqliteSink, FixedClock>, from: Point, to: Point) {
    let queue = controller.pointer_queue();
    queue.push(PointerEvent::Down(from));
    queue.push(PointerEvent::Move(to));
    queue.push(PointerEvent::Up(to));
}

fn controller() -> Controller<SqliteSink, FixedClock> {
    let sink = SqliteSink::open_in_memory().unwrap();
    Controller::with_gate(TransitionGate::with_clock(sink, FixedClock))
}

fn recorded_colors(controller: &Controller<SqliteSink, FixedClock>) -> Vec<SignalColor> {
    controller
        .gate()
        .sink()
        .recorded()
        .unwrap()
        .into_iter()
        .map(|event| event.color)
        .collect()
}

#[test]
fn scenario_a_uniform_red_block_records_one_red_event() {
    let mut frame = blank();
    paint(&mut frame, 10, 10, 40, 15, DIM_RED);

    let mut controller = controller();
    draw(&controller, Point::new(10, 10), Point::new(50, 25));

    let report = controller.tick(&frame).unwrap();
    assert_eq!(report.verdicts.len(), 1);
    assert_eq!(report.verdicts[0].color, SignalColor::Red);
    assert_eq!(report.accepted().count(), 1);

    let events = controller.gate().sink().recorded().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].color, SignalColor::Red);
    assert_eq!(events[0].region_id, report.verdicts[0].region_id);
    assert_eq!(events[0].changed_at, FixedClock.now());
}

#[test]
fn scenario_b_green_on_fresh_region_is_ignored() {
    let mut controller = controller();
    draw(&controller, Point::new(0, 0), Point::new(80, 80));

    let report = controller.tick(&tall_bar(GREEN)).unwrap();
    assert_eq!(report.verdicts.len(), 1);
    assert_eq!(report.verdicts[0].color, SignalColor::Green);
    assert_eq!(report.accepted().count(), 0);
    assert!(recorded_colors(&controller).is_empty());

    let region = &controller.store().list()[0];
    assert_eq!(region.flags.stage(), 0);
}

#[test]
fn scenario_c_full_progression_then_terminal() {
    let mut controller = controller();
    draw(&controller, Point::new(0, 0), Point::new(80, 80));

    controller.tick(&wide_bar(RED)).unwrap();
    controller.tick(&wide_bar(YELLOW)).unwrap();
    controller.tick(&tall_bar(GREEN)).unwrap();
    assert_eq!(
        recorded_colors(&controller),
        vec![SignalColor::Red, SignalColor::Yellow, SignalColor::Green]
    );

    let flags = controller.store().list()[0].flags;
    assert!(flags.red_logged() && flags.yellow_logged() && flags.green_logged());

    let report = controller.tick(&wide_bar(RED)).unwrap();
    assert_eq!(report.verdicts.len(), 1);
    assert_eq!(report.accepted().count(), 0);
    assert_eq!(recorded_colors(&controller).len(), 3);
}

#[test]
fn scenario_d_drag_shifts_corners_and_keeps_flags() {
    let mut controller = controller();
    draw(&controller, Point::new(10, 10), Point::new(50, 25));
    let mut frame = blank();
    paint(&mut frame, 10, 10, 40, 15, RED);
    controller.tick(&frame).unwrap();

    let before = controller.store().list()[0].clone();
    assert!(before.flags.red_logged());

    let (dx, dy) = (13, -4);
    let queue = controller.pointer_queue();
    queue.push(PointerEvent::Down(Point::new(20, 15)));
    queue.push(PointerEvent::Move(Point::new(20 + dx, 15 + dy)));
    queue.push(PointerEvent::Up(Point::new(20 + dx, 15 + dy)));
    controller.tick(&blank()).unwrap();

    let after = controller.store().list()[0].clone();
    assert_eq!(after.id, before.id);
    assert_eq!(after.corners.0, before.corners.0.translated(dx, dy));
    assert_eq!(after.corners.1, before.corners.1.translated(dx, dy));
    assert_eq!(after.flags, before.flags);
    assert_eq!(recorded_colors(&controller), vec![SignalColor::Red]);
}

#[test]
fn scenario_e_region_outside_frame_has_no_verdict() {
    let mut store = RegionStore::new();
    let id = store.add((Point::new(400, 300), Point::new(440, 315)));
    let region = store.get(id).unwrap();

    // The frame is red everywhere, including where the region would be if it
    // were larger.
    let mut frame = blank();
    paint(&mut frame, 0, 0, 160, 120, RED);
    assert_eq!(ColorClassifier::new().classify(&frame, region), None);
}

#[test]
fn yellow_before_red_is_never_recorded() {
    let mut controller = controller();
    draw(&controller, Point::new(0, 0), Point::new(80, 80));
    for _ in 0..3 {
        controller.tick(&wide_bar(YELLOW)).unwrap();
        controller.tick(&tall_bar(GREEN)).unwrap();
    }
    assert!(recorded_colors(&controller).is_empty());

    controller.tick(&wide_bar(RED)).unwrap();
    controller.tick(&tall_bar(GREEN)).unwrap();
    assert_eq!(recorded_colors(&controller), vec![SignalColor::Red]);
}

#[test]
fn repeated_colours_are_recorded_once_per_region() {
    let mut controller = controller();
    draw(&controller, Point::new(0, 0), Point::new(80, 80));
    draw(&controller, Point::new(90, 0), Point::new(159, 60));

    let mut frame = wide_bar(RED);
    paint(&mut frame, 100, 10, 45, 15, RED);
    for _ in 0..5 {
        controller.tick(&frame).unwrap();
    }

    let events = controller.gate().sink().recorded().unwrap();
    assert_eq!(events.len(), 2);
    assert_ne!(events[0].region_id, events[1].region_id);
    assert!(events.iter().all(|event| event.color == SignalColor::Red));
}

#[test]
fn flags_never_decrease_across_a_mixed_sequence() {
    let mut controller = controller();
    draw(&controller, Point::new(0, 0), Point::new(80, 80));
    let frames = [
        wide_bar(YELLOW),
        wide_bar(RED),
        blank(),
        tall_bar(GREEN),
        wide_bar(YELLOW),
        wide_bar(RED),
        tall_bar(GREEN),
        blank(),
    ];

    let mut previous_stage = 0;
    for frame in &frames {
        controller.tick(frame).unwrap();
        let stage = controller.store().list()[0].flags.stage();
        assert!(stage >= previous_stage);
        previous_stage = stage;
    }
    assert_eq!(previous_stage, 3);
}

// --- Driving loop ---

struct ScriptedSource {
    frames: VecDeque<FramePoll>,
    releases: Rc<Cell<u32>>,
    fail_when_empty: bool,
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> WatchResult<FramePoll> {
        match self.frames.pop_front() {
            Some(poll) => Ok(poll),
            None if self.fail_when_empty => Err(WatchError::Source("device unplugged".into())),
            None => Ok(FramePoll::End),
        }
    }

    fn release(self) -> WatchResult<()> {
        self.releases.set(self.releases.get() + 1);
        Ok(())
    }
}

struct CountingSink {
    closes: Rc<Cell<u32>>,
    events: Vec<TransitionEvent>,
}

impl EventSink for CountingSink {
    fn ensure_schema(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn append(&mut self, event: &TransitionEvent) -> Result<(), SinkError> {
        self.events.push(event.clone());
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        self.closes.set(self.closes.get() + 1);
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedSurface {
    presented: usize,
    quit_after_polls: Option<usize>,
    polls: usize,
    last_overlays: Vec<Overlay>,
}

impl Surface for ScriptedSurface {
    fn present(&mut self, _frame: &RgbImage, overlays: &[Overlay]) -> WatchResult<()> {
        self.presented += 1;
        self.last_overlays = overlays.to_vec();
        Ok(())
    }

    fn poll(&mut self) -> WatchResult<SurfaceControl> {
        self.polls += 1;
        match self.quit_after_polls {
            Some(limit) if self.polls >= limit => Ok(SurfaceControl::Quit),
            _ => Ok(SurfaceControl::Continue),
        }
    }
}

fn counting_parts(
    frames: Vec<FramePoll>,
    fail_when_empty: bool,
) -> (ScriptedSource, CountingSink, Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let releases = Rc::new(Cell::new(0));
    let closes = Rc::new(Cell::new(0));
    let source = ScriptedSource {
        frames: frames.into(),
        releases: Rc::clone(&releases),
        fail_when_empty,
    };
    let sink = CountingSink {
        closes: Rc::clone(&closes),
        events: Vec::new(),
    };
    (source, sink, releases, closes)
}

#[test]
fn run_until_source_ends_records_events_and_releases_once() {
    let frames = vec![
        FramePoll::Frame(wide_bar(RED)),
        FramePoll::Missed,
        FramePoll::Frame(wide_bar(YELLOW)),
        FramePoll::Frame(tall_bar(GREEN)),
    ];
    let (source, sink, releases, closes) = counting_parts(frames, false);
    let controller = Controller::new(sink);
    let queue = controller.pointer_queue();
    queue.push(PointerEvent::Down(Point::new(0, 0)));
    queue.push(PointerEvent::Up(Point::new(80, 80)));

    let mut surface = ScriptedSurface::default();
    let stats = controller.run(source, &mut surface).unwrap();

    assert_eq!(stats.exit, ExitReason::SourceEnded);
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.missed_frames, 1);
    assert_eq!(stats.events_recorded, 3);
    assert_eq!(surface.presented, 3);
    assert_eq!(surface.last_overlays.len(), 1);
    assert_eq!(releases.get(), 1);
    assert_eq!(closes.get(), 1);
}

#[test]
fn operator_quit_stops_the_loop() {
    let frames = (0..10).map(|_| FramePoll::Frame(blank())).collect();
    let (source, sink, releases, closes) = counting_parts(frames, false);
    let mut surface = ScriptedSurface {
        quit_after_polls: Some(2),
        ..Default::default()
    };
    let stats = Controller::new(sink).run(source, &mut surface).unwrap();
    assert_eq!(stats.exit, ExitReason::OperatorQuit);
    assert_eq!(stats.ticks, 2);
    assert_eq!((releases.get(), closes.get()), (1, 1));
}

#[test]
fn source_failure_still_releases_everything() {
    let frames = vec![FramePoll::Frame(blank())];
    let (source, sink, releases, closes) = counting_parts(frames, true);
    let mut surface = ScriptedSurface::default();
    let result = Controller::new(sink).run(source, &mut surface);
    assert!(matches!(result, Err(WatchError::Source(_))));
    assert_eq!((releases.get(), closes.get()), (1, 1));
}

#[test]
fn persistent_misses_are_treated_as_a_stalled_source() {
    let frames = (0..10).map(|_| FramePoll::Missed).collect();
    let (source, sink, releases, closes) = counting_parts(frames, false);
    let mut surface = ScriptedSurface::default();
    let result = Controller::new(sink)
        .with_max_consecutive_misses(4)
        .run(source, &mut surface);
    assert!(matches!(result, Err(WatchError::SourceStalled(4))));
    assert_eq!(surface.presented, 0);
    assert_eq!((releases.get(), closes.get()), (1, 1));
}
