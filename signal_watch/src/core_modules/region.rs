// THEORY:
// The `region` module defines the operator-drawn areas of interest and the small
// geometry vocabulary they are built from. A `Region` is a "dumb" data container:
// a stable identifier, two corner points exactly as the operator left them, and
// the per-region progression flags that record which colour transitions have
// already been logged.
//
// Key architectural principles:
// 1.  **Stable Identity**: A `RegionId` is assigned once, at creation, by the
//     `RegionStore`. It never depends on where the region sits in a collection,
//     so verdicts, editor selections and persisted events all keep pointing at
//     the same region.
// 2.  **Raw Corners, Normalized Use**: Corners are stored in whatever order the
//     pointer produced them. Every consumer asks for `bounds()`, which reorders
//     them into a half-open pixel rectangle.
// 3.  **Monotonic Flags**: `SequenceFlags` exposes no way to clear a flag. Once a
//     colour is marked it stays marked for the lifetime of the region, which is
//     the foundation of the "at most once" guarantee in the transition gate.

use std::fmt;

/// A signed 2D point in frame pixel coordinates. Pointer positions may fall
/// outside the frame while dragging, hence `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The offset that moves `self` onto `other`.
    pub fn delta_to(self, other: Point) -> (i32, i32) {
        (other.x - self.x, other.y - self.y)
    }

    pub fn translated(self, dx: i32, dy: i32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

/// An axis-aligned, half-open pixel rectangle: `[x, x + width) x [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds the rectangle spanned by two corners given in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Self {
            x: min_x,
            y: min_y,
            width: a.x.abs_diff(b.x),
            height: a.y.abs_diff(b.y),
        }
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Intersects the rectangle with a `frame_width x frame_height` frame.
    /// Returns `None` when nothing of positive area remains.
    pub fn clip_to_frame(&self, frame_width: u32, frame_height: u32) -> Option<Rect> {
        let left = (self.x as i64).max(0);
        let top = (self.y as i64).max(0);
        let right = self.right().min(frame_width as i64);
        let bottom = self.bottom().min(frame_height as i64);

        if right <= left || bottom <= top {
            return None;
        }

        Some(Rect {
            x: left as i32,
            y: top as i32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// The three lamp colours a region can progress through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalColor {
    Red,
    Yellow,
    Green,
}

impl SignalColor {
    /// All colours in progression order.
    pub const SEQUENCE: [SignalColor; 3] = [SignalColor::Red, SignalColor::Yellow, SignalColor::Green];

    /// The lowercase label persisted by event sinks.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalColor::Red => "red",
            SignalColor::Yellow => "yellow",
            SignalColor::Green => "green",
        }
    }

    pub fn from_label(label: &str) -> Option<SignalColor> {
        match label {
            "red" => Some(SignalColor::Red),
            "yellow" => Some(SignalColor::Yellow),
            "green" => Some(SignalColor::Green),
            _ => None,
        }
    }
}

impl fmt::Display for SignalColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stable, never-reused identifier for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u64);

impl RegionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which colour transitions have been logged for a region. Flags only ever go
/// from false to true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceFlags {
    red_logged: bool,
    yellow_logged: bool,
    green_logged: bool,
}

impl SequenceFlags {
    pub fn is_logged(&self, color: SignalColor) -> bool {
        match color {
            SignalColor::Red => self.red_logged,
            SignalColor::Yellow => self.yellow_logged,
            SignalColor::Green => self.green_logged,
        }
    }

    pub fn red_logged(&self) -> bool {
        self.red_logged
    }

    pub fn yellow_logged(&self) -> bool {
        self.yellow_logged
    }

    pub fn green_logged(&self) -> bool {
        self.green_logged
    }

    /// Sets the flag for `color`. No operation clears it again.
    pub fn mark(&mut self, color: SignalColor) {
        match color {
            SignalColor::Red => self.red_logged = true,
            SignalColor::Yellow => self.yellow_logged = true,
            SignalColor::Green => self.green_logged = true,
        }
    }

    /// The single colour the gate will currently accept, or `None` once the
    /// region is terminal at green.
    ///
    /// Only the exact prefixes of the red, yellow, green sequence have a
    /// successor; any other combination cannot be produced through the gate
    /// and is treated as terminal.
    pub fn next_expected(&self) -> Option<SignalColor> {
        match (self.red_logged, self.yellow_logged, self.green_logged) {
            (false, false, false) => Some(SignalColor::Red),
            (true, false, false) => Some(SignalColor::Yellow),
            (true, true, false) => Some(SignalColor::Green),
            _ => None,
        }
    }

    /// How many stages of the progression have been logged (0..=3).
    pub fn stage(&self) -> usize {
        SignalColor::SEQUENCE
            .iter()
            .take_while(|color| self.is_logged(**color))
            .count()
    }
}

/// An operator-defined rectangular area of interest, tracked across ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Assigned by the `RegionStore` at creation; never changes.
    pub id: RegionId,
    /// The two corners as drawn or dragged, in no particular order.
    pub corners: (Point, Point),
    /// Progression flags, touched only by the transition gate.
    pub flags: SequenceFlags,
}

impl Region {
    pub fn new(id: RegionId, corners: (Point, Point)) -> Self {
        Self {
            id,
            corners,
            flags: SequenceFlags::default(),
        }
    }

    /// The normalized half-open pixel rectangle covered by this region.
    pub fn bounds(&self) -> Rect {
        Rect::from_corners(self.corners.0, self.corners.1)
    }

    /// Hit test used for selection. Inclusive of both corners.
    pub fn contains(&self, point: Point) -> bool {
        let (a, b) = self.corners;
        point.x >= a.x.min(b.x)
            && point.x <= a.x.max(b.x)
            && point.y >= a.y.min(b.y)
            && point.y <= a.y.max(b.y)
    }

    /// Both corners shifted by `(dx, dy)`.
    pub fn translated_corners(&self, dx: i32, dy: i32) -> (Point, Point) {
        (
            self.corners.0.translated(dx, dy),
            self.corners.1.translated(dx, dy),
        )
    }
}
