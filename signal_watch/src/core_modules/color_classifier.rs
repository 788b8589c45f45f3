// THEORY:
// The `ColorClassifier` turns one frame and one region into a colour verdict. It is
// the sensory layer of the signal watcher: it knows what a lit lamp looks like but
// nothing about what was seen before.
//
// Pipeline per region:
// 1.  **Clip**: The region's rectangle is intersected with the frame. Nothing left
//     (outside the frame, or zero area) means no verdict, never an error.
// 2.  **HSV Conversion**: The region of interest is converted pixel by pixel into
//     the packed 8-bit HSV encoding (`Pixel::to_hsv`).
// 3.  **Band Masks**: Three fixed closed bands (red, yellow, green) each produce a
//     binary mask; the union of the three is handed to the `shape_detector`.
// 4.  **Shape Heuristics**: Lamp housings light up as bars. A "wide" shape
//     (`w/h > 2`, both sides over 10 px) is tested against red, then yellow; a
//     "tall" shape (`h/w > 2`, both sides over 10 px) is tested against green.
// 5.  **Re-threshold**: For a candidate shape/colour pair, only the shape's
//     bounding rectangle is re-tested against that single band. One matching
//     pixel is enough. The first qualifying shape in the detector's traversal
//     order wins.

use crate::core_modules::pixel::pixel::{Hsv, Pixel};
use crate::core_modules::region::{Rect, Region, RegionId, SignalColor};
use crate::core_modules::shape_detector::shape_detector::find_shapes;
use crate::core_modules::shape_detector::{BoundingRect, Mask};
use image::RgbImage;
use tracing::trace;

/// Both sides of a shape must exceed this many pixels to be considered.
const MIN_SHAPE_SIDE: u32 = 10;
/// A shape must be more than this many times longer than it is thick.
const ELONGATION_RATIO: f64 = 2.0;

/// A closed range over packed (hue, saturation, value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBand {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl ColorBand {
    pub const RED: ColorBand = ColorBand::new(Hsv::new(0, 100, 100), Hsv::new(10, 255, 255));
    pub const YELLOW: ColorBand = ColorBand::new(Hsv::new(25, 100, 100), Hsv::new(35, 255, 255));
    pub const GREEN: ColorBand = ColorBand::new(Hsv::new(50, 100, 100), Hsv::new(70, 255, 255));

    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    pub fn for_color(color: SignalColor) -> ColorBand {
        match color {
            SignalColor::Red => ColorBand::RED,
            SignalColor::Yellow => ColorBand::YELLOW,
            SignalColor::Green => ColorBand::GREEN,
        }
    }

    #[inline]
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.hue..=self.upper.hue).contains(&hsv.hue)
            && (self.lower.saturation..=self.upper.saturation).contains(&hsv.saturation)
            && (self.lower.value..=self.upper.value).contains(&hsv.value)
    }
}

/// A colour observed in a region on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub color: SignalColor,
    pub region_id: RegionId,
}

/// The region of interest converted to packed HSV, row-major.
struct HsvImage {
    width: u32,
    height: u32,
    pixels: Vec<Hsv>,
}

impl HsvImage {
    fn from_frame(frame: &RgbImage, clip: Rect) -> Self {
        let mut pixels = Vec::with_capacity(clip.area() as usize);
        for y in 0..clip.height {
            for x in 0..clip.width {
                let rgb = *frame.get_pixel(clip.x as u32 + x, clip.y as u32 + y);
                pixels.push(Pixel::from(rgb).to_hsv());
            }
        }
        Self {
            width: clip.width,
            height: clip.height,
            pixels,
        }
    }

    #[inline]
    fn get(&self, x: u32, y: u32) -> Hsv {
        self.pixels[(y * self.width + x) as usize]
    }

    fn band_mask(&self, band: &ColorBand) -> Mask {
        Mask::from_fn(self.width, self.height, |x, y| band.contains(self.get(x, y)))
    }

    /// Whether any pixel inside `rect` falls in `band`.
    fn any_in_band(&self, rect: &BoundingRect, band: &ColorBand) -> bool {
        (rect.y..rect.y + rect.height)
            .any(|y| (rect.x..rect.x + rect.width).any(|x| band.contains(self.get(x, y))))
    }
}

/// Stateless classifier producing at most one verdict per region per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorClassifier;

impl ColorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classifies the content of `region` on `frame`.
    pub fn classify(&self, frame: &RgbImage, region: &Region) -> Option<Verdict> {
        // --- 1. Clip ---
        let clip = region.bounds().clip_to_frame(frame.width(), frame.height())?;

        // --- 2. HSV conversion ---
        let hsv = HsvImage::from_frame(frame, clip);

        // --- 3. Union of band masks ---
        let union = hsv
            .band_mask(&ColorBand::RED)
            .union(&hsv.band_mask(&ColorBand::YELLOW))
            .union(&hsv.band_mask(&ColorBand::GREEN));
        if union.count_set() == 0 {
            return None;
        }

        // --- 4 & 5. Shape heuristics and re-threshold ---
        for shape in find_shapes(&union) {
            for color in candidate_colors(&shape.bounds) {
                if hsv.any_in_band(&shape.bounds, &ColorBand::for_color(*color)) {
                    trace!(region = %region.id, %color, bounds = ?shape.bounds, "shape qualified");
                    return Some(Verdict {
                        color: *color,
                        region_id: region.id,
                    });
                }
            }
        }

        None
    }
}

/// Which colours a shape's proportions make it a candidate for, in test order.
fn candidate_colors(bounds: &BoundingRect) -> &'static [SignalColor] {
    let (w, h) = (bounds.width, bounds.height);
    if w == 0 || h == 0 || w <= MIN_SHAPE_SIDE || h <= MIN_SHAPE_SIDE {
        return &[];
    }
    if w as f64 / h as f64 > ELONGATION_RATIO {
        &[SignalColor::Red, SignalColor::Yellow]
    } else if h as f64 / w as f64 > ELONGATION_RATIO {
        &[SignalColor::Green]
    } else {
        &[]
    }
}
