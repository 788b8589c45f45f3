// THEORY:
// The `ShapeDetector` is the spatial grouping step of colour classification. It
// takes a binary mask (pixels inside any colour band are foreground) and finds
// the connected shapes in it, the same role contour extraction plays in a
// classic vision pipeline.
//
// Algorithm:
// 1.  **Outer Shapes**: Every 8-connected component of foreground pixels is one
//     shape. Its bounding rectangle is the min/max extent of its pixels.
// 2.  **Nested Shapes (Holes)**: Every 4-connected component of background pixels
//     that does not touch the mask border is enclosed by foreground, so it is a
//     hole. The contour of a hole runs along the foreground pixels bordering it,
//     so its bounding rectangle is the hole's extent grown by one pixel per side.
//     Foreground islands inside a hole are outer shapes of their own and are
//     found by step 1, which gives the full nesting tree flattened into a list.
// 3.  **Deterministic Order**: The classifier returns on the first qualifying
//     shape, so order decides ties between colours. Shapes are sorted by
//     descending bounding-box area, then outer before hole, then top edge, then
//     left edge.
// 4.  **Stateless Utility**: Like any detector in this crate it has no memory of
//     previous frames.

/// A row-major binary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width * height) as usize],
        }
    }

    /// Builds a mask by evaluating `predicate` at every `(x, y)`.
    pub fn from_fn<F>(width: u32, height: u32, mut predicate: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut bits = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                bits.push(predicate(x, y));
            }
        }
        Self {
            width,
            height,
            bits,
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        self.bits[(y * self.width + x) as usize] = value;
    }

    /// Pixel-wise OR of two equally sized masks.
    pub fn union(&self, other: &Mask) -> Mask {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        Mask {
            width: self.width,
            height: self.height,
            bits: self
                .bits
                .iter()
                .zip(&other.bits)
                .map(|(a, b)| *a || *b)
                .collect(),
        }
    }

    pub fn count_set(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }
}

/// Axis-aligned bounding rectangle in mask coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingRect {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Whether a shape is a foreground component or a hole inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShapeKind {
    Outer,
    Hole,
}

/// A single connected shape found in a mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub bounds: BoundingRect,
    /// The number of pixels in the component itself.
    pub pixel_count: usize,
}

pub mod shape_detector {
    use super::*;

    const NEIGHBOURS_8: [(i32, i32); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];
    const NEIGHBOURS_4: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

    /// Finds every outer shape and hole in `mask`, in traversal order.
    pub fn find_shapes(mask: &Mask) -> Vec<Shape> {
        let mut shapes = Vec::new();
        if mask.width == 0 || mask.height == 0 {
            return shapes;
        }

        // --- 1. Outer shapes: 8-connected foreground ---
        let mut visited = Mask::new(mask.width, mask.height);
        for y in 0..mask.height {
            for x in 0..mask.width {
                if mask.get(x, y) && !visited.get(x, y) {
                    let component = grow_component(mask, &mut visited, x, y, true, &NEIGHBOURS_8);
                    shapes.push(Shape {
                        kind: ShapeKind::Outer,
                        bounds: component.bounds,
                        pixel_count: component.pixel_count,
                    });
                }
            }
        }

        // --- 2. Holes: 4-connected background not touching the border ---
        let mut visited = Mask::new(mask.width, mask.height);
        for y in 0..mask.height {
            for x in 0..mask.width {
                if !mask.get(x, y) && !visited.get(x, y) {
                    let component = grow_component(mask, &mut visited, x, y, false, &NEIGHBOURS_4);
                    if component.touches_border {
                        continue;
                    }
                    let inner = component.bounds;
                    shapes.push(Shape {
                        kind: ShapeKind::Hole,
                        bounds: BoundingRect {
                            x: inner.x - 1,
                            y: inner.y - 1,
                            width: inner.width + 2,
                            height: inner.height + 2,
                        },
                        pixel_count: component.pixel_count,
                    });
                }
            }
        }

        // --- 3. Deterministic traversal order ---
        shapes.sort_by(|a, b| {
            b.bounds
                .area()
                .cmp(&a.bounds.area())
                .then(a.kind.cmp(&b.kind))
                .then(a.bounds.y.cmp(&b.bounds.y))
                .then(a.bounds.x.cmp(&b.bounds.x))
        });
        shapes
    }

    struct Component {
        bounds: BoundingRect,
        pixel_count: usize,
        touches_border: bool,
    }

    /// Iterative flood fill over pixels whose mask value equals `target`.
    fn grow_component(
        mask: &Mask,
        visited: &mut Mask,
        seed_x: u32,
        seed_y: u32,
        target: bool,
        neighbours: &[(i32, i32)],
    ) -> Component {
        let mut stack = vec![(seed_x, seed_y)];
        visited.set(seed_x, seed_y, true);

        let mut min_x = seed_x;
        let mut min_y = seed_y;
        let mut max_x = seed_x;
        let mut max_y = seed_y;
        let mut pixel_count = 0;
        let mut touches_border = false;

        let width = mask.width as i32;
        let height = mask.height as i32;

        while let Some((x, y)) = stack.pop() {
            pixel_count += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            if x == 0 || y == 0 || x + 1 == mask.width || y + 1 == mask.height {
                touches_border = true;
            }

            for (dx, dy) in neighbours {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= width || ny >= height {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                if !visited.get(nx, ny) && mask.get(nx, ny) == target {
                    visited.set(nx, ny, true);
                    stack.push((nx, ny));
                }
            }
        }

        Component {
            bounds: BoundingRect {
                x: min_x,
                y: min_y,
                width: max_x - min_x + 1,
                height: max_y - min_y + 1,
            },
            pixel_count,
            touches_border,
        }
    }
}
