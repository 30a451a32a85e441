// ============================================================================
// BRUSH — soft circular dabs, interpolated strokes and marquee fills
// ============================================================================
//
// The working canvas shows the current image. Painting in `Add` mode erases
// its alpha, which is what later becomes the editable region of the mask.
// `Subtract` paints the base image back in, un-marking the region.

use image::{Rgba, RgbaImage};

use crate::canvas::Point;

/// Arc length between consecutive dab centres.
pub const DAB_SPACING: f32 = 5.0;

/// Width of the soft falloff band outside the dab radius.
pub const DAB_SOFT_EDGE: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushMode {
    /// Erase canvas alpha (add to the mask).
    Add,
    /// Restore the base image (remove from the mask).
    Subtract,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrushStyle {
    Brush(BrushMode),
    /// Rectangle selection, applied on release.
    Marquee,
}

impl Default for BrushStyle {
    fn default() -> Self {
        BrushStyle::Brush(BrushMode::Add)
    }
}

impl BrushStyle {
    pub fn label(&self) -> &'static str {
        match self {
            BrushStyle::Brush(BrushMode::Add) => "Erase",
            BrushStyle::Brush(BrushMode::Subtract) => "Restore",
            BrushStyle::Marquee => "Marquee",
        }
    }

    pub fn all() -> &'static [BrushStyle] {
        &[
            BrushStyle::Brush(BrushMode::Add),
            BrushStyle::Brush(BrushMode::Subtract),
            BrushStyle::Marquee,
        ]
    }
}

/// Coverage of a pixel at `dist` from the dab centre: solid inside the
/// radius, smoothstep falloff across the soft edge.
fn dab_coverage(dist: f32, radius: f32) -> f32 {
    if dist <= radius {
        1.0
    } else if dist >= radius + DAB_SOFT_EDGE {
        0.0
    } else {
        let t = (dist - radius) / DAB_SOFT_EDGE;
        1.0 - t * t * (3.0 - 2.0 * t)
    }
}

#[inline(always)]
fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
}

fn apply_coverage(
    target: &mut RgbaImage,
    restore_from: &RgbaImage,
    x: u32,
    y: u32,
    coverage: f32,
    mode: BrushMode,
) {
    if coverage <= 0.0 {
        return;
    }
    match mode {
        BrushMode::Add => {
            let px = target.get_pixel_mut(x, y);
            px[3] = (px[3] as f32 * (1.0 - coverage)).round() as u8;
        }
        BrushMode::Subtract => {
            let Some(src) = restore_from.get_pixel_checked(x, y).copied() else {
                return;
            };
            let px = target.get_pixel_mut(x, y);
            *px = Rgba([
                lerp_u8(px[0], src[0], coverage),
                lerp_u8(px[1], src[1], coverage),
                lerp_u8(px[2], src[2], coverage),
                lerp_u8(px[3], src[3], coverage),
            ]);
        }
    }
}

/// Paint one soft-edged dab centred on `center`.
///
/// `restore_from` is only read in `Subtract` mode.
pub fn paint_dab(
    target: &mut RgbaImage,
    restore_from: &RgbaImage,
    center: Point,
    radius: f32,
    mode: BrushMode,
) {
    if radius.is_nan() || radius <= 0.0 || !center.x.is_finite() || !center.y.is_finite() {
        return;
    }
    let (width, height) = target.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let reach = radius + DAB_SOFT_EDGE;
    let min_x = (center.x - reach).floor().max(0.0) as i64;
    let min_y = (center.y - reach).floor().max(0.0) as i64;
    let max_x = ((center.x + reach).ceil() as i64).min(width as i64 - 1);
    let max_y = ((center.y + reach).ceil() as i64).min(height as i64 - 1);
    if min_x > max_x || min_y > max_y {
        return;
    }

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 + 0.5 - center.x;
            let dy = y as f32 + 0.5 - center.y;
            let coverage = dab_coverage((dx * dx + dy * dy).sqrt(), radius);
            apply_coverage(target, restore_from, x as u32, y as u32, coverage, mode);
        }
    }
}

/// Dab centres for a stroke segment, spaced `DAB_SPACING` apart along the
/// line and always ending on `end`. A zero-length segment yields `start`.
///
/// Centres are produced lazily; long segments cost nothing until consumed.
pub fn segment_dab_centers(start: Point, end: Point) -> SegmentDabs {
    let dx = end.x as f64 - start.x as f64;
    let dy = end.y as f64 - start.y as f64;
    let dist = (dx * dx + dy * dy).sqrt();
    let dist = if dist.is_finite() && dist > f32::EPSILON as f64 {
        dist
    } else {
        0.0
    };
    SegmentDabs {
        start,
        end,
        dist,
        index: 0,
        finished: false,
    }
}

/// Iterator over the dab centres of one segment.
#[derive(Clone, Debug)]
pub struct SegmentDabs {
    start: Point,
    end: Point,
    dist: f64,
    index: u64,
    finished: bool,
}

impl Iterator for SegmentDabs {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.finished {
            return None;
        }
        if self.dist == 0.0 {
            self.finished = true;
            return Some(self.start);
        }
        let along = self.index as f64 * DAB_SPACING as f64;
        if along >= self.dist {
            self.finished = true;
            return Some(self.end);
        }
        self.index += 1;
        let s = along / self.dist;
        let lerp = |a: f32, b: f32| (a as f64 * (1.0 - s) + b as f64 * s) as f32;
        Some(Point::new(lerp(self.start.x, self.end.x), lerp(self.start.y, self.end.y)))
    }
}

/// Clip a segment to the rectangle `min`..`max` (Liang-Barsky).
/// Returns `None` when the segment misses it entirely.
fn clip_segment(start: Point, end: Point, min: Point, max: Point) -> Option<(Point, Point)> {
    let (x0, y0) = (start.x as f64, start.y as f64);
    let (dx, dy) = (end.x as f64 - x0, end.y as f64 - y0);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    let edges = [
        (-dx, x0 - min.x as f64),
        (dx, max.x as f64 - x0),
        (-dy, y0 - min.y as f64),
        (dy, max.y as f64 - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    let at = |t: f64| Point::new((x0 + dx * t) as f32, (y0 + dy * t) as f32);
    Some((at(t0), at(t1)))
}

/// Paint a continuous stroke from `start` to `end`. Only the part of the
/// segment that can reach the canvas is stamped.
pub fn paint_segment(
    target: &mut RgbaImage,
    restore_from: &RgbaImage,
    start: Point,
    end: Point,
    radius: f32,
    mode: BrushMode,
) {
    if radius.is_nan() || radius <= 0.0 {
        return;
    }
    if ![start.x, start.y, end.x, end.y].iter().all(|v| v.is_finite()) {
        return;
    }
    let reach = radius + DAB_SOFT_EDGE;
    let (width, height) = target.dimensions();
    let min = Point::new(-reach, -reach);
    let max = Point::new(width as f32 + reach, height as f32 + reach);
    let Some((start, end)) = clip_segment(start, end, min, max) else { return };
    for center in segment_dab_centers(start, end) {
        paint_dab(target, restore_from, center, radius, mode);
    }
}

/// Apply full coverage to the rectangle spanned by two corners.
pub fn paint_marquee(
    target: &mut RgbaImage,
    restore_from: &RgbaImage,
    corner_a: Point,
    corner_b: Point,
    mode: BrushMode,
) {
    let (width, height) = target.dimensions();
    let left = corner_a.x.min(corner_b.x).round().max(0.0) as i64;
    let top = corner_a.y.min(corner_b.y).round().max(0.0) as i64;
    let right = (corner_a.x.max(corner_b.x).round() as i64).min(width as i64);
    let bottom = (corner_a.y.max(corner_b.y).round() as i64).min(height as i64);

    for y in top..bottom {
        for x in left..right {
            apply_coverage(target, restore_from, x as u32, y as u32, 1.0, mode);
        }
    }
}
