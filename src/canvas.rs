// ============================================================================
// CANVAS SPACE — pointer mapping, cursor and display zoom
// ============================================================================

use eframe::egui;
use egui::Pos2;

/// A position in canvas (backing-image) space.
pub type Point = Pos2;

/// Smallest and largest display scale the wheel can reach.
pub const MIN_SCALE: f32 = 0.05;
pub const MAX_SCALE: f32 = 8.0;

/// Multiplicative zoom step per wheel tick.
pub const WHEEL_ZOOM_IN: f32 = 1.02;
pub const WHEEL_ZOOM_OUT: f32 = 0.98;

/// Map a pointer position (screen space) into canvas space.
///
/// `element_origin` is the screen-space top-left of the displayed canvas and
/// `scale` its display scale. The same mapping must drive both the brush
/// cursor indicator and the paint target, otherwise they drift apart when
/// zoomed.
pub fn map_pointer(element_origin: Pos2, client: Pos2, scale: f32) -> Point {
    Pos2::new(
        (client.x - element_origin.x) / scale,
        (client.y - element_origin.y) / scale,
    )
}

/// On-screen brush cursor: position in device space plus brush diameter in
/// screen units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorData {
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

impl CursorData {
    pub fn new(width: f32) -> Self {
        Self { x: 0.0, y: 0.0, width }
    }

    /// Brush radius in canvas units at the given display scale.
    pub fn canvas_radius(&self, scale: f32) -> f32 {
        self.width / 2.0 / scale
    }
}

/// Display zoom. Only changes how the canvas is shown, never its resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { scale: 0.5 }
    }
}

impl Viewport {
    pub fn new(scale: f32) -> Self {
        Self {
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// One wheel tick: positive delta zooms out, negative zooms in.
    pub fn apply_wheel(&mut self, delta_y: f32) {
        let factor = if delta_y > 0.0 {
            WHEEL_ZOOM_OUT
        } else if delta_y < 0.0 {
            WHEEL_ZOOM_IN
        } else {
            return;
        };
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Screen-space rectangle covered by a `width`×`height` canvas whose
    /// top-left sits at `origin`.
    pub fn display_rect(&self, origin: Pos2, width: u32, height: u32) -> egui::Rect {
        egui::Rect::from_min_size(
            origin,
            egui::vec2(width as f32 * self.scale, height as f32 * self.scale),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_scale_doubles_offsets() {
        let p = map_pointer(Pos2::new(100.0, 100.0), Pos2::new(150.0, 150.0), 0.5);
        assert_eq!(p, Pos2::new(100.0, 100.0));
    }

    #[test]
    fn unit_scale_is_a_translation() {
        let p = map_pointer(Pos2::new(10.0, 20.0), Pos2::new(15.0, 22.0), 1.0);
        assert_eq!(p, Pos2::new(5.0, 2.0));
    }

    #[test]
    fn wheel_zooms_multiplicatively() {
        let mut v = Viewport::new(1.0);
        v.apply_wheel(3.0);
        assert!((v.scale() - 0.98).abs() < 1e-6);
        v.apply_wheel(-1.0);
        assert!((v.scale() - 0.98 * 1.02).abs() < 1e-6);
        v.apply_wheel(0.0);
        assert!((v.scale() - 0.98 * 1.02).abs() < 1e-6);
    }

    #[test]
    fn wheel_never_reaches_zero() {
        let mut v = Viewport::new(0.1);
        for _ in 0..1000 {
            v.apply_wheel(1.0);
        }
        assert_eq!(v.scale(), MIN_SCALE);
    }

    #[test]
    fn cursor_radius_follows_scale() {
        let c = CursorData::new(150.0);
        assert_eq!(c.canvas_radius(0.5), 150.0);
        assert_eq!(c.canvas_radius(1.0), 75.0);
    }
}
