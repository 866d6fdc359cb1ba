use egui::{Modifiers, Pos2, Rect, Vec2};

use crate::canvas::CanvasSize;
use crate::settings::EditorSettings;

/// Scroll offsets are fractions of the canvas size, kept in this range.
pub const SCROLL_LIMIT: f32 = 0.5;

/// Zoom factor and normalized scroll of the canvas inside the editor area.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    zoom: f32,
    /// Horizontal / vertical scroll as fractions of canvas width / height.
    scroll: Vec2,
    /// Screen rect of the editor area hosting the canvas.
    area: Rect,
    zoom_min: f32,
    zoom_max: f32,
    zoom_step: f32,
    scroll_divisor: f32,
}

impl Viewport {
    pub fn new(settings: &EditorSettings) -> Self {
        Self {
            zoom: 1.0f32.max(settings.zoom_min),
            scroll: Vec2::ZERO,
            area: Rect::NOTHING,
            zoom_min: settings.zoom_min,
            zoom_max: settings.zoom_max.max(settings.zoom_min),
            zoom_step: settings.zoom_step(),
            scroll_divisor: settings.scroll_divisor,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn scroll(&self) -> Vec2 {
        self.scroll
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn set_area(&mut self, area: Rect) {
        self.area = area;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(self.zoom_min, self.zoom_max);
    }

    pub fn set_scroll(&mut self, scroll: Vec2) {
        self.scroll = Vec2::new(clamp_scroll(scroll.x), clamp_scroll(scroll.y));
    }

    pub fn reset(&mut self) {
        self.set_zoom(1.0);
        self.scroll = Vec2::ZERO;
    }

    /// Apply one wheel event. Plain wheel scrolls vertically, shift+wheel
    /// horizontally and ctrl+wheel zooms; positive `delta_y` scrolls down
    /// or zooms out. Only the sign of `delta_y` matters. Returns whether
    /// anything changed.
    pub fn wheel(&mut self, delta_y: f32, modifiers: Modifiers, canvas: CanvasSize) -> bool {
        if delta_y == 0.0 || delta_y.is_nan() {
            return false;
        }
        let sign = delta_y.signum();
        let before = (self.zoom, self.scroll);
        if modifiers.ctrl {
            self.set_zoom(self.zoom / self.zoom_step.powf(sign));
        } else if modifiers.shift {
            let step = self.scroll_step(canvas.width);
            self.scroll.x = clamp_scroll(self.scroll.x + sign * step);
        } else {
            let step = self.scroll_step(canvas.height);
            self.scroll.y = clamp_scroll(self.scroll.y + sign * step);
        }
        before != (self.zoom, self.scroll)
    }

    /// One notch shifts the surface by `scroll_divisor` screen pixels at
    /// every zoom.
    fn scroll_step(&self, extent: u32) -> f32 {
        let denom = extent.max(1) as f32 / self.scroll_divisor * self.zoom;
        1.0 / denom
    }

    /// Screen rect of the canvas surface: centred in the area, shifted by
    /// the scroll offsets and scaled by the zoom.
    pub fn surface_rect(&self, canvas: CanvasSize) -> Rect {
        let w = canvas.width as f32 * self.zoom;
        let h = canvas.height as f32 * self.zoom;
        let area_size = self.area.size();
        let left = self.area.min.x + 0.5 * area_size.x - (self.scroll.x + 0.5) * w;
        let top = self.area.min.y + 0.5 * area_size.y - (self.scroll.y + 0.5) * h;
        Rect::from_min_size(Pos2::new(left, top), Vec2::new(w, h))
    }

    /// Screen position of a canvas pixel's top-left corner.
    pub fn canvas_to_screen(&self, canvas: CanvasSize, x: f32, y: f32) -> Pos2 {
        let rect = self.surface_rect(canvas);
        Pos2::new(rect.min.x + x * self.zoom, rect.min.y + y * self.zoom)
    }
}

fn clamp_scroll(v: f32) -> f32 {
    v.clamp(-SCROLL_LIMIT, SCROLL_LIMIT)
}
