use egui::{Pos2, Rect};

/// A pointer position in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasPoint {
    /// Sub-pixel position.
    pub fx: f32,
    pub fy: f32,
    /// `floor` of the sub-pixel position.
    pub x: i32,
    pub y: i32,
}

impl CanvasPoint {
    pub fn pixel(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Map a screen position onto the canvas, given where the canvas surface is
/// drawn on screen and the zoom it is drawn at. Positions outside the
/// surface map to out-of-range (possibly negative) pixels.
pub fn map_pointer(screen: Pos2, surface: Rect, zoom: f32) -> CanvasPoint {
    let fx = (screen.x - surface.min.x) / zoom;
    let fy = (screen.y - surface.min.y) / zoom;
    CanvasPoint {
        fx,
        fy,
        x: fx.floor() as i32,
        y: fy.floor() as i32,
    }
}
