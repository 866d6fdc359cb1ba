use image::RgbaImage;

use super::{Pointer, ToolContext};
use crate::canvas::{Region, crop};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    Line,
    Rect,
}

impl ShapeKind {
    fn description(&self) -> &'static str {
        match self {
            ShapeKind::Line => "Line",
            ShapeKind::Rect => "Rectangle",
        }
    }
}

struct Shape {
    layer_index: usize,
    before: RgbaImage,
    anchor: (i32, i32),
    /// Pixels written by the last redraw.
    drawn: Option<Region>,
}

/// Rubber-band line and rectangle outline. Every move puts the previously
/// drawn pixels back and draws the shape again; release commits it.
pub struct ShapeTool {
    kind: ShapeKind,
    shape: Option<Shape>,
}

impl ShapeTool {
    pub fn new(kind: ShapeKind) -> Self {
        Self { kind, shape: None }
    }

    pub fn down(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        self.finish(ctx)?;
        let layer_index = ctx.current_layer();
        let mut shape = Shape {
            layer_index,
            before: ctx.snapshot_layer(layer_index)?,
            anchor: p.pixel(),
            drawn: None,
        };
        shape.redraw(self.kind, p.pixel(), ctx)?;
        self.shape = Some(shape);
        Ok(())
    }

    pub fn tool_move(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        let Some(shape) = self.shape.as_mut() else { return Ok(()) };
        let end = constrain(self.kind, shape.anchor, p.pixel(), p.shift);
        shape.redraw(self.kind, end, ctx)
    }

    pub fn up(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        self.tool_move(p, ctx)?;
        self.finish(ctx)
    }

    pub fn finish(&mut self, ctx: &mut ToolContext) -> Result<()> {
        let Some(shape) = self.shape.take() else { return Ok(()) };
        match shape.drawn {
            Some(region) => ctx.commit(
                shape.layer_index,
                self.kind.description(),
                region,
                crop(&shape.before, region),
            ),
            None => Ok(()),
        }
    }

    pub fn abort(&mut self) {
        self.shape = None;
    }
}

impl Shape {
    fn redraw(&mut self, kind: ShapeKind, end: (i32, i32), ctx: &mut ToolContext) -> Result<()> {
        let color = ctx.settings().brush_color;
        let thickness = ctx.settings().brush_thickness;
        let mut surface = ctx.surface(self.layer_index)?;
        if let Some(previous) = self.drawn {
            surface.copy_from(&self.before, previous);
        }
        self.drawn = match kind {
            ShapeKind::Line => surface.stroke_segment(self.anchor, end, thickness, color),
            ShapeKind::Rect => surface.stroke_rect(self.anchor, end, thickness, color),
        };
        Ok(())
    }
}

/// Shift snaps lines to the nearest 45° and rectangles to squares.
fn constrain(kind: ShapeKind, anchor: (i32, i32), end: (i32, i32), shift: bool) -> (i32, i32) {
    if !shift {
        return end;
    }
    let (dx, dy) = (end.0 - anchor.0, end.1 - anchor.1);
    let d = dx.abs().max(dy.abs());
    let sx = if dx < 0 { -1 } else { 1 };
    let sy = if dy < 0 { -1 } else { 1 };
    match kind {
        ShapeKind::Line if dx.abs() > 2 * dy.abs() => (end.0, anchor.1),
        ShapeKind::Line if dy.abs() > 2 * dx.abs() => (anchor.0, end.1),
        _ => (anchor.0 + d * sx, anchor.1 + d * sy),
    }
}
