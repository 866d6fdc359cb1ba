use image::RgbaImage;

use super::{Pointer, ToolContext};
use crate::canvas::{Region, crop};
use crate::error::Result;
use crate::log_info;

/// What a freehand stroke does to the pixels under the brush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrokeKind {
    Paint,
    Erase,
    /// Clone stamp: copy from a source point through the brush.
    Clone,
}

impl StrokeKind {
    fn description(&self) -> &'static str {
        match self {
            StrokeKind::Paint => "Brush Stroke",
            StrokeKind::Erase => "Eraser Stroke",
            StrokeKind::Clone => "Clone Stamp",
        }
    }
}

/// Per-stroke state, alive from `down` to commit.
struct Stroke {
    layer_index: usize,
    /// Whole layer as it was when the stroke began.
    before: RgbaImage,
    last: (i32, i32),
    bounds: Option<Region>,
    /// Clone source displacement, locked at the first dab.
    offset: (i32, i32),
}

/// Brush, eraser and clone stamp: dabs joined between successive pointer
/// positions, committed as one history entry on release.
pub struct StrokeTool {
    kind: StrokeKind,
    stroke: Option<Stroke>,
    /// End of the previous stroke, for shift+click straight lines.
    last_end: Option<(i32, i32)>,
    /// Clone source set with ctrl+click.
    clone_source: Option<(i32, i32)>,
}

impl StrokeTool {
    pub fn new(kind: StrokeKind) -> Self {
        Self {
            kind,
            stroke: None,
            last_end: None,
            clone_source: None,
        }
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn clone_source(&self) -> Option<(i32, i32)> {
        self.clone_source
    }

    pub fn down(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        self.finish(ctx)?;

        let mut offset = (0, 0);
        if self.kind == StrokeKind::Clone {
            if p.ctrl {
                self.clone_source = Some(p.pixel());
                log_info!("Clone source set at {:?}", p.pixel());
                return Ok(());
            }
            let Some(source) = self.clone_source else { return Ok(()) };
            offset = (source.0 - p.x, source.1 - p.y);
        }

        let layer_index = ctx.current_layer();
        let start = match (p.shift, self.last_end) {
            (true, Some(end)) => end,
            _ => p.pixel(),
        };
        let mut stroke = Stroke {
            layer_index,
            before: ctx.snapshot_layer(layer_index)?,
            last: start,
            bounds: None,
            offset,
        };
        stroke.extend(self.kind, start, p.pixel(), ctx)?;
        self.stroke = Some(stroke);
        Ok(())
    }

    pub fn tool_move(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        let Some(stroke) = self.stroke.as_mut() else { return Ok(()) };
        if stroke.last != p.pixel() {
            stroke.extend(self.kind, stroke.last, p.pixel(), ctx)?;
        }
        Ok(())
    }

    pub fn up(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        self.tool_move(p, ctx)?;
        self.finish(ctx)
    }

    /// Commit the in-progress stroke, if any, to the layer it started on.
    pub fn finish(&mut self, ctx: &mut ToolContext) -> Result<()> {
        let Some(stroke) = self.stroke.take() else { return Ok(()) };
        self.last_end = Some(stroke.last);
        match stroke.bounds {
            Some(bounds) => ctx.commit(
                stroke.layer_index,
                self.kind.description(),
                bounds,
                crop(&stroke.before, bounds),
            ),
            None => Ok(()),
        }
    }

    pub fn abort(&mut self) {
        if self.stroke.take().is_some() {
            log_info!("{} aborted", self.kind.description());
        }
    }
}

impl Stroke {
    fn extend(
        &mut self,
        kind: StrokeKind,
        from: (i32, i32),
        to: (i32, i32),
        ctx: &mut ToolContext,
    ) -> Result<()> {
        let color = ctx.settings().brush_color;
        let brush = ctx.settings().brush_thickness;
        let eraser = ctx.settings().eraser_thickness;
        let mut surface = ctx.surface(self.layer_index)?;
        let touched = match kind {
            StrokeKind::Paint => surface.stroke_segment(from, to, brush, color),
            StrokeKind::Erase => surface.erase_segment(from, to, eraser),
            StrokeKind::Clone => surface.clone_segment(from, to, brush, &self.before, self.offset),
        };
        self.bounds = Region::union_opt(self.bounds, touched);
        self.last = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasSize, LayerStore, TRANSPARENT};
    use crate::components::history::UndoStack;
    use crate::components::tools::ToolSettings;
    use image::Rgba;

    struct Harness {
        layers: LayerStore,
        history: UndoStack,
        settings: ToolSettings,
        dirty: bool,
        events: Vec<crate::project::EditorEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                layers: LayerStore::new(CanvasSize::new(32, 32), 8),
                history: UndoStack::new(),
                settings: ToolSettings::default(),
                dirty: false,
                events: Vec::new(),
            }
        }

        fn ctx(&mut self) -> ToolContext<'_> {
            ToolContext {
                layers: &mut self.layers,
                history: &mut self.history,
                settings: &self.settings,
                is_dirty: &mut self.dirty,
                events: &mut self.events,
            }
        }
    }

    fn at(x: i32, y: i32) -> Pointer {
        Pointer {
            fx: x as f32 + 0.5,
            fy: y as f32 + 0.5,
            x,
            y,
            ctrl: false,
            shift: false,
            zoom: 1.0,
            was_down: true,
        }
    }

    #[test]
    fn brush_commits_minimal_bounds() {
        let mut h = Harness::new();
        let mut brush = StrokeTool::new(StrokeKind::Paint);
        brush.down(&at(10, 10), &mut h.ctx()).unwrap();
        brush.tool_move(&at(19, 19), &mut h.ctx()).unwrap();
        brush.up(&at(19, 19), &mut h.ctx()).unwrap();

        let entry = h.history.last().unwrap();
        assert_eq!(entry.region(), Region::new(10, 10, 10, 10));
        assert_eq!(entry.description(), "Brush Stroke");
        assert_eq!(h.history.undo_count(), 1);
        assert!(h.dirty);
    }

    #[test]
    fn shift_click_continues_from_previous_end() {
        let mut h = Harness::new();
        let mut brush = StrokeTool::new(StrokeKind::Paint);
        brush.down(&at(2, 2), &mut h.ctx()).unwrap();
        brush.up(&at(2, 2), &mut h.ctx()).unwrap();
        let mut p = at(8, 2);
        p.shift = true;
        brush.down(&p, &mut h.ctx()).unwrap();
        brush.up(&p, &mut h.ctx()).unwrap();
        assert_eq!(h.history.last().unwrap().region(), Region::new(2, 2, 7, 1));
        assert_ne!(*h.layers.current().surface().get_pixel(5, 2), TRANSPARENT);
    }

    #[test]
    fn eraser_clears_to_transparent() {
        let mut h = Harness::new();
        h.layers
            .get_mut(0)
            .unwrap()
            .context()
            .fill_rect(Region::new(0, 0, 32, 32), Rgba([1, 2, 3, 255]));
        let mut eraser = StrokeTool::new(StrokeKind::Erase);
        eraser.down(&at(16, 16), &mut h.ctx()).unwrap();
        eraser.up(&at(16, 16), &mut h.ctx()).unwrap();
        assert_eq!(*h.layers.current().surface().get_pixel(16, 16), TRANSPARENT);
        assert_eq!(h.history.last().unwrap().description(), "Eraser Stroke");
    }

    #[test]
    fn stamp_without_source_does_nothing() {
        let mut h = Harness::new();
        let mut stamp = StrokeTool::new(StrokeKind::Clone);
        stamp.down(&at(4, 4), &mut h.ctx()).unwrap();
        assert!(!stamp.is_stroking());
        assert!(!h.history.can_undo());
    }

    #[test]
    fn stamp_copies_from_locked_offset() {
        let mut h = Harness::new();
        let red = Rgba([255, 0, 0, 255]);
        h.layers.get_mut(0).unwrap().context().put_pixel(2, 2, red);

        let mut stamp = StrokeTool::new(StrokeKind::Clone);
        let mut source = at(2, 2);
        source.ctrl = true;
        stamp.down(&source, &mut h.ctx()).unwrap();
        assert_eq!(stamp.clone_source(), Some((2, 2)));

        stamp.down(&at(20, 20), &mut h.ctx()).unwrap();
        stamp.up(&at(20, 20), &mut h.ctx()).unwrap();
        assert_eq!(*h.layers.current().surface().get_pixel(20, 20), red);
    }

    #[test]
    fn abort_leaves_no_history() {
        let mut h = Harness::new();
        let mut brush = StrokeTool::new(StrokeKind::Paint);
        brush.down(&at(3, 3), &mut h.ctx()).unwrap();
        brush.abort();
        brush.finish(&mut h.ctx()).unwrap();
        assert!(!h.history.can_undo());
    }
}
