//! Tool state machine: the closed set of editing tools, their shared
//! invocation context, and the registry that switches between them.

mod bucket;
mod select;
mod shape;
mod stroke;

pub use bucket::BucketTool;
pub use select::SelectTool;
pub use shape::{ShapeKind, ShapeTool};
pub use stroke::{StrokeKind, StrokeTool};

use egui::CursorIcon;
use image::{Rgba, RgbaImage};

use crate::canvas::{CanvasSize, DrawContext, LayerStore, Region};
use crate::components::history::{HistoryEntry, UndoStack};
use crate::error::Result;
use crate::project::EditorEvent;
use crate::settings::EditorSettings;
use crate::{log_err, log_info};

// ============================================================================
// TOOL IDS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ToolId {
    #[default]
    None,
    Brush,
    Line,
    Eraser,
    Bucket,
    Stamp,
    Select,
    Rect,
}

impl ToolId {
    pub const ALL: [ToolId; 8] = [
        ToolId::None,
        ToolId::Brush,
        ToolId::Line,
        ToolId::Eraser,
        ToolId::Bucket,
        ToolId::Stamp,
        ToolId::Select,
        ToolId::Rect,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolId::None => "none",
            ToolId::Brush => "brush",
            ToolId::Line => "line",
            ToolId::Eraser => "eraser",
            ToolId::Bucket => "bucket",
            ToolId::Stamp => "stamp",
            ToolId::Select => "select",
            ToolId::Rect => "rect",
        }
    }

    pub fn from_name(name: &str) -> Option<ToolId> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name.trim()))
    }

    fn slot(&self) -> usize {
        match self {
            ToolId::None => 0,
            ToolId::Brush => 1,
            ToolId::Line => 2,
            ToolId::Eraser => 3,
            ToolId::Bucket => 4,
            ToolId::Stamp => 5,
            ToolId::Select => 6,
            ToolId::Rect => 7,
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// POINTER + SETTINGS
// ============================================================================

/// Everything a pointer handler needs about one event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pointer {
    pub fx: f32,
    pub fy: f32,
    pub x: i32,
    pub y: i32,
    pub ctrl: bool,
    pub shift: bool,
    pub zoom: f32,
    /// Only meaningful on `up`: the primary button was held before release.
    pub was_down: bool,
}

impl Pointer {
    pub fn pixel(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Live tool menu values.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSettings {
    pub brush_color: Rgba<u8>,
    pub brush_thickness: u32,
    pub eraser_thickness: u32,
    /// Percent, 0 = exact match.
    pub fill_tolerance: f32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self::from(&EditorSettings::default())
    }
}

impl From<&EditorSettings> for ToolSettings {
    fn from(s: &EditorSettings) -> Self {
        Self {
            brush_color: s.brush_color,
            brush_thickness: s.brush_thickness.max(1),
            eraser_thickness: s.eraser_thickness.max(1),
            fill_tolerance: s.fill_tolerance.clamp(0.0, 100.0),
        }
    }
}

// ============================================================================
// TOOL CONTEXT: transient access granted to a handler
// ============================================================================

/// Borrowed project state for the duration of one handler call. Tools
/// write layer pixels and commit history; they never change layer
/// membership.
pub struct ToolContext<'a> {
    pub layers: &'a mut LayerStore,
    pub history: &'a mut UndoStack,
    pub settings: &'a ToolSettings,
    pub is_dirty: &'a mut bool,
    pub events: &'a mut Vec<EditorEvent>,
}

impl ToolContext<'_> {
    pub fn current_layer(&self) -> usize {
        self.layers.current_index()
    }

    pub fn canvas_size(&self) -> CanvasSize {
        self.layers.size()
    }

    pub fn settings(&self) -> &ToolSettings {
        self.settings
    }

    pub fn surface(&mut self, layer_index: usize) -> Result<DrawContext<'_>> {
        Ok(self.layers.get_mut(layer_index)?.context())
    }

    /// Full copy of a layer's pixels.
    pub fn snapshot_layer(&self, layer_index: usize) -> Result<RgbaImage> {
        Ok(self.layers.get(layer_index)?.surface().clone())
    }

    /// Commit one history entry for `region` of `layer_index`. `before` holds
    /// the region's pixels prior to the edit; the after patch is read from
    /// the layer as it is now.
    pub fn commit(
        &mut self,
        layer_index: usize,
        description: &str,
        region: Region,
        before: RgbaImage,
    ) -> Result<()> {
        let after = self.layers.get(layer_index)?.snapshot(region);
        let entry = HistoryEntry::new(description, layer_index, region, before, after)?;
        self.history.commit(entry);
        self.layers.refresh_preview(layer_index)?;
        crate::project::mark_dirty(self.is_dirty, self.events);
        self.events.push(EditorEvent::HistoryChanged);
        Ok(())
    }
}

// ============================================================================
// TOOL: one variant per id, each holding only its own state
// ============================================================================

pub enum Tool {
    None,
    Brush(StrokeTool),
    Line(ShapeTool),
    Eraser(StrokeTool),
    Bucket(BucketTool),
    Stamp(StrokeTool),
    Select(SelectTool),
    Rect(ShapeTool),
}

impl Tool {
    pub fn new(id: ToolId) -> Self {
        match id {
            ToolId::None => Tool::None,
            ToolId::Brush => Tool::Brush(StrokeTool::new(StrokeKind::Paint)),
            ToolId::Line => Tool::Line(ShapeTool::new(ShapeKind::Line)),
            ToolId::Eraser => Tool::Eraser(StrokeTool::new(StrokeKind::Erase)),
            ToolId::Bucket => Tool::Bucket(BucketTool::default()),
            ToolId::Stamp => Tool::Stamp(StrokeTool::new(StrokeKind::Clone)),
            ToolId::Select => Tool::Select(SelectTool::default()),
            ToolId::Rect => Tool::Rect(ShapeTool::new(ShapeKind::Rect)),
        }
    }

    pub fn id(&self) -> ToolId {
        match self {
            Tool::None => ToolId::None,
            Tool::Brush(_) => ToolId::Brush,
            Tool::Line(_) => ToolId::Line,
            Tool::Eraser(_) => ToolId::Eraser,
            Tool::Bucket(_) => ToolId::Bucket,
            Tool::Stamp(_) => ToolId::Stamp,
            Tool::Select(_) => ToolId::Select,
            Tool::Rect(_) => ToolId::Rect,
        }
    }

    pub fn on_start(&mut self, _previous: ToolId, _ctx: &mut ToolContext) -> Result<()> {
        Ok(())
    }

    pub fn on_end(&mut self, _next: ToolId, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Brush(t) | Tool::Eraser(t) | Tool::Stamp(t) => t.finish(ctx),
            Tool::Line(t) | Tool::Rect(t) => t.finish(ctx),
            Tool::Select(t) => t.on_end(ctx),
            Tool::None | Tool::Bucket(_) => Ok(()),
        }
    }

    pub fn on_canvas_change(&mut self, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Brush(t) | Tool::Eraser(t) | Tool::Stamp(t) => t.finish(ctx),
            Tool::Line(t) | Tool::Rect(t) => t.finish(ctx),
            Tool::Select(t) => t.on_canvas_change(ctx),
            Tool::None | Tool::Bucket(_) => Ok(()),
        }
    }

    /// Pointer motion with no button held.
    pub fn hover(&mut self, p: &Pointer, _ctx: &mut ToolContext) -> Result<()> {
        if let Tool::Select(t) = self {
            t.hover(p);
        }
        Ok(())
    }

    pub fn down(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Brush(t) | Tool::Eraser(t) | Tool::Stamp(t) => t.down(p, ctx),
            Tool::Line(t) | Tool::Rect(t) => t.down(p, ctx),
            Tool::Bucket(t) => t.down(p, ctx),
            Tool::Select(t) => t.down(p, ctx),
            Tool::None => Ok(()),
        }
    }

    /// Pointer motion with the primary button held.
    pub fn tool_move(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Brush(t) | Tool::Eraser(t) | Tool::Stamp(t) => t.tool_move(p, ctx),
            Tool::Line(t) | Tool::Rect(t) => t.tool_move(p, ctx),
            Tool::Select(t) => t.tool_move(p, ctx),
            Tool::None | Tool::Bucket(_) => Ok(()),
        }
    }

    pub fn up(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Brush(t) | Tool::Eraser(t) | Tool::Stamp(t) => t.up(p, ctx),
            Tool::Line(t) | Tool::Rect(t) => t.up(p, ctx),
            Tool::Select(t) => t.up(p, ctx),
            Tool::None | Tool::Bucket(_) => Ok(()),
        }
    }

    pub fn on_ctrl_a(&mut self, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Select(t) => t.select_all(ctx),
            _ => Ok(()),
        }
    }

    pub fn on_ctrl_c(&mut self, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Select(t) => t.copy(ctx),
            _ => Ok(()),
        }
    }

    pub fn on_ctrl_v(&mut self, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Select(t) => t.paste(ctx),
            _ => Ok(()),
        }
    }

    pub fn on_ctrl_x(&mut self, ctx: &mut ToolContext) -> Result<()> {
        match self {
            Tool::Select(t) => t.cut(ctx),
            _ => Ok(()),
        }
    }

    /// `true` lets the global undo run. An open stroke or shape is
    /// committed first so its start snapshot never outlives the undo.
    pub fn on_ctrl_z(&mut self, ctx: &mut ToolContext) -> Result<bool> {
        match self {
            Tool::Brush(t) | Tool::Eraser(t) | Tool::Stamp(t) => t.finish(ctx).map(|_| true),
            Tool::Line(t) | Tool::Rect(t) => t.finish(ctx).map(|_| true),
            Tool::Select(t) => t.intercept_history(ctx),
            Tool::None | Tool::Bucket(_) => Ok(true),
        }
    }

    /// `true` lets the global redo run. An open stroke or shape is
    /// committed first so its start snapshot never outlives the redo.
    pub fn on_ctrl_y(&mut self, ctx: &mut ToolContext) -> Result<bool> {
        match self {
            Tool::Brush(t) | Tool::Eraser(t) | Tool::Stamp(t) => t.finish(ctx).map(|_| true),
            Tool::Line(t) | Tool::Rect(t) => t.finish(ctx).map(|_| true),
            Tool::Select(t) => t.intercept_history(ctx),
            Tool::None | Tool::Bucket(_) => Ok(true),
        }
    }

    /// Drop any in-progress operation without committing it. Pixels already
    /// written stay as they are.
    pub fn abort(&mut self) {
        match self {
            Tool::Brush(t) | Tool::Eraser(t) | Tool::Stamp(t) => t.abort(),
            Tool::Line(t) | Tool::Rect(t) => t.abort(),
            Tool::Select(t) => t.abort(),
            Tool::None | Tool::Bucket(_) => {}
        }
    }

    pub fn cursor(&self) -> CursorIcon {
        match self {
            Tool::None => CursorIcon::Default,
            Tool::Bucket(_) => CursorIcon::PointingHand,
            Tool::Select(t) if t.over_floating() => CursorIcon::Move,
            _ => CursorIcon::Crosshair,
        }
    }
}

// ============================================================================
// TOOL BOX: registry + active tool
// ============================================================================

/// One instance of every tool, kept for the whole session so tool-local
/// state that outlives a switch (the select clipboard) survives.
pub struct ToolBox {
    tools: Vec<Tool>,
    active: ToolId,
}

impl Default for ToolBox {
    fn default() -> Self {
        Self {
            tools: ToolId::ALL.iter().map(|id| Tool::new(*id)).collect(),
            active: ToolId::None,
        }
    }
}

impl ToolBox {
    pub fn active_id(&self) -> ToolId {
        self.active
    }

    pub fn active(&self) -> &Tool {
        &self.tools[self.active.slot()]
    }

    pub fn active_mut(&mut self) -> &mut Tool {
        &mut self.tools[self.active.slot()]
    }

    pub fn get(&self, id: ToolId) -> &Tool {
        &self.tools[id.slot()]
    }

    pub fn select_state(&self) -> Option<&SelectTool> {
        match self.get(ToolId::Select) {
            Tool::Select(t) => Some(t),
            _ => None,
        }
    }

    /// Run the outgoing tool's `on_end` to completion, then the incoming
    /// tool's `on_start`. Switching to the active tool does nothing.
    pub fn switch(&mut self, to: ToolId, ctx: &mut ToolContext) {
        let from = self.active;
        if from == to {
            return;
        }

        let outgoing = &mut self.tools[from.slot()];
        if let Err(e) = outgoing.on_end(to, ctx) {
            log_err!("{} on_end failed: {}", from, e);
            outgoing.abort();
        }
        ctx.events.push(EditorEvent::ToolEnded { tool: from, next: to });

        self.active = to;
        let incoming = &mut self.tools[to.slot()];
        if let Err(e) = incoming.on_start(from, ctx) {
            log_err!("{} on_start failed: {}", to, e);
            incoming.abort();
        }
        ctx.events.push(EditorEvent::ToolStarted { tool: to, previous: from });
        log_info!("Tool switched: {} -> {}", from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::from_name(id.name()), Some(id));
        }
        assert_eq!(ToolId::from_name(" Brush "), Some(ToolId::Brush));
        assert_eq!(ToolId::from_name("lasso"), None);
    }

    #[test]
    fn registry_starts_on_none() {
        let tools = ToolBox::default();
        assert_eq!(tools.active_id(), ToolId::None);
        for id in ToolId::ALL {
            assert_eq!(tools.get(id).id(), id);
        }
    }

    #[test]
    fn switch_ends_before_it_starts() {
        let mut layers = LayerStore::new(CanvasSize::new(8, 8), 8);
        let mut history = UndoStack::new();
        let settings = ToolSettings::default();
        let mut dirty = false;
        let mut events = Vec::new();
        let mut ctx = ToolContext {
            layers: &mut layers,
            history: &mut history,
            settings: &settings,
            is_dirty: &mut dirty,
            events: &mut events,
        };
        let mut tools = ToolBox::default();
        tools.switch(ToolId::Brush, &mut ctx);
        tools.switch(ToolId::Brush, &mut ctx);
        tools.switch(ToolId::Select, &mut ctx);
        assert_eq!(
            events,
            vec![
                EditorEvent::ToolEnded { tool: ToolId::None, next: ToolId::Brush },
                EditorEvent::ToolStarted { tool: ToolId::Brush, previous: ToolId::None },
                EditorEvent::ToolEnded { tool: ToolId::Brush, next: ToolId::Select },
                EditorEvent::ToolStarted { tool: ToolId::Select, previous: ToolId::Brush },
            ]
        );
    }
}
