use egui::{CursorIcon, Key, Modifiers, Pos2, Rect, Vec2};
use image::RgbaImage;
use rayon::prelude::*;
use uuid::Uuid;

use crate::canvas::{CanvasSize, Layer, LayerStore};
use crate::components::history::{Restore, UndoStack};
use crate::components::tools::{Pointer, Tool, ToolBox, ToolContext, ToolId, ToolSettings};
use crate::coords::map_pointer;
use crate::error::{EditorError, Result};
use crate::settings::EditorSettings;
use crate::viewport::Viewport;
use crate::{log_err, log_info};

// ============================================================================
// EVENTS
// ============================================================================

/// Notifications for the host, drained with [`Project::drain_events`].
/// Layer membership and pixel changes are reported separately through
/// [`LayerStore::drain_changes`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditorEvent {
    ToolEnded { tool: ToolId, next: ToolId },
    ToolStarted { tool: ToolId, previous: ToolId },
    /// Undo or redo availability may have changed.
    HistoryChanged,
    ViewportChanged,
    DirtyChanged(bool),
}

pub(crate) fn mark_dirty(is_dirty: &mut bool, events: &mut Vec<EditorEvent>) {
    if !*is_dirty {
        *is_dirty = true;
        events.push(EditorEvent::DirtyChanged(true));
    }
}

// ============================================================================
// INPUT PLUMBING
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    /// Moved with no button held.
    Hover,
    Down,
    /// Moved with the primary button held.
    Drag,
    Up { was_down: bool },
}

/// Ctrl+letter shortcuts understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shortcut {
    SelectAll,
    Copy,
    Paste,
    Cut,
    Undo,
    Redo,
}

impl Shortcut {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::A => Some(Shortcut::SelectAll),
            Key::C => Some(Shortcut::Copy),
            Key::V => Some(Shortcut::Paste),
            Key::X => Some(Shortcut::Cut),
            Key::Z => Some(Shortcut::Undo),
            Key::Y => Some(Shortcut::Redo),
            _ => None,
        }
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Initial document contents. `layers` are encoded images (any format the
/// `image` crate decodes), bottom layer first.
#[derive(Clone, Debug)]
pub struct LoadRequest {
    pub canvas_size: CanvasSize,
    pub layers: Option<Vec<Vec<u8>>>,
}

impl LoadRequest {
    pub fn blank(canvas_size: CanvasSize) -> Self {
        Self {
            canvas_size,
            layers: None,
        }
    }
}

pub fn decode_layer(index: usize, bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.into_rgba8())
        .map_err(|source| EditorError::Decode { index, source })
}

/// Decode every blob in parallel. Results keep source order; any failure
/// fails the whole batch.
pub fn decode_all(blobs: &[Vec<u8>]) -> Result<Vec<RgbaImage>> {
    blobs
        .par_iter()
        .enumerate()
        .map(|(index, bytes)| decode_layer(index, bytes))
        .collect()
}

// ============================================================================
// PROJECT
// ============================================================================

/// Single open document: the shared containers every engine component
/// works against.
pub struct Project {
    pub id: Uuid,
    layers: LayerStore,
    history: UndoStack,
    tools: ToolBox,
    viewport: Viewport,
    tool_settings: ToolSettings,
    settings: EditorSettings,
    is_dirty: bool,
    events: Vec<EditorEvent>,
    /// Identity of the layer the active tool last saw as current.
    current_layer_id: Uuid,
}

impl Project {
    /// One blank layer, tool `none`, viewport area matching the canvas at
    /// zoom 1.
    pub fn new(size: CanvasSize, settings: EditorSettings) -> Self {
        let layers = LayerStore::new(size, settings.preview_max_edge);
        let current_layer_id = layers.current().id;
        let mut viewport = Viewport::new(&settings);
        viewport.set_area(Rect::from_min_size(
            Pos2::ZERO,
            Vec2::new(size.width as f32, size.height as f32),
        ));
        Self {
            id: Uuid::new_v4(),
            layers,
            history: UndoStack::from_settings(&settings),
            tools: ToolBox::default(),
            viewport,
            tool_settings: ToolSettings::from(&settings),
            settings,
            is_dirty: false,
            events: Vec::new(),
            current_layer_id,
        }
    }

    /// Replace the document with `request`. On a decode failure the project
    /// falls back to one blank layer of the requested size and the error is
    /// returned.
    pub fn load(&mut self, request: LoadRequest) -> Result<()> {
        self.tools.active_mut().abort();
        let size = request.canvas_size;
        let edge = self.layers.preview_max_edge();

        let decoded = match &request.layers {
            Some(blobs) => decode_all(blobs),
            None => Ok(Vec::new()),
        };
        let (layers, outcome) = match decoded {
            Ok(bitmaps) => {
                let layers: Vec<Layer> = bitmaps
                    .par_iter()
                    .map(|bitmap| Layer::from_bitmap(bitmap, size, edge))
                    .collect();
                (layers, Ok(()))
            }
            Err(e) => {
                log_err!("Load failed, falling back to a blank layer: {}", e);
                (Vec::new(), Err(e))
            }
        };

        self.layers.replace_all(size, layers);
        self.history.clear();
        self.events.push(EditorEvent::HistoryChanged);
        self.viewport.reset();
        self.events.push(EditorEvent::ViewportChanged);
        self.mark_clean();
        self.sync_current_layer();
        log_info!(
            "Loaded {} layer(s) at {}x{}",
            self.layers.len(),
            size.width,
            size.height
        );
        outcome
    }

    // --- accessors ---------------------------------------------------------

    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    /// Membership/order changes reported by the layer store since last call.
    pub fn drain_layer_changes(&mut self) -> Vec<crate::canvas::LayerChange> {
        self.layers.drain_changes()
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn tools(&self) -> &ToolBox {
        &self.tools
    }

    pub fn active_tool(&self) -> ToolId {
        self.tools.active_id()
    }

    pub fn cursor(&self) -> CursorIcon {
        self.tools.active().cursor()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Host-side viewport bookkeeping (editor area on resize, reset).
    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn tool_settings(&self) -> &ToolSettings {
        &self.tool_settings
    }

    pub fn tool_settings_mut(&mut self) -> &mut ToolSettings {
        &mut self.tool_settings
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn mark_dirty(&mut self) {
        mark_dirty(&mut self.is_dirty, &mut self.events);
    }

    pub fn mark_clean(&mut self) {
        if self.is_dirty {
            self.is_dirty = false;
            self.events.push(EditorEvent::DirtyChanged(false));
        }
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    // --- tools -------------------------------------------------------------

    pub fn set_tool(&mut self, id: ToolId) {
        let Project {
            layers,
            history,
            tools,
            tool_settings,
            is_dirty,
            events,
            ..
        } = self;
        let mut ctx = ToolContext {
            layers,
            history,
            settings: tool_settings,
            is_dirty,
            events,
        };
        tools.switch(id, &mut ctx);
    }

    /// Run `f` against the active tool. A failing handler is logged and the
    /// tool's in-progress operation aborted.
    fn run_tool<R>(
        &mut self,
        handler: &str,
        f: impl FnOnce(&mut Tool, &mut ToolContext<'_>) -> Result<R>,
    ) -> Option<R> {
        let Project {
            layers,
            history,
            tools,
            tool_settings,
            is_dirty,
            events,
            ..
        } = self;
        let mut ctx = ToolContext {
            layers,
            history,
            settings: tool_settings,
            is_dirty,
            events,
        };
        let tool = tools.active_mut();
        match f(&mut *tool, &mut ctx) {
            Ok(r) => Some(r),
            Err(e) => {
                log_err!("{} {} failed, operation aborted: {}", tool.id(), handler, e);
                tool.abort();
                None
            }
        }
    }

    /// Whether `pos` lies in the editing area. This is the whole editor
    /// rect, so a press in the margin around a zoomed-out canvas still
    /// starts an operation.
    pub fn area_contains(&self, pos: Pos2) -> bool {
        self.viewport.area().contains(pos)
    }

    /// Map a screen position through the viewport and hand it to the active
    /// tool.
    pub fn pointer(&mut self, phase: PointerPhase, pos: Pos2, modifiers: Modifiers) {
        let zoom = self.viewport.zoom();
        let surface = self.viewport.surface_rect(self.layers.size());
        let mapped = map_pointer(pos, surface, zoom);
        let p = Pointer {
            fx: mapped.fx,
            fy: mapped.fy,
            x: mapped.x,
            y: mapped.y,
            ctrl: modifiers.ctrl || modifiers.command,
            shift: modifiers.shift,
            zoom,
            was_down: matches!(phase, PointerPhase::Up { was_down: true }),
        };
        match phase {
            PointerPhase::Hover => self.run_tool("move", |t, ctx| t.hover(&p, ctx)),
            PointerPhase::Down => self.run_tool("down", |t, ctx| t.down(&p, ctx)),
            PointerPhase::Drag => self.run_tool("tool_move", |t, ctx| t.tool_move(&p, ctx)),
            PointerPhase::Up { .. } => self.run_tool("up", |t, ctx| t.up(&p, ctx)),
        };
    }

    /// Clipboard shortcuts activate the select tool first. Undo/redo ask
    /// the active tool before touching history.
    pub fn shortcut(&mut self, shortcut: Shortcut) {
        match shortcut {
            Shortcut::Undo => {
                if self.run_tool("on_ctrl_z", |t, ctx| t.on_ctrl_z(ctx)) == Some(true) {
                    self.undo();
                }
            }
            Shortcut::Redo => {
                if self.run_tool("on_ctrl_y", |t, ctx| t.on_ctrl_y(ctx)) == Some(true) {
                    self.redo();
                }
            }
            clipboard => {
                self.set_tool(ToolId::Select);
                match clipboard {
                    Shortcut::SelectAll => self.run_tool("on_ctrl_a", |t, ctx| t.on_ctrl_a(ctx)),
                    Shortcut::Copy => self.run_tool("on_ctrl_c", |t, ctx| t.on_ctrl_c(ctx)),
                    Shortcut::Paste => self.run_tool("on_ctrl_v", |t, ctx| t.on_ctrl_v(ctx)),
                    _ => self.run_tool("on_ctrl_x", |t, ctx| t.on_ctrl_x(ctx)),
                };
            }
        }
    }

    pub fn wheel(&mut self, delta_y: f32, modifiers: Modifiers) -> bool {
        let changed = self.viewport.wheel(delta_y, modifiers, self.layers.size());
        if changed {
            self.events.push(EditorEvent::ViewportChanged);
        }
        changed
    }

    // --- history -----------------------------------------------------------

    /// Revert the newest entry. `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(restore) = self.history.undo() else { return false };
        self.apply_restore("Undo", restore);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(restore) = self.history.redo() else { return false };
        self.apply_restore("Redo", restore);
        true
    }

    fn apply_restore(&mut self, label: &str, restore: Restore) {
        self.events.push(EditorEvent::HistoryChanged);
        match self.layers.get_mut(restore.layer_index) {
            Ok(layer) => layer.apply_patch(restore.region, &restore.patch),
            Err(e) => {
                log_err!("{} skipped: {}", label, e);
                return;
            }
        }
        if let Err(e) = self.layers.refresh_preview(restore.layer_index) {
            log_err!("{} preview refresh failed: {}", label, e);
        }
        self.mark_dirty();
        log_info!(
            "{} applied to layer {} at {:?}",
            label,
            restore.layer_index,
            restore.region
        );
    }

    // --- layers ------------------------------------------------------------

    pub fn set_current_layer(&mut self, index: usize) -> Result<()> {
        self.layers.set_current_index(index)?;
        self.sync_current_layer();
        Ok(())
    }

    /// Insert a blank layer at `index` and make it current.
    pub fn insert_layer(&mut self, index: usize) -> Result<()> {
        self.flush_tool();
        self.layers.insert_blank(index)?;
        self.after_structure_change();
        Ok(())
    }

    /// `Ok(false)` when `index` is the only layer, which is never removed.
    pub fn remove_layer(&mut self, index: usize) -> Result<bool> {
        self.flush_tool();
        let removed = self.layers.remove(index)?.is_some();
        if removed {
            self.after_structure_change();
        }
        Ok(removed)
    }

    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        self.flush_tool();
        self.layers.move_layer(from, to)?;
        if from != to {
            self.after_structure_change();
        }
        Ok(())
    }

    /// Let the active tool commit anything it holds while indices are
    /// still valid.
    fn flush_tool(&mut self) {
        self.run_tool("on_canvas_change", |t, ctx| t.on_canvas_change(ctx));
    }

    /// History entries address layers by index, so a structural change
    /// drops them.
    fn after_structure_change(&mut self) {
        self.history.clear();
        self.events.push(EditorEvent::HistoryChanged);
        self.mark_dirty();
        self.sync_current_layer();
    }

    fn sync_current_layer(&mut self) {
        let id = self.layers.current().id;
        if id != self.current_layer_id {
            self.current_layer_id = id;
            self.run_tool("on_canvas_change", |t, ctx| t.on_canvas_change(ctx));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_keeps_source_order_and_names_failures() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();
        let ok = decode_all(&[png.clone(), png.clone()]).unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[1].dimensions(), (3, 2));

        let err = decode_all(&[png, b"not an image".to_vec()]).unwrap_err();
        assert!(matches!(err, EditorError::Decode { index: 1, .. }));
    }

    #[test]
    fn new_project_is_clean_with_one_layer() {
        let project = Project::new(CanvasSize::new(8, 8), EditorSettings::default());
        assert_eq!(project.layers().len(), 1);
        assert_eq!(project.active_tool(), ToolId::None);
        assert!(!project.is_dirty());
        assert!(project.area_contains(Pos2::new(4.0, 4.0)));
        assert!(!project.area_contains(Pos2::new(-1.0, 4.0)));
    }

    #[test]
    fn structural_change_clears_history() {
        let mut project = Project::new(CanvasSize::new(8, 8), EditorSettings::default());
        project.set_tool(ToolId::Brush);
        project.pointer(PointerPhase::Down, Pos2::new(1.5, 1.5), Modifiers::NONE);
        project.pointer(PointerPhase::Up { was_down: true }, Pos2::new(1.5, 1.5), Modifiers::NONE);
        assert!(project.history().can_undo());
        project.insert_layer(1).unwrap();
        assert!(!project.history().can_undo());
        assert_eq!(project.layers().current_index(), 1);
    }

    #[test]
    fn shortcut_keys() {
        assert_eq!(Shortcut::from_key(Key::Z), Some(Shortcut::Undo));
        assert_eq!(Shortcut::from_key(Key::Q), None);
    }
}
