use std::sync::Arc;

use image::RgbaImage;

use super::{Pointer, ToolContext};
use crate::canvas::{Region, crop};
use crate::error::Result;
use crate::log_info;

enum Drag {
    /// Rubber-band selection from `anchor`.
    Marquee { anchor: (i32, i32), moved: bool },
    /// Dragging the floating paste; `grab` is the pointer offset from its origin.
    MoveFloating { grab: (i32, i32) },
}

/// Pasted pixels not yet committed to the layer.
struct Floating {
    layer_index: usize,
    image: Arc<RgbaImage>,
    origin: (i32, i32),
    /// Whole layer as it was before the paste.
    before: RgbaImage,
    drawn: Option<Region>,
}

impl Floating {
    fn footprint_contains(&self, x: i32, y: i32) -> bool {
        x >= self.origin.0
            && y >= self.origin.1
            && x < self.origin.0 + self.image.width() as i32
            && y < self.origin.1 + self.image.height() as i32
    }

    fn redraw(&mut self, ctx: &mut ToolContext) -> Result<()> {
        let mut surface = ctx.surface(self.layer_index)?;
        if let Some(previous) = self.drawn {
            surface.copy_from(&self.before, previous);
        }
        self.drawn = surface.draw_image(&self.image, self.origin.0, self.origin.1);
        Ok(())
    }
}

/// Rectangular selection with a clipboard that outlives tool switches.
#[derive(Default)]
pub struct SelectTool {
    selection: Option<Region>,
    drag: Option<Drag>,
    floating: Option<Floating>,
    clipboard: Option<Arc<RgbaImage>>,
    over_floating: bool,
}

impl SelectTool {
    pub fn selection(&self) -> Option<Region> {
        self.selection
    }

    pub fn clipboard(&self) -> Option<&Arc<RgbaImage>> {
        self.clipboard.as_ref()
    }

    pub fn has_floating(&self) -> bool {
        self.floating.is_some()
    }

    pub fn over_floating(&self) -> bool {
        self.over_floating
    }

    pub fn hover(&mut self, p: &Pointer) {
        self.over_floating = self
            .floating
            .as_ref()
            .is_some_and(|f| f.footprint_contains(p.x, p.y));
    }

    pub fn down(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        if let Some(floating) = &self.floating {
            if floating.footprint_contains(p.x, p.y) {
                let grab = (p.x - floating.origin.0, p.y - floating.origin.1);
                self.drag = Some(Drag::MoveFloating { grab });
                return Ok(());
            }
        }
        self.commit_floating(ctx)?;
        self.drag = Some(Drag::Marquee {
            anchor: p.pixel(),
            moved: false,
        });
        Ok(())
    }

    pub fn tool_move(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        match &mut self.drag {
            Some(Drag::Marquee { anchor, moved }) => {
                if p.pixel() != *anchor {
                    *moved = true;
                }
                if *moved {
                    self.selection = Region::from_corners(*anchor, p.pixel(), ctx.canvas_size());
                }
            }
            Some(Drag::MoveFloating { grab }) => {
                let origin = (p.x - grab.0, p.y - grab.1);
                if let Some(floating) = self.floating.as_mut() {
                    if floating.origin != origin {
                        floating.origin = origin;
                        floating.redraw(ctx)?;
                    }
                }
            }
            None => {}
        }
        Ok(())
    }

    pub fn up(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        self.tool_move(p, ctx)?;
        if let Some(Drag::Marquee { moved: false, .. }) = self.drag {
            self.selection = None;
        }
        self.drag = None;
        Ok(())
    }

    pub fn select_all(&mut self, ctx: &mut ToolContext) -> Result<()> {
        self.commit_floating(ctx)?;
        self.selection = Some(ctx.canvas_size().bounds());
        Ok(())
    }

    pub fn copy(&mut self, ctx: &mut ToolContext) -> Result<()> {
        if let Some(floating) = &self.floating {
            self.clipboard = Some(Arc::clone(&floating.image));
        } else if let Some(selection) = self.selection {
            let pixels = ctx.layers.get(ctx.current_layer())?.snapshot(selection);
            self.clipboard = Some(Arc::new(pixels));
            log_info!("Copied {:?}", selection);
        }
        Ok(())
    }

    /// Copy, then remove the copied pixels. A floating paste is simply
    /// dropped; a selection is cleared and committed as one entry.
    pub fn cut(&mut self, ctx: &mut ToolContext) -> Result<()> {
        self.copy(ctx)?;
        if let Some(floating) = self.floating.take() {
            if let Some(drawn) = floating.drawn {
                ctx.surface(floating.layer_index)?
                    .copy_from(&floating.before, drawn);
            }
            return Ok(());
        }
        let Some(selection) = self.selection else { return Ok(()) };
        let layer_index = ctx.current_layer();
        let before = ctx.layers.get(layer_index)?.snapshot(selection);
        ctx.surface(layer_index)?.clear_rect(selection);
        ctx.commit(layer_index, "Cut", selection, before)
    }

    /// Float the clipboard at the selection origin, or the canvas origin.
    pub fn paste(&mut self, ctx: &mut ToolContext) -> Result<()> {
        let Some(image) = self.clipboard.clone() else { return Ok(()) };
        self.commit_floating(ctx)?;
        let origin = self
            .selection
            .map(|s| (s.x as i32, s.y as i32))
            .unwrap_or((0, 0));
        let layer_index = ctx.current_layer();
        let mut floating = Floating {
            layer_index,
            image,
            origin,
            before: ctx.snapshot_layer(layer_index)?,
            drawn: None,
        };
        floating.redraw(ctx)?;
        self.floating = Some(floating);
        self.selection = None;
        Ok(())
    }

    /// Undo/redo while a paste floats only commits the paste.
    pub fn intercept_history(&mut self, ctx: &mut ToolContext) -> Result<bool> {
        if self.floating.is_none() {
            return Ok(true);
        }
        self.commit_floating(ctx)?;
        Ok(false)
    }

    pub fn on_end(&mut self, ctx: &mut ToolContext) -> Result<()> {
        self.drag = None;
        self.commit_floating(ctx)?;
        self.selection = None;
        Ok(())
    }

    pub fn on_canvas_change(&mut self, ctx: &mut ToolContext) -> Result<()> {
        self.drag = None;
        self.commit_floating(ctx)?;
        self.selection = None;
        Ok(())
    }

    pub fn abort(&mut self) {
        self.drag = None;
        self.floating = None;
        self.over_floating = false;
    }

    /// Commit the floating paste's final footprint as one entry and select it.
    fn commit_floating(&mut self, ctx: &mut ToolContext) -> Result<()> {
        let Some(floating) = self.floating.take() else { return Ok(()) };
        self.over_floating = false;
        let Some(region) = floating.drawn else { return Ok(()) };
        self.selection = Some(region);
        ctx.commit(
            floating.layer_index,
            "Paste",
            region,
            crop(&floating.before, region),
        )
    }
}
