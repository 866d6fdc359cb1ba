use std::sync::Arc;

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use uuid::Uuid;

use crate::error::{EditorError, Result};

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// GEOMETRY
// ============================================================================

/// Shared width/height of every layer in a project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }
}

/// Axis-aligned rectangle in canvas pixels. `x + width` / `y + height` are
/// exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest region containing both corners (inclusive), clipped to the
    /// canvas. `None` when the rectangle lies fully outside.
    pub fn from_corners(a: (i32, i32), b: (i32, i32), canvas: CanvasSize) -> Option<Self> {
        let (x0, x1) = (a.0.min(b.0), a.0.max(b.0));
        let (y0, y1) = (a.1.min(b.1), a.1.max(b.1));
        Self::from_signed(x0, y0, x1 + 1, y1 + 1, canvas)
    }

    /// Clip the half-open signed span `[x0, x1) × [y0, y1)` to the canvas.
    pub fn from_signed(x0: i32, y0: i32, x1: i32, y1: i32, canvas: CanvasSize) -> Option<Self> {
        let cx0 = x0.max(0);
        let cy0 = y0.max(0);
        let cx1 = x1.min(canvas.width as i32);
        let cy1 = y1.min(canvas.height as i32);
        if cx1 <= cx0 || cy1 <= cy0 {
            return None;
        }
        Some(Self::new(
            cx0 as u32,
            cy0 as u32,
            (cx1 - cx0) as u32,
            (cy1 - cy0) as u32,
        ))
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x as i32
            && y >= self.y as i32
            && x < self.right() as i32
            && y < self.bottom() as i32
    }

    pub fn union(&self, other: Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Region::new(x, y, right - x, bottom - y)
    }

    pub fn intersect(&self, other: Region) -> Option<Region> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > x && bottom > y).then(|| Region::new(x, y, right - x, bottom - y))
    }

    /// Grow an accumulated bounding box.
    pub fn union_opt(acc: Option<Region>, next: Option<Region>) -> Option<Region> {
        match (acc, next) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// Running min/max over touched pixels.
#[derive(Clone, Copy, Debug, Default)]
struct Touched {
    min: Option<(u32, u32)>,
    max: (u32, u32),
}

impl Touched {
    fn add(&mut self, x: u32, y: u32) {
        match self.min {
            None => {
                self.min = Some((x, y));
                self.max = (x, y);
            }
            Some((mx, my)) => {
                self.min = Some((mx.min(x), my.min(y)));
                self.max = (self.max.0.max(x), self.max.1.max(y));
            }
        }
    }

    fn region(&self) -> Option<Region> {
        self.min.map(|(x, y)| {
            Region::new(x, y, self.max.0 - x + 1, self.max.1 - y + 1)
        })
    }
}

// ============================================================================
// PIXEL HELPERS
// ============================================================================

/// Non-premultiplied source-over. A transparent destination receives the
/// source unchanged.
pub fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    if src[3] == 255 || dst[3] == 0 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mix = |s: u8, d: u8| -> u8 {
        let c = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Copy `region` out of `image`.
pub fn crop(image: &RgbaImage, region: Region) -> RgbaImage {
    image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image()
}

/// Integer points from `a` to `b` inclusive (Bresenham).
fn line_points(a: (i32, i32), b: (i32, i32)) -> Vec<(i32, i32)> {
    let (mut x0, mut y0) = a;
    let (x1, y1) = b;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let mut points = Vec::with_capacity((dx - dy) as usize + 1);
    loop {
        points.push((x0, y0));
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
    points
}

/// Pixels covered by a round brush of `diameter` swept from `a` to `b`,
/// clipped to the canvas. Each pixel appears once, so translucent colors
/// never double-blend inside one segment.
fn segment_mask(
    a: (i32, i32),
    b: (i32, i32),
    diameter: u32,
    canvas: CanvasSize,
) -> Option<(Region, Vec<bool>)> {
    let radius = diameter.max(1) as f32 / 2.0;
    let r2 = radius * radius;
    let reach = radius.floor() as i32;
    let span = Region::from_signed(
        a.0.min(b.0) - reach,
        a.1.min(b.1) - reach,
        a.0.max(b.0) + reach + 1,
        a.1.max(b.1) + reach + 1,
        canvas,
    )?;
    let w = span.width as usize;
    let mut mask = vec![false; w * span.height as usize];
    for (cx, cy) in line_points(a, b) {
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if (dx * dx + dy * dy) as f32 > r2 {
                    continue;
                }
                let (px, py) = (cx + dx, cy + dy);
                if span.contains(px, py) {
                    let mx = (px - span.x as i32) as usize;
                    let my = (py - span.y as i32) as usize;
                    mask[my * w + mx] = true;
                }
            }
        }
    }
    Some((span, mask))
}

// ============================================================================
// DRAW CONTEXT: mutable view bound to one layer surface
// ============================================================================

/// Drawing operations on a layer surface. Obtained from [`Layer::context`];
/// the borrow guarantees a single live context per surface.
///
/// Every painting call returns the bounding box of the pixels it touched.
pub struct DrawContext<'a> {
    surface: &'a mut RgbaImage,
}

impl<'a> DrawContext<'a> {
    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.surface.width(), self.surface.height())
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.surface.get_pixel(x, y)
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, pixel: Rgba<u8>) -> Option<Region> {
        if !self.size().contains(x, y) {
            return None;
        }
        self.surface.put_pixel(x as u32, y as u32, pixel);
        Some(Region::new(x as u32, y as u32, 1, 1))
    }

    pub fn snapshot(&self, region: Region) -> RgbaImage {
        crop(self.surface, region)
    }

    pub fn clear_rect(&mut self, region: Region) {
        let Some(region) = region.intersect(self.size().bounds()) else { return };
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                self.surface.put_pixel(x, y, TRANSPARENT);
            }
        }
    }

    /// Source-over `image` with its top-left corner at (`x`, `y`).
    pub fn draw_image(&mut self, image: &RgbaImage, x: i32, y: i32) -> Option<Region> {
        let target = Region::from_signed(
            x,
            y,
            x + image.width() as i32,
            y + image.height() as i32,
            self.size(),
        )?;
        for py in target.y..target.bottom() {
            for px in target.x..target.right() {
                let src = *image.get_pixel((px as i32 - x) as u32, (py as i32 - y) as u32);
                let dst = self.surface.get_pixel_mut(px, py);
                *dst = blend_over(*dst, src);
            }
        }
        Some(target)
    }

    /// Overwrite `region` with the same pixels of `source` (a full-canvas image).
    pub fn copy_from(&mut self, source: &RgbaImage, region: Region) {
        let Some(region) = region.intersect(self.size().bounds()) else { return };
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                self.surface.put_pixel(x, y, *source.get_pixel(x, y));
            }
        }
    }

    pub fn fill_rect(&mut self, region: Region, color: Rgba<u8>) -> Option<Region> {
        let region = region.intersect(self.size().bounds())?;
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                let dst = self.surface.get_pixel_mut(x, y);
                *dst = blend_over(*dst, color);
            }
        }
        Some(region)
    }

    /// Round-brush segment in `color`.
    pub fn stroke_segment(
        &mut self,
        a: (i32, i32),
        b: (i32, i32),
        diameter: u32,
        color: Rgba<u8>,
    ) -> Option<Region> {
        let (span, mask) = segment_mask(a, b, diameter, self.size())?;
        self.apply_mask(span, &mask, |_, _, dst| blend_over(dst, color))
    }

    /// Round-brush segment clearing pixels to transparent.
    pub fn erase_segment(&mut self, a: (i32, i32), b: (i32, i32), diameter: u32) -> Option<Region> {
        let (span, mask) = segment_mask(a, b, diameter, self.size())?;
        self.apply_mask(span, &mask, |_, _, _| TRANSPARENT)
    }

    /// Round-brush segment copying from `source` displaced by `offset`.
    /// Pixels whose source falls outside the canvas are left alone.
    pub fn clone_segment(
        &mut self,
        a: (i32, i32),
        b: (i32, i32),
        diameter: u32,
        source: &RgbaImage,
        offset: (i32, i32),
    ) -> Option<Region> {
        let (span, mask) = segment_mask(a, b, diameter, self.size())?;
        let size = self.size();
        let mut touched = Touched::default();
        let w = span.width as usize;
        for (i, _) in mask.iter().enumerate().filter(|(_, m)| **m) {
            let x = span.x + (i % w) as u32;
            let y = span.y + (i / w) as u32;
            let sx = x as i32 + offset.0;
            let sy = y as i32 + offset.1;
            if !size.contains(sx, sy) {
                continue;
            }
            self.surface.put_pixel(x, y, *source.get_pixel(sx as u32, sy as u32));
            touched.add(x, y);
        }
        touched.region()
    }

    /// Rectangle outline between inclusive corners, `thickness` pixels wide
    /// and growing inward.
    pub fn stroke_rect(
        &mut self,
        a: (i32, i32),
        b: (i32, i32),
        thickness: u32,
        color: Rgba<u8>,
    ) -> Option<Region> {
        let (x0, x1) = (a.0.min(b.0), a.0.max(b.0));
        let (y0, y1) = (a.1.min(b.1), a.1.max(b.1));
        let t = thickness.max(1) as i32;
        let span = Region::from_corners((x0, y0), (x1, y1), self.size())?;
        let mut touched = Touched::default();
        for y in span.y..span.bottom() {
            for x in span.x..span.right() {
                let (xi, yi) = (x as i32, y as i32);
                let on_border = xi - x0 < t || x1 - xi < t || yi - y0 < t || y1 - yi < t;
                if !on_border {
                    continue;
                }
                let dst = self.surface.get_pixel_mut(x, y);
                *dst = blend_over(*dst, color);
                touched.add(x, y);
            }
        }
        touched.region()
    }

    fn apply_mask(
        &mut self,
        span: Region,
        mask: &[bool],
        mut op: impl FnMut(u32, u32, Rgba<u8>) -> Rgba<u8>,
    ) -> Option<Region> {
        let w = span.width as usize;
        let mut touched = Touched::default();
        for (i, _) in mask.iter().enumerate().filter(|(_, m)| **m) {
            let x = span.x + (i % w) as u32;
            let y = span.y + (i / w) as u32;
            let dst = self.surface.get_pixel_mut(x, y);
            *dst = op(x, y, *dst);
            touched.add(x, y);
        }
        touched.region()
    }
}

// ============================================================================
// LAYER
// ============================================================================

pub struct Layer {
    pub id: Uuid,
    surface: RgbaImage,
    /// Thumbnail of `surface`, at most `preview_max_edge` on its longest side.
    preview: Arc<RgbaImage>,
    /// Bumped every time the preview is regenerated.
    pub preview_generation: u64,
}

impl Layer {
    pub fn blank(size: CanvasSize, preview_max_edge: u32) -> Self {
        Self::with_surface(RgbaImage::new(size.width, size.height), preview_max_edge)
    }

    /// Canvas-sized layer with `bitmap` drawn at the origin. Larger bitmaps
    /// are cropped, smaller ones leave transparent margins.
    pub fn from_bitmap(bitmap: &RgbaImage, size: CanvasSize, preview_max_edge: u32) -> Self {
        let mut surface = RgbaImage::new(size.width, size.height);
        image::imageops::replace(&mut surface, bitmap, 0, 0);
        Self::with_surface(surface, preview_max_edge)
    }

    fn with_surface(surface: RgbaImage, preview_max_edge: u32) -> Self {
        let preview = Arc::new(build_preview(&surface, preview_max_edge));
        Self {
            id: Uuid::new_v4(),
            surface,
            preview,
            preview_generation: 0,
        }
    }

    pub fn size(&self) -> CanvasSize {
        CanvasSize::new(self.surface.width(), self.surface.height())
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn context(&mut self) -> DrawContext<'_> {
        DrawContext {
            surface: &mut self.surface,
        }
    }

    pub fn snapshot(&self, region: Region) -> RgbaImage {
        crop(&self.surface, region)
    }

    pub fn preview(&self) -> &Arc<RgbaImage> {
        &self.preview
    }

    /// Clear `region` and draw `patch` back at its origin.
    pub fn apply_patch(&mut self, region: Region, patch: &RgbaImage) {
        let mut ctx = self.context();
        ctx.clear_rect(region);
        ctx.draw_image(patch, region.x as i32, region.y as i32);
    }

    fn regenerate_preview(&mut self, max_edge: u32) {
        self.preview = Arc::new(build_preview(&self.surface, max_edge));
        self.preview_generation += 1;
    }
}

fn build_preview(surface: &RgbaImage, max_edge: u32) -> RgbaImage {
    let (w, h) = surface.dimensions();
    let longest = w.max(h);
    if longest <= max_edge || longest == 0 {
        return surface.clone();
    }
    let scale = max_edge as f32 / longest as f32;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    image::imageops::resize(surface, nw, nh, image::imageops::FilterType::Triangle)
}

// ============================================================================
// LAYER STORE
// ============================================================================

/// What changed in the store since consumers last drained it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerChange {
    Replaced,
    Updated(usize),
    Inserted(usize),
    Removed(usize),
    Moved { from: usize, to: usize },
    CurrentChanged(usize),
}

/// Ordered layer sequence. Sole owner of layer membership and order; layer
/// pixels are written by tools through [`Layer::context`].
pub struct LayerStore {
    layers: Vec<Layer>,
    current: usize,
    size: CanvasSize,
    preview_max_edge: u32,
    changes: Vec<LayerChange>,
}

impl LayerStore {
    /// Store with one blank layer.
    pub fn new(size: CanvasSize, preview_max_edge: u32) -> Self {
        Self {
            layers: vec![Layer::blank(size, preview_max_edge)],
            current: 0,
            size,
            preview_max_edge,
            changes: Vec::new(),
        }
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn preview_max_edge(&self) -> u32 {
        self.preview_max_edge
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Swap the whole sequence. An empty sequence becomes one blank layer.
    pub fn replace_all(&mut self, size: CanvasSize, layers: Vec<Layer>) {
        debug_assert!(layers.iter().all(|l| l.size() == size));
        self.size = size;
        self.layers = if layers.is_empty() {
            vec![Layer::blank(size, self.preview_max_edge)]
        } else {
            layers
        };
        self.current = self.current.min(self.layers.len() - 1);
        self.changes.push(LayerChange::Replaced);
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn set_current_index(&mut self, index: usize) -> Result<()> {
        self.check(index)?;
        if index != self.current {
            self.current = index;
            self.changes.push(LayerChange::CurrentChanged(index));
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&Layer> {
        let len = self.layers.len();
        self.layers.get(index).ok_or(EditorError::LayerIndex { index, len })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Layer> {
        let len = self.layers.len();
        self.layers.get_mut(index).ok_or(EditorError::LayerIndex { index, len })
    }

    pub fn current(&self) -> &Layer {
        &self.layers[self.current]
    }

    pub fn refresh_preview(&mut self, index: usize) -> Result<()> {
        let max_edge = self.preview_max_edge;
        self.get_mut(index)?.regenerate_preview(max_edge);
        self.changes.push(LayerChange::Updated(index));
        Ok(())
    }

    /// Insert a blank layer at `index` (`index == len` appends) and make it current.
    pub fn insert_blank(&mut self, index: usize) -> Result<()> {
        if index > self.layers.len() {
            return Err(EditorError::LayerIndex {
                index,
                len: self.layers.len(),
            });
        }
        self.layers
            .insert(index, Layer::blank(self.size, self.preview_max_edge));
        self.current = index;
        self.changes.push(LayerChange::Inserted(index));
        Ok(())
    }

    /// Remove the layer at `index`. The last remaining layer is kept and
    /// `Ok(None)` returned.
    pub fn remove(&mut self, index: usize) -> Result<Option<Layer>> {
        self.check(index)?;
        if self.layers.len() == 1 {
            return Ok(None);
        }
        let removed = self.layers.remove(index);
        if self.current > index || self.current >= self.layers.len() {
            self.current = self.current.saturating_sub(1);
        }
        self.changes.push(LayerChange::Removed(index));
        Ok(Some(removed))
    }

    /// Move a layer; the moved layer stays current if it was.
    pub fn move_layer(&mut self, from: usize, to: usize) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        if from == to {
            return Ok(());
        }
        let current_id = self.layers[self.current].id;
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        self.current = self
            .layers
            .iter()
            .position(|l| l.id == current_id)
            .unwrap_or(0);
        self.changes.push(LayerChange::Moved { from, to });
        Ok(())
    }

    pub fn drain_changes(&mut self) -> Vec<LayerChange> {
        std::mem::take(&mut self.changes)
    }

    /// Flatten all layers bottom to top.
    pub fn composite(&self) -> RgbaImage {
        let CanvasSize { width, height } = self.size;
        let mut out = RgbaImage::new(width, height);
        let row_len = width as usize * 4;
        if row_len == 0 {
            return out;
        }
        let layers = &self.layers;
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, row)| {
                for layer in layers {
                    for x in 0..width as usize {
                        let src = *layer.surface.get_pixel(x as u32, y as u32);
                        let o = x * 4;
                        let dst = Rgba([row[o], row[o + 1], row[o + 2], row[o + 3]]);
                        row[o..o + 4].copy_from_slice(&blend_over(dst, src).0);
                    }
                }
            });
        out
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.layers.len() {
            Ok(())
        } else {
            Err(EditorError::LayerIndex {
                index,
                len: self.layers.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn region_from_corners_is_inclusive_and_clipped() {
        let canvas = CanvasSize::new(16, 16);
        assert_eq!(
            Region::from_corners((5, 7), (2, 3), canvas),
            Some(Region::new(2, 3, 4, 5))
        );
        assert_eq!(
            Region::from_corners((-4, -4), (20, 2), canvas),
            Some(Region::new(0, 0, 16, 3))
        );
        assert_eq!(Region::from_corners((-4, -4), (-1, -1), canvas), None);
    }

    #[test]
    fn region_union_and_intersect() {
        let a = Region::new(0, 0, 4, 4);
        let b = Region::new(2, 3, 4, 4);
        assert_eq!(a.union(b), Region::new(0, 0, 6, 7));
        assert_eq!(a.intersect(b), Some(Region::new(2, 3, 2, 1)));
        assert_eq!(a.intersect(Region::new(4, 0, 1, 1)), None);
    }

    #[test]
    fn thin_segment_touches_exact_pixels() {
        let mut layer = Layer::blank(CanvasSize::new(32, 32), 8);
        let touched = layer.context().stroke_segment((10, 10), (19, 10), 1, RED);
        assert_eq!(touched, Some(Region::new(10, 10, 10, 1)));
        assert_eq!(*layer.surface().get_pixel(10, 10), RED);
        assert_eq!(*layer.surface().get_pixel(19, 10), RED);
        assert_eq!(*layer.surface().get_pixel(20, 10), TRANSPARENT);
        assert_eq!(*layer.surface().get_pixel(10, 11), TRANSPARENT);
    }

    #[test]
    fn thick_dab_is_clipped_at_canvas_edge() {
        let mut layer = Layer::blank(CanvasSize::new(8, 8), 8);
        let touched = layer.context().stroke_segment((0, 0), (0, 0), 5, RED);
        assert_eq!(touched, Some(Region::new(0, 0, 3, 3)));
    }

    #[test]
    fn translucent_segment_blends_each_pixel_once() {
        let mut layer = Layer::blank(CanvasSize::new(16, 16), 8);
        let half = Rgba([0, 0, 255, 128]);
        layer.context().stroke_segment((2, 2), (10, 2), 3, half);
        assert_eq!(layer.surface().get_pixel(6, 2)[3], 128);
    }

    #[test]
    fn apply_patch_restores_exact_pixels() {
        let mut layer = Layer::blank(CanvasSize::new(8, 8), 8);
        let region = Region::new(1, 1, 3, 3);
        layer.context().fill_rect(Region::new(0, 0, 8, 8), Rgba([9, 9, 9, 40]));
        let before = layer.snapshot(region);
        layer.context().fill_rect(region, RED);
        layer.apply_patch(region, &before);
        assert_eq!(layer.snapshot(region), before);
    }

    #[test]
    fn blend_over_transparent_destination_copies_source() {
        let src = Rgba([12, 34, 56, 78]);
        assert_eq!(blend_over(TRANSPARENT, src), src);
        assert_eq!(blend_over(RED, TRANSPARENT), RED);
    }

    #[test]
    fn stroke_rect_draws_outline_only() {
        let mut layer = Layer::blank(CanvasSize::new(16, 16), 8);
        let touched = layer.context().stroke_rect((2, 2), (6, 5), 1, RED);
        assert_eq!(touched, Some(Region::new(2, 2, 5, 4)));
        assert_eq!(*layer.surface().get_pixel(2, 4), RED);
        assert_eq!(*layer.surface().get_pixel(4, 3), TRANSPARENT);
    }

    #[test]
    fn preview_is_bounded_and_regenerated() {
        let mut store = LayerStore::new(CanvasSize::new(256, 128), 64);
        assert_eq!(store.current().preview().dimensions(), (64, 32));
        store.refresh_preview(0).unwrap();
        assert_eq!(store.current().preview_generation, 1);
        assert_eq!(store.drain_changes(), vec![LayerChange::Updated(0)]);
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn get_out_of_bounds_is_index_error() {
        let store = LayerStore::new(CanvasSize::new(4, 4), 4);
        assert!(!store.is_empty());
        assert!(matches!(
            store.get(3),
            Err(EditorError::LayerIndex { index: 3, len: 1 })
        ));
    }

    #[test]
    fn current_index_clamps_when_sequence_shrinks() {
        let size = CanvasSize::new(4, 4);
        let mut store = LayerStore::new(size, 4);
        store.insert_blank(1).unwrap();
        store.insert_blank(2).unwrap();
        assert_eq!(store.current_index(), 2);
        store.replace_all(size, vec![Layer::blank(size, 4)]);
        assert_eq!(store.current_index(), 0);
    }

    #[test]
    fn remove_keeps_last_layer_and_adjusts_current() {
        let size = CanvasSize::new(4, 4);
        let mut store = LayerStore::new(size, 4);
        store.insert_blank(1).unwrap();
        assert!(store.remove(0).unwrap().is_some());
        assert_eq!(store.current_index(), 0);
        assert!(store.remove(0).unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn move_layer_tracks_current_layer() {
        let size = CanvasSize::new(4, 4);
        let mut store = LayerStore::new(size, 4);
        store.insert_blank(1).unwrap();
        store.insert_blank(2).unwrap();
        let id = store.current().id;
        store.move_layer(2, 0).unwrap();
        assert_eq!(store.current_index(), 0);
        assert_eq!(store.current().id, id);
    }

    #[test]
    fn composite_stacks_bottom_to_top() {
        let size = CanvasSize::new(2, 1);
        let mut bottom = Layer::blank(size, 4);
        bottom.context().fill_rect(size.bounds(), RED);
        let mut top = Layer::blank(size, 4);
        top.context().put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let mut store = LayerStore::new(size, 4);
        store.replace_all(size, vec![bottom, top]);
        let flat = store.composite();
        assert_eq!(*flat.get_pixel(0, 0), RED);
        assert_eq!(*flat.get_pixel(1, 0), Rgba([0, 255, 0, 255]));
    }
}
