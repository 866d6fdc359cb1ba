use image::{Rgba, RgbaImage};

use super::{Pointer, ToolContext};
use crate::canvas::Region;
use crate::error::Result;
use crate::log_info;

/// Flood fill of the 4-connected area under the click.
#[derive(Default)]
pub struct BucketTool;

impl BucketTool {
    pub fn down(&mut self, p: &Pointer, ctx: &mut ToolContext) -> Result<()> {
        let size = ctx.canvas_size();
        if !size.contains(p.x, p.y) {
            return Ok(());
        }
        let layer_index = ctx.current_layer();
        let color = ctx.settings().brush_color;
        let tolerance = ctx.settings().fill_tolerance / 100.0 * 255.0;

        let layer = ctx.layers.get(layer_index)?;
        let (mask, _) = flood_fill(layer.surface(), p.x as u32, p.y as u32, tolerance);

        // Only pixels that actually change are part of the edit.
        let surface = layer.surface();
        let width = size.width as usize;
        let mut changed: Option<Region> = None;
        for (i, _) in mask.iter().enumerate().filter(|(_, m)| **m) {
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            if *surface.get_pixel(x, y) != color {
                changed = Region::union_opt(changed, Some(Region::new(x, y, 1, 1)));
            }
        }
        let Some(region) = changed else { return Ok(()) };

        let before = layer.snapshot(region);
        let mut draw = ctx.surface(layer_index)?;
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                if mask[y as usize * width + x as usize] {
                    draw.put_pixel(x as i32, y as i32, color);
                }
            }
        }
        log_info!("Fill at ({}, {}) covered {:?}", p.x, p.y, region);
        ctx.commit(layer_index, "Fill", region, before)
    }
}

/// Mask of the 4-connected area around the seed whose pixels are within
/// `tolerance` (0..=255, per channel) of the seed color, plus its bounding
/// box. Fully transparent pixels match each other whatever their RGB.
pub fn flood_fill(
    surface: &RgbaImage,
    start_x: u32,
    start_y: u32,
    tolerance: f32,
) -> (Vec<bool>, Option<Region>) {
    let (w, h) = surface.dimensions();
    let wu = w as usize;
    // mask doubles as the visited set and the output
    let mut mask = vec![false; wu * h as usize];
    if start_x >= w || start_y >= h {
        return (mask, None);
    }

    let target = *surface.get_pixel(start_x, start_y);
    let pixel_at = |idx: usize| -> Rgba<u8> { *surface.get_pixel((idx % wu) as u32, (idx / wu) as u32) };

    let (mut min_x, mut min_y, mut max_x, mut max_y) = (start_x, start_y, start_x, start_y);
    let seed = start_y as usize * wu + start_x as usize;
    let mut stack: Vec<usize> = Vec::with_capacity(4096);
    mask[seed] = true;
    stack.push(seed);

    while let Some(idx) = stack.pop() {
        let x = (idx % wu) as u32;
        let y = (idx / wu) as u32;
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);

        let mut visit = |ni: usize| {
            if !mask[ni] && matches(pixel_at(ni), target, tolerance) {
                mask[ni] = true;
                stack.push(ni);
            }
        };
        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < w {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - wu);
        }
        if y + 1 < h {
            visit(idx + wu);
        }
    }

    let bbox = Region::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
    (mask, Some(bbox))
}

#[inline(always)]
fn matches(p: Rgba<u8>, target: Rgba<u8>, tolerance: f32) -> bool {
    if target[3] == 0 && p[3] == 0 {
        return true;
    }
    if target[3] == 0 || p[3] == 0 {
        return (target[3] as f32 - p[3] as f32).abs() <= tolerance;
    }
    (0..4)
        .map(|c| (target[c] as f32 - p[c] as f32).abs())
        .fold(0.0f32, f32::max)
        <= tolerance
}
