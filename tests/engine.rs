use std::io::Cursor;

use egui::{Modifiers, Pos2};
use image::{ImageOutputFormat, Rgba, RgbaImage};
use strata::components::tools::ToolId;
use strata::project::PointerPhase;
use strata::settings::EditorSettings;
use strata::{CanvasSize, EditorError, EditorEvent, LoadRequest, Project, Region};

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

fn png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

fn project(size: u32) -> Project {
    Project::new(CanvasSize::new(size, size), EditorSettings::default())
}

/// Pixel centre in screen space at the default viewport (zoom 1, area = canvas).
fn px(x: i32, y: i32) -> Pos2 {
    Pos2::new(x as f32 + 0.5, y as f32 + 0.5)
}

fn stroke(project: &mut Project, points: &[(i32, i32)]) {
    let (first, rest) = points.split_first().unwrap();
    project.pointer(PointerPhase::Down, px(first.0, first.1), Modifiers::NONE);
    for p in rest {
        project.pointer(PointerPhase::Drag, px(p.0, p.1), Modifiers::NONE);
    }
    let last = points.last().unwrap();
    project.pointer(PointerPhase::Up { was_down: true }, px(last.0, last.1), Modifiers::NONE);
}

#[test]
fn load_without_layers_yields_one_blank_current_layer() {
    let mut project = project(8);
    project
        .load(LoadRequest::blank(CanvasSize::new(64, 64)))
        .unwrap();
    let layers = project.layers();
    assert_eq!(layers.len(), 1);
    assert_eq!(layers.current_index(), 0);
    assert_eq!(layers.size(), CanvasSize::new(64, 64));
    assert!(layers.current().surface().pixels().all(|p| p[3] == 0));
    assert!(!project.history().can_undo());
}

#[test]
fn load_keeps_source_order_and_pads_small_bitmaps() {
    let mut project = project(4);
    let bottom = RgbaImage::from_pixel(4, 4, RED);
    let top = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
    project
        .load(LoadRequest {
            canvas_size: CanvasSize::new(4, 4),
            layers: Some(vec![png(&bottom), png(&top)]),
        })
        .unwrap();
    let layers: Vec<_> = project.layers().iter().collect();
    assert_eq!(layers.len(), 2);
    assert_eq!(*layers[0].surface().get_pixel(3, 3), RED);
    assert_eq!(*layers[1].surface().get_pixel(1, 1), Rgba([0, 0, 255, 255]));
    assert_eq!(layers[1].surface().get_pixel(3, 3)[3], 0);
}

#[test]
fn decode_failure_falls_back_to_blank_layer() {
    let mut project = project(4);
    let good = png(&RgbaImage::from_pixel(4, 4, RED));
    let result = project.load(LoadRequest {
        canvas_size: CanvasSize::new(16, 16),
        layers: Some(vec![good, vec![0, 1, 2, 3]]),
    });
    assert!(matches!(result, Err(EditorError::Decode { index: 1, .. })));
    assert_eq!(project.layers().len(), 1);
    assert_eq!(project.layers().size(), CanvasSize::new(16, 16));
    assert!(project.layers().current().surface().pixels().all(|p| p[3] == 0));
}

#[test]
fn brush_stroke_commits_exact_region_and_undo_restores() {
    let mut project = project(64);
    project.set_tool(ToolId::Brush);
    let before = project.layers().current().surface().clone();

    stroke(&mut project, &[(10, 10), (19, 19)]);

    let entry = project.history().last().unwrap();
    assert_eq!(entry.region(), Region::new(10, 10, 10, 10));
    assert_eq!(entry.layer_index(), 0);
    assert!(project.is_dirty());

    assert!(project.undo());
    assert_eq!(project.layers().current().surface(), &before);
}

#[test]
fn undo_redo_round_trip_over_many_edits() {
    let mut project = project(32);
    project.set_tool(ToolId::Brush);
    let mut states = vec![project.layers().current().surface().clone()];
    for i in 0..6 {
        project.tool_settings_mut().brush_color = Rgba([40 * i as u8, 0, 0, 255]);
        stroke(&mut project, &[(i, 0), (i + 10, 20)]);
        states.push(project.layers().current().surface().clone());
    }

    for expected in states.iter().rev().skip(1) {
        assert!(project.undo());
        assert_eq!(project.layers().current().surface(), expected);
    }
    assert!(!project.undo());

    for expected in states.iter().skip(1) {
        assert!(project.redo());
        assert_eq!(project.layers().current().surface(), expected);
    }
    assert!(!project.redo());
}

#[test]
fn new_commit_discards_redo() {
    let mut project = project(16);
    project.set_tool(ToolId::Brush);
    stroke(&mut project, &[(1, 1), (4, 1)]);
    assert!(project.undo());
    stroke(&mut project, &[(1, 5), (4, 5)]);
    assert!(!project.history().can_redo());
    assert!(!project.redo());
}

#[test]
fn bucket_fill_commits_changed_pixels_only() {
    let mut project = project(8);
    project.tool_settings_mut().brush_color = RED;
    project.set_tool(ToolId::Bucket);
    project.pointer(PointerPhase::Down, px(3, 3), Modifiers::NONE);
    project.pointer(PointerPhase::Up { was_down: true }, px(3, 3), Modifiers::NONE);
    assert_eq!(project.history().last().unwrap().region(), Region::new(0, 0, 8, 8));
    assert_eq!(*project.layers().current().surface().get_pixel(7, 7), RED);

    // Filling with the same color changes nothing.
    project.pointer(PointerPhase::Down, px(3, 3), Modifiers::NONE);
    assert_eq!(project.history().undo_count(), 1);
}

#[test]
fn line_rubber_band_leaves_only_final_line() {
    let mut project = project(16);
    project.set_tool(ToolId::Line);
    stroke(&mut project, &[(2, 2), (2, 12), (12, 2)]);
    let surface = project.layers().current().surface();
    assert_eq!(surface.get_pixel(2, 8)[3], 0);
    assert_eq!(surface.get_pixel(8, 2)[3], 255);
    assert_eq!(project.history().undo_count(), 1);
    assert_eq!(project.history().last().unwrap().region(), Region::new(2, 2, 11, 1));
}

#[test]
fn switching_tools_ends_before_starting() {
    let mut project = project(8);
    project.drain_events();
    project.set_tool(ToolId::Brush);
    project.set_tool(ToolId::Select);
    let tool_events: Vec<_> = project
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, EditorEvent::ToolEnded { .. } | EditorEvent::ToolStarted { .. }))
        .collect();
    assert_eq!(
        tool_events,
        vec![
            EditorEvent::ToolEnded { tool: ToolId::None, next: ToolId::Brush },
            EditorEvent::ToolStarted { tool: ToolId::Brush, previous: ToolId::None },
            EditorEvent::ToolEnded { tool: ToolId::Brush, next: ToolId::Select },
            EditorEvent::ToolStarted { tool: ToolId::Select, previous: ToolId::Brush },
        ]
    );
}

#[test]
fn layer_switch_commits_stroke_to_original_layer() {
    let mut project = project(16);
    project.insert_layer(1).unwrap();
    project.set_current_layer(0).unwrap();
    project.set_tool(ToolId::Brush);
    project.pointer(PointerPhase::Down, px(4, 4), Modifiers::NONE);
    project.pointer(PointerPhase::Drag, px(8, 4), Modifiers::NONE);

    project.set_current_layer(1).unwrap();
    let entry = project.history().last().unwrap();
    assert_eq!(entry.layer_index(), 0);
    assert_eq!(entry.region(), Region::new(4, 4, 5, 1));

    // The release after the switch has no stroke to finish.
    project.pointer(PointerPhase::Up { was_down: true }, px(8, 4), Modifiers::NONE);
    assert_eq!(project.history().undo_count(), 1);
}

#[test]
fn last_layer_is_never_removed() {
    let mut project = project(4);
    assert!(!project.remove_layer(0).unwrap());
    assert!(matches!(
        project.remove_layer(3),
        Err(EditorError::LayerIndex { index: 3, len: 1 })
    ));
}

#[test]
fn composite_reflects_undo() {
    let mut project = project(8);
    project.tool_settings_mut().brush_color = RED;
    project.set_tool(ToolId::Brush);
    stroke(&mut project, &[(0, 0), (7, 0)]);
    assert_eq!(*project.layers().composite().get_pixel(5, 0), RED);
    project.undo();
    assert_eq!(project.layers().composite().get_pixel(5, 0)[3], 0);
}
