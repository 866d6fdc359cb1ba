// ============================================================================
// Strata CLI: headless input replay via command-line arguments
// ============================================================================
//
// Usage examples:
//   strata --size 64x64 --script strokes.txt --output out.png
//   strata --layer base.png --layer "overlays/*.png" --script fix.txt -o flat.png
//   strata -l photo.png -o copy.png                (load and flatten only)
//
// Script lines (one command each, `#` starts a comment):
//   tool brush            down 10 10 [shift] [ctrl]     move 12 14
//   up 12 14              key ctrl+z                    wheel -1 [shift|ctrl]
//   layer 1               color 255,0,0,255             size 4
//
// Coordinates are canvas pixels; they are mapped through the viewport like
// real pointer input, so zooming and scrolling in a script behaves as it
// would in the editor.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use egui::{Key, Modifiers, PointerButton, Pos2, Rect, Vec2};

use crate::canvas::CanvasSize;
use crate::components::input::{InputDispatcher, InputEvent};
use crate::components::tools::ToolId;
use crate::error::{EditorError, Result};
use crate::project::{LoadRequest, Project};
use crate::settings::EditorSettings;
use crate::{log_info, log_warn};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Strata headless canvas replay.
///
/// Load layer images, replay an input script through the editing engine and
/// write the flattened result as PNG.
#[derive(Parser, Debug)]
#[command(
    name = "strata",
    about = "Strata headless canvas replay",
    long_about = "Load layer images, replay a pointer/keyboard script against the\n\
                  canvas engine and write the flattened result.\n\n\
                  Example:\n  \
                  strata --size 64x64 --script strokes.txt --output out.png\n  \
                  strata -l base.png -l \"overlays/*.png\" -s fix.txt -o flat.png"
)]
pub struct CliArgs {
    /// Layer image(s), bottom first. Glob patterns accepted (e.g. "layers/*.png").
    #[arg(short, long, num_args = 1..)]
    pub layer: Vec<String>,

    /// Canvas size as WIDTHxHEIGHT. Defaults to the first layer's size.
    #[arg(long, value_name = "WxH", value_parser = parse_size, required_unless_present = "layer")]
    pub size: Option<CanvasSize>,

    /// Input script to replay.
    #[arg(short, long, value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Output PNG path.
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Settings file. Defaults to the user settings location.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print per-step timing and a history summary.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_size(s: &str) -> std::result::Result<CanvasSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width: {}", e))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height: {}", e))?;
    if w == 0 || h == 0 {
        return Err("canvas dimensions must be positive".to_string());
    }
    Ok(CanvasSize::new(w, h))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the replay and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    match run_inner(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs) -> Result<()> {
    let start = Instant::now();
    let settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };

    let inputs = resolve_inputs(&args.layer);
    if inputs.is_empty() && !args.layer.is_empty() {
        eprintln!("warning: no layer files matched; starting from a blank canvas.");
    }
    let size = match (args.size, inputs.first()) {
        (Some(size), _) => size,
        (None, Some(first)) => {
            let (w, h) = image::image_dimensions(first)?;
            CanvasSize::new(w, h)
        }
        (None, None) => {
            return Err(EditorError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "no layer files and no --size given",
            )));
        }
    };

    let blobs = inputs
        .iter()
        .map(std::fs::read)
        .collect::<std::io::Result<Vec<_>>>()?;
    let mut project = Project::new(size, settings);
    project.load(LoadRequest {
        canvas_size: size,
        layers: (!blobs.is_empty()).then_some(blobs),
    })?;
    fit_area(&mut project);
    if args.verbose {
        println!(
            "loaded {} layer(s) at {}x{} in {:.1?}",
            project.layers().len(),
            size.width,
            size.height,
            start.elapsed()
        );
    }

    if let Some(script_path) = &args.script {
        let script = std::fs::read_to_string(script_path)?;
        let steps = replay(&mut project, &script)?;
        if args.verbose {
            let history = project.history();
            println!(
                "replayed {} step(s): {} undoable (next: {}), {} redoable (next: {})",
                steps,
                history.undo_count(),
                history.undo_description().unwrap_or("-"),
                history.redo_count(),
                history.redo_description().unwrap_or("-")
            );
        }
    }

    write_output(&project, &args.output)?;
    if args.verbose {
        println!("wrote {} in {:.1?}", args.output.display(), start.elapsed());
        if let Some(log) = crate::logger::log_path() {
            println!("log: {}", log.display());
        }
    }
    Ok(())
}

/// Editor area = canvas at zoom 1, so script coordinates start out 1:1.
fn fit_area(project: &mut Project) {
    let size = project.layers().size();
    project.viewport_mut().set_area(Rect::from_min_size(
        Pos2::ZERO,
        Vec2::new(size.width as f32, size.height as f32),
    ));
}

fn write_output(project: &Project, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    project
        .layers()
        .composite()
        .save_with_format(output, image::ImageFormat::Png)?;
    log_info!("Wrote {}", output.display());
    Ok(())
}

// ============================================================================
// Script replay
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptCommand {
    Tool(ToolId),
    Down { x: f32, y: f32, modifiers: Modifiers },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32 },
    Key(Key),
    Wheel { delta_y: f32, modifiers: Modifiers },
    Layer(usize),
    Color(image::Rgba<u8>),
    Size(u32),
}

/// Parse a whole script. Blank lines and `#` comments are skipped.
pub fn parse_script(script: &str) -> Result<Vec<ScriptCommand>> {
    let mut commands = Vec::new();
    for (i, raw) in script.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let command = parse_command(line).map_err(|message| EditorError::Script {
            line: i + 1,
            message,
        })?;
        commands.push(command);
    }
    Ok(commands)
}

fn parse_command(line: &str) -> std::result::Result<ScriptCommand, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let rest: Vec<&str> = words.collect();

    let coord = |idx: usize| parse_coord(&verb, &rest, idx);
    let modifiers = |from: usize| parse_modifiers(&rest[from.min(rest.len())..]);
    let arg = |what: &str| first_arg(&verb, &rest, what);

    match verb.as_str() {
        "tool" => {
            let name = arg("a tool name")?;
            ToolId::from_name(name)
                .map(ScriptCommand::Tool)
                .ok_or_else(|| format!("unknown tool '{}'", name))
        }
        "down" => Ok(ScriptCommand::Down {
            x: coord(0)?,
            y: coord(1)?,
            modifiers: modifiers(2)?,
        }),
        "move" => Ok(ScriptCommand::Move {
            x: coord(0)?,
            y: coord(1)?,
        }),
        "up" => Ok(ScriptCommand::Up {
            x: coord(0)?,
            y: coord(1)?,
        }),
        "key" => {
            let combo = arg("a key such as ctrl+z")?.to_ascii_lowercase();
            let letter = combo
                .strip_prefix("ctrl+")
                .ok_or_else(|| format!("only ctrl+<letter> keys are supported, got '{}'", combo))?;
            key_for_letter(letter)
                .map(ScriptCommand::Key)
                .ok_or_else(|| format!("unsupported key '{}'", letter))
        }
        "wheel" => {
            let delta_y = arg("a delta")?
                .parse::<f32>()
                .map_err(|e| format!("bad wheel delta: {}", e))?;
            Ok(ScriptCommand::Wheel {
                delta_y,
                modifiers: modifiers(1)?,
            })
        }
        "layer" => arg("an index")?
            .parse()
            .map(ScriptCommand::Layer)
            .map_err(|e| format!("bad layer index: {}", e)),
        "color" => EditorSettings::str_to_color(arg("r,g,b,a")?)
            .map(ScriptCommand::Color)
            .ok_or_else(|| "color must be r,g,b,a".to_string()),
        "size" => arg("a thickness")?
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(ScriptCommand::Size)
            .ok_or_else(|| "size must be a positive integer".to_string()),
        other => Err(format!("unknown command '{}'", other)),
    }
}

fn parse_coord(verb: &str, rest: &[&str], idx: usize) -> std::result::Result<f32, String> {
    rest.get(idx)
        .ok_or_else(|| format!("'{}' needs x and y", verb))?
        .parse::<f32>()
        .map_err(|e| format!("bad coordinate: {}", e))
}

fn parse_modifiers(words: &[&str]) -> std::result::Result<Modifiers, String> {
    let mut m = Modifiers::NONE;
    for word in words {
        match word.to_ascii_lowercase().as_str() {
            "shift" => m.shift = true,
            "ctrl" => {
                m.ctrl = true;
                m.command = true;
            }
            other => return Err(format!("unknown modifier '{}'", other)),
        }
    }
    Ok(m)
}

fn first_arg<'a>(verb: &str, rest: &[&'a str], what: &str) -> std::result::Result<&'a str, String> {
    rest.first()
        .copied()
        .ok_or_else(|| format!("'{}' needs {}", verb, what))
}

fn key_for_letter(letter: &str) -> Option<Key> {
    match letter {
        "a" => Some(Key::A),
        "c" => Some(Key::C),
        "v" => Some(Key::V),
        "x" => Some(Key::X),
        "y" => Some(Key::Y),
        "z" => Some(Key::Z),
        _ => None,
    }
}

/// Parse `script` and feed it through an input dispatcher. Returns the
/// number of commands run.
pub fn replay(project: &mut Project, script: &str) -> Result<usize> {
    let commands = parse_script(script)?;
    let mut dispatcher = InputDispatcher::new();
    let mut held = Modifiers::NONE;

    for command in &commands {
        match command {
            ScriptCommand::Tool(id) => project.set_tool(*id),
            ScriptCommand::Down { x, y, modifiers } => {
                held = *modifiers;
                let pos = to_screen(project, *x, *y);
                dispatcher.dispatch(
                    project,
                    InputEvent::PointerPressed {
                        pos,
                        button: PointerButton::Primary,
                        modifiers: held,
                    },
                );
            }
            ScriptCommand::Move { x, y } => {
                let pos = to_screen(project, *x, *y);
                dispatcher.dispatch(project, InputEvent::PointerMoved { pos, modifiers: held });
            }
            ScriptCommand::Up { x, y } => {
                let pos = to_screen(project, *x, *y);
                dispatcher.dispatch(
                    project,
                    InputEvent::PointerReleased {
                        pos,
                        button: PointerButton::Primary,
                        modifiers: held,
                    },
                );
                held = Modifiers::NONE;
            }
            ScriptCommand::Key(key) => {
                dispatcher.dispatch(
                    project,
                    InputEvent::Key {
                        key: *key,
                        modifiers: Modifiers::CTRL,
                        in_text_input: false,
                    },
                );
            }
            ScriptCommand::Wheel { delta_y, modifiers } => {
                dispatcher.dispatch(
                    project,
                    InputEvent::Wheel {
                        delta_y: *delta_y,
                        modifiers: *modifiers,
                    },
                );
            }
            ScriptCommand::Layer(index) => {
                if let Err(e) = project.set_current_layer(*index) {
                    log_warn!("Script layer switch ignored: {}", e);
                }
            }
            ScriptCommand::Color(color) => project.tool_settings_mut().brush_color = *color,
            ScriptCommand::Size(n) => {
                let eraser = project.active_tool() == ToolId::Eraser;
                let settings = project.tool_settings_mut();
                if eraser {
                    settings.eraser_thickness = *n;
                } else {
                    settings.brush_thickness = *n;
                }
            }
        }
    }
    Ok(commands.len())
}

/// Screen position of the centre of canvas pixel (`x`, `y`).
fn to_screen(project: &Project, x: f32, y: f32) -> Pos2 {
    project
        .viewport()
        .canvas_to_screen(project.layers().size(), x + 0.5, y + 0.5)
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            // Literal path: use directly
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}
