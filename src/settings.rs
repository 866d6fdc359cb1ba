use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::Rgba;

use crate::{log_info, log_warn};

const SETTINGS_FILE: &str = "strata_settings.cfg";

/// Editor settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Zoom floor.
    pub zoom_min: f32,
    /// Zoom ceiling.
    pub zoom_max: f32,
    /// Wheel notches needed to double the zoom.
    pub zoom_steps_per_octave: u32,
    /// One wheel notch scrolls the canvas by this many screen pixels.
    pub scroll_divisor: f32,
    /// Maximum undo entries (0 = unbounded).
    pub history_max_entries: usize,
    /// Maximum history memory in MiB (0 = unbounded).
    pub history_max_megabytes: usize,
    /// Longest edge of the cached layer previews.
    pub preview_max_edge: u32,

    // Tool menu defaults
    pub brush_color: Rgba<u8>,
    pub brush_thickness: u32,
    pub eraser_thickness: u32,
    /// Flood fill tolerance in percent (0 = exact match).
    pub fill_tolerance: f32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            zoom_min: 0.5,
            zoom_max: 64.0,
            zoom_steps_per_octave: 8,
            scroll_divisor: 20.0,
            history_max_entries: 0,
            history_max_megabytes: 0,
            preview_max_edge: 64,
            brush_color: Rgba([0, 0, 0, 255]),
            brush_thickness: 1,
            eraser_thickness: 8,
            fill_tolerance: 0.0,
        }
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/strata/strata_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Strata\strata_settings.cfg
    /// On macOS:   ~/Library/Application Support/Strata/strata_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("strata");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("Strata").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Strata")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Zoom factor applied per wheel notch.
    pub fn zoom_step(&self) -> f32 {
        2f32.powf(1.0 / self.zoom_steps_per_octave.max(1) as f32)
    }

    /// History memory cap in bytes, `None` when unbounded.
    pub fn history_max_bytes(&self) -> Option<usize> {
        (self.history_max_megabytes > 0).then(|| self.history_max_megabytes * 1024 * 1024)
    }

    /// History entry cap, `None` when unbounded.
    pub fn history_max_len(&self) -> Option<usize> {
        (self.history_max_entries > 0).then_some(self.history_max_entries)
    }

    /// Serialize a color as "r,g,b,a"
    fn color_to_str(c: Rgba<u8>) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse a color from "r,g,b,a"
    pub fn str_to_color(s: &str) -> Option<Rgba<u8>> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Rgba([r, g, b, a]))
        } else {
            None
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "zoom_min={}\n\
             zoom_max={}\n\
             zoom_steps_per_octave={}\n\
             scroll_divisor={}\n\
             history_max_entries={}\n\
             history_max_megabytes={}\n\
             preview_max_edge={}\n\
             brush_color={}\n\
             brush_thickness={}\n\
             eraser_thickness={}\n\
             fill_tolerance={}\n",
            self.zoom_min,
            self.zoom_max,
            self.zoom_steps_per_octave,
            self.scroll_divisor,
            self.history_max_entries,
            self.history_max_megabytes,
            self.preview_max_edge,
            Self::color_to_str(self.brush_color),
            self.brush_thickness,
            self.eraser_thickness,
            self.fill_tolerance,
        )
    }

    /// Parse `key=value` lines. Unknown keys are skipped and malformed
    /// values keep their defaults with a warning.
    pub fn from_config_str(content: &str) -> Self {
        let d = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let (key, val) = (key.trim(), val.trim());
            match key {
                "zoom_min" => s.zoom_min = field(key, val, d.zoom_min, |z| *z > 0.0),
                "zoom_max" => s.zoom_max = field(key, val, d.zoom_max, |z| *z > 0.0),
                "zoom_steps_per_octave" => {
                    s.zoom_steps_per_octave = field(key, val, d.zoom_steps_per_octave, |n| *n > 0)
                }
                "scroll_divisor" => {
                    s.scroll_divisor = field(key, val, d.scroll_divisor, |v| *v > 0.0)
                }
                "history_max_entries" => {
                    s.history_max_entries = field(key, val, d.history_max_entries, |_| true)
                }
                "history_max_megabytes" => {
                    s.history_max_megabytes = field(key, val, d.history_max_megabytes, |_| true)
                }
                "preview_max_edge" => {
                    s.preview_max_edge = field(key, val, d.preview_max_edge, |e| *e > 0)
                }
                "brush_color" => match Self::str_to_color(val) {
                    Some(c) => s.brush_color = c,
                    None => {
                        log_warn!("Settings: bad brush_color '{}', keeping default", val);
                    }
                },
                "brush_thickness" => {
                    s.brush_thickness = field(key, val, d.brush_thickness, |n| *n > 0)
                }
                "eraser_thickness" => {
                    s.eraser_thickness = field(key, val, d.eraser_thickness, |n| *n > 0)
                }
                "fill_tolerance" => {
                    s.fill_tolerance =
                        field(key, val, d.fill_tolerance, |t: &f32| t.is_finite()).clamp(0.0, 100.0)
                }
                _ => {}
            }
        }
        if s.zoom_max < s.zoom_min {
            s.zoom_max = s.zoom_min;
        }
        s
    }

    /// Save settings to the default location.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Load settings from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                log_info!("Loaded settings from {}", path.display());
                Self::from_config_str(&content)
            }
            Err(_) => Self::default(),
        }
    }
}

/// Parse one settings value, falling back to `default` (with a warning)
/// when it does not parse or fails `valid`.
fn field<T: FromStr>(key: &str, val: &str, default: T, valid: impl Fn(&T) -> bool) -> T {
    match val.parse::<T>() {
        Ok(v) if valid(&v) => v,
        _ => {
            log_warn!("Settings: bad value '{}' for {}, keeping default", val, key);
            default
        }
    }
}
