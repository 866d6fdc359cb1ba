//! Session logger. Engine log output goes to `strata.log`, next to the
//! settings file; the file is truncated by every [`init`].
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros. They are no-ops
//! until the sink is opened, so an embedding host or a test run stays quiet
//! unless it asks for a log.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::settings::EditorSettings;

const LOG_FILE_NAME: &str = "strata.log";

static SINK: OnceLock<(PathBuf, Mutex<File>)> = OnceLock::new();

/// Path of the open log, if any.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK.get().map(|(path, _)| path)
}

/// Append one `[HH:MM:SS] [LEVEL] message` line.
pub fn write(level: &str, msg: &str) {
    let Some((_, file)) = SINK.get() else { return };
    if let Ok(mut file) = file.lock() {
        let _ = writeln!(file, "[{}] [{}] {}", timestamp(), level, msg);
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write("INFO", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write("WARN", &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write("ERROR", &format!($($arg)*));
    };
}

/// Open the log beside the settings file, or in the working directory when
/// no settings location exists.
pub fn init() {
    let dir = EditorSettings::settings_path()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    init_at(dir.join(LOG_FILE_NAME));
}

/// Open the log at `path`. Only the first successful call takes effect.
pub fn init_at(path: PathBuf) {
    if SINK.get().is_some() {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    if SINK.set((path, Mutex::new(file))).is_ok() {
        write("INFO", &format!("strata {} session log", env!("CARGO_PKG_VERSION")));
    }
}

/// HH:MM:SS within the current UTC day.
fn timestamp() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => {
            let secs = d.as_secs();
            format!("{:02}:{:02}:{:02}", (secs % 86400) / 3600, (secs % 3600) / 60, secs % 60)
        }
        Err(_) => "??:??:??".to_string(),
    }
}
