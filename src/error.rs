use thiserror::Error;

/// Errors raised by the canvas editing engine.
///
/// Empty undo/redo history is deliberately absent: popping an empty stack
/// returns `None` and does nothing.
#[derive(Error, Debug)]
pub enum EditorError {
    /// Layer access outside the current sequence. Unreachable while the
    /// store invariants hold.
    #[error("layer index {index} out of bounds ({len} layers)")]
    LayerIndex { index: usize, len: usize },

    /// A persisted layer could not be decoded at load time.
    #[error("failed to decode layer {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: image::ImageError,
    },

    /// A history entry whose snapshot does not match its region.
    #[error("patch is {patch_width}x{patch_height} but region is {region_width}x{region_height}")]
    PatchSize {
        patch_width: u32,
        patch_height: u32,
        region_width: u32,
        region_height: u32,
    },

    /// A replay script line the CLI could not parse.
    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, EditorError>;
