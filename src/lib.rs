//! Strata: canvas editing engine for a layered raster editor.
//!
//! A [`project::Project`] owns the layer store, undo/redo history, tool
//! registry and viewport. Hosts feed it input through a
//! [`components::input::InputDispatcher`] and read back pixels, previews and
//! [`project::EditorEvent`]s.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod coords;
pub mod error;
pub mod project;
pub mod settings;
pub mod viewport;

pub use canvas::{CanvasSize, Layer, LayerStore, Region};
pub use error::{EditorError, Result};
pub use project::{EditorEvent, LoadRequest, Project};
