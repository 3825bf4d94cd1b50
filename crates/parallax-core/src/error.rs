//! Error types for the scene pipeline.
//!
//! Resolution problems never show up here: the field resolver substitutes
//! defaults. These types cover backend node creation, asset loading, label
//! fonts, and reading option/telemetry documents.

use crate::shape::ShapeId;

/// Errors raised by a [`crate::scene::SceneBackend`] while building nodes.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("failed to create node for `{id}`: {reason}")]
    Spawn { id: ShapeId, reason: String },

    #[error("failed to rebuild node geometry: {0}")]
    Rebuild(String),
}

/// Failure reported by the asynchronous model loader.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelLoadError {
    #[error("failed to load model `{url}`: {reason}")]
    Failed { url: String, reason: String },

    #[error("model `{url}` contains no scene")]
    MissingScene { url: String },
}

/// Errors from the label rasterizer.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("label font data is not a valid TrueType/OpenType font")]
    InvalidFont,

    #[error("I/O error reading label font: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reading options or telemetry documents.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
