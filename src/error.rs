//! Error taxonomy for the scan/pack/render core
//!
//! Per-file problems are not errors: they surface as [`crate::core::SkipReason`]
//! on the affected entry. Everything here is fatal to the call that returns it.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpaiError {
    /// The tokenizer for an encoding could not be constructed.
    #[error("failed to initialise tokenizer for encoding `{encoding}`: {message}")]
    Tokenizer { encoding: String, message: String },

    #[error("unknown tokenizer encoding `{0}`")]
    UnknownEncoding(String),

    #[error("invalid glob pattern `{pattern}`: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to enumerate {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("scan root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A selected file could not be read back while rendering.
    #[error("failed to read {path} while rendering: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch for changes: {0}")]
    Watch(#[from] notify::Error),

    #[error("failed to build scan worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CpaiError>;
