//! Application-wide error types.
//!
//! Library modules use the unified [`Error`] enum via `thiserror`, while
//! the binary entry point uses `anyhow` for convenient propagation.
//!
//! The resolution pipeline cares about two distinctions that ordinary
//! error chaining loses:
//!
//! - [`Error::Unsupported`]: the file's tag container has no extraction
//!   path. Not the same as "no metadata found" - callers downgrade it to
//!   an empty result instead of failing the request.
//! - [`Error::is_not_found`]: a referenced file (typically a cached cover
//!   asset) has vanished. Resolution logs it and carries on.

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache database error
    #[error("Cache store error: {0}")]
    Database(#[from] sqlx::Error),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Tag reading error
    #[error("Tag error for {path}: {message}")]
    Tag { path: PathBuf, message: String },

    /// Tag container format with no extraction path
    #[error("Unsupported container format: {0}")]
    Unsupported(PathBuf),

    /// Media root scan error
    #[error("Scan error: {0}")]
    Scan(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a tag error.
    pub fn tag(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Tag {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a scan error.
    pub fn scan(message: impl Into<String>) -> Self {
        Self::Scan(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error means "the referenced file does not exist".
    ///
    /// Used by the resolver to tell a vanished cover asset (non-fatal,
    /// logged) apart from a real read failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Image(image::ImageError::IoError(e)) => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

/// Map a lofty probe/read error onto the application taxonomy.
///
/// An unrecognized container becomes [`Error::Unsupported`]; everything
/// else is a plain tag error for the given path.
pub fn from_lofty(path: &std::path::Path, err: lofty::error::LoftyError) -> Error {
    match err.kind() {
        lofty::error::ErrorKind::UnknownFormat => Error::Unsupported(path.to_path_buf()),
        _ => Error::tag(path, err.to_string()),
    }
}
