// src/error.rs

//! Crate-wide error type
//!
//! Errors fall into three families that decide how far a generation run got:
//! configuration problems and compatibility problems are detected before any
//! content is written, I/O problems abort mid-pipeline.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration (flags, patch config, builder misuse)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The same layer/add-on name was registered twice
    #[error("Configuration error: duplicate layer {0}")]
    DuplicateElementError(String),

    /// The compared distributions (or a previous patch) do not fit together
    #[error("Compatibility error: {0}")]
    CompatibilityError(String),

    /// Filesystem failure with the path that caused it
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed document, descriptor or metadata
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrap an I/O error with the path it occurred at
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::IoError {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error is a configuration problem (duplicate elements included)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ConfigurationError(_) | Error::DuplicateElementError(_)
        )
    }

    pub fn is_compatibility(&self) -> bool {
        matches!(self, Error::CompatibilityError(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Error::IoError { .. } | Error::Io(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}

/// Extension for attaching a path to raw `io::Result`s
pub(crate) trait IoResultExt<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::DuplicateElementError("base".into()).is_configuration());
        assert!(Error::ConfigurationError("x".into()).is_configuration());
        assert!(Error::CompatibilityError("x".into()).is_compatibility());
        assert!(Error::io("/tmp/x", io::Error::other("boom")).is_io());
        assert!(!Error::ParseError("x".into()).is_io());
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = Error::io(
            "/tmp/workspace",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/workspace"));
        assert!(msg.contains("denied"));
    }
}
