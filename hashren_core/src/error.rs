//! Error types for hashren_core.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using hashren_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while canonicalizing a tree.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// I/O error tied to a specific path.
    #[error("{path}: {source}")]
    PathIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Root of a run is missing or not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Digest length outside the accepted range.
    #[error("Invalid digest length: {value} (expected {min}..={max} bytes)")]
    InvalidDigestLength { value: String, min: usize, max: usize },

    /// Invalid digest hex string.
    #[error("Invalid digest: {reason}")]
    InvalidDigest { reason: String },

    /// File name cannot be turned into a canonical name.
    #[error("Invalid file name: {path}")]
    InvalidFileName { path: PathBuf },

    /// The canonical name is held by something other than a regular file.
    #[error("Canonical name {path} is occupied by a non-regular file")]
    OccupiedByNonFile { path: PathBuf },

    /// A worker thread could not be started or panicked.
    #[error("Worker {id} failed: {reason}")]
    Worker { id: usize, reason: String },

    /// Unsupported algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

impl Error {
    /// Create a PathIo error.
    pub fn path_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::PathIo {
            path: path.into(),
            source,
        }
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        Error::NotADirectory { path: path.into() }
    }

    /// Create an InvalidDigestLength error.
    pub fn invalid_digest_length(value: impl Into<String>, min: usize, max: usize) -> Self {
        Error::InvalidDigestLength {
            value: value.into(),
            min,
            max,
        }
    }

    /// Create an InvalidDigest error.
    pub fn invalid_digest(reason: impl Into<String>) -> Self {
        Error::InvalidDigest {
            reason: reason.into(),
        }
    }

    /// Create an InvalidFileName error.
    pub fn invalid_file_name(path: impl Into<PathBuf>) -> Self {
        Error::InvalidFileName { path: path.into() }
    }

    /// Create an OccupiedByNonFile error.
    pub fn occupied_by_non_file(path: impl Into<PathBuf>) -> Self {
        Error::OccupiedByNonFile { path: path.into() }
    }

    /// Create a Worker error.
    pub fn worker(id: usize, reason: impl Into<String>) -> Self {
        Error::Worker {
            id,
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// The path this error is about, if it names one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::PathIo { path, .. }
            | Error::NotADirectory { path }
            | Error::InvalidFileName { path }
            | Error::OccupiedByNonFile { path } => Some(path.as_path()),
            _ => None,
        }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error, optionally with the path it happened at
        let path = error_path(&err);
        let source = match err.io_error() {
            Some(io_err) => std::io::Error::new(io_err.kind(), io_err.to_string()),
            None => std::io::Error::other(err.to_string()),
        };
        match path {
            Some(path) => Error::PathIo { path, source },
            None => Error::Io { source },
        }
    }
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}
