//! Error types for level loading and persistence
//!
//! Neither error is fatal: callers log and keep the previous state.

use std::io;

/// Error loading a level file.
#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    /// Malformed content; `line` is 1-based.
    Parse { line: usize, message: String },
}

impl LoadError {
    pub(crate) fn parse(line_index: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line: line_index + 1,
            message: message.into(),
        }
    }
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Parse { line, message } => write!(f, "line {}: {}", line, message),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse { .. } => None,
        }
    }
}

/// Error rewriting persisted records.
#[derive(Debug)]
pub enum PersistenceError {
    Io(io::Error),
    /// The file has fewer records than the key being rewritten.
    MissingRecord { key: usize, len: usize },
    Serialize(serde_json::Error),
}

impl From<io::Error> for PersistenceError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err)
    }
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::MissingRecord { key, len } => {
                write!(f, "record {} missing (file has {} records)", key, len)
            }
            Self::Serialize(e) => write!(f, "serialization error: {}", e),
        }
    }
}

impl std::error::Error for PersistenceError {}
