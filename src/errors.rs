use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failures raised by the position-mapping engine.
///
/// Validation failures are rejected before any mutation; resolution
/// failures mean the caller asked about a coordinate the filtered grid
/// never produced.
#[derive(Debug)]
pub enum MapError {
    InvalidPosition { row: usize, col: usize },
    InvalidFieldType(String),
    InvalidLabel(String),
    DuplicateLabel(String),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::InvalidPosition { row, col } => {
                write!(f, "Invalid filtered position ({}, {})", row, col)
            }
            MapError::InvalidFieldType(t) => write!(f, "Unknown field type '{}'", t),
            MapError::InvalidLabel(msg) => write!(f, "Invalid label: {}", msg),
            MapError::DuplicateLabel(label) => {
                write!(f, "A field labelled '{}' already exists", label)
            }
        }
    }
}

impl std::error::Error for MapError {}

/// Failures raised by the persistence layer. `NotFound` is kept distinct
/// from other I/O failures so callers can treat a missing configuration
/// as absent rather than broken.
#[derive(Debug)]
pub enum StorageError {
    NotFound(PathBuf),
    Io(io::Error),
    Parse { path: PathBuf, reason: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(path) => write!(f, "File not found: {}", path.display()),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::Parse { path, reason } => {
                write!(f, "Failed to parse {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
