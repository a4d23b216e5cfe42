//! Error types for Shelfmark
//!
//! Only `PersistenceError` and `ShelfmarkError` ever reach a caller.
//! Outline resolution and annotation capture failures are downgraded
//! where they happen and only show up in the log.

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, ShelfmarkError>;

/// Top-level error returned by reader and CLI operations
#[derive(Error, Debug)]
pub enum ShelfmarkError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Failed to load PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Storage or transport failure reported by an `AnnotationStore`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PersistenceError {
    /// Human-readable message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Database(msg) | Self::NotFound(msg) | Self::Serialization(msg) => msg,
        }
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Extension trait converting rusqlite results into `PersistenceError`
pub trait ToDbError<T> {
    fn db_err(self) -> std::result::Result<T, PersistenceError>;
}

impl<T> ToDbError<T> for std::result::Result<T, rusqlite::Error> {
    fn db_err(self) -> std::result::Result<T, PersistenceError> {
        self.map_err(PersistenceError::from)
    }
}

/// Why a single outline entry's destination could not be turned into a page
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutlineResolutionError {
    #[error("outline entry has no destination")]
    MissingDestination,

    #[error("destination references object {0} {1} which is not a page")]
    UnknownPage(u32, u16),

    #[error("page index {0} is out of range")]
    PageOutOfRange(u32),

    #[error("named destination '{0}' not found")]
    NamedDestinationNotFound(String),

    #[error("document error: {0}")]
    Document(String),
}

/// Why a selection could not be placed precisely on its page
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotationCaptureError {
    #[error("page element geometry is unavailable")]
    PageGeometryUnavailable,

    #[error("invalid zoom scale {0}")]
    InvalidScale(f64),
}
