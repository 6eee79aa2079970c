//! Storage Layer
//!
//! Keeps per-day activity documents, subject profiles and reported locations
//! behind a repository, with postcard snapshots for persistence.

mod repository;

pub use repository::{DayDocument, LocationRecord, Repository, SubjectProfile};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Lock poisoned: {0}")]
    Poisoned(String),
    #[error("Record not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
