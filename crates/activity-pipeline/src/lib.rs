//! Activity Recognition Pipeline
//!
//! Orchestrates one ingestion call: parse the raw batch, extract window
//! features, normalize them, extend the subject's sequence history, classify
//! every completed sequence and persist the resulting records.

mod config;
mod error;
mod pipeline;
mod subject;

pub use config::{PipelineConfig, TimestampMode};
pub use error::PipelineError;
pub use pipeline::{ActivityPipeline, IngestOutcome};
pub use subject::{SubjectRegistry, SubjectState};
