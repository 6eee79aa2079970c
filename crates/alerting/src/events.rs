//! Events handed from ingestion to the daily sweep

use inference_engine::{ActivityRecord, SubjectId};

#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    /// Records produced by one ingestion call
    RecordsClassified {
        subject: SubjectId,
        records: Vec<ActivityRecord>,
    },
    /// Device token registered or replaced
    DeviceRegistered { subject: SubjectId, token: String },
}
