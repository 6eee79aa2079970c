//! Alerting System
//!
//! Turns a subject's classified records into activity episodes, decides which
//! episodes deserve a notification, and delivers them once per subject-day
//! through a pluggable sink. A background sweep receives records from
//! ingestion over a channel and runs the daily summary on an interval.

mod episode;
mod events;
mod manager;
mod notification;
mod policy;
mod sweep;

pub use episode::{Episode, EpisodeAggregator, DEFAULT_GAP_TOLERANCE_SECS};
pub use events::ActivityEvent;
pub use manager::{AlertConfig, DispatchManager, DispatchSummary};
pub use notification::{DeliveryTarget, LogSink, MemorySink, NotificationSink, SinkError};
pub use policy::{
    summarize_day, DailyReport, Notification, NotificationKind, NotificationPolicy, PolicyThresholds, Priority,
};
pub use sweep::{DailySweep, SweepSummary};
