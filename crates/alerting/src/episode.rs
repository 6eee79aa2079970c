//! Episode aggregation

use chrono::{DateTime, Duration, Utc};
use inference_engine::{ActivityRecord, ActivityType};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default gap allowed between two records of one episode (seconds)
pub const DEFAULT_GAP_TOLERANCE_SECS: i64 = 20;

/// Maximal run of same-activity records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub activity: ActivityType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Number of records merged into this episode
    pub records: usize,
}

impl Episode {
    fn open(record: &ActivityRecord) -> Self {
        Self {
            activity: record.activity,
            start: record.start_time,
            end: record.end_time,
            records: 1,
        }
    }

    /// Whole minutes between start and end
    pub fn duration_minutes(&self) -> i64 {
        ((self.end - self.start).num_seconds() / 60).max(0)
    }
}

/// Merges a day's records into episodes
#[derive(Debug, Clone)]
pub struct EpisodeAggregator {
    gap_tolerance: Duration,
}

impl EpisodeAggregator {
    pub fn new(gap_tolerance: Duration) -> Self {
        Self { gap_tolerance }
    }

    /// Walk the records in start-time order. A record extends the open
    /// episode when it has the same activity and starts no later than
    /// `gap_tolerance` after the episode ends; otherwise the open episode is
    /// closed and a new one starts.
    pub fn aggregate(&self, records: &[ActivityRecord]) -> Vec<Episode> {
        let mut ordered: Vec<&ActivityRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.start_time);

        let mut episodes = Vec::new();
        let mut current: Option<Episode> = None;

        for record in ordered {
            current = match current.take() {
                None => Some(Episode::open(record)),
                Some(mut episode) => {
                    let gap = record.start_time - episode.end;
                    if record.activity == episode.activity && gap <= self.gap_tolerance {
                        episode.end = episode.end.max(record.end_time);
                        episode.records += 1;
                        Some(episode)
                    } else {
                        episodes.push(episode);
                        Some(Episode::open(record))
                    }
                }
            };
        }
        episodes.extend(current);

        debug!(
            "Aggregated {} records into {} episodes",
            records.len(),
            episodes.len()
        );
        episodes
    }
}

impl Default for EpisodeAggregator {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_GAP_TOLERANCE_SECS))
    }
}
