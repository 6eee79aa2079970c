//! Notification policy

use crate::episode::{Episode, EpisodeAggregator};
use chrono::{DateTime, NaiveDate, Utc};
use inference_engine::{ActivityRecord, ActivityType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Duration thresholds (minutes) for the posture notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyThresholds {
    /// Continuous sitting at or above this is flagged
    pub sit_min_minutes: i64,
    /// Continuous standing at or above this is flagged
    pub stand_min_minutes: i64,
    /// Lying down within this inclusive range counts as a reasonable rest
    pub rest_min_minutes: i64,
    pub rest_max_minutes: i64,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            sit_min_minutes: 120,
            stand_min_minutes: 30,
            rest_min_minutes: 10,
            rest_max_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Walked,
    SatTooLong,
    StoodTooLong,
    ReasonableRest,
    Ran,
    Biked,
    FallDetected,
    DailyPrompt,
    FallLocation,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Walked => "walked",
            NotificationKind::SatTooLong => "sat_too_long",
            NotificationKind::StoodTooLong => "stood_too_long",
            NotificationKind::ReasonableRest => "reasonable_rest",
            NotificationKind::Ran => "ran",
            NotificationKind::Biked => "biked",
            NotificationKind::FallDetected => "fall_detected",
            NotificationKind::DailyPrompt => "daily_prompt",
            NotificationKind::FallLocation => "fall_location",
        }
    }
}

/// Delivery priority. Critical notifications go out first and are never throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    Critical,
}

/// Message addressed to a subject's device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    /// Extra key/value payload delivered with the message
    pub data: BTreeMap<String, String>,
    /// Start of the episode this notification describes, if any
    pub episode_start: Option<DateTime<Utc>>,
}

impl Notification {
    fn new(kind: NotificationKind, title: &str, body: String) -> Self {
        Self {
            kind,
            title: title.to_string(),
            body,
            priority: Priority::Normal,
            data: BTreeMap::new(),
            episode_start: None,
        }
    }

    fn critical(mut self) -> Self {
        self.priority = Priority::Critical;
        self
    }

    /// "How was your day" prompt for a day without any activity
    pub fn daily_prompt() -> Self {
        Self::new(
            NotificationKind::DailyPrompt,
            "How was your day?",
            "Open the app to see today's activity timeline.".to_string(),
        )
    }

    /// Fall alert carrying the reported position
    pub fn fall_location(location_id: &str, subject: &str, latitude: f64, longitude: f64, at: DateTime<Utc>) -> Self {
        let mut notification = Self::new(
            NotificationKind::FallLocation,
            "Fall alert",
            format!("A fall was detected at {}. Tap to see the location.", at.format("%H:%M:%S")),
        )
        .critical();
        notification.data.insert("_id".to_string(), location_id.to_string());
        notification.data.insert("lat".to_string(), latitude.to_string());
        notification.data.insert("long".to_string(), longitude.to_string());
        notification.data.insert("user_id".to_string(), subject.to_string());
        notification
    }

    /// Key identifying this notification within one subject-day
    pub fn dedup_key(&self) -> String {
        match self.episode_start {
            Some(start) => format!("{}@{}", self.kind.as_str(), start.timestamp_millis()),
            None => self.kind.as_str().to_string(),
        }
    }
}

/// Maps finished episodes to notifications
#[derive(Debug, Clone, Default)]
pub struct NotificationPolicy {
    thresholds: PolicyThresholds,
}

impl NotificationPolicy {
    pub fn new(thresholds: PolicyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }

    /// Notification for one episode, or `None` when the episode is unremarkable
    pub fn evaluate(&self, episode: &Episode, date: NaiveDate) -> Option<Notification> {
        let t = &self.thresholds;
        let minutes = episode.duration_minutes();
        let from = episode.start.format("%H:%M");
        let to = episode.end.format("%H:%M");

        let notification = match episode.activity {
            ActivityType::Walk => Notification::new(
                NotificationKind::Walked,
                "You went for a walk",
                format!("From {} to {} on {}.", from, to, date),
            ),
            ActivityType::Sit if minutes >= t.sit_min_minutes => Notification::new(
                NotificationKind::SatTooLong,
                "Sitting too long!",
                format!("You sat continuously for {} hours on {}.", minutes / 60, date),
            ),
            ActivityType::Stand if minutes >= t.stand_min_minutes => Notification::new(
                NotificationKind::StoodTooLong,
                "You have been standing a while",
                format!("Stood for about {} minutes on {}.", minutes, date),
            ),
            ActivityType::LieDown if (t.rest_min_minutes..=t.rest_max_minutes).contains(&minutes) => {
                Notification::new(
                    NotificationKind::ReasonableRest,
                    "A well-judged rest",
                    format!("Lay down for {} minutes on {}.", minutes, date),
                )
            }
            ActivityType::Run => Notification::new(
                NotificationKind::Ran,
                "Great job! You went for a run",
                format!("Ran at {} on {}.", from, date),
            ),
            ActivityType::Bike => Notification::new(
                NotificationKind::Biked,
                "You went cycling",
                format!("Cycled from {} to {} on {}.", from, to, date),
            ),
            ActivityType::Fall => Notification::new(
                NotificationKind::FallDetected,
                "Fall detected!",
                format!("Fall at {} on {}. Please check on them right away!", from, date),
            )
            .critical(),
            _ => return None,
        };

        Some(Notification {
            episode_start: Some(episode.start),
            ..notification
        })
    }
}

/// Episodes and notifications for one subject-day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub episodes: Vec<Episode>,
    /// Critical notifications first, otherwise in episode order
    pub notifications: Vec<Notification>,
    pub fall_detected: bool,
}

/// Summarize one day of records. A day without records yields exactly one
/// daily prompt.
pub fn summarize_day(
    date: NaiveDate,
    records: &[ActivityRecord],
    aggregator: &EpisodeAggregator,
    policy: &NotificationPolicy,
) -> DailyReport {
    if records.is_empty() {
        return DailyReport {
            date,
            episodes: Vec::new(),
            notifications: vec![Notification::daily_prompt()],
            fall_detected: false,
        };
    }

    let episodes = aggregator.aggregate(records);
    let mut notifications: Vec<Notification> = episodes
        .iter()
        .filter_map(|episode| policy.evaluate(episode, date))
        .collect();
    // Stable: keeps episode order within each priority
    notifications.sort_by_key(|n| std::cmp::Reverse(n.priority));

    let fall_detected = episodes.iter().any(|e| e.activity == ActivityType::Fall);

    DailyReport {
        date,
        episodes,
        notifications,
        fall_detected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn episode(activity: ActivityType, minutes: i64) -> Episode {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Episode {
            activity,
            start,
            end: start + Duration::minutes(minutes),
            records: 1,
        }
    }

    #[test]
    fn test_sitting_threshold() {
        let policy = NotificationPolicy::default();
        assert!(policy.evaluate(&episode(ActivityType::Sit, 119), day()).is_none());

        let n = policy.evaluate(&episode(ActivityType::Sit, 120), day()).unwrap();
        assert_eq!(n.kind, NotificationKind::SatTooLong);
        assert!(n.body.contains("2 hours"));
    }

    #[test]
    fn test_standing_and_rest_ranges() {
        let policy = NotificationPolicy::default();
        assert!(policy.evaluate(&episode(ActivityType::Stand, 29), day()).is_none());
        assert!(policy.evaluate(&episode(ActivityType::Stand, 30), day()).is_some());

        assert!(policy.evaluate(&episode(ActivityType::LieDown, 9), day()).is_none());
        assert!(policy.evaluate(&episode(ActivityType::LieDown, 10), day()).is_some());
        assert!(policy.evaluate(&episode(ActivityType::LieDown, 60), day()).is_some());
        assert!(policy.evaluate(&episode(ActivityType::LieDown, 61), day()).is_none());
    }

    #[test]
    fn test_always_notified_and_silent_labels() {
        let policy = NotificationPolicy::default();
        for activity in [ActivityType::Walk, ActivityType::Run, ActivityType::Bike] {
            assert!(policy.evaluate(&episode(activity, 0), day()).is_some());
        }
        assert!(policy.evaluate(&episode(ActivityType::Reserved, 90), day()).is_none());

        let walk = policy.evaluate(&episode(ActivityType::Walk, 3), day()).unwrap();
        assert_eq!(walk.body, "From 09:00 to 09:03 on 2024-05-01.");
    }

    #[test]
    fn test_fall_is_critical() {
        let n = NotificationPolicy::default()
            .evaluate(&episode(ActivityType::Fall, 0), day())
            .unwrap();
        assert_eq!(n.priority, Priority::Critical);
        assert!(n.dedup_key().starts_with("fall_detected@"));
    }

    #[test]
    fn test_empty_day_prompts_once() {
        let report = summarize_day(
            day(),
            &[],
            &EpisodeAggregator::default(),
            &NotificationPolicy::default(),
        );
        assert_eq!(report.notifications.len(), 1);
        assert_eq!(report.notifications[0].kind, NotificationKind::DailyPrompt);
        assert!(report.episodes.is_empty());
        assert!(!report.fall_detected);
    }

    #[test]
    fn test_report_orders_critical_first() {
        let at = |m: u32| Utc.with_ymd_and_hms(2024, 5, 1, 8, m, 0).unwrap();
        let records = vec![
            ActivityRecord::new(ActivityType::Walk, at(0), at(2)),
            ActivityRecord::new(ActivityType::Run, at(5), at(6)),
            ActivityRecord::new(ActivityType::Fall, at(10), at(10)),
        ];
        let aggregator = EpisodeAggregator::default();
        let policy = NotificationPolicy::default();
        let report = summarize_day(day(), &records, &aggregator, &policy);

        let kinds: Vec<_> = report.notifications.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![NotificationKind::FallDetected, NotificationKind::Walked, NotificationKind::Ran]
        );
        assert!(report.fall_detected);
        assert_eq!(report, summarize_day(day(), &records, &aggregator, &policy));
    }

    #[test]
    fn test_location_payload() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 14, 3, 9).unwrap();
        let n = Notification::fall_location("loc-1", "alice", 10.5, 106.25, at);
        assert_eq!(n.data["lat"], "10.5");
        assert_eq!(n.data["long"], "106.25");
        assert!(n.body.contains("14:03:09"));
    }
}
