//! Dispatch Manager Implementation

use crate::episode::DEFAULT_GAP_TOLERANCE_SECS;
use crate::notification::{DeliveryTarget, NotificationSink};
use crate::policy::{DailyReport, Notification, PolicyThresholds, Priority};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use inference_engine::SubjectId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Alerting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Maximum gap between records merged into one episode (seconds, default: 20)
    pub gap_tolerance_secs: i64,
    /// Duration thresholds of the notification policy
    pub thresholds: PolicyThresholds,
    /// Period of the daily sweep (seconds)
    pub sweep_interval_secs: u64,
    /// Maximum normal-priority notifications per subject per hour
    pub max_notifications_per_hour: usize,
    /// Days of records and ledger entries kept by the sweep
    pub retention_days: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            gap_tolerance_secs: DEFAULT_GAP_TOLERANCE_SECS,
            thresholds: PolicyThresholds::default(),
            sweep_interval_secs: 3600,
            max_notifications_per_hour: 10,
            retention_days: 2,
        }
    }
}

impl AlertConfig {
    pub fn gap_tolerance(&self) -> Duration {
        Duration::seconds(self.gap_tolerance_secs)
    }
}

/// Hourly send window of one subject
#[derive(Debug, Clone)]
struct HourlyWindow {
    started: DateTime<Utc>,
    sent: usize,
}

/// Outcome of dispatching one report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    /// Already delivered for this subject-day
    pub duplicates: usize,
    /// Held back by the hourly cap; retried on the next sweep
    pub throttled: usize,
    /// Rejected by the sink; retried on the next sweep
    pub failed: usize,
}

/// Delivery ledger with deduplication and throttling
pub struct DispatchManager {
    config: AlertConfig,
    /// Keys of notifications delivered per subject-day
    ledger: HashMap<(SubjectId, NaiveDate), HashSet<String>>,
    /// Hourly send windows by subject
    windows: HashMap<SubjectId, HourlyWindow>,
}

impl DispatchManager {
    /// Create a new dispatch manager
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating dispatch manager with config: {:?}", config);
        Self {
            config,
            ledger: HashMap::new(),
            windows: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Whether a notification was already delivered for this subject-day
    pub fn already_sent(&self, subject: &SubjectId, date: NaiveDate, notification: &Notification) -> bool {
        self.ledger
            .get(&(subject.clone(), date))
            .is_some_and(|keys| keys.contains(&notification.dedup_key()))
    }

    /// Check the hourly cap. Critical notifications are never throttled.
    fn within_cap(&mut self, subject: &SubjectId, priority: Priority, now: DateTime<Utc>) -> bool {
        if priority == Priority::Critical {
            return true;
        }

        let window = self.windows.entry(subject.clone()).or_insert(HourlyWindow {
            started: now,
            sent: 0,
        });
        if now - window.started >= Duration::hours(1) {
            window.started = now;
            window.sent = 0;
        }
        window.sent < self.config.max_notifications_per_hour
    }

    fn record_sent(&mut self, subject: &SubjectId, date: NaiveDate, notification: &Notification) {
        self.ledger
            .entry((subject.clone(), date))
            .or_default()
            .insert(notification.dedup_key());

        if notification.priority == Priority::Normal {
            if let Some(window) = self.windows.get_mut(subject) {
                window.sent += 1;
            }
        }

        metrics::counter!("activity_notifications_total", "kind" => notification.kind.as_str()).increment(1);
        debug!("Notification recorded: {} {} {}", subject, date, notification.dedup_key());
    }

    /// Deliver a report's notifications that have not gone out yet, critical first
    pub fn dispatch(
        &mut self,
        target: &DeliveryTarget,
        report: &DailyReport,
        sink: &dyn NotificationSink,
        now: DateTime<Utc>,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        let mut ordered: Vec<&Notification> = report.notifications.iter().collect();
        ordered.sort_by_key(|n| std::cmp::Reverse(n.priority));

        for notification in ordered {
            if self.already_sent(&target.subject, report.date, notification) {
                summary.duplicates += 1;
                continue;
            }

            if !self.within_cap(&target.subject, notification.priority, now) {
                warn!("Notification throttled for {}: max per hour reached", target.subject);
                summary.throttled += 1;
                continue;
            }

            match sink.send(target, notification) {
                Ok(()) => {
                    self.record_sent(&target.subject, report.date, notification);
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!("Notification {} for {} failed: {}", notification.kind.as_str(), target.subject, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Forget ledger entries for days before `cutoff`
    pub fn prune_before(&mut self, cutoff: NaiveDate) {
        let before = self.ledger.len();
        self.ledger.retain(|(_, date), _| *date >= cutoff);
        let removed = before - self.ledger.len();
        if removed > 0 {
            debug!("Pruned {} ledger entries before {}", removed, cutoff);
        }
    }

    /// Number of subject-days with delivered notifications
    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }
}

impl Default for DispatchManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}
