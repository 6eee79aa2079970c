//! Daily Sweep Worker
//!
//! Collects classified records from ingestion over a channel, buckets them per
//! subject and UTC day, and periodically turns each completed day into a
//! report whose notifications are delivered through the dispatch ledger.
//! A day is only summarized once it has ended, so episodes still growing are
//! never judged early.

use crate::episode::EpisodeAggregator;
use crate::events::ActivityEvent;
use crate::manager::{AlertConfig, DispatchManager, DispatchSummary};
use crate::notification::{DeliveryTarget, NotificationSink};
use crate::policy::{summarize_day, DailyReport, NotificationPolicy};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use inference_engine::{ActivityRecord, SubjectId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use storage::{Repository, StorageError};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// What the sweep knows about one subject
#[derive(Debug, Clone, Default)]
struct SubjectLedger {
    device_token: Option<String>,
    days: BTreeMap<NaiveDate, Vec<ActivityRecord>>,
}

/// Totals of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub subjects: usize,
    pub falls: usize,
    pub dispatch: DispatchSummary,
}

/// Periodic worker summarizing each subject's day
pub struct DailySweep {
    events: mpsc::Receiver<ActivityEvent>,
    subjects: HashMap<SubjectId, SubjectLedger>,
    aggregator: EpisodeAggregator,
    policy: NotificationPolicy,
    manager: DispatchManager,
    sink: Arc<dyn NotificationSink>,
    /// Source of device tokens registered outside the event stream
    repository: Option<Arc<Repository>>,
}

impl DailySweep {
    /// Create the worker together with the sender ingestion publishes on
    pub fn channel(
        capacity: usize,
        config: AlertConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> (mpsc::Sender<ActivityEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sweep = Self {
            events: rx,
            subjects: HashMap::new(),
            aggregator: EpisodeAggregator::new(config.gap_tolerance()),
            policy: NotificationPolicy::new(config.thresholds.clone()),
            manager: DispatchManager::new(config),
            sink,
            repository: None,
        };
        (tx, sweep)
    }

    /// Resolve device tokens through `repository` and seed subjects and
    /// records it already holds, such as those restored from a snapshot.
    pub fn with_repository(mut self, repository: Arc<Repository>) -> Self {
        match repository.profiles() {
            Ok(profiles) => {
                for profile in profiles {
                    let ledger = self.subjects.entry(profile.subject).or_default();
                    if profile.device_token.is_some() {
                        ledger.device_token = profile.device_token;
                    }
                }
            }
            Err(e) => warn!("Could not read stored profiles: {}", e),
        }

        match repository.documents_since(NaiveDate::MIN) {
            Ok(documents) => {
                let mut seeded = 0;
                for document in documents {
                    seeded += document.records.len();
                    self.subjects
                        .entry(document.subject)
                        .or_default()
                        .days
                        .entry(document.date)
                        .or_default()
                        .extend(document.records);
                }
                info!("Sweep seeded with {} stored records for {} subjects", seeded, self.subjects.len());
            }
            Err(e) => warn!("Could not read stored day documents: {}", e),
        }

        self.repository = Some(repository);
        self
    }

    /// Fold one event into the per-subject ledgers
    pub fn apply(&mut self, event: ActivityEvent) {
        match event {
            ActivityEvent::RecordsClassified { subject, records } => {
                let ledger = self.subjects.entry(subject).or_default();
                for record in records {
                    ledger
                        .days
                        .entry(record.start_time.date_naive())
                        .or_default()
                        .push(record);
                }
            }
            ActivityEvent::DeviceRegistered { subject, token } => {
                debug!("Device token updated for {}", subject);
                self.subjects.entry(subject).or_default().device_token = Some(token);
            }
        }
    }

    /// Apply every event already queued without waiting
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Report of one subject-day, if the subject is known
    pub fn report(&self, subject: &SubjectId, date: NaiveDate) -> Option<DailyReport> {
        let ledger = self.subjects.get(subject)?;
        let records = ledger.days.get(&date).map(Vec::as_slice).unwrap_or(&[]);
        Some(summarize_day(date, records, &self.aggregator, &self.policy))
    }

    /// Summarize `date` for every known subject and deliver what is new.
    /// A day that has not ended by `now` is left alone.
    pub fn sweep(&mut self, date: NaiveDate, now: DateTime<Utc>) -> SweepSummary {
        let mut summary = SweepSummary::default();
        if date >= now.date_naive() {
            debug!("Day {} still in progress, not summarized", date);
            return summary;
        }

        for (subject, ledger) in &self.subjects {
            let records = ledger.days.get(&date).map(Vec::as_slice).unwrap_or(&[]);
            let report = summarize_day(date, records, &self.aggregator, &self.policy);
            if report.fall_detected {
                summary.falls += 1;
            }

            let token = resolve_token(self.repository.as_deref(), subject, ledger);
            let target = DeliveryTarget::new(subject.clone(), token);
            let dispatched = self.manager.dispatch(&target, &report, self.sink.as_ref(), now);

            summary.subjects += 1;
            summary.dispatch.sent += dispatched.sent;
            summary.dispatch.duplicates += dispatched.duplicates;
            summary.dispatch.throttled += dispatched.throttled;
            summary.dispatch.failed += dispatched.failed;
        }

        self.prune(date);

        info!(
            "Sweep for {}: {} subjects, {} sent, {} falls",
            date, summary.subjects, summary.dispatch.sent, summary.falls
        );
        summary
    }

    /// Summarize the UTC day before `now`. Repeated calls on the same day
    /// only retry what has not been delivered.
    pub fn sweep_completed(&mut self, now: DateTime<Utc>) -> SweepSummary {
        match now.date_naive().pred_opt() {
            Some(date) => self.sweep(date, now),
            None => SweepSummary::default(),
        }
    }

    fn prune(&mut self, date: NaiveDate) {
        let cutoff = date - Duration::days(self.manager.config().retention_days.max(0));
        for ledger in self.subjects.values_mut() {
            ledger.days.retain(|day, _| *day >= cutoff);
        }
        self.manager.prune_before(cutoff);
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }

    /// Run until `shutdown` turns true or its sender is dropped. Events are
    /// applied as they arrive; the previous UTC day is swept every
    /// `sweep_interval_secs`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Self {
        let period = std::time::Duration::from_secs(self.manager.config().sweep_interval_secs.max(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        info!("Starting daily sweep every {:?}", period);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(event) = self.events.recv() => self.apply(event),
                _ = ticker.tick() => {
                    self.drain_events();
                    let summary = self.sweep_completed(Utc::now());
                    if summary.dispatch.failed > 0 {
                        warn!("{} notifications failed and will be retried", summary.dispatch.failed);
                    }
                }
            }
        }

        info!("Daily sweep stopped");
        self
    }
}

/// Token from the repository when it has one, otherwise the last registration
/// event seen
fn resolve_token(repository: Option<&Repository>, subject: &SubjectId, ledger: &SubjectLedger) -> Option<String> {
    if let Some(repository) = repository {
        match repository.device_token(subject) {
            Ok(token) => return Some(token),
            Err(StorageError::NotFound) => {}
            Err(e) => warn!("Token lookup for {} failed: {}", subject, e),
        }
    }
    ledger.device_token.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MemorySink;
    use crate::policy::NotificationKind;
    use chrono::TimeZone;
    use inference_engine::ActivityType;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    /// Early on the day after `day()`
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 1, 0, 0).unwrap()
    }

    fn setup() -> (mpsc::Sender<ActivityEvent>, DailySweep, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let (tx, sweep) = DailySweep::channel(16, AlertConfig::default(), sink.clone());
        (tx, sweep, sink)
    }

    fn register(sweep: &mut DailySweep, subject: &str) {
        sweep.apply(ActivityEvent::DeviceRegistered {
            subject: SubjectId::from(subject),
            token: format!("token-{}", subject),
        });
    }

    #[test]
    fn test_empty_day_gets_prompt() {
        let (_tx, mut sweep, sink) = setup();
        register(&mut sweep, "alice");

        let summary = sweep.sweep(day(), now());
        assert_eq!(summary.dispatch.sent, 1);
        assert_eq!(sink.delivered()[0].1.kind, NotificationKind::DailyPrompt);
    }

    #[test]
    fn test_repeated_sweep_is_idempotent() {
        let (_tx, mut sweep, sink) = setup();
        register(&mut sweep, "alice");
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        sweep.apply(ActivityEvent::RecordsClassified {
            subject: SubjectId::from("alice"),
            records: vec![
                ActivityRecord::new(ActivityType::Sit, start, start + Duration::minutes(60)),
                ActivityRecord::new(
                    ActivityType::Sit,
                    start + Duration::minutes(60) + Duration::seconds(15),
                    start + Duration::minutes(130),
                ),
                ActivityRecord::new(ActivityType::Fall, start + Duration::minutes(140), start + Duration::minutes(140)),
            ],
        });

        let first = sweep.sweep(day(), now());
        assert_eq!(first.dispatch.sent, 2);
        assert_eq!(first.falls, 1);
        let kinds: Vec<_> = sink.delivered().iter().map(|(_, n)| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::FallDetected, NotificationKind::SatTooLong]);

        let second = sweep.sweep(day(), now());
        assert_eq!(second.dispatch.sent, 0);
        assert_eq!(second.dispatch.duplicates, 2);
        assert_eq!(sink.delivered().len(), 2);
    }

    #[test]
    fn test_day_in_progress_is_not_summarized() {
        let (_tx, mut sweep, sink) = setup();
        register(&mut sweep, "alice");
        let alice = SubjectId::from("alice");
        let lie_start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        sweep.apply(ActivityEvent::RecordsClassified {
            subject: alice.clone(),
            records: vec![ActivityRecord::new(
                ActivityType::LieDown,
                lie_start,
                lie_start + Duration::minutes(15),
            )],
        });

        // Neither the empty morning nor the short rest so far is reported
        for hour in [0, 9, 23] {
            let at = Utc.with_ymd_and_hms(2024, 5, 1, hour, 30, 0).unwrap();
            assert_eq!(sweep.sweep(day(), at), SweepSummary::default());
        }
        assert!(sink.delivered().is_empty());

        // The rest goes on to 90 minutes, outside the reasonable band
        sweep.apply(ActivityEvent::RecordsClassified {
            subject: alice.clone(),
            records: vec![ActivityRecord::new(
                ActivityType::LieDown,
                lie_start + Duration::minutes(15) + Duration::seconds(10),
                lie_start + Duration::minutes(90),
            )],
        });

        let summary = sweep.sweep_completed(Utc.with_ymd_and_hms(2024, 5, 2, 0, 30, 0).unwrap());
        assert_eq!(summary.subjects, 1);
        assert_eq!(summary.dispatch.sent, 0);
        assert!(sink.delivered().is_empty());

        let report = sweep.report(&alice, day()).unwrap();
        assert_eq!(report.episodes.len(), 1);
        assert_eq!(report.episodes[0].duration_minutes(), 90);
        assert!(report.notifications.is_empty());
    }

    #[test]
    fn test_tokens_and_records_from_repository() {
        let repository = Arc::new(Repository::new());
        let alice = SubjectId::from("alice");
        let bob = SubjectId::from("bob");
        let walk_at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let walk = ActivityRecord::new(ActivityType::Walk, walk_at, walk_at + Duration::minutes(1));

        // State restored from a snapshot before the sweep starts
        repository.append_records(&alice, day(), &[walk.clone()]).unwrap();
        repository.set_device_token(&alice, "tok-a").unwrap();

        let sink = Arc::new(MemorySink::new());
        let (_tx, sweep) = DailySweep::channel(16, AlertConfig::default(), sink.clone());
        let mut sweep = sweep.with_repository(repository.clone());
        assert_eq!(sweep.subject_count(), 1);

        // Bob's token reaches the repository but no registration event arrives
        sweep.apply(ActivityEvent::RecordsClassified {
            subject: bob.clone(),
            records: vec![walk],
        });
        repository.set_device_token(&bob, "tok-b").unwrap();

        let summary = sweep.sweep_completed(now());
        assert_eq!(summary.dispatch.sent, 2);
        assert_eq!(summary.dispatch.failed, 0);

        let mut tokens: Vec<_> = sink
            .delivered()
            .iter()
            .filter_map(|(target, _)| target.device_token.clone())
            .collect();
        tokens.sort();
        assert_eq!(tokens, vec!["tok-a".to_string(), "tok-b".to_string()]);
    }

    #[test]
    fn test_records_bucketed_by_day_and_pruned() {
        let (_tx, mut sweep, _sink) = setup();
        let old = Utc.with_ymd_and_hms(2024, 4, 20, 9, 0, 0).unwrap();
        sweep.apply(ActivityEvent::RecordsClassified {
            subject: SubjectId::from("bob"),
            records: vec![ActivityRecord::new(ActivityType::Walk, old, old)],
        });
        let bob = SubjectId::from("bob");
        assert_eq!(sweep.report(&bob, old.date_naive()).unwrap().episodes.len(), 1);

        // Subject without a token: delivery fails but the sweep carries on
        let summary = sweep.sweep(day(), now());
        assert_eq!(summary.dispatch.failed, 1);
        assert!(sweep.report(&bob, old.date_naive()).unwrap().episodes.is_empty());
    }

    #[tokio::test]
    async fn test_drain_events_from_channel() {
        let (tx, mut sweep, _sink) = setup();
        tx.send(ActivityEvent::DeviceRegistered {
            subject: SubjectId::from("carol"),
            token: "t".to_string(),
        })
        .await
        .unwrap();
        assert_eq!(sweep.drain_events(), 1);
        assert_eq!(sweep.subject_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_on_interval_and_stops() {
        let sink = Arc::new(MemorySink::new());
        let config = AlertConfig {
            sweep_interval_secs: 60,
            ..Default::default()
        };
        let (tx, sweep) = DailySweep::channel(16, config, sink.clone());
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(sweep.run(stop_rx));

        tx.send(ActivityEvent::DeviceRegistered {
            subject: SubjectId::from("dave"),
            token: "t".to_string(),
        })
        .await
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        stop_tx.send(true).unwrap();
        let sweep = handle.await.unwrap();

        assert_eq!(sweep.subject_count(), 1);
        assert_eq!(sink.delivered().len(), 1);
    }
}
