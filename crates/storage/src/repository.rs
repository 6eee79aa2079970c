//! Repository Implementation

use crate::StorageError;
use chrono::{DateTime, NaiveDate, Utc};
use inference_engine::{ActivityRecord, SubjectId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// All records of one subject on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayDocument {
    pub subject: SubjectId,
    pub date: NaiveDate,
    pub records: Vec<ActivityRecord>,
}

/// Per-subject profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub subject: SubjectId,
    pub device_token: Option<String>,
    /// Whether the most recent ingestion contained a fall
    pub is_fall: bool,
    pub updated_at: DateTime<Utc>,
}

impl SubjectProfile {
    fn new(subject: SubjectId) -> Self {
        Self {
            subject,
            device_token: None,
            is_fall: false,
            updated_at: Utc::now(),
        }
    }
}

/// Reported position of a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: String,
    pub subject: SubjectId,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Serialized form of the whole repository
#[derive(Serialize, Deserialize)]
struct Snapshot {
    documents: Vec<DayDocument>,
    profiles: Vec<SubjectProfile>,
    locations: Vec<LocationRecord>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Poisoned(e.to_string()))
}

/// Repository for data access (in-memory)
pub struct Repository {
    /// Day documents keyed by subject and date
    documents: Mutex<BTreeMap<(SubjectId, NaiveDate), DayDocument>>,
    profiles: Mutex<BTreeMap<SubjectId, SubjectProfile>>,
    locations: Mutex<VecDeque<LocationRecord>>,
    /// Oldest locations are dropped beyond this
    max_locations: usize,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            documents: Mutex::new(BTreeMap::new()),
            profiles: Mutex::new(BTreeMap::new()),
            locations: Mutex::new(VecDeque::new()),
            max_locations: 10_000,
        }
    }

    /// Append records to the subject's document for `date`, creating it if
    /// absent. Returns the document's record count.
    pub fn append_records(
        &self,
        subject: &SubjectId,
        date: NaiveDate,
        records: &[ActivityRecord],
    ) -> Result<usize, StorageError> {
        let mut documents = lock(&self.documents)?;
        let document = documents
            .entry((subject.clone(), date))
            .or_insert_with(|| DayDocument {
                subject: subject.clone(),
                date,
                records: Vec::new(),
            });
        document.records.extend_from_slice(records);
        debug!(
            "Appended {} records to {} {} ({} total)",
            records.len(),
            subject,
            date,
            document.records.len()
        );
        Ok(document.records.len())
    }

    /// Document of one subject-day
    pub fn day_document(&self, subject: &SubjectId, date: NaiveDate) -> Result<Option<DayDocument>, StorageError> {
        let documents = lock(&self.documents)?;
        Ok(documents.get(&(subject.clone(), date)).cloned())
    }

    /// Documents dated `from` or later, ordered by subject then date
    pub fn documents_since(&self, from: NaiveDate) -> Result<Vec<DayDocument>, StorageError> {
        let documents = lock(&self.documents)?;
        Ok(documents
            .values()
            .filter(|d| d.date >= from)
            .cloned()
            .collect())
    }

    /// Drop day documents dated before `cutoff`. Returns how many were removed.
    pub fn prune_before(&self, cutoff: NaiveDate) -> Result<usize, StorageError> {
        let mut documents = lock(&self.documents)?;
        let before = documents.len();
        documents.retain(|(_, date), _| *date >= cutoff);
        let removed = before - documents.len();
        if removed > 0 {
            info!("Pruned {} day documents before {}", removed, cutoff);
        }
        Ok(removed)
    }

    /// Store or replace the subject's device token
    pub fn set_device_token(&self, subject: &SubjectId, token: &str) -> Result<(), StorageError> {
        let mut profiles = lock(&self.profiles)?;
        let profile = profiles
            .entry(subject.clone())
            .or_insert_with(|| SubjectProfile::new(subject.clone()));
        profile.device_token = Some(token.to_string());
        profile.updated_at = Utc::now();
        info!("Device token registered for {}", subject);
        Ok(())
    }

    /// Set the subject's fall flag
    pub fn set_fall(&self, subject: &SubjectId, is_fall: bool) -> Result<(), StorageError> {
        let mut profiles = lock(&self.profiles)?;
        let profile = profiles
            .entry(subject.clone())
            .or_insert_with(|| SubjectProfile::new(subject.clone()));
        profile.is_fall = is_fall;
        profile.updated_at = Utc::now();
        Ok(())
    }

    pub fn profile(&self, subject: &SubjectId) -> Result<Option<SubjectProfile>, StorageError> {
        let profiles = lock(&self.profiles)?;
        Ok(profiles.get(subject).cloned())
    }

    /// Every stored profile
    pub fn profiles(&self) -> Result<Vec<SubjectProfile>, StorageError> {
        Ok(lock(&self.profiles)?.values().cloned().collect())
    }

    /// Device token of a subject, or `NotFound`
    pub fn device_token(&self, subject: &SubjectId) -> Result<String, StorageError> {
        self.profile(subject)?
            .and_then(|p| p.device_token)
            .ok_or(StorageError::NotFound)
    }

    /// Store a reported location under a fresh id
    pub fn insert_location(
        &self,
        subject: &SubjectId,
        latitude: f64,
        longitude: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<LocationRecord, StorageError> {
        let record = LocationRecord {
            id: Uuid::new_v4().to_string(),
            subject: subject.clone(),
            latitude,
            longitude,
            recorded_at,
        };

        let mut locations = lock(&self.locations)?;
        while locations.len() >= self.max_locations {
            locations.pop_front();
        }
        locations.push_back(record.clone());
        debug!("Stored location {} for {}", record.id, subject);
        Ok(record)
    }

    /// Most recent locations of a subject, newest first
    pub fn locations(&self, subject: &SubjectId, limit: usize) -> Result<Vec<LocationRecord>, StorageError> {
        let locations = lock(&self.locations)?;
        Ok(locations
            .iter()
            .rev()
            .filter(|l| &l.subject == subject)
            .take(limit)
            .cloned()
            .collect())
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn subject_count(&self) -> usize {
        self.profiles.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn location_count(&self) -> usize {
        self.locations.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Serialize every document, profile and location with postcard
    pub fn snapshot(&self) -> Result<Vec<u8>, StorageError> {
        let snapshot = Snapshot {
            documents: lock(&self.documents)?.values().cloned().collect(),
            profiles: lock(&self.profiles)?.values().cloned().collect(),
            locations: lock(&self.locations)?.iter().cloned().collect(),
        };
        postcard::to_allocvec(&snapshot).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    /// Rebuild a repository from `snapshot` output
    pub fn restore(bytes: &[u8]) -> Result<Self, StorageError> {
        let snapshot: Snapshot =
            postcard::from_bytes(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let repo = Self::new();
        {
            let mut documents = lock(&repo.documents)?;
            for document in snapshot.documents {
                documents.insert((document.subject.clone(), document.date), document);
            }
            let mut profiles = lock(&repo.profiles)?;
            for profile in snapshot.profiles {
                profiles.insert(profile.subject.clone(), profile);
            }
            lock(&repo.locations)?.extend(snapshot.locations);
        }
        info!(
            "Restored repository: {} documents, {} subjects",
            repo.document_count(),
            repo.subject_count()
        );
        Ok(repo)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use inference_engine::ActivityType;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn record(activity: ActivityType) -> ActivityRecord {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        ActivityRecord::new(activity, at, at)
    }

    #[test]
    fn test_append_creates_then_extends_document() {
        let repo = Repository::new();
        let alice = SubjectId::from("alice");

        assert_eq!(repo.append_records(&alice, day(), &[record(ActivityType::Walk)]).unwrap(), 1);
        assert_eq!(
            repo.append_records(&alice, day(), &[record(ActivityType::Sit), record(ActivityType::Sit)])
                .unwrap(),
            3
        );
        assert_eq!(repo.document_count(), 1);

        let document = repo.day_document(&alice, day()).unwrap().unwrap();
        assert_eq!(document.records[0].activity, ActivityType::Walk);
        assert!(repo.day_document(&SubjectId::from("bob"), day()).unwrap().is_none());
    }

    #[test]
    fn test_prune_before_drops_old_days() {
        let repo = Repository::new();
        let alice = SubjectId::from("alice");
        let earlier = day().pred_opt().unwrap();
        repo.append_records(&alice, earlier, &[record(ActivityType::Walk)]).unwrap();
        repo.append_records(&alice, day(), &[record(ActivityType::Sit)]).unwrap();

        assert_eq!(repo.documents_since(earlier).unwrap().len(), 2);
        assert_eq!(repo.prune_before(day()).unwrap(), 1);
        assert!(repo.day_document(&alice, earlier).unwrap().is_none());
        assert_eq!(repo.documents_since(earlier).unwrap()[0].date, day());
        assert_eq!(repo.prune_before(day()).unwrap(), 0);
    }

    #[test]
    fn test_profile_token_and_fall_flag() {
        let repo = Repository::new();
        let alice = SubjectId::from("alice");
        assert!(matches!(repo.device_token(&alice), Err(StorageError::NotFound)));

        repo.set_fall(&alice, true).unwrap();
        repo.set_device_token(&alice, "tok").unwrap();
        let profile = repo.profile(&alice).unwrap().unwrap();
        assert!(profile.is_fall);
        assert_eq!(repo.device_token(&alice).unwrap(), "tok");

        repo.set_fall(&alice, false).unwrap();
        assert!(!repo.profile(&alice).unwrap().unwrap().is_fall);
        assert_eq!(repo.profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_locations_newest_first_with_retention() {
        let mut repo = Repository::new();
        repo.max_locations = 3;
        let alice = SubjectId::from("alice");
        for i in 0..5 {
            repo.insert_location(&alice, i as f64, 0.0, Utc::now()).unwrap();
        }
        assert_eq!(repo.location_count(), 3);
        let latest = repo.locations(&alice, 2).unwrap();
        assert_eq!(latest[0].latitude, 4.0);
        assert_eq!(latest[1].latitude, 3.0);
        assert_ne!(latest[0].id, latest[1].id);
    }

    #[test]
    fn test_snapshot_restore() {
        let repo = Repository::new();
        let alice = SubjectId::from("alice");
        repo.append_records(&alice, day(), &[record(ActivityType::Fall)]).unwrap();
        repo.set_device_token(&alice, "tok").unwrap();
        repo.insert_location(&alice, 10.0, 106.0, Utc::now()).unwrap();

        let restored = Repository::restore(&repo.snapshot().unwrap()).unwrap();
        assert_eq!(restored.day_document(&alice, day()).unwrap(), repo.day_document(&alice, day()).unwrap());
        assert_eq!(restored.device_token(&alice).unwrap(), "tok");
        assert_eq!(restored.location_count(), 1);

        assert!(Repository::restore(&[0xff, 0xff]).is_err());
    }
}
