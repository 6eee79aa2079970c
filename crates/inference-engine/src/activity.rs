//! Activity labels and classified records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity detected by the model, serialized as its integer code 1-8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ActivityType {
    Walk = 1,
    Sit = 2,
    Stand = 3,
    LieDown = 4,
    Run = 5,
    /// Class 6 is trained but carries no user-facing meaning
    Reserved = 6,
    Bike = 7,
    Fall = 8,
}

impl ActivityType {
    /// Number of classes the model emits
    pub const COUNT: usize = 8;

    /// Integer code (1-8)
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a label by its integer code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ActivityType::Walk),
            2 => Some(ActivityType::Sit),
            3 => Some(ActivityType::Stand),
            4 => Some(ActivityType::LieDown),
            5 => Some(ActivityType::Run),
            6 => Some(ActivityType::Reserved),
            7 => Some(ActivityType::Bike),
            8 => Some(ActivityType::Fall),
            _ => None,
        }
    }

    /// Label for a zero-based model output index
    pub fn from_class_index(index: usize) -> Option<Self> {
        u8::try_from(index + 1).ok().and_then(Self::from_code)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Walk => "walk",
            ActivityType::Sit => "sit",
            ActivityType::Stand => "stand",
            ActivityType::LieDown => "lie_down",
            ActivityType::Run => "run",
            ActivityType::Reserved => "reserved",
            ActivityType::Bike => "bike",
            ActivityType::Fall => "fall",
        }
    }
}

impl TryFrom<u8> for ActivityType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown activity type {}", code))
    }
}

impl From<ActivityType> for u8 {
    fn from(activity: ActivityType) -> u8 {
        activity.code()
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the person wearing the sensor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One classified sequence with the time range it is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(rename = "activityType")]
    pub activity: ActivityType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(activity: ActivityType, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            activity,
            start_time,
            end_time,
        }
    }
}
