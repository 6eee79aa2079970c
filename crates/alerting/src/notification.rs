//! Notification delivery

use crate::policy::Notification;
use inference_engine::SubjectId;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("no device token registered for subject {0}")]
    NoDeviceToken(SubjectId),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Where a notification should be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub subject: SubjectId,
    pub device_token: Option<String>,
}

impl DeliveryTarget {
    pub fn new(subject: SubjectId, device_token: Option<String>) -> Self {
        Self { subject, device_token }
    }

    /// Registered token, or `NoDeviceToken`
    pub fn token(&self) -> Result<&str, SinkError> {
        self.device_token
            .as_deref()
            .ok_or_else(|| SinkError::NoDeviceToken(self.subject.clone()))
    }
}

/// Push-notification transport
pub trait NotificationSink: Send + Sync {
    fn send(&self, target: &DeliveryTarget, notification: &Notification) -> Result<(), SinkError>;
}

/// Sink that writes notifications to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn send(&self, target: &DeliveryTarget, notification: &Notification) -> Result<(), SinkError> {
        let token = target.token()?;
        info!(
            subject = %target.subject,
            kind = notification.kind.as_str(),
            priority = ?notification.priority,
            "Notify {}: {} / {}",
            token,
            notification.title,
            notification.body
        );
        Ok(())
    }
}

/// Sink that keeps every delivered notification in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<(DeliveryTarget, Notification)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of delivered notifications in send order
    pub fn delivered(&self) -> Vec<(DeliveryTarget, Notification)> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for MemorySink {
    fn send(&self, target: &DeliveryTarget, notification: &Notification) -> Result<(), SinkError> {
        target.token()?;
        self.delivered
            .lock()
            .map_err(|e| SinkError::Delivery(e.to_string()))?
            .push((target.clone(), notification.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_is_rejected() {
        let sink = MemorySink::new();
        let target = DeliveryTarget::new(SubjectId::from("bob"), None);
        assert_eq!(
            sink.send(&target, &Notification::daily_prompt()),
            Err(SinkError::NoDeviceToken(SubjectId::from("bob")))
        );
        assert!(LogSink.send(&target, &Notification::daily_prompt()).is_err());
        assert!(sink.delivered().is_empty());
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        let target = DeliveryTarget::new(SubjectId::from("bob"), Some("tok".to_string()));
        sink.send(&target, &Notification::daily_prompt()).unwrap();
        assert_eq!(sink.delivered().len(), 1);
        assert_eq!(sink.delivered()[0].0.token().unwrap(), "tok");
    }
}
