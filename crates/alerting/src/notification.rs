//! Notifications and the In-Session Log

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use telemetry::Bin;
use tracing::debug;
use uuid::Uuid;

/// Title of the full-bin alert
pub const BIN_ALMOST_FULL: &str = "Bin Almost Full";

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Warning,
    Info,
    Success,
}

/// A user-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Lookup reference only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_id: Option<String>,
}

impl Notification {
    /// Warning raised when a bin crosses the full threshold
    pub fn bin_almost_full(bin: &Bin, fill: u8, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: BIN_ALMOST_FULL.to_string(),
            message: format!("{} in {} is {}% full.", bin.name, bin.location, fill),
            timestamp: at,
            read: false,
            kind: NotificationKind::Warning,
            bin_id: Some(bin.id.clone()),
        }
    }
}

/// Notifications, most recent first
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<VecDeque<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a notification. Only the alert path adds entries.
    pub(crate) fn append(&self, notification: Notification) {
        debug!("Notification {}: {}", notification.id, notification.message);
        self.entries.lock().push_front(notification);
    }

    /// Copy of every entry, most recent first
    pub fn list(&self) -> Vec<Notification> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Mark one entry read. Returns false if no entry has that id.
    pub fn mark_read(&self, id: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|n| n.id == id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    /// Remove one entry. Returns false if no entry has that id.
    pub fn dismiss(&self, id: &str) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| n.id != id);
        entries.len() != before
    }

    pub fn clear_all(&self) {
        self.entries.lock().clear();
    }

    pub fn unread_count(&self) -> usize {
        self.entries.lock().iter().filter(|n| !n.read).count()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(message: &str) -> Notification {
        Notification {
            id: Uuid::new_v4().to_string(),
            title: "Test".to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
            read: false,
            kind: NotificationKind::Info,
            bin_id: None,
        }
    }

    #[test]
    fn test_append_prepends() {
        let log = NotificationLog::new();
        log.append(notification("first"));
        log.append(notification("second"));

        let entries = log.list();
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "first");
    }

    #[test]
    fn test_mark_read_and_dismiss() {
        let log = NotificationLog::new();
        let n = notification("full");
        let id = n.id.clone();
        log.append(n);
        log.append(notification("other"));
        assert_eq!(log.unread_count(), 2);

        assert!(log.mark_read(&id));
        assert_eq!(log.unread_count(), 1);
        assert!(!log.mark_read("missing"));

        assert!(log.dismiss(&id));
        assert!(!log.dismiss(&id));
        assert_eq!(log.len(), 1);

        log.clear_all();
        assert!(log.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&notification("x")).unwrap();
        assert!(json.contains("\"type\":\"info\""));
        assert!(json.contains("\"read\":false"));
        assert!(!json.contains("binId"));
    }
}
