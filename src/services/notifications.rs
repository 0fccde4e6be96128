//! Non-blocking user notifications (toasts)

use std::{collections::VecDeque, sync::Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

const MAX_NOTIFICATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Most recent notifications, oldest dropped first
#[derive(Debug, Default)]
pub struct Notifications {
    items: Mutex<VecDeque<Notification>>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        };
        match self.items.lock() {
            Ok(mut items) => {
                if items.len() == MAX_NOTIFICATIONS {
                    items.pop_front();
                }
                items.push_back(notification);
            }
            Err(e) => warn!("Failed to lock notifications: {}", e),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message);
    }

    pub fn list(&self) -> Vec<Notification> {
        self.items.lock()
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_dropped_when_full() {
        let notifications = Notifications::new();
        for i in 0..(MAX_NOTIFICATIONS + 2) {
            notifications.info(format!("n{}", i));
        }

        let list = notifications.list();
        assert_eq!(list.len(), MAX_NOTIFICATIONS);
        assert_eq!(list[0].message, "n2");
        assert_eq!(list.last().unwrap().message, format!("n{}", MAX_NOTIFICATIONS + 1));
    }
}
