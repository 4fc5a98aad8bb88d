//! Notification system
//! The single user-visible channel for failures and notices

use crate::error::ErrorSeverity;
use std::cell::RefCell;
use std::time::{Duration, Instant};

/// Fire-and-forget user notification sink.
///
/// Implementations must not block; the chrome process calls this from
/// key handling and protocol callbacks alike.
pub trait Notifier {
    fn notify(&self, message: &str, critical: bool, header: &str);
}

/// Types of notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    /// Informational message
    Info,
    /// Warning message
    Warning,
    /// Error message
    Error,
    /// Critical message, stays until dismissed
    Critical,
}

impl From<ErrorSeverity> for NotificationType {
    fn from(severity: ErrorSeverity) -> Self {
        match severity {
            ErrorSeverity::Info => NotificationType::Info,
            ErrorSeverity::Warning => NotificationType::Warning,
            ErrorSeverity::Error => NotificationType::Error,
            ErrorSeverity::Critical => NotificationType::Critical,
        }
    }
}

/// A single notification
#[derive(Debug, Clone)]
pub struct Notification {
    /// Unique identifier
    pub id: u64,
    /// Short header, e.g. the subsystem that raised it
    pub header: String,
    /// The message content
    pub message: String,
    /// The type/severity of the notification
    pub kind: NotificationType,
    /// When the notification was created
    pub timestamp: Instant,
    /// Optional time-to-live. If None, it persists until manually dismissed.
    pub ttl: Option<Duration>,
}

impl Notification {
    /// Create a new notification
    pub fn new(
        id: u64,
        kind: NotificationType,
        header: impl Into<String>,
        message: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            id,
            header: header.into(),
            message: message.into(),
            kind,
            timestamp: Instant::now(),
            ttl,
        }
    }

    /// Check if the notification has expired
    pub fn is_expired(&self, now: Instant) -> bool {
        if let Some(ttl) = self.ttl {
            now.duration_since(self.timestamp) > ttl
        } else {
            false
        }
    }
}

/// Manages active notifications
pub struct NotificationManager {
    notifications: Vec<Notification>,
    next_id: u64,
    /// Monotonic generation counter for change detection
    pub generation: u64,
}

impl NotificationManager {
    /// Create a new notification manager
    pub fn new() -> Self {
        Self {
            notifications: Vec::new(),
            next_id: 0,
            generation: 0,
        }
    }

    /// Add a notification
    pub fn add(
        &mut self,
        kind: NotificationType,
        header: impl Into<String>,
        message: impl Into<String>,
        ttl: Option<Duration>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.notifications
            .push(Notification::new(id, kind, header, message, ttl));
        self.generation += 1;
        id
    }

    /// Add a critical notification, which never expires on its own
    pub fn critical(&mut self, header: impl Into<String>, message: impl Into<String>) -> u64 {
        self.add(NotificationType::Critical, header, message, None)
    }

    /// Check if there are any notifications
    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// Iterate over the stored notifications, oldest first
    pub fn iter_active(&self) -> std::slice::Iter<'_, Notification> {
        self.notifications.iter()
    }

    /// The most recent notification, if any
    pub fn last(&self) -> Option<&Notification> {
        self.notifications.last()
    }

    /// Prune expired notifications
    pub fn prune_expired(&mut self) {
        let now = Instant::now();
        let old_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired(now));
        if self.notifications.len() != old_len {
            self.generation += 1;
        }
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for RefCell<NotificationManager> {
    fn notify(&self, message: &str, critical: bool, header: &str) {
        if critical {
            tracing::error!(header, "{message}");
        } else {
            tracing::info!(header, "{message}");
        }

        // A notifier re-entered from its own render path drops the message
        // rather than panicking on the borrow.
        let Ok(mut manager) = self.try_borrow_mut() else {
            return;
        };
        if critical {
            manager.critical(header, message);
        } else {
            manager.add(
                NotificationType::Info,
                header,
                message,
                Some(Duration::from_secs(5)),
            );
        }
    }
}
