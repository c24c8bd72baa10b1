//! In-process notification events over a `tokio::sync::broadcast` channel.
//!
//! The factory publishes one [`NotificationAssigned`] per created
//! notification, after the notification and its observer links are stored.
//! Subscribers that fall behind the channel capacity observe
//! `RecvError::Lagged` and miss the oldest events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::references::ObserverRef;
use crate::sti::Notification;

/// Event name carried by [`NotificationAssigned::event_type`].
pub const NOTIFICATION_ASSIGNED: &str = "notification.assigned";

const DEFAULT_CAPACITY: usize = 1024;

/// A notification was created and addressed to its observers.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationAssigned {
    pub event_type: String,
    pub notification: Notification,
    pub observers: Vec<ObserverRef>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationAssigned {
    pub fn new(notification: Notification, observers: Vec<ObserverRef>) -> Self {
        Self {
            event_type: NOTIFICATION_ASSIGNED.to_string(),
            notification,
            observers,
            timestamp: Utc::now(),
        }
    }
}

/// Fan-out bus for [`NotificationAssigned`] events.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<NotificationAssigned>,
}

impl EventBus {
    /// Create a bus holding at most `capacity` undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers; dropped silently when there are none.
    pub fn publish(&self, event: NotificationAssigned) {
        match self.sender.send(event) {
            Ok(receivers) => trace!(receivers, "Published notification event"),
            Err(_) => trace!("No subscribers for notification event"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationAssigned> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
