//! Per-user notifications
//!
//! Notifications are persisted first, then published on an in-process broadcast
//! channel that live WebSocket sessions subscribe to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;
use crate::store::Store;
use crate::tasks::Priority;

/// Capacity of the live channel; lagging subscribers skip, publishers never block
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskUpdated,
    TaskCompleted,
    CommentAdded,
    ReportSubmitted,
    ReportReviewed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskAssigned => "task_assigned",
            NotificationKind::TaskUpdated => "task_updated",
            NotificationKind::TaskCompleted => "task_completed",
            NotificationKind::CommentAdded => "comment_added",
            NotificationKind::ReportSubmitted => "report_submitted",
            NotificationKind::ReportReviewed => "report_reviewed",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "task_assigned" => Ok(NotificationKind::TaskAssigned),
            "task_updated" => Ok(NotificationKind::TaskUpdated),
            "task_completed" => Ok(NotificationKind::TaskCompleted),
            "comment_added" => Ok(NotificationKind::CommentAdded),
            "report_submitted" => Ok(NotificationKind::ReportSubmitted),
            "report_reviewed" => Ok(NotificationKind::ReportReviewed),
            _ => Err(format!("Invalid notification kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user: Option<Uuid>,
    pub read: bool,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            task_id: None,
            from_user: None,
            read: false,
            priority: Priority::Medium,
            created_at: Utc::now(),
        }
    }

    pub fn about_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn from(mut self, sender: Uuid) -> Self {
        self.from_user = Some(sender);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Persists notifications and fans them out to live subscribers
#[derive(Clone)]
pub struct Notifier {
    store: Store,
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(store: Store) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { store, tx }
    }

    /// Subscribe to every published notification; filter by recipient on the receiving side
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Store the notification, then publish it
    pub async fn notify(&self, notification: Notification) -> Result<Notification> {
        self.store.insert_notification(&notification).await?;

        tracing::info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            "notification created"
        );

        // No receivers is fine: nobody is connected right now.
        let _ = self.tx.send(notification.clone());
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            NotificationKind::TaskAssigned,
            NotificationKind::TaskUpdated,
            NotificationKind::TaskCompleted,
            NotificationKind::CommentAdded,
            NotificationKind::ReportSubmitted,
            NotificationKind::ReportReviewed,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("mention".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_builder() {
        let user = Uuid::new_v4();
        let task = Uuid::new_v4();
        let sender = Uuid::new_v4();
        let n = Notification::new(user, NotificationKind::TaskAssigned, "New Task", "Do it")
            .about_task(task)
            .from(sender)
            .with_priority(Priority::High);

        assert_eq!(n.user_id, user);
        assert_eq!(n.task_id, Some(task));
        assert_eq!(n.from_user, Some(sender));
        assert_eq!(n.priority, Priority::High);
        assert!(!n.read);
    }

    #[test]
    fn test_serialization_skips_empty_refs() {
        let n = Notification::new(Uuid::new_v4(), NotificationKind::CommentAdded, "t", "m");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "comment_added");
        assert!(json.get("task_id").is_none());
    }
}
