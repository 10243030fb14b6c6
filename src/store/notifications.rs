//! Notification records

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{parse_opt_uuid, parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::notify::Notification;

/// Most recent notifications returned per listing
const LIST_LIMIT: i64 = 50;

impl Store {
    pub async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, task_id, from_user, read, priority, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.id.to_string())
        .bind(notification.user_id.to_string())
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.task_id.map(|u| u.to_string()))
        .bind(notification.from_user.map(|u| u.to_string()))
        .bind(notification.read)
        .bind(notification.priority.as_str())
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first, capped
    pub async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, kind, title, message, task_id, from_user, read, priority, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(LIST_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0")
                .bind(user_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Mark one of the user's notifications read; other users' ids read as missing
    pub async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    /// Returns how many notifications changed
    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_notification(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    kind: String,
    title: String,
    message: String,
    task_id: Option<String>,
    from_user: Option<String>,
    read: bool,
    priority: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: parse_uuid(&row.id, "notification")?,
            user_id: parse_uuid(&row.user_id, "user")?,
            kind: row.kind.parse().map_err(AppError::Internal)?,
            title: row.title,
            message: row.message,
            task_id: parse_opt_uuid(row.task_id, "task")?,
            from_user: parse_opt_uuid(row.from_user, "sender")?,
            read: row.read,
            priority: row.priority.parse().map_err(AppError::Internal)?,
            created_at: row.created_at,
        })
    }
}
