//! The caller's own notifications

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::notify::Notification;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedAll {
    pub updated: u64,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<NotificationList>> {
    let notifications = state.store.list_notifications(auth.0.id).await?;
    let unread_count = state.store.unread_count(auth.0.id).await?;
    Ok(Json(NotificationList {
        notifications,
        unread_count,
    }))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.store.mark_notification_read(id, auth.0.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<MarkedAll>> {
    let updated = state.store.mark_all_notifications_read(auth.0.id).await?;
    Ok(Json(MarkedAll { updated }))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.store.delete_notification(id, auth.0.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
