//! Task endpoints; the workflows live in [`crate::tasks::workflow`]

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::hierarchy::Department;
use crate::tasks::{
    NewTask, ReportReview, Task, TaskAnalytics, TaskComment, TaskDetail, TaskFilter, TaskPatch,
    TaskReport,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ContentBody {
    pub content: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>)> {
    let task = state.tasks.create(&auth.0, body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list(&auth.0, filter).await?))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskDetail>> {
    Ok(Json(state.tasks.get(&auth.0, id).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>> {
    Ok(Json(state.tasks.update(&auth.0, id, patch).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.tasks.delete(&auth.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn comment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ContentBody>,
) -> Result<(StatusCode, Json<TaskComment>)> {
    let comment = state.tasks.comment(&auth.0, id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn submit_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ContentBody>,
) -> Result<(StatusCode, Json<TaskReport>)> {
    let report = state.tasks.submit_report(&auth.0, id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn review_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, report_id)): Path<(Uuid, Uuid)>,
    Json(review): Json<ReportReview>,
) -> Result<Json<TaskReport>> {
    Ok(Json(
        state
            .tasks
            .review_report(&auth.0, id, report_id, review)
            .await?,
    ))
}

pub async fn by_department(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(department): Path<String>,
) -> Result<Json<Vec<Task>>> {
    let department: Department = department.parse().map_err(AppError::BadRequest)?;
    Ok(Json(state.tasks.by_department(&auth.0, department).await?))
}

pub async fn analytics(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<TaskAnalytics>> {
    Ok(Json(state.tasks.analytics(&auth.0, filter).await?))
}

pub async fn timeline(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<BTreeMap<String, Vec<Task>>>> {
    Ok(Json(state.tasks.timeline(&auth.0, filter).await?))
}
