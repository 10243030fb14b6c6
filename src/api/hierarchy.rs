//! Hierarchy level administration

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::hierarchy::{HierarchyLevel, LevelPatch, NewLevel};
use crate::AppState;

/// Levels of the caller's company, most senior first
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<HierarchyLevel>>> {
    let company_id = auth.company_id()?;
    Ok(Json(state.store.list_levels(company_id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<NewLevel>,
) -> Result<(StatusCode, Json<HierarchyLevel>)> {
    let company_id = auth.require_company_admin()?;

    let level = body.into_level(company_id);
    let existing = state.store.list_levels(company_id).await?;
    level
        .validate_placement(&existing)
        .map_err(AppError::BadRequest)?;

    state.store.insert_level(&level).await?;
    tracing::info!(
        level_id = %level.id,
        %company_id,
        rank = level.rank,
        "hierarchy level created"
    );

    Ok((StatusCode::CREATED, Json(level)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<LevelPatch>,
) -> Result<Json<HierarchyLevel>> {
    let company_id = auth.require_company_admin()?;

    let mut level = state
        .store
        .find_level(id)
        .await?
        .filter(|l| l.company_id == company_id)
        .ok_or_else(|| AppError::NotFound(format!("Hierarchy level {} not found", id)))?;

    patch.apply(&mut level);
    let existing = state.store.list_levels(company_id).await?;
    level
        .validate_placement(&existing)
        .map_err(AppError::BadRequest)?;

    state.store.update_level(&level).await?;
    tracing::info!(level_id = %level.id, "hierarchy level updated");

    Ok(Json(level))
}
