//! Company administration (super admins)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{Company, User};
use crate::store::CompanyStats;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCompany {
    pub name: String,
    pub description: Option<String>,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Serialize)]
pub struct CompanyCreated {
    pub company: Company,
    pub admin: User,
    /// Token the new company admin signs in with
    pub admin_token: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateCompany>,
) -> Result<(StatusCode, Json<CompanyCreated>)> {
    auth.require_super_admin()?;

    let name = body.name.trim();
    let admin_name = body.admin_name.trim();
    if name.is_empty() || admin_name.is_empty() {
        return Err(AppError::BadRequest(
            "Company name and admin name are required".to_string(),
        ));
    }
    if !body.admin_email.contains('@') {
        return Err(AppError::BadRequest(format!(
            "Invalid email: {}",
            body.admin_email
        )));
    }

    let password_hash = state.auth.hash_password(&body.admin_password).await?;
    let description = body
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let (company, admin) = state
        .store
        .create_company_with_admin(
            name,
            description,
            admin_name,
            &body.admin_email,
            Some(&password_hash),
        )
        .await?;
    let admin_token = state.auth.issue(&admin)?;

    tracing::info!(company_id = %company.id, admin_id = %admin.id, "company created");

    Ok((
        StatusCode::CREATED,
        Json(CompanyCreated {
            company,
            admin,
            admin_token,
        }),
    ))
}

pub async fn list(State(state): State<Arc<AppState>>, auth: AuthUser) -> Result<Json<Vec<Company>>> {
    auth.require_super_admin()?;
    Ok(Json(state.store.list_companies().await?))
}

pub async fn stats(State(state): State<Arc<AppState>>, auth: AuthUser) -> Result<Json<CompanyStats>> {
    auth.require_super_admin()?;
    Ok(Json(state.store.company_stats().await?))
}

/// Super admins see any company; members see their own
pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Company>> {
    if !auth.0.is_super_admin() && !auth.0.belongs_to(id) {
        return Err(AppError::Forbidden(
            "You can only view your own company".to_string(),
        ));
    }
    Ok(Json(state.store.get_company(id).await?))
}
