//! Profiles and employee management

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
use crate::models::{NewUser, Role, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEmployee {
    pub name: String,
    pub email: String,
    pub hierarchy_level_id: Uuid,
    pub reports_to: Option<Uuid>,
    /// Initial password
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct EmployeeCreated {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub hierarchy_level_id: Option<Uuid>,
    pub reports_to: Option<Uuid>,
}

pub async fn profile(auth: AuthUser) -> Json<User> {
    Json(auth.0)
}

/// Requires the current password; a user without one cannot set one here
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<PasswordChange>,
) -> Result<StatusCode> {
    let user_id = auth.0.id;
    let current = state.store.password_hash(user_id).await?;
    let matches = match current {
        Some(hash) => state.auth.verify_password(&body.current_password, &hash).await?,
        None => false,
    };
    if !matches {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let hash = state.auth.hash_password(&body.new_password).await?;
    state.store.set_password_hash(user_id, &hash).await?;

    tracing::info!(%user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    let mut user = auth.0;
    if let Some(name) = body.name.map(|n| n.trim().to_string()) {
        if name.is_empty() {
            return Err(AppError::BadRequest("Name cannot be empty".to_string()));
        }
        user.name = name;
    }
    if let Some(phone) = body.phone {
        user.phone = phone.trim().to_string();
    }
    if let Some(bio) = body.bio {
        user.bio = bio.trim().to_string();
    }

    state.store.update_user(&user).await?;
    Ok(Json(state.store.get_user(user.id).await?))
}

pub async fn list_employees(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<User>>> {
    let company_id = auth.require_company_admin()?;
    Ok(Json(state.store.list_employees(company_id).await?))
}

/// Check a level id belongs to the company
async fn level_in_company(state: &AppState, company_id: Uuid, level_id: Uuid) -> Result<()> {
    match state.store.find_level(level_id).await? {
        Some(level) if level.company_id == company_id => Ok(()),
        _ => Err(AppError::BadRequest(format!(
            "Hierarchy level {} not found in this company",
            level_id
        ))),
    }
}

/// Check a reports-to user belongs to the company
async fn manager_in_company(state: &AppState, company_id: Uuid, user_id: Uuid) -> Result<()> {
    match state.store.find_user(user_id).await? {
        Some(user) if user.belongs_to(company_id) => Ok(()),
        _ => Err(AppError::BadRequest(format!(
            "User {} not found in this company",
            user_id
        ))),
    }
}

pub async fn create_employee(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateEmployee>,
) -> Result<(StatusCode, Json<EmployeeCreated>)> {
    let company_id = auth.require_company_admin()?;

    level_in_company(&state, company_id, body.hierarchy_level_id).await?;
    if let Some(manager) = body.reports_to {
        manager_in_company(&state, company_id, manager).await?;
    }
    let password_hash = state.auth.hash_password(&body.password).await?;

    let user = state
        .store
        .create_user(NewUser {
            name: body.name,
            email: body.email,
            role: Role::Employee,
            company_id: Some(company_id),
            hierarchy_level_id: Some(body.hierarchy_level_id),
            reports_to: body.reports_to,
            password_hash: Some(password_hash),
        })
        .await?;
    let token = state.auth.issue(&user)?;

    tracing::info!(user_id = %user.id, %company_id, "employee created");

    Ok((StatusCode::CREATED, Json(EmployeeCreated { user, token })))
}

/// Company admins may rename and re-place their company's users; anyone may rename themself
pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<User>> {
    let actor = &auth.0;
    let placement_change = body.hierarchy_level_id.is_some() || body.reports_to.is_some();

    let mut user = state.store.get_user(id).await?;
    let admin_of_user = actor.is_company_admin()
        && actor
            .company_id
            .is_some_and(|company| user.belongs_to(company));

    if !admin_of_user && (actor.id != id || placement_change) {
        return Err(AppError::Forbidden(
            "Only your company admin can update this user".to_string(),
        ));
    }

    if let Some(name) = body.name.map(|n| n.trim().to_string()) {
        if name.is_empty() {
            return Err(AppError::BadRequest("Name cannot be empty".to_string()));
        }
        user.name = name;
    }
    if let Some(company_id) = user.company_id.filter(|_| placement_change) {
        if let Some(level_id) = body.hierarchy_level_id {
            level_in_company(&state, company_id, level_id).await?;
            user.hierarchy_level_id = Some(level_id);
        }
        if let Some(manager) = body.reports_to {
            if manager == user.id {
                return Err(AppError::BadRequest(
                    "A user cannot report to themselves".to_string(),
                ));
            }
            manager_in_company(&state, company_id, manager).await?;
            user.reports_to = Some(manager);
        }
    }

    state.store.update_user(&user).await?;
    tracing::info!(user_id = %user.id, updated_by = %actor.id, "user updated");

    Ok(Json(state.store.get_user(user.id).await?))
}
