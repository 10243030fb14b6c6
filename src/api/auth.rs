//! Password login

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_string())
}

/// Unknown emails, wrong passwords and accounts without a password all fail alike
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Credentials>,
) -> Result<Json<LoginResponse>> {
    let user = state
        .store
        .find_user_by_email(&body.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    let hash = state
        .store
        .password_hash(user.id)
        .await?
        .ok_or_else(invalid_credentials)?;
    if !state.auth.verify_password(&body.password, &hash).await? {
        tracing::debug!(user_id = %user.id, "login rejected");
        return Err(invalid_credentials());
    }

    let token = state.auth.issue(&user)?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(LoginResponse { token, user }))
}
