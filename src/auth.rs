//! Bearer token authentication
//!
//! Tokens are HS256 JWTs carrying the user id, role and company. Every request
//! reloads the user, so role or level changes apply without reissuing tokens.
//! Passwords are stored as bcrypt hashes and only ever checked here.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Role, User};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

pub const MIN_PASSWORD_LEN: usize = 6;

/// Signing keys, token lifetime and password work factor
#[derive(Clone)]
pub struct AuthConfig {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: i64,
    hash_cost: u32,
}

impl AuthConfig {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_hours,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// bcrypt cost; tests lower it to keep hashing fast
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn hash_password(&self, password: &str) -> Result<String> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let password = password.to_string();
        let cost = self.hash_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// A malformed stored hash counts as a mismatch
    pub async fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        let matched = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?;
        match matched {
            Ok(ok) => Ok(ok),
            Err(e) => {
                tracing::warn!("Stored password hash is unusable: {}", e);
                Ok(false)
            }
        }
    }

    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            company: user.company_id,
            exp: (now + Duration::hours(self.expiry_hours)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Expected a Bearer token".to_string()))
}

/// Resolve a token to the current user record
pub async fn authenticate(state: &AppState, token: &str) -> Result<User> {
    let claims = state.auth.verify(token)?;
    state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn require_super_admin(&self) -> Result<()> {
        if self.0.is_super_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Super admin access required".to_string()))
        }
    }

    /// The admin's company
    pub fn require_company_admin(&self) -> Result<Uuid> {
        match self.0.company_id {
            Some(company_id) if self.0.is_company_admin() => Ok(company_id),
            _ => Err(AppError::Forbidden(
                "Company admin access required".to_string(),
            )),
        }
    }

    pub fn company_id(&self) -> Result<Uuid> {
        self.0
            .company_id
            .ok_or_else(|| AppError::Forbidden("You do not belong to a company".to_string()))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user = authenticate(state, token).await?;
        Ok(AuthUser(user))
    }
}
