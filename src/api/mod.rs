//! REST API
//!
//! Every route except `/health`, `/ws` and login requires a bearer token (see [`crate::auth`]).

mod auth;
mod companies;
mod hierarchy;
mod notifications;
mod tasks;
mod users;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;

use crate::{websocket, AppState};

/// Build the application router. Layers (tracing, CORS) are added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket::handler))
        .route("/api/auth/login", post(auth::login))
        // Companies
        .route(
            "/api/companies",
            get(companies::list).post(companies::create),
        )
        .route("/api/companies/stats", get(companies::stats))
        .route("/api/companies/:id", get(companies::get))
        // Users
        .route(
            "/api/users/profile",
            get(users::profile).patch(users::update_profile),
        )
        .route("/api/users/profile/password", patch(users::change_password))
        .route(
            "/api/users/employees",
            get(users::list_employees).post(users::create_employee),
        )
        .route("/api/users/:id", patch(users::update))
        // Hierarchy
        .route("/api/hierarchy", get(hierarchy::list).post(hierarchy::create))
        .route("/api/hierarchy/:id", put(hierarchy::update))
        // Tasks
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route("/api/tasks/analytics", get(tasks::analytics))
        .route("/api/tasks/timeline", get(tasks::timeline))
        .route("/api/tasks/department/:department", get(tasks::by_department))
        .route(
            "/api/tasks/:id",
            get(tasks::get).put(tasks::update).delete(tasks::delete),
        )
        .route("/api/tasks/:id/comments", post(tasks::comment))
        .route("/api/tasks/:id/reports", post(tasks::submit_report))
        .route(
            "/api/tasks/:id/reports/:report_id",
            put(tasks::review_report),
        )
        // Notifications
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/read-all", put(notifications::mark_all_read))
        .route("/api/notifications/:id/read", put(notifications::mark_read))
        .route(
            "/api/notifications/:id",
            delete(notifications::delete),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
