//! taskladder - hierarchy-scoped task assignment for multi-company teams

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod models;
pub mod notify;
pub mod store;
pub mod tasks;
pub mod websocket;

use std::sync::Arc;

use crate::auth::AuthConfig;
use crate::hierarchy::{DayBoundary, HierarchyAuthorizer};
use crate::notify::Notifier;
use crate::store::Store;
use crate::tasks::TaskService;

pub use api::router;

/// Application state shared across handlers
pub struct AppState {
    pub store: Store,
    pub notifier: Notifier,
    pub tasks: TaskService,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(store: Store, auth: AuthConfig, day_boundary: DayBoundary) -> Arc<Self> {
        let notifier = Notifier::new(store.clone());
        let authorizer = HierarchyAuthorizer::new(store.clone(), day_boundary);
        let tasks = TaskService::new(store.clone(), authorizer, notifier.clone());
        Arc::new(Self {
            store,
            notifier,
            tasks,
            auth,
        })
    }
}
