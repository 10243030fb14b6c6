//! SQLite store
//!
//! UUIDs are stored as TEXT. Timestamps are always written as UTC, so comparing
//! their text encodings orders them by time.

mod companies;
mod levels;
mod notifications;
mod tasks;
mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::hierarchy::{Directory, HierarchyLevel};
use crate::models::User;

pub use companies::CompanyStats;
pub use tasks::{TaskOrder, TaskQuery};

/// Database store
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))
    }
}

#[async_trait]
impl Directory for Store {
    async fn get_hierarchy_level(&self, id: Uuid) -> Result<Option<HierarchyLevel>> {
        self.find_level(id).await
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.find_user(id).await
    }

    async fn count_tasks(
        &self,
        assigned_to: Uuid,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<u64> {
        self.count_tasks_created_between(assigned_to, created_after, created_before)
            .await
    }

    async fn list_users_in_company(&self, company_id: Uuid) -> Result<Vec<User>> {
        self.list_company_users(company_id).await
    }
}

pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::Internal(format!("Invalid {} UUID: {}", field, e)))
}

pub(crate) fn parse_opt_uuid(value: Option<String>, field: &str) -> Result<Option<Uuid>> {
    value.map(|v| parse_uuid(&v, field)).transpose()
}

/// Map unique-constraint violations to a conflict; everything else stays a database error
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: impl Into<String>) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(message.into()),
        _ => AppError::Database(err),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::hierarchy::HierarchyLevel;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_store_new() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Store::new(pool);
        store.migrate().await.unwrap();
        // Migrations are idempotent
        store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_directory_lookups() {
        let store = setup_test_db().await;
        let (company, _) = seed_company(&store).await;
        let level = seed_level(&store, HierarchyLevel::new(company.id, "Lead", 1)).await;
        let employee = seed_employee(&store, company.id, level.id).await;

        let dir: &dyn Directory = &store;
        assert_eq!(
            dir.get_hierarchy_level(level.id).await.unwrap().unwrap().rank,
            1
        );
        assert!(dir.get_hierarchy_level(Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(dir.get_user(employee.id).await.unwrap().unwrap().id, employee.id);
        assert!(dir.get_user(Uuid::new_v4()).await.unwrap().is_none());

        // Admin plus the employee
        assert_eq!(dir.list_users_in_company(company.id).await.unwrap().len(), 2);
        assert!(dir
            .list_users_in_company(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let store = setup_test_db().await;
        store.pool().close().await;

        let err = store.find_user(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_store_unavailable());
    }

    #[test]
    fn test_parse_uuid_errors_are_internal() {
        let err = parse_uuid("nope", "task").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(parse_opt_uuid(None, "task").unwrap(), None);
    }
}
