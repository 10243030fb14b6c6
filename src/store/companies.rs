//! Company records

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{conflict_on_unique, parse_opt_uuid, parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::models::{Company, Role, User};

/// Platform-wide counters for super admins
#[derive(Debug, Clone, Serialize)]
pub struct CompanyStats {
    pub total_companies: i64,
    pub active_companies: i64,
    pub total_users: i64,
}

impl Store {
    /// Create a company and its administrator in one transaction
    pub async fn create_company_with_admin(
        &self,
        name: &str,
        description: Option<String>,
        admin_name: &str,
        admin_email: &str,
        admin_password_hash: Option<&str>,
    ) -> Result<(Company, User)> {
        let now = Utc::now();
        let company_id = Uuid::new_v4();
        let admin_id = Uuid::new_v4();
        let email = admin_email.trim().to_lowercase();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO companies (id, name, description, admin_id, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(company_id.to_string())
        .bind(name)
        .bind(&description)
        .bind(admin_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, company_id, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(admin_id.to_string())
        .bind(admin_name)
        .bind(&email)
        .bind(Role::CompanyAdmin.as_str())
        .bind(company_id.to_string())
        .bind(admin_password_hash)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, format!("Email {} is already registered", email)))?;

        tx.commit().await?;

        let company = Company {
            id: company_id,
            name: name.to_string(),
            description,
            admin_id: Some(admin_id),
            active: true,
            created_at: now,
            updated_at: now,
        };
        let admin = User {
            id: admin_id,
            name: admin_name.to_string(),
            email,
            role: Role::CompanyAdmin,
            company_id: Some(company_id),
            hierarchy_level_id: None,
            reports_to: None,
            phone: String::new(),
            bio: String::new(),
            created_at: now,
            updated_at: now,
        };

        Ok((company, admin))
    }

    pub async fn get_company(&self, id: Uuid) -> Result<Company> {
        let row = sqlx::query_as::<_, CompanyRow>(
            r#"
            SELECT id, name, description, admin_id, active, created_at, updated_at
            FROM companies
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Company {} not found", id)))?;

        row.try_into()
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            r#"
            SELECT id, name, description, admin_id, active, created_at, updated_at
            FROM companies
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn company_stats(&self) -> Result<CompanyStats> {
        let (total_companies, active_companies): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN active THEN 1 ELSE 0 END), 0)
            FROM companies
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(CompanyStats {
            total_companies,
            active_companies,
            total_users,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: String,
    name: String,
    description: Option<String>,
    admin_id: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CompanyRow> for Company {
    type Error = AppError;

    fn try_from(row: CompanyRow) -> Result<Self> {
        Ok(Company {
            id: parse_uuid(&row.id, "company")?,
            name: row.name,
            description: row.description,
            admin_id: parse_opt_uuid(row.admin_id, "admin")?,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_create_company_with_admin() {
        let store = setup_test_db().await;
        let (company, admin) = store
            .create_company_with_admin("Globex", None, "Hank", "Hank@Globex.TEST", Some("hank-hash"))
            .await
            .unwrap();

        assert_eq!(company.admin_id, Some(admin.id));
        assert_eq!(admin.role, Role::CompanyAdmin);
        assert_eq!(admin.email, "hank@globex.test");

        let fetched = store.get_company(company.id).await.unwrap();
        assert_eq!(fetched.name, "Globex");
        assert!(fetched.active);

        let stored_admin = store.get_user(admin.id).await.unwrap();
        assert_eq!(stored_admin.company_id, Some(company.id));
        assert_eq!(
            store.password_hash(admin.id).await.unwrap().as_deref(),
            Some("hank-hash")
        );
    }

    #[tokio::test]
    async fn test_duplicate_admin_email_rolls_back() {
        let store = setup_test_db().await;
        store
            .create_company_with_admin("One", None, "A", "same@x.test", None)
            .await
            .unwrap();

        let err = store
            .create_company_with_admin("Two", None, "B", "same@x.test", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // The second company must not survive the failed transaction
        assert_eq!(store.list_companies().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_company_not_found() {
        let store = setup_test_db().await;
        let result = store.get_company(Uuid::new_v4()).await;
        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_company_stats() {
        let store = setup_test_db().await;
        let stats = store.company_stats().await.unwrap();
        assert_eq!(stats.total_companies, 0);
        assert_eq!(stats.active_companies, 0);

        seed_company(&store).await;
        seed_company(&store).await;
        let stats = store.company_stats().await.unwrap();
        assert_eq!(stats.total_companies, 2);
        assert_eq!(stats.active_companies, 2);
        assert_eq!(stats.total_users, 2);
    }

    #[tokio::test]
    async fn test_company_row_try_from_invalid_uuid() {
        let row = CompanyRow {
            id: "not-a-uuid".to_string(),
            name: "Bad".to_string(),
            description: None,
            admin_id: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let result: Result<Company> = row.try_into();
        assert!(matches!(result.unwrap_err(), AppError::Internal(_)));
    }
}
