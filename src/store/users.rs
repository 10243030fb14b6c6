//! User records

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{conflict_on_unique, parse_opt_uuid, parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::models::{NewUser, Role, User};

const USER_COLUMNS: &str = "id, name, email, role, company_id, hierarchy_level_id, reports_to, phone, bio, created_at, updated_at";

impl Store {
    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        new_user.validate().map_err(AppError::BadRequest)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.trim().to_string(),
            email: new_user.email.trim().to_lowercase(),
            role: new_user.role,
            company_id: new_user.company_id,
            hierarchy_level_id: new_user.hierarchy_level_id,
            reports_to: new_user.reports_to,
            phone: String::new(),
            bio: String::new(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, company_id, hierarchy_level_id, reports_to, phone, bio, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.company_id.map(|u| u.to_string()))
        .bind(user.hierarchy_level_id.map(|u| u.to_string()))
        .bind(user.reports_to.map(|u| u.to_string()))
        .bind(&user.phone)
        .bind(&user.bio)
        .bind(&new_user.password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("Email {} is already registered", user.email)))?;

        Ok(user)
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Emails are stored lowercased, so the lookup is case-insensitive
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    pub async fn password_hash(&self, user_id: Uuid) -> Result<Option<String>> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        hash.ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn set_password_hash(&self, user_id: Uuid, hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(Utc::now())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// Every user of a company, any role
    pub async fn list_company_users(&self, company_id: Uuid) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE company_id = ? ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .bind(company_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn list_employees(&self, company_id: Uuid) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE company_id = ? AND role = ? ORDER BY name ASC",
            USER_COLUMNS
        ))
        .bind(company_id.to_string())
        .bind(Role::Employee.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Persist the mutable fields of a user
    pub async fn update_user(&self, user: &User) -> Result<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = ?, email = ?, hierarchy_level_id = ?, reports_to = ?, phone = ?, bio = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.hierarchy_level_id.map(|u| u.to_string()))
        .bind(user.reports_to.map(|u| u.to_string()))
        .bind(&user.phone)
        .bind(&user.bio)
        .bind(now)
        .bind(user.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("Email {} is already registered", user.email)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user.id)));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    role: String,
    company_id: Option<String>,
    hierarchy_level_id: Option<String>,
    reports_to: Option<String>,
    phone: String,
    bio: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id, "user")?,
            name: row.name,
            email: row.email,
            role: row
                .role
                .parse()
                .map_err(|e| AppError::Internal(format!("Invalid role: {}", e)))?,
            company_id: parse_opt_uuid(row.company_id, "company")?,
            hierarchy_level_id: parse_opt_uuid(row.hierarchy_level_id, "hierarchy level")?,
            reports_to: parse_opt_uuid(row.reports_to, "reports_to")?,
            phone: row.phone,
            bio: row.bio,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::hierarchy::HierarchyLevel;

    #[tokio::test]
    async fn test_create_and_get_user() {
        let store = setup_test_db().await;
        let (company, admin) = seed_company(&store).await;
        let level = seed_level(&store, HierarchyLevel::new(company.id, "Staff", 3)).await;

        let user = store
            .create_user(NewUser {
                name: "  Grace ".to_string(),
                email: "Grace@Acme.TEST".to_string(),
                role: Role::Employee,
                company_id: Some(company.id),
                hierarchy_level_id: Some(level.id),
                reports_to: Some(admin.id),
                password_hash: None,
            })
            .await
            .unwrap();

        let fetched = store.get_user(user.id).await.unwrap();
        assert_eq!(fetched.name, "Grace");
        assert_eq!(fetched.email, "grace@acme.test");
        assert_eq!(fetched.hierarchy_level_id, Some(level.id));
        assert_eq!(fetched.reports_to, Some(admin.id));
    }

    #[tokio::test]
    async fn test_create_user_rejects_invalid_input() {
        let store = setup_test_db().await;
        let (company, _) = seed_company(&store).await;
        let err = store
            .create_user(NewUser {
                name: "No Level".to_string(),
                email: "nolevel@acme.test".to_string(),
                role: Role::Employee,
                company_id: Some(company.id),
                hierarchy_level_id: None,
                reports_to: None,
                password_hash: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = setup_test_db().await;
        let (_, admin) = seed_company(&store).await;
        let err = store
            .create_user(NewUser {
                name: "Copy".to_string(),
                email: admin.email.to_uppercase(),
                role: Role::SuperAdmin,
                company_id: None,
                hierarchy_level_id: None,
                reports_to: None,
                password_hash: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_password_hash_storage() {
        let store = setup_test_db().await;
        let (company, admin) = seed_company(&store).await;
        let level = seed_level(&store, HierarchyLevel::new(company.id, "Staff", 3)).await;

        let user = store
            .create_user(NewUser {
                name: "Lin".to_string(),
                email: "lin@acme.test".to_string(),
                role: Role::Employee,
                company_id: Some(company.id),
                hierarchy_level_id: Some(level.id),
                reports_to: None,
                password_hash: Some("first-hash".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(
            store.password_hash(user.id).await.unwrap().as_deref(),
            Some("first-hash")
        );

        store.set_password_hash(user.id, "second-hash").await.unwrap();
        assert_eq!(
            store.password_hash(user.id).await.unwrap().as_deref(),
            Some("second-hash")
        );

        assert_eq!(store.password_hash(admin.id).await.unwrap(), None);
        assert!(matches!(
            store.password_hash(Uuid::new_v4()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            store.set_password_hash(Uuid::new_v4(), "x").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_find_user_by_email() {
        let store = setup_test_db().await;
        let (_, admin) = seed_company(&store).await;

        let found = store
            .find_user_by_email(&format!(" {} ", admin.email.to_uppercase()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, admin.id);
        assert!(store
            .find_user_by_email("nobody@acme.test")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let store = setup_test_db().await;
        let result = store.get_user(Uuid::new_v4()).await;
        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_employees_excludes_admin() {
        let store = setup_test_db().await;
        let (company, _) = seed_company(&store).await;
        let level = seed_level(&store, HierarchyLevel::new(company.id, "Staff", 2)).await;
        seed_employee(&store, company.id, level.id).await;
        seed_employee(&store, company.id, level.id).await;

        assert_eq!(store.list_employees(company.id).await.unwrap().len(), 2);
        assert_eq!(store.list_company_users(company.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_reassign_level_replaces() {
        let store = setup_test_db().await;
        let (company, _) = seed_company(&store).await;
        let junior = seed_level(&store, HierarchyLevel::new(company.id, "Junior", 3)).await;
        let senior = seed_level(&store, HierarchyLevel::new(company.id, "Senior", 2)).await;
        let mut user = seed_employee(&store, company.id, junior.id).await;

        user.hierarchy_level_id = Some(senior.id);
        user.bio = "Promoted".to_string();
        store.update_user(&user).await.unwrap();

        let fetched = store.get_user(user.id).await.unwrap();
        assert_eq!(fetched.hierarchy_level_id, Some(senior.id));
        assert_eq!(fetched.bio, "Promoted");
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let store = setup_test_db().await;
        let (_, mut admin) = seed_company(&store).await;
        admin.id = Uuid::new_v4();
        let err = store.update_user(&admin).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_user_row_try_from_invalid_role() {
        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            name: "x".to_string(),
            email: "x@y.test".to_string(),
            role: "overlord".to_string(),
            company_id: None,
            hierarchy_level_id: None,
            reports_to: None,
            phone: String::new(),
            bio: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let result: Result<User> = row.try_into();
        assert!(result.is_err());
    }
}
