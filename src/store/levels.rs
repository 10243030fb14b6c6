//! Hierarchy level records

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{parse_opt_uuid, parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::hierarchy::{Department, HierarchyLevel};

impl Store {
    pub async fn insert_level(&self, level: &HierarchyLevel) -> Result<()> {
        let scope = serde_json::to_string(&level.department_scope)
            .map_err(|e| AppError::Internal(format!("Failed to encode departments: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO hierarchy_levels
                (id, company_id, name, rank, max_tasks_per_day, reports_to, department_scope, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(level.id.to_string())
        .bind(level.company_id.to_string())
        .bind(&level.name)
        .bind(i64::from(level.rank))
        .bind(i64::from(level.max_tasks_per_day))
        .bind(level.reports_to.map(|u| u.to_string()))
        .bind(scope)
        .bind(level.created_at)
        .bind(level.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_level(&self, id: Uuid) -> Result<Option<HierarchyLevel>> {
        let row = sqlx::query_as::<_, LevelRow>(
            r#"
            SELECT id, company_id, name, rank, max_tasks_per_day, reports_to, department_scope, created_at, updated_at
            FROM hierarchy_levels
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    pub async fn get_level(&self, id: Uuid) -> Result<HierarchyLevel> {
        self.find_level(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Hierarchy level {} not found", id)))
    }

    /// Levels of a company, most senior first
    pub async fn list_levels(&self, company_id: Uuid) -> Result<Vec<HierarchyLevel>> {
        let rows = sqlx::query_as::<_, LevelRow>(
            r#"
            SELECT id, company_id, name, rank, max_tasks_per_day, reports_to, department_scope, created_at, updated_at
            FROM hierarchy_levels
            WHERE company_id = ?
            ORDER BY rank ASC, name ASC
            "#,
        )
        .bind(company_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Rank and company are never rewritten
    pub async fn update_level(&self, level: &HierarchyLevel) -> Result<()> {
        let scope = serde_json::to_string(&level.department_scope)
            .map_err(|e| AppError::Internal(format!("Failed to encode departments: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE hierarchy_levels
            SET name = ?, max_tasks_per_day = ?, reports_to = ?, department_scope = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&level.name)
        .bind(i64::from(level.max_tasks_per_day))
        .bind(level.reports_to.map(|u| u.to_string()))
        .bind(scope)
        .bind(level.updated_at)
        .bind(level.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Hierarchy level {} not found",
                level.id
            )));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct LevelRow {
    id: String,
    company_id: String,
    name: String,
    rank: i64,
    max_tasks_per_day: i64,
    reports_to: Option<String>,
    department_scope: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LevelRow> for HierarchyLevel {
    type Error = AppError;

    fn try_from(row: LevelRow) -> Result<Self> {
        let department_scope: BTreeSet<Department> = serde_json::from_str(&row.department_scope)
            .map_err(|e| AppError::Internal(format!("Invalid department scope: {}", e)))?;

        Ok(HierarchyLevel {
            id: parse_uuid(&row.id, "hierarchy level")?,
            company_id: parse_uuid(&row.company_id, "company")?,
            name: row.name,
            rank: u32::try_from(row.rank)
                .map_err(|_| AppError::Internal(format!("Invalid rank: {}", row.rank)))?,
            max_tasks_per_day: u32::try_from(row.max_tasks_per_day).map_err(|_| {
                AppError::Internal(format!("Invalid quota: {}", row.max_tasks_per_day))
            })?,
            reports_to: parse_opt_uuid(row.reports_to, "reports_to")?,
            department_scope,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
