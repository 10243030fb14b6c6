//! Task records and their activity

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use super::{parse_uuid, Store};
use crate::error::{AppError, Result};
use crate::hierarchy::TaskScope;
use crate::tasks::{
    Priority, ReportStatus, Subtask, Task, TaskComment, TaskDetail, TaskReport, TaskStatus,
    TaskUpdate,
};

const TASK_COLUMNS: &str = "id, company_id, title, description, assigned_to, assigned_by, status, priority, due_date, category, estimated_hours, actual_hours, subtasks, created_at, updated_at";

/// Sort order for task listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskOrder {
    #[default]
    NewestFirst,
    DueDateAscending,
}

/// Filter for listing tasks. The scope is always applied.
#[derive(Debug, Clone)]
pub struct TaskQuery {
    pub scope: TaskScope,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    /// Inclusive lower bound on the due date
    pub due_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the due date
    pub due_until: Option<DateTime<Utc>>,
    pub order: TaskOrder,
}

impl TaskQuery {
    pub fn new(scope: TaskScope) -> Self {
        Self {
            scope,
            status: None,
            priority: None,
            due_from: None,
            due_until: None,
            order: TaskOrder::default(),
        }
    }

    pub fn with_status(mut self, status: Option<TaskStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = priority;
        self
    }

    pub fn due_between(mut self, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.due_from = from;
        self.due_until = until;
        self
    }

    pub fn order(mut self, order: TaskOrder) -> Self {
        self.order = order;
        self
    }
}

impl Store {
    pub async fn insert_task(&self, task: &Task) -> Result<()> {
        let subtasks = encode_subtasks(&task.subtasks)?;

        sqlx::query(&format!(
            "INSERT INTO tasks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TASK_COLUMNS
        ))
        .bind(task.id.to_string())
        .bind(task.company_id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.assigned_to.to_string())
        .bind(task.assigned_by.to_string())
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(&task.category)
        .bind(task.estimated_hours)
        .bind(task.actual_hours)
        .bind(subtasks)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_task(&self, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE id = ?",
            TASK_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task> {
        self.find_task(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))
    }

    /// List tasks matching the query, scope first
    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM tasks WHERE company_id = ", TASK_COLUMNS));
        qb.push_bind(query.scope.company_id().to_string());

        if let Some(assignees) = query.scope.assignees() {
            if assignees.is_empty() {
                return Ok(Vec::new());
            }
            qb.push(" AND assigned_to IN (");
            let mut ids = qb.separated(", ");
            for id in assignees {
                ids.push_bind(id.to_string());
            }
            ids.push_unseparated(")");
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(priority) = query.priority {
            qb.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(from) = query.due_from {
            qb.push(" AND due_date >= ").push_bind(from);
        }
        if let Some(until) = query.due_until {
            qb.push(" AND due_date <= ").push_bind(until);
        }
        qb.push(match query.order {
            TaskOrder::NewestFirst => " ORDER BY created_at DESC",
            TaskOrder::DueDateAscending => " ORDER BY due_date ASC",
        });

        let rows = qb
            .build_query_as::<TaskRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Tasks assigned to `assigned_to` created inside `[start, end]`, both ends inclusive
    pub async fn count_tasks_created_between(
        &self,
        assigned_to: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM tasks
            WHERE assigned_to = ? AND created_at >= ? AND created_at <= ?
            "#,
        )
        .bind(assigned_to.to_string())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    /// Save a task's mutable fields, with an optional progress note, atomically
    pub async fn update_task(&self, task: &Task, note: Option<&TaskUpdate>) -> Result<()> {
        let subtasks = encode_subtasks(&task.subtasks)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = ?, priority = ?, due_date = ?, actual_hours = ?, subtasks = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_date)
        .bind(task.actual_hours)
        .bind(subtasks)
        .bind(task.updated_at)
        .bind(task.id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Task {} not found", task.id)));
        }

        if let Some(note) = note {
            sqlx::query(
                r#"
                INSERT INTO task_updates (id, task_id, author_id, content, new_status, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(note.id.to_string())
            .bind(note.task_id.to_string())
            .bind(note.author_id.to_string())
            .bind(&note.content)
            .bind(note.new_status.map(|s| s.as_str()))
            .bind(note.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a task; its updates, reports and comments cascade
    pub async fn delete_task(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Task {} not found", id)));
        }
        Ok(())
    }

    // Activity

    pub async fn list_task_updates(&self, task_id: Uuid) -> Result<Vec<TaskUpdate>> {
        let rows = sqlx::query_as::<_, TaskUpdateRow>(
            r#"
            SELECT id, task_id, author_id, content, new_status, created_at
            FROM task_updates
            WHERE task_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Store a report and move its task under review in one transaction
    pub async fn submit_report(&self, task: &Task, report: &TaskReport) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(task.status.as_str())
            .bind(task.updated_at)
            .bind(task.id.to_string())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO task_reports (id, task_id, author_id, content, status, review_comments, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.id.to_string())
        .bind(report.task_id.to_string())
        .bind(report.author_id.to_string())
        .bind(&report.content)
        .bind(report.status.as_str())
        .bind(&report.review_comments)
        .bind(report.created_at)
        .bind(report.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_report(&self, task_id: Uuid, report_id: Uuid) -> Result<TaskReport> {
        let row = sqlx::query_as::<_, TaskReportRow>(
            r#"
            SELECT id, task_id, author_id, content, status, review_comments, created_at, updated_at
            FROM task_reports
            WHERE id = ? AND task_id = ?
            "#,
        )
        .bind(report_id.to_string())
        .bind(task_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))?;

        row.try_into()
    }

    pub async fn update_report(&self, report: &TaskReport) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE task_reports
            SET status = ?, review_comments = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(report.status.as_str())
        .bind(&report.review_comments)
        .bind(report.updated_at)
        .bind(report.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_reports(&self, task_id: Uuid) -> Result<Vec<TaskReport>> {
        let rows = sqlx::query_as::<_, TaskReportRow>(
            r#"
            SELECT id, task_id, author_id, content, status, review_comments, created_at, updated_at
            FROM task_reports
            WHERE task_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    pub async fn insert_comment(&self, comment: &TaskComment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO task_comments (id, task_id, author_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(comment.id.to_string())
        .bind(comment.task_id.to_string())
        .bind(comment.author_id.to_string())
        .bind(&comment.content)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_comments(&self, task_id: Uuid) -> Result<Vec<TaskComment>> {
        let rows = sqlx::query_as::<_, TaskCommentRow>(
            r#"
            SELECT id, task_id, author_id, content, created_at
            FROM task_comments
            WHERE task_id = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// A task together with all of its activity
    pub async fn task_detail(&self, task: Task) -> Result<TaskDetail> {
        let updates = self.list_task_updates(task.id).await?;
        let reports = self.list_reports(task.id).await?;
        let comments = self.list_comments(task.id).await?;

        Ok(TaskDetail {
            task,
            updates,
            reports,
            comments,
        })
    }
}

fn encode_subtasks(subtasks: &[Subtask]) -> Result<String> {
    serde_json::to_string(subtasks)
        .map_err(|e| AppError::Internal(format!("Failed to encode subtasks: {}", e)))
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    company_id: String,
    title: String,
    description: String,
    assigned_to: String,
    assigned_by: String,
    status: String,
    priority: String,
    due_date: DateTime<Utc>,
    category: String,
    estimated_hours: f64,
    actual_hours: Option<f64>,
    subtasks: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(Task {
            id: parse_uuid(&row.id, "task")?,
            company_id: parse_uuid(&row.company_id, "company")?,
            title: row.title,
            description: row.description,
            assigned_to: parse_uuid(&row.assigned_to, "assignee")?,
            assigned_by: parse_uuid(&row.assigned_by, "assigner")?,
            status: row.status.parse().map_err(AppError::Internal)?,
            priority: row.priority.parse().map_err(AppError::Internal)?,
            due_date: row.due_date,
            category: row.category,
            estimated_hours: row.estimated_hours,
            actual_hours: row.actual_hours,
            subtasks: serde_json::from_str(&row.subtasks)
                .map_err(|e| AppError::Internal(format!("Invalid subtasks: {}", e)))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskUpdateRow {
    id: String,
    task_id: String,
    author_id: String,
    content: String,
    new_status: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaskUpdateRow> for TaskUpdate {
    type Error = AppError;

    fn try_from(row: TaskUpdateRow) -> Result<Self> {
        Ok(TaskUpdate {
            id: parse_uuid(&row.id, "task update")?,
            task_id: parse_uuid(&row.task_id, "task")?,
            author_id: parse_uuid(&row.author_id, "author")?,
            content: row.content,
            new_status: row
                .new_status
                .map(|s| s.parse::<TaskStatus>())
                .transpose()
                .map_err(AppError::Internal)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskReportRow {
    id: String,
    task_id: String,
    author_id: String,
    content: String,
    status: String,
    review_comments: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskReportRow> for TaskReport {
    type Error = AppError;

    fn try_from(row: TaskReportRow) -> Result<Self> {
        Ok(TaskReport {
            id: parse_uuid(&row.id, "report")?,
            task_id: parse_uuid(&row.task_id, "task")?,
            author_id: parse_uuid(&row.author_id, "author")?,
            content: row.content,
            status: row
                .status
                .parse::<ReportStatus>()
                .map_err(AppError::Internal)?,
            review_comments: row.review_comments,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskCommentRow {
    id: String,
    task_id: String,
    author_id: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaskCommentRow> for TaskComment {
    type Error = AppError;

    fn try_from(row: TaskCommentRow) -> Result<Self> {
        Ok(TaskComment {
            id: parse_uuid(&row.id, "comment")?,
            task_id: parse_uuid(&row.task_id, "task")?,
            author_id: parse_uuid(&row.author_id, "author")?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}
