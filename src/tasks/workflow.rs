//! Task workflows
//!
//! Every workflow resolves the acting user's scope through the hierarchy authorizer
//! before touching a task. Creation additionally checks assignment authority and the
//! assignee's daily quota; the quota check and the insert run under a per-assignee
//! lock so concurrent requests in this process cannot overshoot the quota.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::task::{
    NewTask, Priority, ReportStatus, Task, TaskComment, TaskDetail, TaskPatch, TaskReport,
    TaskStatus, TaskUpdate,
};
use crate::error::{AppError, Result};
use crate::hierarchy::{Department, HierarchyAuthorizer, TaskScope};
use crate::models::User;
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::store::{Store, TaskOrder, TaskQuery};

/// Optional filters for task listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Verdict on a submitted report
#[derive(Debug, Clone, Deserialize)]
pub struct ReportReview {
    pub status: ReportStatus,
    pub review_comments: Option<String>,
}

/// Company-wide task statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskAnalytics {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
    /// Completed share of all tasks, 0.0 when there are none
    pub completion_rate: f64,
    /// Mean of `updated_at - created_at` over completed tasks, in days
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_completion_days: Option<f64>,
}

impl TaskAnalytics {
    fn from_tasks(tasks: &[Task]) -> Self {
        let mut analytics = TaskAnalytics {
            total: tasks.len() as u64,
            ..Default::default()
        };
        for status in TaskStatus::all() {
            analytics.by_status.insert(status.as_str().to_string(), 0);
        }
        for priority in Priority::all() {
            analytics.by_priority.insert(priority.as_str().to_string(), 0);
        }

        let mut completed = 0u64;
        let mut completion_days = 0.0;
        for task in tasks {
            *analytics
                .by_status
                .entry(task.status.as_str().to_string())
                .or_default() += 1;
            *analytics
                .by_priority
                .entry(task.priority.as_str().to_string())
                .or_default() += 1;
            *analytics
                .by_category
                .entry(task.category.clone())
                .or_default() += 1;

            if task.status == TaskStatus::Completed {
                completed += 1;
                let elapsed = task.updated_at - task.created_at;
                completion_days += elapsed.num_seconds() as f64 / 86_400.0;
            }
        }

        if analytics.total > 0 {
            analytics.completion_rate = completed as f64 / analytics.total as f64;
        }
        if completed > 0 {
            analytics.average_completion_days = Some(completion_days / completed as f64);
        }
        analytics
    }
}

/// Task workflows over the store, the authorizer and the notifier
#[derive(Clone)]
pub struct TaskService {
    store: Store,
    authorizer: HierarchyAuthorizer<Store>,
    notifier: Notifier,
    /// One mutex per assignee, held across quota check and insert
    assignee_locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl TaskService {
    pub fn new(store: Store, authorizer: HierarchyAuthorizer<Store>, notifier: Notifier) -> Self {
        Self {
            store,
            authorizer,
            notifier,
            assignee_locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn authorizer(&self) -> &HierarchyAuthorizer<Store> {
        &self.authorizer
    }

    async fn assignee_lock(&self, assignee: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.assignee_locks.read().await.get(&assignee) {
            return lock.clone();
        }
        self.assignee_locks
            .write()
            .await
            .entry(assignee)
            .or_default()
            .clone()
    }

    /// Drop the map entry once no other caller holds or waits on the lock
    async fn release_assignee_lock(&self, assignee: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.assignee_locks.write().await;
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&assignee);
        }
    }

    /// Publish a notification. The triggering change is already committed, so a
    /// failure here is logged rather than returned.
    async fn send(&self, notification: Notification) {
        let user_id = notification.user_id;
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::error!(%user_id, error = %e, "failed to deliver notification");
        }
    }

    /// Load a task and check it is inside the actor's scope
    async fn accessible_task(&self, actor: &User, task_id: Uuid) -> Result<Task> {
        let task = self.store.get_task(task_id).await?;
        let scope = self.authorizer.visible_task_filter(actor.id).await?;
        if !scope.matches(&task) {
            tracing::warn!(user_id = %actor.id, %task_id, "task outside of user's scope");
            return Err(AppError::Forbidden(
                "You do not have permission to access this task".to_string(),
            ));
        }
        Ok(task)
    }

    /// Create a task assigned by `actor`
    pub async fn create(&self, actor: &User, input: NewTask) -> Result<Task> {
        input.validate().map_err(AppError::BadRequest)?;

        let company_id = actor.company_id.ok_or_else(|| {
            AppError::Forbidden("Only company members can assign tasks".to_string())
        })?;
        let assignee = self
            .store
            .find_user(input.assigned_to)
            .await?
            .filter(|u| u.belongs_to(company_id))
            .ok_or_else(|| {
                AppError::NotFound(format!("Assignee {} not found", input.assigned_to))
            })?;

        let (Some(assigner_level), Some(assignee_level)) =
            (actor.hierarchy_level_id, assignee.hierarchy_level_id)
        else {
            return Err(AppError::BadRequest(
                "Both users must be placed at a hierarchy level".to_string(),
            ));
        };

        if !self
            .authorizer
            .can_assign(company_id, assigner_level, assignee_level)
            .await?
        {
            tracing::warn!(
                assigner = %actor.id,
                assignee = %assignee.id,
                "assignment denied by hierarchy"
            );
            return Err(AppError::Forbidden(
                "You can only assign tasks to users below your hierarchy level".to_string(),
            ));
        }

        let level = self.store.get_level(assignee_level).await?;
        let task = Task::new(company_id, actor.id, input);

        let lock = self.assignee_lock(assignee.id).await;
        let inserted: Result<()> = async {
            let _guard = lock.lock().await;
            if !self
                .authorizer
                .check_daily_quota(assignee.id, &level, task.created_at)
                .await?
            {
                tracing::warn!(
                    assignee = %assignee.id,
                    max = level.max_tasks_per_day,
                    "daily task quota reached"
                );
                return Err(AppError::BadRequest(format!(
                    "{} has reached the daily limit of {} tasks",
                    assignee.name, level.max_tasks_per_day
                )));
            }
            self.store.insert_task(&task).await
        }
        .await;
        self.release_assignee_lock(assignee.id, lock).await;
        inserted?;

        tracing::info!(
            task_id = %task.id,
            assigned_by = %actor.id,
            assigned_to = %assignee.id,
            "task created"
        );

        self.send(
            Notification::new(
                assignee.id,
                NotificationKind::TaskAssigned,
                "New Task Assigned",
                format!("You have been assigned a new task: {}", task.title),
            )
            .about_task(task.id)
            .from(actor.id)
            .with_priority(task.priority),
        )
        .await;

        Ok(task)
    }

    /// Tasks visible to `actor`, newest first
    pub async fn list(&self, actor: &User, filter: TaskFilter) -> Result<Vec<Task>> {
        let scope = self.authorizer.visible_task_filter(actor.id).await?;
        let query = TaskQuery::new(scope)
            .with_status(filter.status)
            .with_priority(filter.priority);
        self.store.list_tasks(&query).await
    }

    pub async fn get(&self, actor: &User, task_id: Uuid) -> Result<TaskDetail> {
        let task = self.accessible_task(actor, task_id).await?;
        self.store.task_detail(task).await
    }

    /// Apply a patch and record it as a progress note
    pub async fn update(&self, actor: &User, task_id: Uuid, patch: TaskPatch) -> Result<Task> {
        if patch.is_empty() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }
        if patch
            .actual_hours
            .is_some_and(|h| !h.is_finite() || h < 0.0)
        {
            return Err(AppError::BadRequest(
                "Actual hours must be a non-negative number".to_string(),
            ));
        }

        let mut task = self.accessible_task(actor, task_id).await?;
        let previous = task.apply(&patch);

        let content = patch
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| match previous {
                Some(_) => format!("Status changed to {}", task.status.as_str()),
                None => "Task details updated".to_string(),
            });
        let note = TaskUpdate {
            id: Uuid::new_v4(),
            task_id: task.id,
            author_id: actor.id,
            content,
            new_status: previous.map(|_| task.status),
            created_at: task.updated_at,
        };
        self.store.update_task(&task, Some(&note)).await?;

        tracing::info!(
            task_id = %task.id,
            user_id = %actor.id,
            status = task.status.as_str(),
            "task updated"
        );

        let (kind, title) = if previous.is_some() && task.status == TaskStatus::Completed {
            (NotificationKind::TaskCompleted, "Task Completed")
        } else {
            (NotificationKind::TaskUpdated, "Task Updated")
        };
        // The assignee hears about changes; their own changes go to the assigner.
        let recipient = if actor.id == task.assigned_to {
            task.assigned_by
        } else {
            task.assigned_to
        };
        if recipient != actor.id {
            self.send(
                Notification::new(
                    recipient,
                    kind,
                    title,
                    format!("Task \"{}\" is now {}", task.title, task.status.as_str()),
                )
                .about_task(task.id)
                .from(actor.id)
                .with_priority(task.priority),
            )
            .await;
        }

        Ok(task)
    }

    pub async fn comment(&self, actor: &User, task_id: Uuid, content: &str) -> Result<TaskComment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("Comment cannot be empty".to_string()));
        }

        let task = self.accessible_task(actor, task_id).await?;
        let comment = TaskComment {
            id: Uuid::new_v4(),
            task_id: task.id,
            author_id: actor.id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_comment(&comment).await?;

        let recipient = if actor.id == task.assigned_to {
            task.assigned_by
        } else {
            task.assigned_to
        };
        if recipient != actor.id {
            self.send(
                Notification::new(
                    recipient,
                    NotificationKind::CommentAdded,
                    "New Comment",
                    format!("{} commented on \"{}\"", actor.name, task.title),
                )
                .about_task(task.id)
                .from(actor.id),
            )
            .await;
        }

        Ok(comment)
    }

    /// Submit a work report; only the assignee may, and the task goes under review
    pub async fn submit_report(
        &self,
        actor: &User,
        task_id: Uuid,
        content: &str,
    ) -> Result<TaskReport> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("Report content is required".to_string()));
        }

        let mut task = self.store.get_task(task_id).await?;
        if task.assigned_to != actor.id {
            return Err(AppError::Forbidden(
                "Only the assigned user can submit a report".to_string(),
            ));
        }
        task.mark_under_review().map_err(AppError::BadRequest)?;

        let report = TaskReport {
            id: Uuid::new_v4(),
            task_id: task.id,
            author_id: actor.id,
            content: content.to_string(),
            status: ReportStatus::Submitted,
            review_comments: None,
            created_at: task.updated_at,
            updated_at: task.updated_at,
        };
        self.store.submit_report(&task, &report).await?;

        tracing::info!(task_id = %task.id, report_id = %report.id, "report submitted");

        self.send(
            Notification::new(
                task.assigned_by,
                NotificationKind::ReportSubmitted,
                "Report Submitted",
                format!("New report submitted for task \"{}\"", task.title),
            )
            .about_task(task.id)
            .from(actor.id)
            .with_priority(task.priority),
        )
        .await;

        Ok(report)
    }

    /// Review a report; the assigner or a company admin may
    pub async fn review_report(
        &self,
        actor: &User,
        task_id: Uuid,
        report_id: Uuid,
        review: ReportReview,
    ) -> Result<TaskReport> {
        let task = self.store.get_task(task_id).await?;
        let is_admin = actor.is_company_admin() && actor.belongs_to(task.company_id);
        if actor.id != task.assigned_by && !is_admin {
            return Err(AppError::Forbidden(
                "Only the assigner or a company admin can review reports".to_string(),
            ));
        }

        let mut report = self.store.get_report(task_id, report_id).await?;
        let comments = review
            .review_comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        report
            .review(review.status, comments)
            .map_err(AppError::BadRequest)?;
        self.store.update_report(&report).await?;

        tracing::info!(
            %task_id,
            %report_id,
            verdict = report.status.as_str(),
            "report reviewed"
        );

        self.send(
            Notification::new(
                report.author_id,
                NotificationKind::ReportReviewed,
                "Report Reviewed",
                format!(
                    "Your report for \"{}\" was {}",
                    task.title,
                    report.status.as_str()
                ),
            )
            .about_task(task.id)
            .from(actor.id),
        )
        .await;

        Ok(report)
    }

    /// Delete a task; the company admin or the original assigner may
    pub async fn delete(&self, actor: &User, task_id: Uuid) -> Result<()> {
        let task = self.store.get_task(task_id).await?;
        if !actor.belongs_to(task.company_id) {
            return Err(AppError::NotFound(format!("Task {} not found", task_id)));
        }
        if !actor.is_company_admin() && actor.id != task.assigned_by {
            return Err(AppError::Forbidden(
                "Only the assigner or a company admin can delete this task".to_string(),
            ));
        }

        self.store.delete_task(task_id).await?;
        tracing::info!(%task_id, user_id = %actor.id, "task deleted");
        Ok(())
    }

    /// Tasks of users whose level is scoped to `department`, within the actor's scope
    pub async fn by_department(&self, actor: &User, department: Department) -> Result<Vec<Task>> {
        let scope = self.authorizer.visible_task_filter(actor.id).await?;
        let company_id = scope.company_id();

        let levels: Vec<Uuid> = self
            .store
            .list_levels(company_id)
            .await?
            .into_iter()
            .filter(|l| l.department_scope.contains(&department))
            .map(|l| l.id)
            .collect();
        let in_department = self
            .store
            .list_company_users(company_id)
            .await?
            .into_iter()
            .filter(|u| u.hierarchy_level_id.is_some_and(|l| levels.contains(&l)))
            .map(|u| u.id)
            .filter(|id| scope.permits(company_id, *id))
            .collect();

        let query = TaskQuery::new(TaskScope::Assignees {
            company_id,
            assignees: in_department,
        });
        self.store.list_tasks(&query).await
    }

    /// Aggregate statistics over the actor's company; company admins only
    pub async fn analytics(&self, actor: &User, filter: TaskFilter) -> Result<TaskAnalytics> {
        if !actor.is_company_admin() {
            return Err(AppError::Forbidden(
                "Only company admins can view analytics".to_string(),
            ));
        }
        let scope = self.authorizer.visible_task_filter(actor.id).await?;
        let tasks: Vec<Task> = self
            .store
            .list_tasks(&TaskQuery::new(scope))
            .await?
            .into_iter()
            .filter(|t| filter.start.map_or(true, |s| t.created_at >= s))
            .filter(|t| filter.end.map_or(true, |e| t.created_at <= e))
            .collect();

        Ok(TaskAnalytics::from_tasks(&tasks))
    }

    /// Tasks in the actor's scope grouped by due day (`YYYY-MM-DD`)
    pub async fn timeline(
        &self,
        actor: &User,
        filter: TaskFilter,
    ) -> Result<BTreeMap<String, Vec<Task>>> {
        let scope = self.authorizer.visible_task_filter(actor.id).await?;
        let query = TaskQuery::new(scope)
            .with_status(filter.status)
            .with_priority(filter.priority)
            .due_between(filter.start, filter.end)
            .order(TaskOrder::DueDateAscending);

        let mut timeline: BTreeMap<String, Vec<Task>> = BTreeMap::new();
        for task in self.store.list_tasks(&query).await? {
            timeline
                .entry(task.due_day().format("%Y-%m-%d").to_string())
                .or_default()
                .push(task);
        }
        Ok(timeline)
    }
}
