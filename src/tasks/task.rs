//! Tasks and their activity records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    /// A report was submitted and awaits review
    UnderReview,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::UnderReview => "under_review",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn all() -> [TaskStatus; 4] {
        [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::UnderReview,
            TaskStatus::Completed,
        ]
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "under_review" => Ok(TaskStatus::UnderReview),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// Priority of a task (also used for notifications)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn all() -> [Priority; 3] {
        [Priority::Low, Priority::Medium, Priority::High]
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

/// A unit of assigned work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: String,
    pub assigned_to: Uuid,
    pub assigned_by: Uuid,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    pub category: String,
    pub estimated_hours: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<f64>,
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a pending task from validated input
    pub fn new(company_id: Uuid, assigned_by: Uuid, input: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            title: input.title.trim().to_string(),
            description: input.description,
            assigned_to: input.assigned_to,
            assigned_by,
            status: TaskStatus::Pending,
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            category: input.category,
            estimated_hours: input.estimated_hours,
            actual_hours: None,
            subtasks: input.subtasks,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a patch; returns the previous status if it changed
    pub fn apply(&mut self, patch: &TaskPatch) -> Option<TaskStatus> {
        let previous = self.status;
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due) = patch.due_date {
            self.due_date = due;
        }
        if let Some(hours) = patch.actual_hours {
            self.actual_hours = Some(hours);
        }
        self.updated_at = Utc::now();
        (previous != self.status).then_some(previous)
    }

    /// Move to review after a report; completed tasks cannot be reported on
    pub fn mark_under_review(&mut self) -> Result<(), String> {
        if self.status == TaskStatus::Completed {
            return Err("Cannot submit a report for a completed task".to_string());
        }
        self.status = TaskStatus::UnderReview;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn due_day(&self) -> NaiveDate {
        self.due_date.date_naive()
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assigned_to: Uuid,
    pub due_date: DateTime<Utc>,
    pub priority: Option<Priority>,
    pub category: String,
    pub estimated_hours: f64,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("Description is required".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("Category is required".to_string());
        }
        if !self.estimated_hours.is_finite() || self.estimated_hours < 0.0 {
            return Err("Estimated hours must be a non-negative number".to_string());
        }
        if self.subtasks.iter().any(|s| s.title.trim().is_empty()) {
            return Err("Subtasks need a title".to_string());
        }
        Ok(())
    }
}

/// Partial update of a task, optionally with a progress note
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub content: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub actual_hours: Option<f64>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().map_or(true, |c| c.trim().is_empty())
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.actual_hours.is_none()
    }
}

/// Progress note attached to a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<TaskStatus>,
    pub created_at: DateTime<Utc>,
}

/// Review state of a submitted report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Submitted,
    Reviewed,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Submitted => "submitted",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ReportStatus::Submitted),
            "reviewed" => Ok(ReportStatus::Reviewed),
            "approved" => Ok(ReportStatus::Approved),
            "rejected" => Ok(ReportStatus::Rejected),
            _ => Err(format!("Invalid report status: {}", s)),
        }
    }
}

/// Work report submitted by the assignee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_comments: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskReport {
    pub fn review(&mut self, verdict: ReportStatus, comments: Option<String>) -> Result<(), String> {
        if self.status != ReportStatus::Submitted {
            return Err(format!(
                "Report already {}",
                self.status.as_str()
            ));
        }
        if verdict == ReportStatus::Submitted {
            return Err("A review must approve, reject or mark the report reviewed".to_string());
        }
        self.status = verdict;
        self.review_comments = comments;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: Uuid,
    pub task_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A task with its activity, as returned by the detail endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub updates: Vec<TaskUpdate>,
    pub reports: Vec<TaskReport>,
    pub comments: Vec<TaskComment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task() -> NewTask {
        NewTask {
            title: "  Quarterly audit ".to_string(),
            description: "Reconcile ledgers".to_string(),
            assigned_to: Uuid::new_v4(),
            due_date: Utc::now(),
            priority: None,
            category: "finance".to_string(),
            estimated_hours: 6.0,
            subtasks: vec![],
        }
    }

    #[test]
    fn test_status_round_trip() {
        for status in TaskStatus::all() {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("done".parse::<TaskStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn test_priority_default_and_order() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert!(Priority::High > Priority::Low);
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
    }

    #[test]
    fn test_new_task_is_pending_and_trimmed() {
        let input = new_task();
        let assignee = input.assigned_to;
        let task = Task::new(Uuid::new_v4(), Uuid::new_v4(), input);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.title, "Quarterly audit");
        assert_eq!(task.assigned_to, assignee);
    }

    #[test]
    fn test_new_task_validation() {
        assert!(new_task().validate().is_ok());

        let mut input = new_task();
        input.title = " ".to_string();
        assert!(input.validate().is_err());

        let mut input = new_task();
        input.estimated_hours = -1.0;
        assert!(input.validate().is_err());

        let mut input = new_task();
        input.subtasks.push(Subtask {
            title: String::new(),
            completed: false,
            due_date: None,
        });
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_apply_reports_status_change() {
        let mut task = Task::new(Uuid::new_v4(), Uuid::new_v4(), new_task());
        let changed = task.apply(&TaskPatch {
            status: Some(TaskStatus::InProgress),
            ..Default::default()
        });
        assert_eq!(changed, Some(TaskStatus::Pending));

        let unchanged = task.apply(&TaskPatch {
            priority: Some(Priority::High),
            ..Default::default()
        });
        assert_eq!(unchanged, None);
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(TaskPatch::default().is_empty());
        assert!(TaskPatch {
            content: Some("  ".to_string()),
            ..Default::default()
        }
        .is_empty());
        assert!(!TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_completed_task_rejects_report() {
        let mut task = Task::new(Uuid::new_v4(), Uuid::new_v4(), new_task());
        task.mark_under_review().unwrap();
        assert_eq!(task.status, TaskStatus::UnderReview);

        task.status = TaskStatus::Completed;
        assert!(task.mark_under_review().is_err());
    }

    #[test]
    fn test_report_review_once() {
        let now = Utc::now();
        let mut report = TaskReport {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            content: "done".to_string(),
            status: ReportStatus::Submitted,
            review_comments: None,
            created_at: now,
            updated_at: now,
        };
        assert!(report
            .review(ReportStatus::Submitted, None)
            .is_err());
        report
            .review(ReportStatus::Approved, Some("good".to_string()))
            .unwrap();
        assert_eq!(report.status, ReportStatus::Approved);
        assert!(report.review(ReportStatus::Rejected, None).is_err());
    }
}
