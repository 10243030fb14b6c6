//! Tasks and the workflows that create and move them
//!
//! - `task`: task records, reports, comments and their input types
//! - `workflow`: hierarchy-checked create/update/report flows with notifications

pub mod task;
pub mod workflow;

pub use task::{
    NewTask, Priority, ReportStatus, Subtask, Task, TaskComment, TaskDetail, TaskPatch,
    TaskReport, TaskStatus, TaskUpdate,
};
pub use workflow::{ReportReview, TaskAnalytics, TaskFilter, TaskService};
