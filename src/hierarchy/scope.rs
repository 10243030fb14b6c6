//! Task visibility predicate

use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::tasks::Task;

/// Which tasks a user may see. Applied by the store when listing, and checked
/// against single tasks for get/update access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskScope {
    /// Every task of the company
    Company { company_id: Uuid },
    /// Tasks of the company assigned to one of these users
    Assignees {
        company_id: Uuid,
        assignees: BTreeSet<Uuid>,
    },
}

impl TaskScope {
    pub fn company_id(&self) -> Uuid {
        match self {
            TaskScope::Company { company_id } | TaskScope::Assignees { company_id, .. } => {
                *company_id
            }
        }
    }

    /// True if a task in `company_id` assigned to `assigned_to` is visible
    pub fn permits(&self, company_id: Uuid, assigned_to: Uuid) -> bool {
        match self {
            TaskScope::Company { company_id: scope } => *scope == company_id,
            TaskScope::Assignees {
                company_id: scope,
                assignees,
            } => *scope == company_id && assignees.contains(&assigned_to),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.permits(task.company_id, task.assigned_to)
    }

    /// Explicit assignee list, or `None` when the whole company is visible
    pub fn assignees(&self) -> Option<&BTreeSet<Uuid>> {
        match self {
            TaskScope::Company { .. } => None,
            TaskScope::Assignees { assignees, .. } => Some(assignees),
        }
    }
}
