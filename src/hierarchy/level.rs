//! Hierarchy levels
//!
//! A level is the unit of authority comparison inside a company. Levels form a forest
//! through `reports_to`; along every edge the parent has a strictly lower rank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// Default quota for a new level
pub const DEFAULT_MAX_TASKS_PER_DAY: u32 = 10;

/// Departments a level can be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Department {
    #[serde(rename = "IT")]
    It,
    #[serde(rename = "HR")]
    Hr,
    Finance,
    Operations,
    Marketing,
    Sales,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::It => "IT",
            Department::Hr => "HR",
            Department::Finance => "Finance",
            Department::Operations => "Operations",
            Department::Marketing => "Marketing",
            Department::Sales => "Sales",
        }
    }
}

impl std::str::FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IT" => Ok(Department::It),
            "HR" => Ok(Department::Hr),
            "Finance" => Ok(Department::Finance),
            "Operations" => Ok(Department::Operations),
            "Marketing" => Ok(Department::Marketing),
            "Sales" => Ok(Department::Sales),
            _ => Err(format!("Invalid department: {}", s)),
        }
    }
}

/// A level in a company's hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyLevel {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    /// Lower rank means more authority; rank 1 outranks rank 2
    pub rank: u32,
    /// Cap on new assignments per assignee per local calendar day
    pub max_tasks_per_day: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports_to: Option<Uuid>,
    /// Empty means unrestricted
    pub department_scope: BTreeSet<Department>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HierarchyLevel {
    /// Create a new top-level level with the default quota
    pub fn new(company_id: Uuid, name: impl Into<String>, rank: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            name: name.into(),
            rank,
            max_tasks_per_day: DEFAULT_MAX_TASKS_PER_DAY,
            reports_to: None,
            department_scope: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_quota(mut self, max_tasks_per_day: u32) -> Self {
        self.max_tasks_per_day = max_tasks_per_day;
        self
    }

    pub fn reporting_to(mut self, parent: Uuid) -> Self {
        self.reports_to = Some(parent);
        self
    }

    pub fn with_departments(mut self, departments: impl IntoIterator<Item = Department>) -> Self {
        self.department_scope = departments.into_iter().collect();
        self
    }

    /// True if this level carries strictly more authority than `other`
    pub fn outranks(&self, other: &HierarchyLevel) -> bool {
        self.rank < other.rank
    }

    /// Check this level's placement against the other levels of its company.
    ///
    /// `company_levels` may include this level itself (for updates); it is ignored.
    pub fn validate_placement(&self, company_levels: &[HierarchyLevel]) -> Result<(), String> {
        if self.rank == 0 {
            return Err("Rank must be at least 1".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("Level name is required".to_string());
        }

        let Some(parent_id) = self.reports_to else {
            return Ok(());
        };
        if parent_id == self.id {
            return Err("A level cannot report to itself".to_string());
        }

        let by_id: HashMap<Uuid, &HierarchyLevel> = company_levels
            .iter()
            .filter(|l| l.company_id == self.company_id && l.id != self.id)
            .map(|l| (l.id, l))
            .collect();

        let parent = by_id.get(&parent_id).ok_or_else(|| {
            format!("Reports-to level {} not found in this company", parent_id)
        })?;

        if !parent.outranks(self) {
            return Err(format!(
                "Level '{}' (rank {}) cannot report to '{}' (rank {}): the parent must have a lower rank",
                self.name, self.rank, parent.name, parent.rank
            ));
        }

        // Walk up from the parent; reaching this level again means a cycle.
        let mut seen = HashSet::new();
        let mut cursor = Some(parent_id);
        while let Some(id) = cursor {
            if id == self.id || !seen.insert(id) {
                return Err("Reports-to chain would form a cycle".to_string());
            }
            cursor = by_id.get(&id).and_then(|l| l.reports_to);
        }

        Ok(())
    }
}

/// Input for creating a level
#[derive(Debug, Clone, Deserialize)]
pub struct NewLevel {
    pub name: String,
    pub rank: u32,
    pub max_tasks_per_day: Option<u32>,
    pub reports_to: Option<Uuid>,
    #[serde(default)]
    pub department_scope: Vec<Department>,
}

impl NewLevel {
    pub fn into_level(self, company_id: Uuid) -> HierarchyLevel {
        let mut level = HierarchyLevel::new(company_id, self.name, self.rank)
            .with_departments(self.department_scope);
        if let Some(max) = self.max_tasks_per_day {
            level = level.with_quota(max);
        }
        level.reports_to = self.reports_to;
        level
    }
}

/// Partial update of a level. Rank is fixed once created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LevelPatch {
    pub name: Option<String>,
    pub max_tasks_per_day: Option<u32>,
    /// Absent keeps the parent; `null` makes the level a root
    #[serde(default, deserialize_with = "present")]
    pub reports_to: Option<Option<Uuid>>,
    pub department_scope: Option<Vec<Department>>,
}

/// Marks a field as present, so an explicit `null` is distinguishable from a missing key
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl LevelPatch {
    pub fn apply(self, level: &mut HierarchyLevel) {
        if let Some(name) = self.name.filter(|n| !n.trim().is_empty()) {
            level.name = name;
        }
        if let Some(max) = self.max_tasks_per_day {
            level.max_tasks_per_day = max;
        }
        if let Some(parent) = self.reports_to {
            level.reports_to = parent;
        }
        if let Some(scope) = self.department_scope {
            level.department_scope = scope.into_iter().collect();
        }
        level.updated_at = Utc::now();
    }
}
