//! Hierarchy-based assignment authorization
//!
//! The authorizer answers three questions, always against the current state of the
//! directory (nothing is cached between calls):
//! - may a level assign work to another level (`can_assign`)
//! - does an assignee still have quota left today (`check_daily_quota`)
//! - which tasks may a user see (`visible_task_filter`)
//!
//! Unknown or foreign records are ordinary denials. Directory errors are returned as
//! `Err` so the caller fails closed.

use async_trait::async_trait;
use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::level::HierarchyLevel;
use super::scope::TaskScope;
use crate::error::{AppError, Result};
use crate::models::User;

/// Read access the authorizer needs. Implemented by the SQL store; any other
/// backing (fixtures, caches) only has to provide these four lookups.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_hierarchy_level(&self, id: Uuid) -> Result<Option<HierarchyLevel>>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Count tasks assigned to a user with `created_after <= created_at <= created_before`
    async fn count_tasks(
        &self,
        assigned_to: Uuid,
        created_after: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<u64>;

    async fn list_users_in_company(&self, company_id: Uuid) -> Result<Vec<User>>;
}

/// Where a calendar day starts for quota accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    /// The server's local time zone
    #[default]
    Local,
    /// A fixed UTC offset
    Fixed(FixedOffset),
}

impl DayBoundary {
    pub fn utc() -> Self {
        DayBoundary::Fixed(Utc.fix())
    }

    /// Offset in minutes east of UTC; `None` if out of range
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(DayBoundary::Fixed)
    }

    /// Inclusive `[start, end]` of the calendar day containing `as_of`.
    ///
    /// `end` is one nanosecond before the next midnight, so an instant exactly at
    /// midnight belongs to the day that begins there.
    pub fn day_bounds(&self, as_of: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            DayBoundary::Local => bounds_in(&Local, as_of),
            DayBoundary::Fixed(offset) => bounds_in(offset, as_of),
        }
    }
}

fn bounds_in<Tz: TimeZone>(tz: &Tz, as_of: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let date = as_of.with_timezone(tz).date_naive();
    let start = midnight_in(tz, date);
    let next = date
        .succ_opt()
        .map(|d| midnight_in(tz, d))
        .unwrap_or_else(|| start + Duration::days(1));
    (start, next - Duration::nanoseconds(1))
}

fn midnight_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // A DST gap can swallow midnight; the day then starts an hour later.
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Stateless authorization over a directory
#[derive(Clone)]
pub struct HierarchyAuthorizer<D> {
    directory: D,
    day_boundary: DayBoundary,
}

impl<D: Directory> HierarchyAuthorizer<D> {
    pub fn new(directory: D, day_boundary: DayBoundary) -> Self {
        Self {
            directory,
            day_boundary,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn day_boundary(&self) -> DayBoundary {
        self.day_boundary
    }

    /// Resolve a level that must belong to `company_id`; foreign levels read as missing
    async fn level_in_company(
        &self,
        company_id: Uuid,
        level_id: Uuid,
    ) -> Result<Option<HierarchyLevel>> {
        Ok(self
            .directory
            .get_hierarchy_level(level_id)
            .await?
            .filter(|level| level.company_id == company_id))
    }

    /// May a user at `assigner_level` assign work to a user at `assignee_level`?
    ///
    /// True only when both levels exist in `company_id` and the assigner has strictly
    /// more authority (lower rank).
    pub async fn can_assign(
        &self,
        company_id: Uuid,
        assigner_level: Uuid,
        assignee_level: Uuid,
    ) -> Result<bool> {
        let Some(assigner) = self.level_in_company(company_id, assigner_level).await? else {
            tracing::debug!(%assigner_level, "assigner level not resolvable, denying");
            return Ok(false);
        };
        let Some(assignee) = self.level_in_company(company_id, assignee_level).await? else {
            tracing::debug!(%assignee_level, "assignee level not resolvable, denying");
            return Ok(false);
        };

        Ok(assigner.outranks(&assignee))
    }

    /// Does `assignee` have room for one more task on the day containing `as_of`?
    pub async fn check_daily_quota(
        &self,
        assignee: Uuid,
        assignee_level: &HierarchyLevel,
        as_of: DateTime<Utc>,
    ) -> Result<bool> {
        if assignee_level.max_tasks_per_day == 0 {
            return Ok(false);
        }

        let (start, end) = self.day_boundary.day_bounds(as_of);
        let today = self.directory.count_tasks(assignee, start, end).await?;

        tracing::debug!(
            %assignee,
            today,
            max = assignee_level.max_tasks_per_day,
            "daily quota check"
        );

        Ok(today < u64::from(assignee_level.max_tasks_per_day))
    }

    /// Build the predicate for the tasks `requesting_user` may see.
    ///
    /// Company admins see the whole company. Everyone else sees their own tasks plus
    /// those of company users at a strictly greater rank.
    pub async fn visible_task_filter(&self, requesting_user: Uuid) -> Result<TaskScope> {
        let user = self
            .directory
            .get_user(requesting_user)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", requesting_user)))?;

        let company_id = user.company_id.ok_or_else(|| {
            AppError::Forbidden(format!("User {} does not belong to a company", user.id))
        })?;

        if user.is_company_admin() {
            return Ok(TaskScope::Company { company_id });
        }

        let mut assignees = BTreeSet::from([user.id]);

        let own_level = match user.hierarchy_level_id {
            Some(level_id) => self.level_in_company(company_id, level_id).await?,
            None => None,
        };
        let Some(own_level) = own_level else {
            return Ok(TaskScope::Assignees {
                company_id,
                assignees,
            });
        };

        // users -> levels -> rank; memoized for this call only
        let mut ranks: HashMap<Uuid, Option<u32>> = HashMap::new();
        for other in self.directory.list_users_in_company(company_id).await? {
            let Some(level_id) = other.hierarchy_level_id else {
                continue;
            };
            let rank = match ranks.get(&level_id) {
                Some(rank) => *rank,
                None => {
                    let rank = self
                        .level_in_company(company_id, level_id)
                        .await?
                        .map(|l| l.rank);
                    ranks.insert(level_id, rank);
                    rank
                }
            };
            if rank.is_some_and(|r| r > own_level.rank) {
                assignees.insert(other.id);
            }
        }

        Ok(TaskScope::Assignees {
            company_id,
            assignees,
        })
    }
}
