//! Company hierarchy and the authorization rules derived from it
//!
//! A user may only hand work to users at a strictly deeper level, sees the tasks of
//! everyone below them, and each level caps how many tasks its members can receive
//! per day.

pub mod authorizer;
pub mod level;
pub mod scope;

pub use authorizer::{DayBoundary, Directory, HierarchyAuthorizer};
pub use level::{Department, HierarchyLevel, LevelPatch, NewLevel};
pub use scope::TaskScope;
