//! Data models for companies and users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant. Every level, user (except super admins) and task belongs to one company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Platform role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Operates the platform, owns no company
    SuperAdmin,
    /// Top-level administrator of one company
    CompanyAdmin,
    /// Regular member placed in the company hierarchy
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::CompanyAdmin => "company_admin",
            Role::Employee => "employee",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "company_admin" => Ok(Role::CompanyAdmin),
            "employee" => Ok(Role::Employee),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
    /// Current hierarchy level; reassignment replaces it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy_level_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reports_to: Option<Uuid>,
    pub phone: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_company_admin(&self) -> bool {
        self.role == Role::CompanyAdmin
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    /// True if this user is a member (of any role) of the given company
    pub fn belongs_to(&self, company_id: Uuid) -> bool {
        self.company_id == Some(company_id)
    }
}

/// Fields needed to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub company_id: Option<Uuid>,
    pub hierarchy_level_id: Option<Uuid>,
    pub reports_to: Option<Uuid>,
    /// bcrypt hash; `None` leaves password login disabled
    pub password_hash: Option<String>,
}

impl NewUser {
    /// Checks the shape of the record before it reaches the store
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(format!("Invalid email: {}", self.email));
        }
        match self.role {
            Role::SuperAdmin if self.company_id.is_some() => {
                Err("Super admins cannot belong to a company".to_string())
            }
            Role::CompanyAdmin | Role::Employee if self.company_id.is_none() => {
                Err("Company is required".to_string())
            }
            Role::Employee if self.hierarchy_level_id.is_none() => {
                Err("Employees must be placed at a hierarchy level".to_string())
            }
            _ => Ok(()),
        }
    }
}
