//! Server configuration from the environment

use anyhow::{anyhow, Context};
use std::env;
use std::net::SocketAddr;

use crate::hierarchy::DayBoundary;

const DEFAULT_DATABASE_URL: &str = "sqlite:taskladder.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3002";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// 30 days
const DEFAULT_JWT_EXPIRY_HOURS: i64 = 720;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub bcrypt_cost: u32,
    /// Where quota days start; server local time unless an offset is configured
    pub day_boundary: DayBoundary,
    /// Allowed CORS origin; any origin when unset
    pub frontend_url: Option<String>,
}

impl Config {
    /// Read the configuration. `JWT_SECRET` is the only required variable.
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR is not a valid socket address")?;

        let max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        let jwt_expiry_hours = match env::var("JWT_EXPIRY_HOURS") {
            Ok(v) => v.parse().context("JWT_EXPIRY_HOURS must be an integer")?,
            Err(_) => DEFAULT_JWT_EXPIRY_HOURS,
        };

        let bcrypt_cost = match env::var("BCRYPT_COST") {
            Ok(v) => {
                let cost: u32 = v.parse().context("BCRYPT_COST must be an integer")?;
                if !(4..=31).contains(&cost) {
                    return Err(anyhow!("BCRYPT_COST must be between 4 and 31, got {}", cost));
                }
                cost
            }
            Err(_) => bcrypt::DEFAULT_COST,
        };

        let day_boundary = match env::var("QUOTA_UTC_OFFSET_MINUTES") {
            Ok(v) => {
                let minutes: i32 = v
                    .parse()
                    .context("QUOTA_UTC_OFFSET_MINUTES must be an integer")?;
                DayBoundary::from_offset_minutes(minutes)
                    .ok_or_else(|| anyhow!("QUOTA_UTC_OFFSET_MINUTES out of range: {}", minutes))?
            }
            Err(_) => DayBoundary::Local,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            bind_addr,
            max_connections,
            jwt_secret,
            jwt_expiry_hours,
            bcrypt_cost,
            day_boundary,
            frontend_url: env::var("FRONTEND_URL").ok().filter(|s| !s.is_empty()),
        })
    }
}
