//! Service configuration
//!
//! Every setting can come from a CLI flag or the environment (`.env` files are
//! loaded first by the binary).

use clap::{Parser, ValueEnum};
use serde::Serialize;

const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-in-production";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-in-production";

/// Lowest bcrypt work factor the credential store accepts.
pub const MIN_BCRYPT_COST: u32 = 10;

/// Which sub-records the owner profile counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileCountScope {
    /// Only doctors/hospitals/illnesses linked to the owner's own patients
    #[default]
    Owner,
    /// Every linked doctor/hospital/illness in the database
    Global,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "medrecord")]
#[command(about = "Medical record keeping API: patients, doctors, hospitals and illnesses")]
pub struct Config {
    /// Path to the SQLite database
    #[arg(long, env = "DATABASE_PATH", default_value = "./medrecord.db")]
    pub database_path: String,

    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5001)]
    pub port: u16,

    /// Path prefix all record and auth routes are mounted under
    #[arg(long, env = "API_PREFIX", default_value = "/app/api")]
    pub api_prefix: String,

    /// HMAC secret for access tokens
    #[arg(long, env = "ACCESS_TOKEN_SECRET", default_value = DEV_ACCESS_SECRET, hide_env_values = true)]
    pub access_token_secret: String,

    /// HMAC secret for refresh tokens
    #[arg(long, env = "REFRESH_TOKEN_SECRET", default_value = DEV_REFRESH_SECRET, hide_env_values = true)]
    pub refresh_token_secret: String,

    /// Access token lifetime in seconds (at least 1)
    #[arg(
        long,
        env = "ACCESS_TOKEN_TTL_SECS",
        default_value_t = 15 * 60,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub access_token_ttl_secs: u32,

    /// Refresh token lifetime in seconds (at least 1)
    #[arg(
        long,
        env = "REFRESH_TOKEN_TTL_SECS",
        default_value_t = 10 * 60,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub refresh_token_ttl_secs: u32,

    /// bcrypt work factor (values below 10 are raised to 10)
    #[arg(long, env = "BCRYPT_COST", default_value_t = MIN_BCRYPT_COST)]
    pub bcrypt_cost: u32,

    /// Scope of the doctor/hospital/illness counts in the owner profile
    #[arg(long, env = "PROFILE_COUNT_SCOPE", value_enum, default_value_t = ProfileCountScope::Owner)]
    pub profile_count_scope: ProfileCountScope,

    /// How often expired refresh sessions are pruned, in seconds
    #[arg(long, env = "SESSION_PRUNE_SECS", default_value_t = 60)]
    pub session_prune_secs: u64,
}

impl Config {
    /// Listen address in `host:port` form
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn effective_bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost.max(MIN_BCRYPT_COST)
    }

    /// True while either token secret is still the built-in development value
    pub fn uses_dev_secrets(&self) -> bool {
        self.access_token_secret == DEV_ACCESS_SECRET
            || self.refresh_token_secret == DEV_REFRESH_SECRET
    }

    /// Route prefix normalized to `/segment` form (empty string for root)
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.api_prefix.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        }
    }
}
