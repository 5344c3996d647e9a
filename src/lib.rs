//! Medical Record Backend Library
//!
//! Caregiver accounts with JWT sessions, plus patients and the doctors,
//! hospitals and illnesses linked to them, over one SQLite database.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod records;

pub use config::Config;
pub use db::Database;
pub use error::ApiError;
