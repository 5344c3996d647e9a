//! HTTP surface: shared state, record handlers and the router

pub mod records;
pub mod routes;

use crate::auth::UserStore;
use crate::config::ProfileCountScope;
use crate::records::RecordStore;
use serde::Serialize;
use std::sync::Arc;

pub use routes::create_router;

/// Shared state for the record endpoints
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<RecordStore>,
    pub users: Arc<UserStore>,
    pub profile_scope: ProfileCountScope,
}

impl AppState {
    pub fn new(
        records: Arc<RecordStore>,
        users: Arc<UserStore>,
        profile_scope: ProfileCountScope,
    ) -> Self {
        Self {
            records,
            users,
            profile_scope,
        }
    }
}

/// `{success: true, data}` envelope
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
