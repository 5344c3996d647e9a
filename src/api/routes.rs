use axum::{
    middleware,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;

use crate::api::{records, AppState};
use crate::auth::{api as auth_api, auth_middleware, AuthState};

/// Create the API router.
///
/// Auth and record routes are mounted under `prefix` (empty mounts them at the
/// root); `/health` always sits at the root.
pub fn create_router(auth_state: AuthState, app_state: AppState, prefix: &str) -> Router {
    let jwt_handler = auth_state.jwt_handler.clone();

    let auth_routes = Router::new()
        .route("/Signup", post(auth_api::signup))
        .route("/Login", post(auth_api::login))
        .route("/token", post(auth_api::refresh_token))
        .route("/Logout", post(auth_api::logout))
        .with_state(auth_state);

    let record_routes = Router::new()
        .route("/patientinfo", post(records::create_patient))
        .route("/doctorinfo", post(records::create_doctor))
        .route("/hospitalinfo", post(records::create_hospital))
        .route("/illnessinfo", post(records::create_illness))
        .route("/getpatientinfo/:id", get(records::get_patient))
        .route("/patients", get(records::list_patients))
        .route("/patient/:id", delete(records::delete_patient))
        .route("/patient/:id/updateRecords", put(records::update_records))
        .route("/user/:userId/profile", get(records::user_profile))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/setting", post(auth_api::setting))
        .route("/home", post(auth_api::home))
        .route("/mypatients", get(records::my_patients))
        .route_layer(middleware::from_fn_with_state(jwt_handler, auth_middleware))
        .with_state(app_state);

    let api = auth_routes.merge(record_routes).merge(protected_routes);
    let api = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    Router::new().route("/health", get(health_check)).merge(api)
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ===== Response Types =====

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
