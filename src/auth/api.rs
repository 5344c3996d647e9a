//! Authentication API Endpoints
//! Mission: Provide signup, login, token refresh and logout endpoints

use crate::auth::{
    jwt::JwtHandler,
    middleware::extract_claims,
    models::{
        LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, SignupRequest,
        SignupResponse, UserResponse,
    },
    session_store::SessionStore,
    user_store::UserStore,
};
use crate::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
    pub sessions: Arc<SessionStore>,
}

impl AuthState {
    pub fn new(
        user_store: Arc<UserStore>,
        jwt_handler: Arc<JwtHandler>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            user_store,
            jwt_handler,
            sessions,
        }
    }
}

/// Trimmed, non-empty value of an optional field
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Signup endpoint - POST /Signup
pub async fn signup(
    State(state): State<AuthState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<SignupResponse>, ApiError> {
    let Json(payload) = payload?;

    let (Some(name), Some(email), Some(password)) = (
        present(&payload.name),
        present(&payload.email),
        payload.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::Validation("All fields are required".to_string()));
    };

    let user = state
        .user_store
        .create_user(name, email, password)?
        .ok_or_else(|| {
            warn!("Signup rejected, email already registered: {}", email);
            ApiError::Conflict("Email already registered".to_string())
        })?;

    Ok(Json(SignupResponse {
        success: true,
        user: UserResponse::from_user(&user),
    }))
}

/// Login endpoint - POST /Login
pub async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(payload) = payload?;

    let (Some(email), Some(password)) = (present(&payload.email), payload.password.as_deref())
    else {
        return Err(ApiError::Validation("All fields are required".to_string()));
    };

    info!("🔐 Login attempt: {}", email);

    let user = state
        .user_store
        .get_user_by_email(email)?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !UserStore::verify_password(&user, password)? {
        warn!("❌ Failed login attempt: {}", email);
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let (access_token, expires_in) = state.jwt_handler.generate_access_token(&user)?;
    let refresh = state.jwt_handler.generate_refresh_token(&user)?;
    state.sessions.register(&refresh.jti, refresh.expires_at);

    info!("✅ Login successful: {} ({})", user.email, user.id);

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        user_id: user.id.to_string(),
        email: user.email.clone(),
        access_token,
        refresh_token: refresh.token,
        expires_in,
    }))
}

/// Refresh endpoint - POST /token
/// Exchanges a live refresh token for a new access token
pub async fn refresh_token(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let Json(payload) = payload?;
    let token = present(&payload.refresh_token)
        .ok_or_else(|| ApiError::Validation("Refresh token is required".to_string()))?;

    let claims = state
        .jwt_handler
        .validate_refresh_token(token)
        .map_err(|_| ApiError::Forbidden("Invalid or expired token".to_string()))?;

    if !state.sessions.is_active(&claims.jti) {
        warn!("Refresh rejected for revoked or unknown session ({})", claims.sub);
        return Err(ApiError::Forbidden("Invalid or expired token".to_string()));
    }

    let user = state
        .user_store
        .get_user_by_email(&claims.sub)?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let (access_token, expires_in) = state.jwt_handler.generate_access_token(&user)?;
    debug!("Issued refreshed access token for {}", user.email);

    Ok(Json(RefreshResponse {
        success: true,
        access_token,
        expires_in,
    }))
}

/// Logout endpoint - POST /Logout
/// Revokes the refresh session; repeating it is harmless
pub async fn logout(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;
    let token = present(&payload.refresh_token)
        .ok_or_else(|| ApiError::Validation("Refresh token is required".to_string()))?;

    let claims = state
        .jwt_handler
        .validate_refresh_token(token)
        .map_err(|_| ApiError::Forbidden("Invalid or expired token".to_string()))?;

    if state.sessions.revoke(&claims.jti) {
        info!("👋 Logged out: {}", claims.sub);
    } else {
        debug!("Logout for unknown session ({})", claims.sub);
    }

    Ok(Json(json!({
        "success": true,
        "message": "Logged out",
    })))
}

/// Settings placeholder - POST /setting (bearer-gated)
pub async fn setting(req: Request) -> Json<Value> {
    if let Some(claims) = extract_claims(&req) {
        debug!("Settings requested by {}", claims.email);
    }
    Json(json!({ "success": true }))
}

/// Home placeholder - POST /home (bearer-gated)
pub async fn home(req: Request) -> Json<Value> {
    if let Some(claims) = extract_claims(&req) {
        debug!("Home requested by {}", claims.email);
    }
    Json(json!({ "success": true }))
}
