//! JWT Token Handler
//! Mission: Generate and validate access and refresh tokens securely
//!
//! Access and refresh tokens are signed with separate secrets, so a refresh
//! token can never pass as an access token and vice versa.

use crate::auth::models::{Claims, RefreshClaims, User};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 10 * 60;

/// A freshly signed refresh token plus what the session store needs to track it
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT Handler for token operations
pub struct JwtHandler {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtHandler {
    /// Create a handler with 15-minute access and 10-minute refresh tokens
    pub fn new(access_secret: String, refresh_secret: String) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
        }
    }

    pub fn with_ttls(mut self, access_secs: u32, refresh_secs: u32) -> Self {
        self.access_ttl = Duration::seconds(i64::from(access_secs));
        self.refresh_ttl = Duration::seconds(i64::from(refresh_secs));
        self
    }

    /// Generate an access token for a user, returns the token and its lifetime in seconds
    pub fn generate_access_token(&self, user: &User) -> Result<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(self.access_ttl)
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp() as usize,
            exp: expiration,
        };

        debug!(
            "Generating access token for {} ({}), expires in {}s",
            user.email,
            user.id,
            self.access_ttl.num_seconds()
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.access_secret.as_bytes()),
        )
        .context("Failed to generate access token")?;

        Ok((token, self.access_ttl.num_seconds().max(0) as usize))
    }

    /// Generate a refresh token carrying the user's email and a fresh session id
    pub fn generate_refresh_token(&self, user: &User) -> Result<IssuedRefreshToken> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.refresh_ttl)
            .context("Invalid timestamp")?;

        let claims = RefreshClaims {
            sub: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp() as usize,
            exp: expires_at.timestamp() as usize,
        };

        debug!("Generating refresh token for {}", user.email);

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.refresh_secret.as_bytes()),
        )
        .context("Failed to generate refresh token")?;

        Ok(IssuedRefreshToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }

    /// Validate an access token and extract claims
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.access_secret.as_bytes()),
            &strict_validation(),
        )
        .context("Invalid or expired token")?;

        debug!("Validated access token for {}", decoded.claims.email);

        Ok(decoded.claims)
    }

    /// Validate a refresh token and extract claims
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims> {
        let decoded = decode::<RefreshClaims>(
            token,
            &DecodingKey::from_secret(self.refresh_secret.as_bytes()),
            &strict_validation(),
        )
        .context("Invalid or expired refresh token")?;

        Ok(decoded.claims)
    }
}

fn strict_validation() -> Validation {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation
}
