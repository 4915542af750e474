// =============================================================================
// Rooted Hearts Backend - Authentication Handlers
// =============================================================================

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rooted_hearts_common::moderation::has_full_access;
use rooted_hearts_common::{MembershipTier, UserStatus};
use serde::{Deserialize, Serialize};

use crate::db::{NewUser, User, UserResponse};
use crate::error::AppError;
use crate::AppState;

const MIN_PASSWORD_CHARS: usize = 8;

// -----------------------------------------------------------------------------
// JWT Claims
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub exp: i64,     // Expiry timestamp
    pub iat: i64,     // Issued at
}

// -----------------------------------------------------------------------------
// Auth Extractor
// -----------------------------------------------------------------------------

/// Authenticated user extracted from JWT token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| AppError::Auth("Missing authorization header".into()))?;
        let claims = validate_token(&token, &state.config.jwt_secret)?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

impl AuthUser {
    /// Load the caller's account, applying any elapsed suspension first.
    pub async fn load(&self, state: &AppState) -> Result<User, AppError> {
        state
            .db
            .load_user(&self.user_id, Utc::now())
            .await?
            .ok_or_else(|| AppError::Auth("Account no longer exists".into()))
    }
}

/// Reject callers who have not passed the assessment or are suspended.
pub fn require_full_access(user: &User) -> Result<(), AppError> {
    let status = user.effective_status(Utc::now());
    if status == UserStatus::Suspended {
        let until = user
            .suspension_end_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        return Err(AppError::Forbidden(format!("Account suspended until {}", until)));
    }
    if !has_full_access(status, user.assessment_passed) {
        return Err(AppError::Forbidden(
            "Pass the alignment assessment to unlock this feature".into(),
        ));
    }
    Ok(())
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".into()))
    }
}

// -----------------------------------------------------------------------------
// Request/Response Types
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub membership_tier: Option<MembershipTier>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub token: String,
}

// -----------------------------------------------------------------------------
// Helper Functions
// -----------------------------------------------------------------------------

/// Hash a password using Argon2.
fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::Internal)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a JWT token for a user.
pub fn generate_token(user_id: &str, secret: &str, expiry_hours: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal)
}

/// Validate a JWT token and extract claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Extract token from Authorization header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email address is required".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    if req.display_name.trim().is_empty() {
        return Err(AppError::BadRequest("Display name is required".into()));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------------

/// Register a new user. New accounts start in Growth Mode until they pass.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate_registration(&req)?;

    if state.db.is_identity_revoked(&req.email).await? {
        tracing::warn!("Registration attempt with a revoked identity");
        return Err(AppError::IdentityRevoked);
    }

    // Check if user exists
    if state.db.find_user_by_email(&req.email).await?.is_some() {
        return Err(AppError::UserExists);
    }

    let password_hash = hash_password(&req.password)?;

    let user_id = uuid::Uuid::new_v4().to_string();
    let user = state
        .db
        .create_user(NewUser {
            id: &user_id,
            email: &req.email,
            password_hash: &password_hash,
            display_name: req.display_name.trim(),
            membership_tier: req.membership_tier.unwrap_or(MembershipTier::Monthly),
            is_admin: state.config.is_admin_email(&req.email),
        })
        .await
        .map_err(duplicate_email)?;

    tracing::info!(user_id = %user.id, is_admin = user.is_admin, "User registered");

    let token = generate_token(&user.id, &state.config.jwt_secret, state.config.jwt_expiry_hours)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// A concurrent registration can win the race past the lookup above; the
/// UNIQUE index on `users.email` still reports it as a conflict.
fn duplicate_email(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::UserExists,
        other => other.into(),
    }
}

/// Login with email and password.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .db
        .find_user_by_email(&req.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    // Pick up an elapsed suspension before handing back the profile
    let user = state
        .db
        .load_user(&user.id, Utc::now())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let token = generate_token(&user.id, &state.config.jwt_secret, state.config.jwt_expiry_hours)?;

    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// Get current user from token.
pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = auth.load(&state).await?;
    Ok(Json(user.into()))
}

/// Refresh auth token.
pub async fn refresh_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<RefreshResponse>, AppError> {
    // Removed accounts cannot refresh
    auth.load(&state).await?;

    let new_token = generate_token(&auth.user_id, &state.config.jwt_secret, state.config.jwt_expiry_hours)?;

    Ok(Json(RefreshResponse { token: new_token }))
}
