// =============================================================================
// Rooted Hearts Backend - Profiles API
// =============================================================================

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rooted_hearts_common::{BackgroundCheckStatus, MembershipTier, UserStatus};
use serde::{Deserialize, Serialize};

use crate::auth::{require_full_access, AuthUser};
use crate::db::{ProfileUpdate, User, UserResponse};
use crate::error::AppError;
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;
const MIN_AGE: i64 = 18;
const MAX_BIO_CHARS: usize = 2000;
const MAX_INTERESTS: usize = 20;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Another member's profile. `photo_url` is present only once photos are
/// unlocked between the two members.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub display_name: String,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub alignment_score: Option<i64>,
    pub background_check_status: BackgroundCheckStatus,
    pub photo_url: Option<String>,
    pub photos_unlocked: bool,
    pub member_since: DateTime<Utc>,
}

impl ProfileResponse {
    fn new(user: User, show_photo: bool) -> Self {
        Self {
            interests: user.interest_list(),
            background_check_status: user.background_check(),
            photo_url: if show_photo { user.photo_url } else { None },
            photos_unlocked: show_photo,
            id: user.id,
            display_name: user.display_name,
            age: user.age,
            gender: user.gender,
            location: user.location,
            bio: user.bio,
            alignment_score: user.alignment_score,
            member_since: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BrowseQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub membership_tier: MembershipTier,
}

// =============================================================================
// Handlers
// =============================================================================

/// Browse active members who have passed the assessment.
pub async fn browse_profiles(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<ProfileResponse>>, AppError> {
    let viewer = auth.load(&state).await?;
    require_full_access(&viewer)?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let users = state.db.browse_profiles(&viewer.id, limit, offset).await?;
    let unlocked = state.db.unlocked_partner_ids(&viewer.id).await?;

    Ok(Json(
        users
            .into_iter()
            .map(|u| {
                let show_photo = unlocked.contains(&u.id);
                ProfileResponse::new(u, show_photo)
            })
            .collect(),
    ))
}

/// Single member profile.
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let viewer = auth.load(&state).await?;
    let now = Utc::now();

    if viewer.id == id {
        return Ok(Json(ProfileResponse::new(viewer, true)));
    }
    if !viewer.is_admin {
        require_full_access(&viewer)?;
    }

    let user = state
        .db
        .load_user(&id, now)
        .await?
        .ok_or(AppError::UserNotFound)?;

    let visible = user.assessment_passed
        && user.effective_status(now) == UserStatus::Active;
    if !visible && !viewer.is_admin {
        return Err(AppError::UserNotFound);
    }

    let show_photo = state.db.unlocked_partner_ids(&viewer.id).await?.contains(&user.id);
    Ok(Json(ProfileResponse::new(user, show_photo)))
}

fn validate_profile_update(update: &ProfileUpdate) -> Result<(), AppError> {
    if let Some(name) = &update.display_name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Display name cannot be empty".into()));
        }
    }
    if let Some(age) = update.age {
        if age < MIN_AGE {
            return Err(AppError::BadRequest(format!("Members must be at least {}", MIN_AGE)));
        }
    }
    if let Some(bio) = &update.bio {
        if bio.chars().count() > MAX_BIO_CHARS {
            return Err(AppError::BadRequest(format!(
                "Bio must be at most {} characters",
                MAX_BIO_CHARS
            )));
        }
    }
    if let Some(interests) = &update.interests {
        if interests.len() > MAX_INTERESTS {
            return Err(AppError::BadRequest(format!(
                "At most {} interests allowed",
                MAX_INTERESTS
            )));
        }
    }
    Ok(())
}

/// Edit the caller's own profile.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserResponse>, AppError> {
    validate_profile_update(&update)?;
    state.db.update_profile(&auth.user_id, &update).await?;

    let user = auth.load(&state).await?;
    Ok(Json(user.into()))
}

/// Change the caller's membership tier.
pub async fn update_membership(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<MembershipRequest>,
) -> Result<Json<UserResponse>, AppError> {
    state
        .db
        .update_membership(&auth.user_id, req.membership_tier)
        .await?;

    let user = auth.load(&state).await?;
    tracing::info!(user_id = %user.id, tier = %req.membership_tier.as_str(), "Membership updated");
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_validation() {
        assert!(validate_profile_update(&ProfileUpdate::default()).is_ok());
        assert!(validate_profile_update(&ProfileUpdate {
            age: Some(17),
            ..Default::default()
        })
        .is_err());
        assert!(validate_profile_update(&ProfileUpdate {
            display_name: Some("   ".into()),
            ..Default::default()
        })
        .is_err());
        assert!(validate_profile_update(&ProfileUpdate {
            interests: Some(vec!["hiking".into(); MAX_INTERESTS + 1]),
            ..Default::default()
        })
        .is_err());
    }
}
