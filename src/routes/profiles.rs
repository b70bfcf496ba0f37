use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, SignedInUser};
use crate::error::{AppError, AppResult};
use crate::models::{Profile, ProfileStatus, Role};
use crate::state::AppState;
use crate::store::ProfileChanges;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub contact_number: Option<String>,
    pub role: Option<Role>,
    pub status: Option<ProfileStatus>,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
    pub active: bool,
    pub profile: Option<Profile>,
}

pub async fn me(user: SignedInUser) -> AppResult<Json<MeResponse>> {
    let role = user
        .profile
        .as_ref()
        .map(|profile| profile.role)
        .unwrap_or_default();
    let active = user
        .profile
        .as_ref()
        .is_some_and(|profile| profile.status == ProfileStatus::Active);
    Ok(Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        role,
        active,
        profile: user.profile,
    }))
}

pub async fn list_profiles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Profile>>> {
    user.require_admin()?;
    Ok(Json(state.store.list_profiles().await?))
}

fn non_blank(field: &str, value: Option<String>) -> AppResult<Option<String>> {
    match value {
        Some(value) if value.trim().is_empty() => {
            Err(AppError::bad_request(format!("{field} must not be empty")))
        }
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<Profile>> {
    let changes_access = payload.role.is_some() || payload.status.is_some();
    if changes_access || profile_id != user.user_id {
        user.require_admin()?;
    }

    let changes = ProfileChanges {
        full_name: non_blank("full_name", payload.full_name)?,
        contact_number: non_blank("contact_number", payload.contact_number)?,
        role: payload.role,
        status: payload.status,
    };
    if changes.is_empty() {
        return Err(AppError::bad_request("no profile fields to update"));
    }

    Ok(Json(state.store.update_profile(profile_id, changes).await?))
}
