pub mod jwt;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Profile, ProfileStatus, Role},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedInUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }
}

impl TryFrom<SignedInUser> for AuthenticatedUser {
    type Error = AppError;

    fn try_from(user: SignedInUser) -> Result<Self, Self::Error> {
        match user.profile {
            Some(profile) if profile.status == ProfileStatus::Active => Ok(AuthenticatedUser {
                user_id: user.user_id,
                email: user.email,
                role: profile.role,
            }),
            _ => Err(AppError::inactive()),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SignedInUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<SignedInUser>() {
            return Ok(user.clone());
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        let profile = state.store.get_profile(claims.sub).await?;
        let user = SignedInUser {
            user_id: claims.sub,
            email: claims.email,
            profile,
        };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        SignedInUser::from_request_parts(parts, state).await?.try_into()
    }
}
