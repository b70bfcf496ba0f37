use chrono::{NaiveDateTime, TimeDelta};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DashboardShare, NewDashboardShare};
use crate::store::{DataStore, StoreError, StoreResult};

pub const MAX_SHARE_HOURS: i64 = 24 * 365;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("expiration_hours must be between 1 and {MAX_SHARE_HOURS}, got {0}")]
    InvalidExpiry(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub fn generate_share_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_share_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn share_expiry(now: NaiveDateTime, expiration_hours: i64) -> Result<NaiveDateTime, ShareError> {
    if !(1..=MAX_SHARE_HOURS).contains(&expiration_hours) {
        return Err(ShareError::InvalidExpiry(expiration_hours));
    }
    TimeDelta::try_hours(expiration_hours)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(ShareError::InvalidExpiry(expiration_hours))
}

pub async fn create_share(
    store: &dyn DataStore,
    name: &str,
    expiration_hours: i64,
    created_by: Uuid,
    now: NaiveDateTime,
) -> Result<(DashboardShare, String), ShareError> {
    let expires_at = share_expiry(now, expiration_hours)?;
    let token = generate_share_token();
    let share = store
        .insert_share(NewDashboardShare {
            id: Uuid::new_v4(),
            name: name.to_string(),
            token_hash: hash_share_token(&token),
            created_by: Some(created_by),
            expires_at,
        })
        .await?;
    Ok((share, token))
}

pub async fn resolve_share(
    store: &dyn DataStore,
    token: &str,
    now: NaiveDateTime,
) -> StoreResult<Option<DashboardShare>> {
    let share = store.find_share(&hash_share_token(token)).await?;
    Ok(share.filter(|share| share.expires_at > now))
}
