use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::push::{DeliveryReport, PushError, PushMessage, SubscriptionRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub target_user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
}

pub async fn public_key(State(state): State<AppState>) -> AppResult<Json<PublicKeyResponse>> {
    let public_key = state
        .push
        .public_key()
        .ok_or(PushError::NotConfigured)?
        .to_string();
    Ok(Json(PublicKeyResponse { public_key }))
}

pub async fn subscribe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SubscriptionRequest>,
) -> AppResult<(StatusCode, Json<SubscriptionResponse>)> {
    let subscription = state.push.register(user.user_id, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse {
            id: subscription.id,
        }),
    ))
}

pub async fn send_notification(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<SendRequest>,
) -> AppResult<Json<DeliveryReport>> {
    user.require_admin()?;

    let title = payload.title.filter(|value| !value.trim().is_empty());
    let body = payload.body.filter(|value| !value.trim().is_empty());
    let (Some(title), Some(body)) = (title, body) else {
        return Err(AppError::bad_request("title and body are required"));
    };

    let message = PushMessage {
        title,
        body,
        url: payload.url,
    };
    let report = state.push.broadcast(&message, payload.target_user_id).await?;
    Ok(Json(report))
}
