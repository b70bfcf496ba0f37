use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::board::{attach_assignees, BoardJob};
use crate::error::{AppError, AppResult};
use crate::geo::DistanceCache;
use crate::shares::{create_share as store_share, resolve_share};
use crate::state::AppState;
use crate::stats::{attach_contacts, calculate_employee_stats, EmployeeStats};
use crate::store::JobQuery;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub date: Option<NaiveDate>,
    pub jobs: Vec<BoardJob>,
    pub stats: Vec<EmployeeStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub name: String,
    pub expiration_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub id: Uuid,
    pub name: String,
    pub token: String,
    pub expires_at: NaiveDateTime,
}

async fn build_dashboard(state: &AppState, date: Option<NaiveDate>) -> AppResult<DashboardResponse> {
    let jobs = state.store.list_jobs(&JobQuery { ids: None, date }).await?;
    let jobs = attach_assignees(state.store.as_ref(), jobs, &DistanceCache::new()).await?;

    let mut stats = calculate_employee_stats(&jobs);
    if !stats.is_empty() {
        let user_ids: Vec<Uuid> = stats.iter().map(|entry| entry.user_id).collect();
        let profiles = state.store.profiles_by_ids(&user_ids).await?;
        attach_contacts(&mut stats, &profiles);
    }

    Ok(DashboardResponse {
        date,
        jobs,
        stats,
        share_name: None,
    })
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<DashboardResponse>> {
    user.require_admin()?;
    Ok(Json(build_dashboard(&state, params.date).await?))
}

pub async fn create_share(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateShareRequest>,
) -> AppResult<(StatusCode, Json<ShareResponse>)> {
    user.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    let hours = payload
        .expiration_hours
        .unwrap_or(state.config.share_default_expiry_hours);
    let now = Utc::now().naive_utc();
    let (share, token) = store_share(state.store.as_ref(), name, hours, user.user_id, now).await?;
    info!(share_id = %share.id, expires_at = %share.expires_at, "dashboard share created");

    Ok((
        StatusCode::CREATED,
        Json(ShareResponse {
            id: share.id,
            name: share.name,
            token,
            expires_at: share.expires_at,
        }),
    ))
}

pub async fn shared_dashboard(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<DashboardQuery>,
) -> AppResult<Json<DashboardResponse>> {
    let now = Utc::now().naive_utc();
    let share = resolve_share(state.store.as_ref(), &token, now)
        .await?
        .ok_or_else(AppError::unauthorized)?;

    let mut response = build_dashboard(&state, params.date).await?;
    response.share_name = Some(share.name);
    Ok(Json(response))
}
