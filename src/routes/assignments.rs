use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::board::{attach_assignees, Assignee};
use crate::error::{AppError, AppResult};
use crate::geo::DistanceCache;
use crate::models::Job;
use crate::state::AppState;
use crate::store::JobQuery;

#[derive(Debug, Deserialize)]
pub struct SyncAssignmentsRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SyncAssignmentsResponse {
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
    pub assignees: Vec<Assignee>,
}

#[derive(Debug, Deserialize)]
pub struct UnassignQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct UnassignResponse {
    pub jobs: usize,
    pub removed: usize,
}

async fn load_job(state: &AppState, job_id: Uuid) -> AppResult<Job> {
    state
        .store
        .get_job(job_id)
        .await?
        .ok_or_else(AppError::not_found)
}

async fn assignees_for(state: &AppState, job: Job) -> AppResult<Vec<Assignee>> {
    let mut board = attach_assignees(state.store.as_ref(), vec![job], &DistanceCache::new()).await?;
    Ok(board.pop().map(|entry| entry.assignees).unwrap_or_default())
}

pub async fn list_assignments(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<Assignee>>> {
    user.require_admin()?;
    let job = load_job(&state, job_id).await?;
    Ok(Json(assignees_for(&state, job).await?))
}

pub async fn sync_assignments(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<SyncAssignmentsRequest>,
) -> AppResult<Json<SyncAssignmentsResponse>> {
    user.require_admin()?;
    let job = load_job(&state, job_id).await?;

    let current: HashSet<Uuid> = state
        .store
        .assignments_for_jobs(&[job_id])
        .await?
        .into_iter()
        .map(|assignment| assignment.user_id)
        .collect();

    let mut seen = HashSet::new();
    let wanted: Vec<Uuid> = payload
        .user_ids
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect();
    let added: Vec<Uuid> = wanted
        .iter()
        .copied()
        .filter(|id| !current.contains(id))
        .collect();
    let removed: Vec<Uuid> = current
        .iter()
        .copied()
        .filter(|id| !seen.contains(id))
        .collect();

    if !removed.is_empty() {
        state.store.delete_assignments(job_id, &removed).await?;
    }
    if !added.is_empty() {
        state.store.insert_assignments(job_id, &added).await?;
    }
    info!(job_id = %job_id, added = added.len(), removed = removed.len(), "assignments synced");

    state.push.notify_assigned(&job, &added).await;

    let assignees = assignees_for(&state, job).await?;
    Ok(Json(SyncAssignmentsResponse {
        added,
        removed,
        assignees,
    }))
}

pub async fn unassign_date(
    State(state): State<AppState>,
    Query(params): Query<UnassignQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<UnassignResponse>> {
    user.require_admin()?;
    let jobs = state.store.list_jobs(&JobQuery::on_date(params.date)).await?;
    let job_ids: Vec<Uuid> = jobs.iter().map(|job| job.id).collect();
    let removed = if job_ids.is_empty() {
        0
    } else {
        state.store.delete_assignments_for_jobs(&job_ids).await?
    };
    info!(date = %params.date, jobs = job_ids.len(), removed, "unassigned jobs for date");
    Ok(Json(UnassignResponse {
        jobs: job_ids.len(),
        removed,
    }))
}
