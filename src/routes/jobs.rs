use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::NaiveDate;
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::board::{attach_assignees, BoardFilter, BoardJob, BoardMode, BoardSession};
use crate::error::{AppError, AppResult};
use crate::geo::{Coordinates, DistanceCache};
use crate::models::{Job, JobStatus, NewJob};
use crate::realtime::{JobChange, CHANGE_EVENT};
use crate::reconcile::{ConflictResolution, StatusConflict, StatusOutcome};
use crate::state::{AppState, DistanceSession};
use crate::store::JobQuery;

#[derive(Debug, Deserialize)]
pub struct ActiveJobsQuery {
    pub mode: Option<String>,
    pub date: Option<NaiveDate>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: JobStatus,
    #[serde(default)]
    pub confirm_assign: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub conflicting_job_id: Uuid,
    pub resolution: ConflictResolution,
    pub status: JobStatus,
    #[serde(default)]
    pub confirm_assign: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub job_date: NaiveDate,
    pub lot_number: Option<String>,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub assets: Option<String>,
    pub comments: Option<String>,
    pub contact_name: Option<String>,
    pub contact_detail: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub async fn active_jobs(
    State(state): State<AppState>,
    Query(params): Query<ActiveJobsQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<BoardJob>>> {
    let mode = match params.mode.as_deref() {
        None | Some("") => BoardMode::Mine,
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::bad_request(format!("unknown board mode `{raw}`")))?,
    };
    let origin = match (params.lat, params.lng) {
        (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
        (None, None) => None,
        _ => return Err(AppError::bad_request("lat and lng must be given together")),
    };

    let previous = state.distances.lock().await.remove(&user.user_id);
    let cache = match previous {
        Some(session) if session.date == params.date && !params.refresh => session.cache,
        _ => DistanceCache::new(),
    };

    let filter = BoardFilter {
        mode,
        date: params.date,
    };
    let mut session = BoardSession::new(user.user_id, filter).with_distances(cache);
    let loaded = session.refresh(state.store.as_ref()).await;
    if loaded.is_ok() {
        if let Some(origin) = origin {
            session.annotate(&state.annotator, origin).await;
        }
    }

    let jobs = session.jobs().to_vec();
    state.distances.lock().await.insert(
        user.user_id,
        DistanceSession {
            date: params.date,
            cache: session.into_distances(),
        },
    );
    loaded?;
    Ok(Json(jobs))
}

fn outcome_response(outcome: StatusOutcome) -> Response {
    let status = match outcome {
        StatusOutcome::Conflict(_) | StatusOutcome::NeedsConfirmation { .. } => StatusCode::CONFLICT,
        StatusOutcome::Applied { .. } | StatusOutcome::Resynced { .. } => StatusCode::OK,
    };
    (status, Json(outcome)).into_response()
}

async fn open_session(state: &AppState, user: &AuthenticatedUser) -> AppResult<BoardSession> {
    let filter = BoardFilter {
        mode: BoardMode::Mine,
        date: None,
    };
    Ok(BoardSession::open(state.store.as_ref(), user.user_id, filter).await?)
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Response> {
    let mut session = open_session(&state, &user).await?;
    let outcome = state
        .reconciler()
        .set_status(&mut session, job_id, payload.status, payload.confirm_assign)
        .await?;
    info!(user_id = %user.user_id, job_id = %job_id, status = %payload.status, ?outcome, "status change handled");
    Ok(outcome_response(outcome))
}

pub async fn resolve_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<ResolveRequest>,
) -> AppResult<Response> {
    let mut session = open_session(&state, &user).await?;
    let conflict = StatusConflict {
        new_job: job_id,
        new_status: payload.status,
        old_job: payload.conflicting_job_id,
    };
    let outcome = state
        .reconciler()
        .resolve_conflict(&mut session, conflict, payload.resolution, payload.confirm_assign)
        .await?;
    Ok(outcome_response(outcome))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<BoardJob>>> {
    user.require_admin()?;
    let query = JobQuery {
        ids: None,
        date: params.date,
    };
    let jobs = state.store.list_jobs(&query).await?;
    let board = attach_assignees(state.store.as_ref(), jobs, &DistanceCache::new()).await?;
    Ok(Json(board))
}

pub async fn create_job(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<Job>)> {
    user.require_admin()?;
    let job = state
        .store
        .insert_job(NewJob {
            id: Uuid::new_v4(),
            job_date: payload.job_date,
            lot_number: non_blank(payload.lot_number),
            company_name: non_blank(payload.company_name),
            address: non_blank(payload.address),
            assets: non_blank(payload.assets),
            comments: non_blank(payload.comments),
            contact_name: non_blank(payload.contact_name),
            contact_detail: non_blank(payload.contact_detail),
            status: JobStatus::Pending,
            created_by: Some(user.user_id),
        })
        .await?;
    state.feed.publish(JobChange::Insert {
        record: job.clone(),
    });
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    if !state.store.delete_job(job_id).await? {
        return Err(AppError::not_found());
    }
    state.feed.publish(JobChange::Delete { old_id: job_id });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn job_changes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(user_id = %user.user_id, "change stream opened");
    let events = state.feed.stream().filter_map(|change| async move {
        match Event::default().event(CHANGE_EVENT).json_data(&change) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                warn!(error = %err, "failed to encode job change");
                None
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
