use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::extract::ExtractedJob;
use crate::import::{ApprovalSummary, DraftList, ImportDraft};
use crate::models::{Job, NewImportBatch, NewImportRow};
use crate::realtime::JobChange;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
    pub source_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApproveAllRequest {
    pub jobs: Vec<ExtractedJob>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractResponse {
    pub batch_id: Uuid,
    pub count: usize,
    pub drafts: Vec<ImportDraft>,
}

pub async fn extract_jobs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ExtractRequest>,
) -> AppResult<Json<ExtractResponse>> {
    user.require_admin()?;
    let extractor = state.extractor()?;
    let today = Utc::now().date_naive();

    let extracted = extractor.extract(&payload.text, today).await?;

    let batch_id = Uuid::new_v4();
    let rows = extracted
        .iter()
        .map(|job| {
            Ok(NewImportRow {
                id: Uuid::new_v4(),
                batch_id,
                extracted: serde_json::to_value(job)?,
                is_selected: true,
            })
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    let source_type = payload
        .source_type
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "text".to_string());
    state
        .store
        .record_import(
            NewImportBatch {
                id: batch_id,
                source_type,
                raw_text: payload.text,
                created_by: Some(user.user_id),
            },
            rows,
        )
        .await?;

    let drafts = DraftList::from_extracted(extracted, today).into_drafts();
    info!(batch_id = %batch_id, count = drafts.len(), "import batch extracted");
    Ok(Json(ExtractResponse {
        batch_id,
        count: drafts.len(),
        drafts,
    }))
}

pub async fn approve_job(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(fields): Json<ExtractedJob>,
) -> AppResult<(StatusCode, Json<Job>)> {
    user.require_admin()?;
    let mut drafts = DraftList::from_extracted(vec![fields], Utc::now().date_naive());
    let temp_id = drafts
        .drafts()
        .first()
        .map(|draft| draft.temp_id)
        .ok_or_else(|| AppError::bad_request("nothing to approve"))?;

    let job = drafts
        .approve_row(state.store.as_ref(), temp_id, user.user_id)
        .await?;
    state.feed.publish(JobChange::Insert {
        record: job.clone(),
    });
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn approve_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ApproveAllRequest>,
) -> AppResult<Json<ApprovalSummary>> {
    user.require_admin()?;
    if payload.jobs.is_empty() {
        return Err(AppError::bad_request("nothing to approve"));
    }

    let mut drafts = DraftList::from_extracted(payload.jobs, Utc::now().date_naive());
    let summary = drafts.approve_all(state.store.as_ref(), user.user_id).await;
    for job in &summary.created {
        state.feed.publish(JobChange::Insert {
            record: job.clone(),
        });
    }
    info!(
        created = summary.created.len(),
        failed = summary.failures.len(),
        "import rows approved"
    );
    Ok(Json(summary))
}
