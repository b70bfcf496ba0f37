use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract::ExtractedJob;
use crate::models::{Job, JobStatus, NewJob};
use crate::store::{DataStore, StoreError};

const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

pub fn parse_job_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("draft {0} not found")]
    UnknownDraft(Uuid),
    #[error("draft {0} is already being saved")]
    Busy(Uuid),
    #[error("invalid job date {0:?}")]
    InvalidDate(Option<String>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftIssue {
    MissingLot,
    InvalidDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftState {
    Pending,
    Saving,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDraft {
    pub temp_id: Uuid,
    pub fields: ExtractedJob,
    pub job_date: Option<NaiveDate>,
    pub issues: Vec<DraftIssue>,
    pub state: DraftState,
}

impl ImportDraft {
    pub fn new(mut fields: ExtractedJob, today: NaiveDate) -> Self {
        let mut issues = Vec::new();

        let job_date = match fields.date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let parsed = parse_job_date(raw);
                if parsed.is_none() {
                    issues.push(DraftIssue::InvalidDate);
                }
                parsed
            }
            _ => {
                fields.date = Some(today.format("%-m/%-d/%Y").to_string());
                Some(today)
            }
        };

        if fields
            .lot_number
            .as_deref()
            .map_or(true, |lot| lot.trim().is_empty())
        {
            issues.push(DraftIssue::MissingLot);
        }

        Self {
            temp_id: Uuid::new_v4(),
            fields,
            job_date,
            issues,
            state: DraftState::Pending,
        }
    }

    pub fn to_new_job(&self, actor: Uuid) -> Result<NewJob, ImportError> {
        let job_date = self
            .job_date
            .ok_or_else(|| ImportError::InvalidDate(self.fields.date.clone()))?;
        let fields = &self.fields;
        Ok(NewJob {
            id: Uuid::new_v4(),
            job_date,
            lot_number: fields.lot_number.clone(),
            company_name: fields.company_name.clone(),
            address: fields.address.clone(),
            assets: fields.assets.clone(),
            comments: fields.comments.clone(),
            contact_name: fields.contact_name.clone(),
            contact_detail: fields.contact_detail.clone(),
            status: JobStatus::Pending,
            created_by: Some(actor),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalFailure {
    pub temp_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub created: Vec<Job>,
    pub failures: Vec<ApprovalFailure>,
}

#[derive(Debug, Clone, Default)]
pub struct DraftList {
    drafts: Vec<ImportDraft>,
}

impl DraftList {
    pub fn from_extracted(jobs: Vec<ExtractedJob>, today: NaiveDate) -> Self {
        Self {
            drafts: jobs
                .into_iter()
                .map(|fields| ImportDraft::new(fields, today))
                .collect(),
        }
    }

    pub fn drafts(&self) -> &[ImportDraft] {
        &self.drafts
    }

    pub fn into_drafts(self) -> Vec<ImportDraft> {
        self.drafts
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn get(&self, temp_id: Uuid) -> Option<&ImportDraft> {
        self.drafts.iter().find(|draft| draft.temp_id == temp_id)
    }

    pub async fn approve_row(
        &mut self,
        store: &dyn DataStore,
        temp_id: Uuid,
        actor: Uuid,
    ) -> Result<Job, ImportError> {
        let index = self
            .drafts
            .iter()
            .position(|draft| draft.temp_id == temp_id)
            .ok_or(ImportError::UnknownDraft(temp_id))?;
        if self.drafts[index].state == DraftState::Saving {
            return Err(ImportError::Busy(temp_id));
        }

        let new_job = self.drafts[index].to_new_job(actor)?;
        self.drafts[index].state = DraftState::Saving;

        match store.insert_job(new_job).await {
            Ok(job) => {
                self.drafts.retain(|draft| draft.temp_id != temp_id);
                info!(job_id = %job.id, temp_id = %temp_id, "import row approved");
                Ok(job)
            }
            Err(err) => {
                if let Some(draft) = self.drafts.iter_mut().find(|d| d.temp_id == temp_id) {
                    draft.state = DraftState::Pending;
                }
                warn!(temp_id = %temp_id, error = %err, "failed to save import row");
                Err(err.into())
            }
        }
    }

    pub fn reject_row(&mut self, temp_id: Uuid) -> bool {
        let before = self.drafts.len();
        self.drafts.retain(|draft| draft.temp_id != temp_id);
        self.drafts.len() < before
    }

    pub async fn approve_all(&mut self, store: &dyn DataStore, actor: Uuid) -> ApprovalSummary {
        let pending: Vec<Uuid> = self
            .drafts
            .iter()
            .filter(|draft| draft.state == DraftState::Pending)
            .map(|draft| draft.temp_id)
            .collect();

        let mut summary = ApprovalSummary::default();
        for temp_id in pending {
            match self.approve_row(store, temp_id, actor).await {
                Ok(job) => summary.created.push(job),
                Err(err) => summary.failures.push(ApprovalFailure {
                    temp_id,
                    error: err.to_string(),
                }),
            }
        }
        summary
    }
}
