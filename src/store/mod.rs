use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Assignment, DashboardShare, ImportBatch, Job, JobStatus, NewDashboardShare, NewImportBatch,
    NewImportRow, NewJob, NewPushSubscription, Profile, ProfileStatus, PushSubscription, Role,
};

pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => StoreError::NotFound,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => StoreError::Conflict(info.message().to_string()),
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Selects jobs by id set and/or date. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobQuery {
    pub ids: Option<Vec<Uuid>>,
    pub date: Option<NaiveDate>,
}

impl JobQuery {
    pub fn on_date(date: NaiveDate) -> Self {
        Self {
            ids: None,
            date: Some(date),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub contact_number: Option<String>,
    pub role: Option<Role>,
    pub status: Option<ProfileStatus>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.contact_number.is_none()
            && self.role.is_none()
            && self.status.is_none()
    }
}

/// The hosted tables the tracker reads and writes. Nothing here enforces
/// the one-active-job rule; callers own every invariant.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    /// Jobs ordered by `job_date`, oldest first.
    async fn list_jobs(&self, query: &JobQuery) -> StoreResult<Vec<Job>>;

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>>;

    async fn insert_job(&self, job: NewJob) -> StoreResult<Job>;

    async fn delete_job(&self, id: Uuid) -> StoreResult<bool>;

    async fn update_job_status(
        &self,
        id: Uuid,
        status: JobStatus,
        updated_by: Uuid,
    ) -> StoreResult<Job>;

    async fn assigned_job_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn assignments_for_jobs(&self, job_ids: &[Uuid]) -> StoreResult<Vec<Assignment>>;

    async fn insert_assignments(
        &self,
        job_id: Uuid,
        user_ids: &[Uuid],
    ) -> StoreResult<Vec<Assignment>>;

    async fn update_assignment_status(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        status: JobStatus,
    ) -> StoreResult<()>;

    async fn delete_assignments(&self, job_id: Uuid, user_ids: &[Uuid]) -> StoreResult<usize>;

    async fn delete_assignments_for_jobs(&self, job_ids: &[Uuid]) -> StoreResult<usize>;

    /// Profiles ordered by full name.
    async fn list_profiles(&self) -> StoreResult<Vec<Profile>>;

    async fn profiles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>>;

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Profile>;

    /// All subscriptions, or only those belonging to `user_id`.
    async fn push_subscriptions(&self, user_id: Option<Uuid>)
        -> StoreResult<Vec<PushSubscription>>;

    /// Deletes any subscription with the same endpoint, then inserts.
    async fn replace_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> StoreResult<PushSubscription>;

    async fn delete_push_subscription(&self, id: Uuid) -> StoreResult<()>;

    async fn insert_share(&self, share: NewDashboardShare) -> StoreResult<DashboardShare>;

    async fn find_share(&self, token_hash: &str) -> StoreResult<Option<DashboardShare>>;

    async fn record_import(
        &self,
        batch: NewImportBatch,
        rows: Vec<NewImportRow>,
    ) -> StoreResult<ImportBatch>;
}
