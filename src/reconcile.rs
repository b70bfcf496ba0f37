use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::board::{attach_assignees, Assignee, BoardSession};
use crate::models::JobStatus;
use crate::push::PushService;
use crate::realtime::{ChangeFeed, JobChange};
use crate::store::{DataStore, StoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("job {0} not found")]
    JobNotFound(Uuid),
    #[error("failed to assign job: {0}")]
    Assignment(StoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConflict {
    pub new_job: Uuid,
    pub new_status: JobStatus,
    pub old_job: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusOutcome {
    Applied {
        job_id: Uuid,
        status: JobStatus,
        auto_resolved: Option<Uuid>,
        assigned: bool,
    },
    NeedsConfirmation {
        job_id: Uuid,
    },
    Conflict(StatusConflict),
    Resynced {
        job_id: Uuid,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    Pending,
    PickedUp,
}

impl ConflictResolution {
    pub fn status(self) -> JobStatus {
        match self {
            ConflictResolution::Pending => JobStatus::Pending,
            ConflictResolution::PickedUp => JobStatus::PickedUp,
        }
    }
}

#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn DataStore>,
    feed: Option<ChangeFeed>,
    push: Option<PushService>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            feed: None,
            push: None,
        }
    }

    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn with_push(mut self, push: PushService) -> Self {
        self.push = Some(push);
        self
    }

    pub async fn set_status(
        &self,
        session: &mut BoardSession,
        job_id: Uuid,
        new_status: JobStatus,
        confirm_assign: bool,
    ) -> Result<StatusOutcome, ReconcileError> {
        let actor = session.user_id();
        self.ensure_loaded(session, job_id).await?;

        let mut demote = None;
        if new_status.is_active() {
            if let Some((old_job, shared)) = active_elsewhere(session, job_id) {
                if !shared {
                    return Ok(StatusOutcome::Conflict(StatusConflict {
                        new_job: job_id,
                        new_status,
                        old_job,
                    }));
                }
                demote = Some(old_job);
            }
        }

        let holds_job = session
            .job(job_id)
            .is_some_and(|entry| entry.assignee(actor).is_some());
        if !holds_job && !confirm_assign {
            return Ok(StatusOutcome::NeedsConfirmation { job_id });
        }

        if let Some(old_job) = demote {
            info!(user_id = %actor, job_id = %old_job, "co-worker still active; moving actor back to pending");
            self.execute(session, old_job, JobStatus::Pending).await?;
        }

        if !holds_job {
            self.assign_actor(session, job_id).await?;
        }

        if self.execute(session, job_id, new_status).await? {
            Ok(StatusOutcome::Applied {
                job_id,
                status: new_status,
                auto_resolved: demote,
                assigned: !holds_job,
            })
        } else {
            Ok(StatusOutcome::Resynced { job_id })
        }
    }

    pub async fn resolve_conflict(
        &self,
        session: &mut BoardSession,
        conflict: StatusConflict,
        resolution: ConflictResolution,
        confirm_assign: bool,
    ) -> Result<StatusOutcome, ReconcileError> {
        self.ensure_loaded(session, conflict.old_job).await?;
        if !self
            .execute(session, conflict.old_job, resolution.status())
            .await?
        {
            return Ok(StatusOutcome::Resynced {
                job_id: conflict.old_job,
            });
        }
        self.set_status(session, conflict.new_job, conflict.new_status, confirm_assign)
            .await
    }

    async fn ensure_loaded(
        &self,
        session: &mut BoardSession,
        job_id: Uuid,
    ) -> Result<(), ReconcileError> {
        if session.job(job_id).is_some() {
            return Ok(());
        }
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or(ReconcileError::JobNotFound(job_id))?;
        let mut loaded =
            attach_assignees(self.store.as_ref(), vec![job], session.distances()).await?;
        if let Some(entry) = loaded.pop() {
            session.insert_job(entry);
        }
        Ok(())
    }

    async fn assign_actor(
        &self,
        session: &mut BoardSession,
        job_id: Uuid,
    ) -> Result<(), ReconcileError> {
        let actor = session.user_id();
        let inserted = self
            .store
            .insert_assignments(job_id, &[actor])
            .await
            .map_err(ReconcileError::Assignment)?;

        let full_name = match self.store.get_profile(actor).await {
            Ok(Some(profile)) => profile.full_name,
            _ => "Unknown".to_string(),
        };
        if let Some(entry) = session.job_mut(job_id) {
            entry.assignees.push(Assignee {
                user_id: actor,
                full_name,
                status: inserted.first().map(|a| a.status).unwrap_or_default(),
            });
        }
        info!(user_id = %actor, job_id = %job_id, "worker assigned to job");
        Ok(())
    }

    async fn execute(
        &self,
        session: &mut BoardSession,
        job_id: Uuid,
        status: JobStatus,
    ) -> Result<bool, ReconcileError> {
        let actor = session.user_id();
        if let Some(entry) = session.job_mut(job_id) {
            if let Some(assignee) = entry.assignee_mut(actor) {
                assignee.status = status;
            }
            entry.job.status = status;
            entry.job.last_updated_by = Some(actor);
        }

        match self.store.update_job_status(job_id, status, actor).await {
            Ok(record) => {
                if let Some(entry) = session.job_mut(job_id) {
                    entry.job = record.clone();
                }
                if let Some(push) = &self.push {
                    push.notify_status_change(&record).await;
                }
                if let Some(feed) = &self.feed {
                    feed.publish(JobChange::Update { record });
                }
            }
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "job status write failed; reloading board");
                session.refresh(self.store.as_ref()).await?;
                return Ok(false);
            }
        }

        if let Err(err) = self
            .store
            .update_assignment_status(job_id, actor, status)
            .await
        {
            warn!(job_id = %job_id, user_id = %actor, error = %err, "assignment status write failed");
        }
        Ok(true)
    }
}

fn active_elsewhere(session: &BoardSession, job_id: Uuid) -> Option<(Uuid, bool)> {
    let actor = session.user_id();
    session
        .jobs()
        .iter()
        .filter(|entry| entry.job.id != job_id)
        .find(|entry| {
            entry
                .assignee(actor)
                .is_some_and(|assignee| assignee.status.is_active())
        })
        .map(|entry| (entry.job.id, entry.has_other_active_worker(actor)))
}
