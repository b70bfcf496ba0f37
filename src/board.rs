use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::geo::{Coordinates, DistanceAnnotator, DistanceCache};
use crate::models::{Job, JobStatus, UnknownVariant};
use crate::realtime::{JobChange, SyncAction};
use crate::store::{DataStore, JobQuery, StoreResult};

const UNKNOWN_ASSIGNEE: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardMode {
    #[default]
    Mine,
    All,
}

impl FromStr for BoardMode {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "mine" => Ok(BoardMode::Mine),
            "all" => Ok(BoardMode::All),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardFilter {
    pub mode: BoardMode,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignee {
    pub user_id: Uuid,
    pub full_name: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardJob {
    #[serde(flatten)]
    pub job: Job,
    pub assignees: Vec<Assignee>,
    pub distance: Option<f64>,
}

impl BoardJob {
    pub fn assignee(&self, user_id: Uuid) -> Option<&Assignee> {
        self.assignees.iter().find(|a| a.user_id == user_id)
    }

    pub fn assignee_mut(&mut self, user_id: Uuid) -> Option<&mut Assignee> {
        self.assignees.iter_mut().find(|a| a.user_id == user_id)
    }

    pub fn has_other_active_worker(&self, user_id: Uuid) -> bool {
        self.assignees
            .iter()
            .any(|a| a.user_id != user_id && a.status.is_active())
    }
}

pub async fn load_board(
    store: &dyn DataStore,
    user_id: Uuid,
    filter: &BoardFilter,
    cache: &DistanceCache,
) -> StoreResult<Vec<BoardJob>> {
    let ids = match filter.mode {
        BoardMode::Mine => {
            let ids = store.assigned_job_ids(user_id).await?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            Some(ids)
        }
        BoardMode::All => None,
    };

    let jobs = store
        .list_jobs(&JobQuery {
            ids,
            date: filter.date,
        })
        .await?;
    attach_assignees(store, jobs, cache).await
}

pub async fn attach_assignees(
    store: &dyn DataStore,
    jobs: Vec<Job>,
    cache: &DistanceCache,
) -> StoreResult<Vec<BoardJob>> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let job_ids: Vec<Uuid> = jobs.iter().map(|job| job.id).collect();
    let assignments = store.assignments_for_jobs(&job_ids).await?;

    let mut user_ids: Vec<Uuid> = assignments.iter().map(|a| a.user_id).collect();
    user_ids.sort();
    user_ids.dedup();
    let names: HashMap<Uuid, String> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        store
            .profiles_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile.full_name))
            .collect()
    };

    let mut by_job: HashMap<Uuid, Vec<Assignee>> = HashMap::new();
    for assignment in assignments {
        let full_name = names
            .get(&assignment.user_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_ASSIGNEE.to_string());
        by_job.entry(assignment.job_id).or_default().push(Assignee {
            user_id: assignment.user_id,
            full_name,
            status: assignment.status,
        });
    }

    Ok(jobs
        .into_iter()
        .map(|job| BoardJob {
            assignees: by_job.remove(&job.id).unwrap_or_default(),
            distance: cache.get(&job.id).flatten(),
            job,
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct BoardSession {
    user_id: Uuid,
    filter: BoardFilter,
    jobs: Vec<BoardJob>,
    distances: DistanceCache,
    origin: Option<Coordinates>,
}

impl BoardSession {
    pub fn new(user_id: Uuid, filter: BoardFilter) -> Self {
        Self {
            user_id,
            filter,
            jobs: Vec::new(),
            distances: DistanceCache::new(),
            origin: None,
        }
    }

    pub fn with_distances(mut self, distances: DistanceCache) -> Self {
        self.distances = distances;
        self
    }

    pub async fn open(
        store: &dyn DataStore,
        user_id: Uuid,
        filter: BoardFilter,
    ) -> StoreResult<Self> {
        let mut session = Self::new(user_id, filter);
        session.refresh(store).await?;
        Ok(session)
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn filter(&self) -> BoardFilter {
        self.filter
    }

    pub fn jobs(&self) -> &[BoardJob] {
        &self.jobs
    }

    pub fn into_jobs(self) -> Vec<BoardJob> {
        self.jobs
    }

    pub fn job(&self, job_id: Uuid) -> Option<&BoardJob> {
        self.jobs.iter().find(|entry| entry.job.id == job_id)
    }

    pub fn job_mut(&mut self, job_id: Uuid) -> Option<&mut BoardJob> {
        self.jobs.iter_mut().find(|entry| entry.job.id == job_id)
    }

    pub fn insert_job(&mut self, job: BoardJob) {
        match self.job_mut(job.job.id) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
    }

    pub fn distances(&self) -> &DistanceCache {
        &self.distances
    }

    pub fn into_distances(self) -> DistanceCache {
        self.distances
    }

    pub fn origin(&self) -> Option<Coordinates> {
        self.origin
    }

    pub fn set_mode(&mut self, mode: BoardMode) -> bool {
        let changed = self.filter.mode != mode;
        self.filter.mode = mode;
        changed
    }

    pub fn set_date(&mut self, date: Option<NaiveDate>) -> bool {
        if self.filter.date == date {
            return false;
        }
        self.filter.date = date;
        self.distances.clear();
        true
    }

    pub fn clear_distances(&mut self) {
        self.distances.clear();
        for entry in &mut self.jobs {
            entry.distance = None;
        }
    }

    pub async fn refresh(&mut self, store: &dyn DataStore) -> StoreResult<()> {
        self.jobs = load_board(store, self.user_id, &self.filter, &self.distances).await?;
        debug!(user_id = %self.user_id, jobs = self.jobs.len(), "board loaded");
        Ok(())
    }

    pub fn apply_change(&mut self, change: &JobChange) -> SyncAction {
        match change {
            JobChange::Insert { .. } => SyncAction::Refetch,
            JobChange::Update { record } => match self.job_mut(record.id) {
                Some(entry) => {
                    entry.job = record.clone();
                    SyncAction::Patched
                }
                None => SyncAction::Ignored,
            },
            JobChange::Delete { old_id } => {
                let before = self.jobs.len();
                self.jobs.retain(|entry| entry.job.id != *old_id);
                if self.jobs.len() < before {
                    SyncAction::Removed
                } else {
                    SyncAction::Ignored
                }
            }
        }
    }

    pub async fn sync(
        &mut self,
        change: &JobChange,
        store: &dyn DataStore,
    ) -> StoreResult<SyncAction> {
        let action = self.apply_change(change);
        if action == SyncAction::Refetch {
            self.refresh(store).await?;
        }
        Ok(action)
    }

    pub async fn annotate(&mut self, annotator: &DistanceAnnotator, origin: Coordinates) {
        self.origin = Some(origin);
        annotator
            .annotate(origin, &mut self.jobs, &mut self.distances)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn board_job(status: JobStatus) -> BoardJob {
        let now = Utc::now().naive_utc();
        BoardJob {
            job: Job {
                id: Uuid::new_v4(),
                job_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                lot_number: Some("L-1".into()),
                company_name: Some("Acme".into()),
                address: None,
                assets: None,
                comments: None,
                contact_name: None,
                contact_detail: None,
                status,
                last_updated_by: None,
                created_by: None,
                created_at: now,
                updated_at: now,
            },
            assignees: vec![Assignee {
                user_id: Uuid::new_v4(),
                full_name: "Dana".into(),
                status,
            }],
            distance: Some(4.2),
        }
    }

    fn session_with(jobs: Vec<BoardJob>) -> BoardSession {
        let mut session = BoardSession::new(Uuid::new_v4(), BoardFilter::default());
        for job in jobs {
            session.insert_job(job);
        }
        session
    }

    #[test]
    fn update_patches_job_but_keeps_assignees_and_distance() {
        let entry = board_job(JobStatus::Pending);
        let mut record = entry.job.clone();
        record.status = JobStatus::Delivered;
        let mut session = session_with(vec![entry.clone()]);

        let action = session.apply_change(&JobChange::Update { record });

        assert_eq!(action, SyncAction::Patched);
        let patched = session.job(entry.job.id).unwrap();
        assert_eq!(patched.job.status, JobStatus::Delivered);
        assert_eq!(patched.assignees, entry.assignees);
        assert_eq!(patched.distance, Some(4.2));
    }

    #[test]
    fn insert_asks_for_refetch_and_delete_removes() {
        let entry = board_job(JobStatus::Pending);
        let mut session = session_with(vec![entry.clone()]);

        assert_eq!(
            session.apply_change(&JobChange::Insert {
                record: entry.job.clone()
            }),
            SyncAction::Refetch
        );
        assert_eq!(
            session.apply_change(&JobChange::Delete {
                old_id: entry.job.id
            }),
            SyncAction::Removed
        );
        assert!(session.jobs().is_empty());
        assert_eq!(
            session.apply_change(&JobChange::Delete {
                old_id: entry.job.id
            }),
            SyncAction::Ignored
        );
    }

    #[test]
    fn date_change_clears_distances_but_mode_change_does_not() {
        let mut cache = DistanceCache::new();
        cache.insert(Uuid::new_v4(), Some(1.0));
        let mut session =
            BoardSession::new(Uuid::new_v4(), BoardFilter::default()).with_distances(cache);

        assert!(session.set_mode(BoardMode::All));
        assert_eq!(session.distances().len(), 1);

        assert!(!session.set_date(None));
        assert_eq!(session.distances().len(), 1);

        assert!(session.set_date(NaiveDate::from_ymd_opt(2026, 1, 6)));
        assert!(session.distances().is_empty());
    }

    #[test]
    fn detects_other_active_workers() {
        let mut entry = board_job(JobStatus::OnWay);
        let me = Uuid::new_v4();
        entry.assignees.push(Assignee {
            user_id: me,
            full_name: "Me".into(),
            status: JobStatus::OnWay,
        });
        assert!(entry.has_other_active_worker(me));

        entry.assignees[0].status = JobStatus::Pending;
        assert!(!entry.has_other_active_worker(me));
    }

    #[test]
    fn board_mode_parses_query_values() {
        assert_eq!("all".parse::<BoardMode>(), Ok(BoardMode::All));
        assert!("everyone".parse::<BoardMode>().is_err());
    }
}
