use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use tokio::task;
use uuid::Uuid;

use super::{DataStore, JobQuery, ProfileChanges, StoreError, StoreResult};
use crate::db::PgPool;
use crate::models::{
    Assignment, DashboardShare, ImportBatch, Job, JobStatus, NewAssignment, NewDashboardShare,
    NewImportBatch, NewImportRow, NewJob, NewPushSubscription, Profile, ProfileStatus,
    PushSubscription, Role,
};
use crate::schema::{
    dashboard_shares, job_assignments, job_import_batches, job_import_rows, jobs, profiles,
    push_subscriptions,
};

#[derive(AsChangeset)]
#[diesel(table_name = profiles)]
struct ProfileChangeset {
    full_name: Option<String>,
    contact_number: Option<String>,
    role: Option<Role>,
    status: Option<ProfileStatus>,
    updated_at: NaiveDateTime,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| StoreError::Pool(err.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("database task panicked: {err}")))?
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn list_jobs(&self, query: &JobQuery) -> StoreResult<Vec<Job>> {
        let query = query.clone();
        self.run(move |conn| {
            let mut statement = jobs::table.into_boxed();
            if let Some(ids) = query.ids {
                statement = statement.filter(jobs::id.eq_any(ids));
            }
            if let Some(date) = query.date {
                statement = statement.filter(jobs::job_date.eq(date));
            }
            let rows = statement
                .order((jobs::job_date.asc(), jobs::created_at.asc()))
                .load::<Job>(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        self.run(move |conn| Ok(jobs::table.find(id).first::<Job>(conn).optional()?))
            .await
    }

    async fn insert_job(&self, job: NewJob) -> StoreResult<Job> {
        self.run(move |conn| {
            let inserted = diesel::insert_into(jobs::table)
                .values(&job)
                .get_result::<Job>(conn)?;
            Ok(inserted)
        })
        .await
    }

    async fn delete_job(&self, id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| {
            let deleted = diesel::delete(jobs::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn update_job_status(
        &self,
        id: Uuid,
        status: JobStatus,
        updated_by: Uuid,
    ) -> StoreResult<Job> {
        self.run(move |conn| {
            let updated = diesel::update(jobs::table.find(id))
                .set((
                    jobs::status.eq(status),
                    jobs::last_updated_by.eq(Some(updated_by)),
                    jobs::updated_at.eq(Utc::now().naive_utc()),
                ))
                .get_result::<Job>(conn)?;
            Ok(updated)
        })
        .await
    }

    async fn assigned_job_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.run(move |conn| {
            let ids = job_assignments::table
                .filter(job_assignments::user_id.eq(user_id))
                .select(job_assignments::job_id)
                .load::<Uuid>(conn)?;
            Ok(ids)
        })
        .await
    }

    async fn assignments_for_jobs(&self, job_ids: &[Uuid]) -> StoreResult<Vec<Assignment>> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }
        let job_ids = job_ids.to_vec();
        self.run(move |conn| {
            let rows = job_assignments::table
                .filter(job_assignments::job_id.eq_any(job_ids))
                .order(job_assignments::assigned_at.asc())
                .load::<Assignment>(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn insert_assignments(
        &self,
        job_id: Uuid,
        user_ids: &[Uuid],
    ) -> StoreResult<Vec<Assignment>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<NewAssignment> = user_ids
            .iter()
            .map(|user_id| NewAssignment {
                job_id,
                user_id: *user_id,
                status: JobStatus::Pending,
            })
            .collect();
        self.run(move |conn| {
            let inserted = diesel::insert_into(job_assignments::table)
                .values(&rows)
                .get_results::<Assignment>(conn)?;
            Ok(inserted)
        })
        .await
    }

    async fn update_assignment_status(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        status: JobStatus,
    ) -> StoreResult<()> {
        self.run(move |conn| {
            let updated = diesel::update(
                job_assignments::table
                    .filter(job_assignments::job_id.eq(job_id))
                    .filter(job_assignments::user_id.eq(user_id)),
            )
            .set(job_assignments::status.eq(status))
            .execute(conn)?;
            if updated == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn delete_assignments(&self, job_id: Uuid, user_ids: &[Uuid]) -> StoreResult<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        let user_ids = user_ids.to_vec();
        self.run(move |conn| {
            let deleted = diesel::delete(
                job_assignments::table
                    .filter(job_assignments::job_id.eq(job_id))
                    .filter(job_assignments::user_id.eq_any(user_ids)),
            )
            .execute(conn)?;
            Ok(deleted)
        })
        .await
    }

    async fn delete_assignments_for_jobs(&self, job_ids: &[Uuid]) -> StoreResult<usize> {
        if job_ids.is_empty() {
            return Ok(0);
        }
        let job_ids = job_ids.to_vec();
        self.run(move |conn| {
            let deleted = diesel::delete(
                job_assignments::table.filter(job_assignments::job_id.eq_any(job_ids)),
            )
            .execute(conn)?;
            Ok(deleted)
        })
        .await
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        self.run(|conn| {
            let rows = profiles::table
                .order(profiles::full_name.asc())
                .load::<Profile>(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn profiles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.run(move |conn| {
            let rows = profiles::table
                .filter(profiles::id.eq_any(ids))
                .load::<Profile>(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        self.run(move |conn| Ok(profiles::table.find(id).first::<Profile>(conn).optional()?))
            .await
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Profile> {
        self.run(move |conn| {
            let changeset = ProfileChangeset {
                full_name: changes.full_name,
                contact_number: changes.contact_number,
                role: changes.role,
                status: changes.status,
                updated_at: Utc::now().naive_utc(),
            };
            let updated = diesel::update(profiles::table.find(id))
                .set(&changeset)
                .get_result::<Profile>(conn)?;
            Ok(updated)
        })
        .await
    }

    async fn push_subscriptions(
        &self,
        user_id: Option<Uuid>,
    ) -> StoreResult<Vec<PushSubscription>> {
        self.run(move |conn| {
            let mut statement = push_subscriptions::table.into_boxed();
            if let Some(user_id) = user_id {
                statement = statement.filter(push_subscriptions::user_id.eq(user_id));
            }
            let rows = statement
                .order(push_subscriptions::created_at.asc())
                .load::<PushSubscription>(conn)?;
            Ok(rows)
        })
        .await
    }

    async fn replace_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> StoreResult<PushSubscription> {
        self.run(move |conn| {
            conn.transaction(|conn| {
                diesel::delete(
                    push_subscriptions::table
                        .filter(push_subscriptions::endpoint.eq(&subscription.endpoint)),
                )
                .execute(conn)?;
                let inserted = diesel::insert_into(push_subscriptions::table)
                    .values(&subscription)
                    .get_result::<PushSubscription>(conn)?;
                Ok::<PushSubscription, StoreError>(inserted)
            })
        })
        .await
    }

    async fn delete_push_subscription(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::delete(push_subscriptions::table.find(id)).execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn insert_share(&self, share: NewDashboardShare) -> StoreResult<DashboardShare> {
        self.run(move |conn| {
            let inserted = diesel::insert_into(dashboard_shares::table)
                .values(&share)
                .get_result::<DashboardShare>(conn)?;
            Ok(inserted)
        })
        .await
    }

    async fn find_share(&self, token_hash: &str) -> StoreResult<Option<DashboardShare>> {
        let token_hash = token_hash.to_string();
        self.run(move |conn| {
            let share = dashboard_shares::table
                .filter(dashboard_shares::token_hash.eq(token_hash))
                .first::<DashboardShare>(conn)
                .optional()?;
            Ok(share)
        })
        .await
    }

    async fn record_import(
        &self,
        batch: NewImportBatch,
        rows: Vec<NewImportRow>,
    ) -> StoreResult<ImportBatch> {
        self.run(move |conn| {
            conn.transaction(|conn| {
                let inserted = diesel::insert_into(job_import_batches::table)
                    .values(&batch)
                    .get_result::<ImportBatch>(conn)?;
                if !rows.is_empty() {
                    diesel::insert_into(job_import_rows::table)
                        .values(&rows)
                        .execute(conn)?;
                }
                Ok::<ImportBatch, StoreError>(inserted)
            })
        })
        .await
    }
}
