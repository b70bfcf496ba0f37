#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use chrono::{NaiveDate, Utc};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

use jobtracker::auth::jwt::JwtService;
use jobtracker::config::{AppConfig, GeminiConfig, GeoConfig, PushConfig};
use jobtracker::db::DEFAULT_MAX_POOL_SIZE;
use jobtracker::extract::{ExtractError, ExtractedJob, JobExtractor};
use jobtracker::geo::{
    Coordinates, DistanceAnnotator, GeoError, Geocoder, Pacing, RouteService,
};
use jobtracker::models::{
    Assignment, DashboardShare, ImportBatch, Job, JobStatus, NewDashboardShare, NewImportBatch,
    NewImportRow, NewJob, NewPushSubscription, Profile, ProfileStatus, PushSubscription, Role,
};
use jobtracker::push::{PushError, PushTransport};
use jobtracker::routes;
use jobtracker::state::AppState;
use jobtracker::store::{DataStore, JobQuery, ProfileChanges, StoreError, StoreResult};

pub const PUBLIC_KEY: &str = "test-vapid-public-key";

#[derive(Default)]
struct Tables {
    jobs: Vec<Job>,
    assignments: Vec<Assignment>,
    profiles: Vec<Profile>,
    subscriptions: Vec<PushSubscription>,
    shares: Vec<DashboardShare>,
    batches: Vec<ImportBatch>,
    import_rows: Vec<NewImportRow>,
}

/// Keeps every table in memory. Job status writes can be made to fail.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_status_writes: AtomicBool,
}

impl MemoryStore {
    pub fn fail_status_writes(&self, fail: bool) {
        self.fail_status_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn import_rows(&self) -> Vec<NewImportRow> {
        self.tables.lock().await.import_rows.clone()
    }

    pub async fn batches(&self) -> Vec<ImportBatch> {
        self.tables.lock().await.batches.clone()
    }

    pub async fn assignment(&self, job_id: Uuid, user_id: Uuid) -> Option<Assignment> {
        self.tables
            .lock()
            .await
            .assignments
            .iter()
            .find(|a| a.job_id == job_id && a.user_id == user_id)
            .cloned()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn list_jobs(&self, query: &JobQuery) -> StoreResult<Vec<Job>> {
        let tables = self.tables.lock().await;
        let mut jobs: Vec<Job> = tables
            .jobs
            .iter()
            .filter(|job| query.ids.as_ref().map_or(true, |ids| ids.contains(&job.id)))
            .filter(|job| query.date.map_or(true, |date| job.job_date == date))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| (job.job_date, job.created_at));
        Ok(jobs)
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        let tables = self.tables.lock().await;
        Ok(tables.jobs.iter().find(|job| job.id == id).cloned())
    }

    async fn insert_job(&self, job: NewJob) -> StoreResult<Job> {
        let now = Utc::now().naive_utc();
        let record = Job {
            id: job.id,
            job_date: job.job_date,
            lot_number: job.lot_number,
            company_name: job.company_name,
            address: job.address,
            assets: job.assets,
            comments: job.comments,
            contact_name: job.contact_name,
            contact_detail: job.contact_detail,
            status: job.status,
            last_updated_by: None,
            created_by: job.created_by,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.jobs.push(record.clone());
        Ok(record)
    }

    async fn delete_job(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.jobs.len();
        tables.jobs.retain(|job| job.id != id);
        tables.assignments.retain(|a| a.job_id != id);
        Ok(tables.jobs.len() < before)
    }

    async fn update_job_status(
        &self,
        id: Uuid,
        status: JobStatus,
        updated_by: Uuid,
    ) -> StoreResult<Job> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("status writes disabled".into()));
        }
        let mut tables = self.tables.lock().await;
        let job = tables
            .jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or(StoreError::NotFound)?;
        job.status = status;
        job.last_updated_by = Some(updated_by);
        job.updated_at = Utc::now().naive_utc();
        Ok(job.clone())
    }

    async fn assigned_job_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.job_id)
            .collect())
    }

    async fn assignments_for_jobs(&self, job_ids: &[Uuid]) -> StoreResult<Vec<Assignment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .assignments
            .iter()
            .filter(|a| job_ids.contains(&a.job_id))
            .cloned()
            .collect())
    }

    async fn insert_assignments(
        &self,
        job_id: Uuid,
        user_ids: &[Uuid],
    ) -> StoreResult<Vec<Assignment>> {
        let mut tables = self.tables.lock().await;
        if tables
            .assignments
            .iter()
            .any(|a| a.job_id == job_id && user_ids.contains(&a.user_id))
        {
            return Err(StoreError::Conflict("assignment already exists".into()));
        }
        let now = Utc::now().naive_utc();
        let inserted: Vec<Assignment> = user_ids
            .iter()
            .map(|user_id| Assignment {
                job_id,
                user_id: *user_id,
                status: JobStatus::Pending,
                assigned_at: now,
            })
            .collect();
        tables.assignments.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update_assignment_status(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        status: JobStatus,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let assignment = tables
            .assignments
            .iter_mut()
            .find(|a| a.job_id == job_id && a.user_id == user_id)
            .ok_or(StoreError::NotFound)?;
        assignment.status = status;
        Ok(())
    }

    async fn delete_assignments(&self, job_id: Uuid, user_ids: &[Uuid]) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let before = tables.assignments.len();
        tables
            .assignments
            .retain(|a| !(a.job_id == job_id && user_ids.contains(&a.user_id)));
        Ok(before - tables.assignments.len())
    }

    async fn delete_assignments_for_jobs(&self, job_ids: &[Uuid]) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let before = tables.assignments.len();
        tables.assignments.retain(|a| !job_ids.contains(&a.job_id));
        Ok(before - tables.assignments.len())
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let mut profiles = self.tables.lock().await.profiles.clone();
        profiles.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(profiles)
    }

    async fn profiles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let tables = self.tables.lock().await;
        Ok(tables.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> StoreResult<Profile> {
        let mut tables = self.tables.lock().await;
        let profile = tables
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(full_name) = changes.full_name {
            profile.full_name = full_name;
        }
        if let Some(contact_number) = changes.contact_number {
            profile.contact_number = Some(contact_number);
        }
        if let Some(role) = changes.role {
            profile.role = role;
        }
        if let Some(status) = changes.status {
            profile.status = status;
        }
        profile.updated_at = Utc::now().naive_utc();
        Ok(profile.clone())
    }

    async fn push_subscriptions(
        &self,
        user_id: Option<Uuid>,
    ) -> StoreResult<Vec<PushSubscription>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .subscriptions
            .iter()
            .filter(|s| user_id.map_or(true, |id| s.user_id == id))
            .cloned()
            .collect())
    }

    async fn replace_push_subscription(
        &self,
        subscription: NewPushSubscription,
    ) -> StoreResult<PushSubscription> {
        let mut tables = self.tables.lock().await;
        tables
            .subscriptions
            .retain(|s| s.endpoint != subscription.endpoint);
        let record = PushSubscription {
            id: subscription.id,
            user_id: subscription.user_id,
            endpoint: subscription.endpoint,
            p256dh: subscription.p256dh,
            auth: subscription.auth,
            user_agent: subscription.user_agent,
            created_at: Utc::now().naive_utc(),
        };
        tables.subscriptions.push(record.clone());
        Ok(record)
    }

    async fn delete_push_subscription(&self, id: Uuid) -> StoreResult<()> {
        self.tables.lock().await.subscriptions.retain(|s| s.id != id);
        Ok(())
    }

    async fn insert_share(&self, share: NewDashboardShare) -> StoreResult<DashboardShare> {
        let record = DashboardShare {
            id: share.id,
            name: share.name,
            token_hash: share.token_hash,
            created_by: share.created_by,
            expires_at: share.expires_at,
            created_at: Utc::now().naive_utc(),
        };
        self.tables.lock().await.shares.push(record.clone());
        Ok(record)
    }

    async fn find_share(&self, token_hash: &str) -> StoreResult<Option<DashboardShare>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .shares
            .iter()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn record_import(
        &self,
        batch: NewImportBatch,
        rows: Vec<NewImportRow>,
    ) -> StoreResult<ImportBatch> {
        let record = ImportBatch {
            id: batch.id,
            source_type: batch.source_type,
            raw_text: batch.raw_text,
            created_by: batch.created_by,
            created_at: Utc::now().naive_utc(),
        };
        let mut tables = self.tables.lock().await;
        tables.batches.push(record.clone());
        tables.import_rows.extend(rows);
        Ok(record)
    }
}

/// Resolves any query that mentions a known key; counts every call.
#[derive(Default)]
pub struct FakeGeocoder {
    places: std::sync::Mutex<HashMap<String, Coordinates>>,
    calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn place(&self, key: &str, point: Coordinates) {
        if let Ok(mut places) = self.places.lock() {
            places.insert(key.to_string(), point);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn search(&self, query: &str) -> Result<Option<Coordinates>, GeoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let places = self
            .places
            .lock()
            .map_err(|_| GeoError::InvalidResponse("poisoned".into()))?;
        Ok(places
            .iter()
            .find(|(key, _)| query.contains(key.as_str()))
            .map(|(_, point)| *point))
    }
}

/// Answers every route with the same distance, or with none.
pub struct FakeRouter {
    pub distance_km: Option<f64>,
}

#[async_trait]
impl RouteService for FakeRouter {
    async fn driving_distance_km(
        &self,
        _from: Coordinates,
        _to: Coordinates,
    ) -> Result<Option<f64>, GeoError> {
        Ok(self.distance_km)
    }
}

#[derive(Default)]
pub struct FakeExtractor {
    jobs: std::sync::Mutex<Vec<ExtractedJob>>,
}

impl FakeExtractor {
    pub fn respond_with(&self, jobs: Vec<ExtractedJob>) {
        if let Ok(mut current) = self.jobs.lock() {
            *current = jobs;
        }
    }
}

#[async_trait]
impl JobExtractor for FakeExtractor {
    async fn extract(&self, text: &str, _today: NaiveDate) -> Result<Vec<ExtractedJob>, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyInput);
        }
        let jobs = self
            .jobs
            .lock()
            .map_err(|_| ExtractError::InvalidResponse("poisoned".into()))?;
        Ok(jobs.clone())
    }
}

/// Records every delivery. Endpoints containing `gone` answer 410.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingTransport {
    pub async fn sent(&self) -> Vec<(String, serde_json::Value)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<u16, PushError> {
        if subscription.endpoint.contains("gone") {
            return Ok(410);
        }
        let body: serde_json::Value = serde_json::from_slice(payload)?;
        self.sent
            .lock()
            .await
            .push((subscription.endpoint.clone(), body));
        Ok(201)
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub geocoder: Arc<FakeGeocoder>,
    pub extractor: Arc<FakeExtractor>,
    pub transport: Arc<RecordingTransport>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_route_distance(Some(12.34))
    }

    pub fn with_route_distance(distance_km: Option<f64>) -> Self {
        let config = AppConfig {
            database_url: "postgres://unused".to_string(),
            database_max_pool_size: DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            share_default_expiry_hours: 24,
            geo: GeoConfig::default(),
            gemini: GeminiConfig::default(),
            push: PushConfig {
                vapid_public_key: Some(PUBLIC_KEY.to_string()),
                ..PushConfig::default()
            },
        };

        let store = Arc::new(MemoryStore::default());
        let geocoder = Arc::new(FakeGeocoder::default());
        let extractor = Arc::new(FakeExtractor::default());
        let transport = Arc::new(RecordingTransport::default());

        let jwt = JwtService::new(
            &config.jwt_secret,
            &config.jwt_issuer,
            &config.jwt_audience,
            config.jwt_expiry_minutes,
        );
        let annotator = DistanceAnnotator::new(
            geocoder.clone(),
            Arc::new(FakeRouter { distance_km }),
            Pacing::immediate(),
        );
        let state = AppState::new(store.clone(), config, jwt, annotator)
            .with_extractor(extractor.clone())
            .with_push_transport(transport.clone());
        let router = routes::create_router(state.clone());

        Self {
            state,
            store,
            geocoder,
            extractor,
            transport,
            router,
        }
    }

    pub async fn insert_profile(&self, full_name: &str, role: Role) -> Result<Uuid> {
        let now = Utc::now().naive_utc();
        let profile = Profile {
            id: Uuid::new_v4(),
            full_name: full_name.to_string(),
            email: Some(format!("{}@example.com", full_name.to_lowercase())),
            contact_number: Some("555-0100".to_string()),
            role,
            status: ProfileStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let id = profile.id;
        self.store.tables.lock().await.profiles.push(profile);
        Ok(id)
    }

    pub async fn insert_job(&self, date: NaiveDate, company: &str, address: &str) -> Result<Job> {
        Ok(self
            .store
            .insert_job(NewJob {
                id: Uuid::new_v4(),
                job_date: date,
                lot_number: Some(format!("LOT-{company}")),
                company_name: Some(company.to_string()),
                address: Some(address.to_string()),
                assets: None,
                comments: None,
                contact_name: None,
                contact_detail: None,
                status: JobStatus::Pending,
                created_by: None,
            })
            .await?)
    }

    pub async fn assign(&self, job_id: Uuid, user_id: Uuid, status: JobStatus) -> Result<()> {
        self.store.insert_assignments(job_id, &[user_id]).await?;
        self.store
            .update_assignment_status(job_id, user_id, status)
            .await?;
        Ok(())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn token(&self, user_id: Uuid, role: Role) -> Result<String> {
        self.state.jwt.generate_token(user_id, None, role)
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::POST, path, Some(body), token).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::PUT, path, Some(body), token).await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::PATCH, path, Some(body), token).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, None, token).await
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body.collect().await?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_json<T: DeserializeOwned>(response: hyper::Response<Body>) -> Result<T> {
    let bytes = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
