use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use super::address::geocode_queries;
use super::{
    haversine_km, round_tenth, BoundingBox, Coordinates, Geocoder, NominatimGeocoder, OsrmRouter,
    RouteService, SOUTHERN_ONTARIO,
};
use crate::board::BoardJob;
use crate::config::GeoConfig;
use crate::retry::RetryPolicy;

const ROUTE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub delay: Duration,
    pub jitter: Duration,
    pub route_delay: Duration,
    pub retry: RetryPolicy,
}

impl Pacing {
    pub fn from_config(config: &GeoConfig) -> Self {
        Self {
            delay: config.request_delay,
            jitter: config.request_jitter,
            route_delay: ROUTE_DELAY,
            retry: RetryPolicy::new(config.attempts, config.retry_backoff),
        }
    }

    pub const fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
            route_delay: Duration::ZERO,
            retry: RetryPolicy::new(2, Duration::ZERO),
        }
    }

    fn geocode_pause(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration).await;
    }
}

#[derive(Debug, Clone, Default)]
pub struct DistanceCache {
    entries: HashMap<Uuid, Option<f64>>,
}

impl DistanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job_id: &Uuid) -> Option<Option<f64>> {
        self.entries.get(job_id).copied()
    }

    pub fn insert(&mut self, job_id: Uuid, distance: Option<f64>) {
        self.entries.insert(job_id, distance);
    }

    pub fn contains(&self, job_id: &Uuid) -> bool {
        self.entries.contains_key(job_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone)]
pub struct DistanceAnnotator {
    geocoder: Arc<dyn Geocoder>,
    router: Arc<dyn RouteService>,
    pacing: Pacing,
    area: BoundingBox,
}

impl DistanceAnnotator {
    pub fn new(geocoder: Arc<dyn Geocoder>, router: Arc<dyn RouteService>, pacing: Pacing) -> Self {
        Self {
            geocoder,
            router,
            pacing,
            area: SOUTHERN_ONTARIO,
        }
    }

    pub fn from_config(client: Client, config: &GeoConfig) -> Self {
        let geocoder = NominatimGeocoder::new(
            client.clone(),
            config.geocoder_url.clone(),
            config.geocoder_user_agent.clone(),
        );
        let router = OsrmRouter::new(client, config.router_url.clone());
        Self::new(
            Arc::new(geocoder),
            Arc::new(router),
            Pacing::from_config(config),
        )
    }

    pub async fn locate(&self, address: &str) -> Option<Coordinates> {
        for query in geocode_queries(address) {
            pause(self.pacing.geocode_pause()).await;

            let result = self
                .pacing
                .retry
                .run("geocode", |_| self.geocoder.search(&query))
                .await;

            match result {
                Ok(Some(coords)) if self.area.contains(coords) => return Some(coords),
                Ok(Some(coords)) => {
                    debug!(query = %query, lat = coords.lat, lng = coords.lng, "geocoder hit outside service area");
                }
                Ok(None) => debug!(query = %query, "geocoder found nothing"),
                Err(err) => warn!(query = %query, error = %err, "geocoding failed"),
            }
        }
        None
    }

    pub async fn distance_km(&self, origin: Coordinates, address: &str) -> Option<f64> {
        let destination = self.locate(address).await?;

        pause(self.pacing.route_delay).await;
        let km = match self.router.driving_distance_km(origin, destination).await {
            Ok(Some(km)) => km,
            Ok(None) => haversine_km(origin, destination),
            Err(err) => {
                warn!(error = %err, "routing failed; using straight-line distance");
                haversine_km(origin, destination)
            }
        };
        Some(round_tenth(km))
    }

    pub async fn annotate(
        &self,
        origin: Coordinates,
        jobs: &mut [BoardJob],
        cache: &mut DistanceCache,
    ) {
        for entry in jobs.iter_mut() {
            let job_id = entry.job.id;
            if let Some(cached) = cache.get(&job_id) {
                entry.distance = cached;
                continue;
            }

            let distance = match entry.job.address.as_deref().map(str::trim) {
                Some(address) if !address.is_empty() => self.distance_km(origin, address).await,
                _ => None,
            };
            debug!(job_id = %job_id, ?distance, "annotated job distance");
            cache.insert(job_id, distance);
            entry.distance = distance;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::geo::GeoError;
    use crate::models::{Job, JobStatus};

    const ORIGIN: Coordinates = Coordinates::new(43.65, -79.38);

    #[derive(Default)]
    struct ScriptedGeocoder {
        answers: Mutex<Vec<Result<Option<Coordinates>, u16>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGeocoder {
        fn with(answers: Vec<Result<Option<Coordinates>, u16>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Geocoder for ScriptedGeocoder {
        async fn search(&self, _query: &str) -> Result<Option<Coordinates>, GeoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            if answers.is_empty() {
                return Ok(None);
            }
            answers.remove(0).map_err(GeoError::Status)
        }
    }

    struct FixedRouter(Result<Option<f64>, u16>);

    #[async_trait]
    impl RouteService for FixedRouter {
        async fn driving_distance_km(
            &self,
            _from: Coordinates,
            _to: Coordinates,
        ) -> Result<Option<f64>, GeoError> {
            self.0.map_err(GeoError::Status)
        }
    }

    fn annotator(geocoder: Arc<ScriptedGeocoder>, route: Result<Option<f64>, u16>) -> DistanceAnnotator {
        DistanceAnnotator::new(geocoder, Arc::new(FixedRouter(route)), Pacing::immediate())
    }

    fn board_job(address: Option<&str>) -> BoardJob {
        let now = Utc::now().naive_utc();
        BoardJob {
            job: Job {
                id: Uuid::new_v4(),
                job_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                lot_number: None,
                company_name: None,
                address: address.map(str::to_string),
                assets: None,
                comments: None,
                contact_name: None,
                contact_detail: None,
                status: JobStatus::Pending,
                last_updated_by: None,
                created_by: None,
                created_at: now,
                updated_at: now,
            },
            assignees: Vec::new(),
            distance: None,
        }
    }

    #[tokio::test]
    async fn out_of_area_hits_fall_through_the_ladder() {
        let geocoder = Arc::new(ScriptedGeocoder::with(vec![
            Ok(Some(Coordinates::new(49.28, -123.12))),
            Ok(Some(Coordinates::new(43.70, -79.40))),
        ]));
        let coords = annotator(geocoder.clone(), Ok(Some(10.0)))
            .locate("1 Yonge St, Toronto, ON M5E 1W7")
            .await;

        assert_eq!(coords, Some(Coordinates::new(43.70, -79.40)));
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_query_is_retried_once() {
        let geocoder = Arc::new(ScriptedGeocoder::with(vec![
            Err(503),
            Ok(Some(Coordinates::new(43.70, -79.40))),
        ]));
        let coords = annotator(geocoder.clone(), Ok(None))
            .locate("1 Yonge St, Toronto")
            .await;

        assert!(coords.is_some());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn routing_failure_falls_back_to_straight_line() {
        let destination = Coordinates::new(43.70, -79.40);
        let geocoder = Arc::new(ScriptedGeocoder::with(vec![Ok(Some(destination))]));
        let km = annotator(geocoder, Err(500))
            .distance_km(ORIGIN, "1 Yonge St, Toronto")
            .await;

        assert_eq!(km, Some(round_tenth(haversine_km(ORIGIN, destination))));
    }

    #[tokio::test]
    async fn route_distance_is_rounded() {
        let geocoder = Arc::new(ScriptedGeocoder::with(vec![Ok(Some(Coordinates::new(
            43.70, -79.40,
        )))]));
        let km = annotator(geocoder, Ok(Some(12.345)))
            .distance_km(ORIGIN, "1 Yonge St, Toronto")
            .await;

        assert_eq!(km, Some(12.3));
    }

    #[tokio::test]
    async fn cached_jobs_are_not_requeried() {
        let geocoder = Arc::new(ScriptedGeocoder::default());
        let annotator = annotator(geocoder.clone(), Ok(Some(5.0)));
        let mut jobs = vec![board_job(Some("nowhere at all")), board_job(None)];
        let mut cache = DistanceCache::new();

        annotator.annotate(ORIGIN, &mut jobs, &mut cache).await;
        let first_pass = geocoder.calls.load(Ordering::SeqCst);
        assert!(first_pass > 0);
        assert_eq!(cache.len(), 2);
        assert!(jobs.iter().all(|job| job.distance.is_none()));

        annotator.annotate(ORIGIN, &mut jobs, &mut cache).await;
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), first_pass);
    }
}
