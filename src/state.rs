use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    error::{AppError, AppResult},
    extract::{ExtractError, GeminiExtractor, JobExtractor},
    geo::{DistanceAnnotator, DistanceCache},
    push::{PushService, PushTransport, WebPushTransport},
    realtime::ChangeFeed,
    reconcile::Reconciler,
    store::DataStore,
};

#[derive(Debug, Clone, Default)]
pub struct DistanceSession {
    pub date: Option<NaiveDate>,
    pub cache: DistanceCache,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub feed: ChangeFeed,
    pub annotator: DistanceAnnotator,
    pub extractor: Option<Arc<dyn JobExtractor>>,
    pub push: PushService,
    pub distances: Arc<Mutex<HashMap<Uuid, DistanceSession>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DataStore>,
        config: AppConfig,
        jwt: JwtService,
        annotator: DistanceAnnotator,
    ) -> Self {
        let push = PushService::new(store.clone(), None, config.push.vapid_public_key.clone());
        Self {
            store,
            config: Arc::new(config),
            jwt,
            feed: ChangeFeed::default(),
            annotator,
            extractor: None,
            push,
            distances: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(store: Arc<dyn DataStore>, config: AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.geo.geocoder_user_agent.clone())
            .build()
            .context("failed to build HTTP client")?;
        let jwt = JwtService::from_config(&config)?;
        let annotator = DistanceAnnotator::from_config(client.clone(), &config.geo);
        let extractor = GeminiExtractor::from_config(client.clone(), &config.gemini);
        let transport = WebPushTransport::from_config(client, &config.push)
            .context("invalid push configuration")?;

        let mut state = Self::new(store, config, jwt, annotator);
        if let Some(extractor) = extractor {
            state = state.with_extractor(Arc::new(extractor));
        }
        if let Some(transport) = transport {
            let public_key = state
                .config
                .push
                .vapid_public_key
                .clone()
                .unwrap_or_else(|| transport.public_key().to_string());
            state.push = PushService::new(state.store.clone(), Some(Arc::new(transport)), Some(public_key));
        }
        Ok(state)
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn JobExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_push_transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        let public_key = self.push.public_key().map(str::to_string);
        self.push = PushService::new(self.store.clone(), Some(transport), public_key);
        self
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone())
            .with_feed(self.feed.clone())
            .with_push(self.push.clone())
    }

    pub fn extractor(&self) -> AppResult<Arc<dyn JobExtractor>> {
        self.extractor
            .clone()
            .ok_or_else(|| AppError::from(ExtractError::NotConfigured))
    }
}
