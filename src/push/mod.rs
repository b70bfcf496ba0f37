use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Job, NewPushSubscription, PushSubscription};
use crate::store::{DataStore, StoreError};

pub mod webpush;

pub use webpush::{VapidKeys, WebPushTransport};

pub const ASSIGNMENT_TITLE: &str = "New Job Assigned";
pub const ASSIGNMENT_URL: &str = "/active-jobs";
pub const STATUS_UPDATE_URL: &str = "/dashboard";

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push is not configured")]
    NotConfigured,
    #[error("invalid VAPID key: {0}")]
    InvalidVapidKey(String),
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),
    #[error("payload of {0} bytes does not fit in one record")]
    PayloadTooLarge(usize),
    #[error("payload encryption failed")]
    Encryption,
    #[error("failed to sign VAPID token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to encode payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Delivers one already-serialized notification. Returns the push service's
/// HTTP status.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<u16, PushError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl PushMessage {
    pub fn for_assignment(job: &Job) -> Self {
        let company = job
            .company_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("a new job");
        let street = job
            .address
            .as_deref()
            .and_then(|address| address.split(',').next())
            .map(str::trim)
            .filter(|street| !street.is_empty());

        let body = match street {
            Some(street) => format!("You have been assigned to {company} at {street}"),
            None => format!("You have been assigned to {company}"),
        };
        Self {
            title: ASSIGNMENT_TITLE.to_string(),
            body,
            url: Some(ASSIGNMENT_URL.to_string()),
        }
    }

    pub fn for_status_update(job: &Job) -> Self {
        let lot = job
            .lot_number
            .as_deref()
            .filter(|lot| !lot.trim().is_empty())
            .unwrap_or("Unknown Lot");
        let company = job.company_name.as_deref().unwrap_or("A job");
        let status = job.status.as_str().replace('_', " ").to_uppercase();
        Self {
            title: format!("Job Update: {lot}"),
            body: format!("{company} is now {status}"),
            url: Some(STATUS_UPDATE_URL.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryFailure {
    pub endpoint: String,
    pub status: Option<u16>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub success: bool,
    pub total: usize,
    pub sent: usize,
    pub removed: usize,
    pub failures: Vec<DeliveryFailure>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Clone)]
pub struct PushService {
    store: Arc<dyn DataStore>,
    transport: Option<Arc<dyn PushTransport>>,
    public_key: Option<String>,
}

impl PushService {
    pub fn new(
        store: Arc<dyn DataStore>,
        transport: Option<Arc<dyn PushTransport>>,
        public_key: Option<String>,
    ) -> Self {
        Self {
            store,
            transport,
            public_key,
        }
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn register(
        &self,
        user_id: Uuid,
        request: SubscriptionRequest,
    ) -> Result<PushSubscription, PushError> {
        let endpoint = request.endpoint.trim();
        if endpoint.is_empty() {
            return Err(PushError::InvalidSubscription("endpoint is required".into()));
        }
        if request.keys.p256dh.trim().is_empty() || request.keys.auth.trim().is_empty() {
            return Err(PushError::InvalidSubscription("keys are required".into()));
        }

        let subscription = self
            .store
            .replace_push_subscription(NewPushSubscription {
                id: Uuid::new_v4(),
                user_id,
                endpoint: endpoint.to_string(),
                p256dh: request.keys.p256dh,
                auth: request.keys.auth,
                user_agent: request.user_agent,
            })
            .await?;
        info!(user_id = %user_id, subscription_id = %subscription.id, "push subscription registered");
        Ok(subscription)
    }

    pub async fn broadcast(
        &self,
        message: &PushMessage,
        target_user_id: Option<Uuid>,
    ) -> Result<DeliveryReport, PushError> {
        let transport = self.transport.as_ref().ok_or(PushError::NotConfigured)?;
        let payload = serde_json::to_vec(message)?;
        let subscriptions = self.store.push_subscriptions(target_user_id).await?;

        let mut report = DeliveryReport {
            success: true,
            total: subscriptions.len(),
            sent: 0,
            removed: 0,
            failures: Vec::new(),
        };

        for subscription in &subscriptions {
            match transport.send(subscription, &payload).await {
                Ok(status) if (200..300).contains(&status) => report.sent += 1,
                Ok(status) => {
                    if status == 404 || status == 410 {
                        match self.store.delete_push_subscription(subscription.id).await {
                            Ok(()) => report.removed += 1,
                            Err(err) => warn!(
                                subscription_id = %subscription.id,
                                error = %err,
                                "failed to delete expired push subscription"
                            ),
                        }
                    }
                    report.failures.push(DeliveryFailure {
                        endpoint: subscription.endpoint.clone(),
                        status: Some(status),
                        error: format!("push service responded with status {status}"),
                    });
                }
                Err(err) => report.failures.push(DeliveryFailure {
                    endpoint: subscription.endpoint.clone(),
                    status: None,
                    error: err.to_string(),
                }),
            }
        }

        info!(
            total = report.total,
            sent = report.sent,
            removed = report.removed,
            failed = report.failures.len(),
            "push broadcast finished"
        );
        Ok(report)
    }

    pub async fn notify_status_change(&self, job: &Job) {
        if !self.is_configured() {
            return;
        }
        let message = PushMessage::for_status_update(job);
        if let Err(err) = self.broadcast(&message, None).await {
            warn!(job_id = %job.id, error = %err, "status notification failed");
        }
    }

    pub async fn notify_assigned(&self, job: &Job, user_ids: &[Uuid]) {
        if user_ids.is_empty() || !self.is_configured() {
            return;
        }
        let message = PushMessage::for_assignment(job);
        for user_id in user_ids {
            if let Err(err) = self.broadcast(&message, Some(*user_id)).await {
                warn!(job_id = %job.id, user_id = %user_id, error = %err, "assignment notification failed");
            }
        }
    }
}
