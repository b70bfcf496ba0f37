use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::extract::ExtractedJob;
use crate::import::ApprovalSummary;
use crate::models::JobStatus;
use crate::reconcile::StatusOutcome;
use crate::routes::import::{ApproveAllRequest, ExtractResponse};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {status}: {message}")]
    Status { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub async fn set_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        confirm_assign: bool,
    ) -> Result<StatusOutcome, ClientError> {
        let response = self
            .post(
                &format!("/api/jobs/{job_id}/status"),
                &json!({ "status": status, "confirm_assign": confirm_assign }),
            )
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(response.json().await?);
        }
        read_json(response).await
    }

    pub async fn extract(&self, text: &str, source_type: &str) -> Result<ExtractResponse, ClientError> {
        let response = self
            .post(
                "/api/import/extract",
                &json!({ "text": text, "source_type": source_type }),
            )
            .await?;
        read_json(response).await
    }

    pub async fn approve_all(&self, jobs: Vec<ExtractedJob>) -> Result<ApprovalSummary, ClientError> {
        let response = self
            .post("/api/import/approve-all", &ApproveAllRequest { jobs })
            .await?;
        read_json(response).await
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, ClientError> {
        Ok(self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}
