use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GeminiConfig;
use crate::retry::RetryPolicy;

pub const MAX_INPUT_CHARS: usize = 30_000;

const EXTRACTION_RULES: &str = r#"You are a data extraction AI for a logistics company. Extract job information from unstructured text.

IMPORTANT RULES:
1. IGNORE these fields completely: "fml", "no quote", "secure", and dispatcher first names.
2. Each job block starts with a date in format M/D/YYYY.
3. Extract ONLY these fields:
   - date: Job date (M/D/YYYY format)
   - lot_number: Usually a 6-digit number
   - company_name: Company name (usually in UPPERCASE)
   - address: Full address including street, city, province, postal code
   - assets: Asset descriptions with quantities (e.g., "desktops - 37, chromebooks- 35")
   - comments: Special instructions or notes (not metadata or dispatcher names)
   - contact_name: Contact person name
   - contact_detail: Phone number or email

Return ONLY a valid JSON array with this exact structure:
[
  {
    "date": "1/9/2026",
    "lot_number": "226552",
    "company_name": "NORTHERN SS",
    "address": "851 MOUNT PLEASANT RD, TORONTO, ON CA M4P2L5",
    "assets": "desktops - 37, chromebooks- 35, monitors- 25, printers - 6",
    "comments": "50 boxes of misc",
    "contact_name": "greg",
    "contact_detail": "416 859 1883"
  }
]

If a field is not found, use null. Do NOT include any markdown formatting, just pure JSON."#;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no text to extract from")]
    EmptyInput,
    #[error("extraction is not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("model returned no content")]
    EmptyResponse,
    #[error("failed to parse model output as JSON: {0}")]
    InvalidResponse(String),
    #[error("all models failed; last error: {last}")]
    AllCandidatesFailed { last: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedJob {
    #[serde(default, alias = "job_date", deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, alias = "lot_no", deserialize_with = "lenient_text")]
    pub lot_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub assets: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub comments: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub contact_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub contact_detail: Option<String>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

fn truncate_input(text: &str) -> &str {
    match text.char_indices().nth(MAX_INPUT_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

pub fn build_prompt(text: &str, today: NaiveDate) -> String {
    let today = today.format("%-m/%-d/%Y");
    format!(
        "{EXTRACTION_RULES}\n\nCONTEXT:\nThe current date is {today}.\n\
         RULE: If a job date is not explicitly mentioned in the text, you MUST use \"{today}\" as the date. \
         DO NOT return null for date.\n\nEXTRACT FROM THIS TEXT:\n\n{}",
        truncate_input(text)
    )
}

pub fn parse_model_output(raw: &str) -> Result<Vec<ExtractedJob>, ExtractError> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|err| ExtractError::InvalidResponse(format!("{err}: {cleaned}")))?;

    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ExtractError::InvalidResponse(format!(
                "expected an array of jobs, got {other}"
            )))
        }
    };

    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|err| ExtractError::InvalidResponse(err.to_string()))
        })
        .collect()
}

#[async_trait]
pub trait JobExtractor: Send + Sync {
    async fn extract(&self, text: &str, today: NaiveDate) -> Result<Vec<ExtractedJob>, ExtractError>;
}

#[derive(Clone)]
pub struct GeminiExtractor {
    client: Client,
    api_key: String,
    base_url: String,
    models: Vec<String>,
    retry: RetryPolicy,
}

impl GeminiExtractor {
    pub fn new(client: Client, api_key: impl Into<String>, base_url: impl Into<String>, models: Vec<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            models,
            retry: RetryPolicy::new(2, Duration::from_millis(1000)),
        }
    }

    pub fn from_config(client: Client, config: &GeminiConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self::new(
            client,
            api_key,
            config.base_url.clone(),
            config.models.clone(),
        ))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ExtractError> {
        let url = format!(
            "{}/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.1, "maxOutputTokens": 8192 },
        });

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let message = payload["error"]["message"]
                .as_str()
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
                .to_string();
            return Err(ExtractError::Status {
                status: status.as_u16(),
                message,
            });
        }

        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or(ExtractError::EmptyResponse)
    }
}

#[async_trait]
impl JobExtractor for GeminiExtractor {
    async fn extract(&self, text: &str, today: NaiveDate) -> Result<Vec<ExtractedJob>, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::EmptyInput);
        }
        let prompt = build_prompt(text, today);

        let mut last_error = None;
        for model in &self.models {
            let attempt = self
                .retry
                .run(model, |_| async {
                    let output = self.generate(model, &prompt).await?;
                    parse_model_output(&output)
                })
                .await;

            match attempt {
                Ok(jobs) => {
                    info!(model = %model, jobs = jobs.len(), "extraction succeeded");
                    return Ok(jobs);
                }
                Err(err) => {
                    warn!(model = %model, error = %err, "extraction model failed; trying next");
                    last_error = Some(err);
                }
            }
        }

        Err(ExtractError::AllCandidatesFailed {
            last: last_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no models configured".to_string()),
        })
    }
}
