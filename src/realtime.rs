use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Job;

pub const CHANGE_EVENT: &str = "change";
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum JobChange {
    Insert { record: Job },
    Update { record: Job },
    Delete { old_id: Uuid },
}

impl JobChange {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobChange::Insert { record } | JobChange::Update { record } => record.id,
            JobChange::Delete { old_id } => *old_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Patched,
    Removed,
    Refetch,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<JobChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, change: JobChange) -> usize {
        let job_id = change.job_id();
        match self.sender.send(change) {
            Ok(receivers) => {
                debug!(job_id = %job_id, receivers, "published job change");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobChange> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> impl Stream<Item = JobChange> + Send + 'static {
        change_stream(self.subscribe())
    }
}

pub fn change_stream(
    receiver: broadcast::Receiver<JobChange>,
) -> impl Stream<Item = JobChange> + Send + 'static {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(change) => return Some((change, receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change feed subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (&*line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data })
    }
}

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("invalid change payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct RemoteFeed {
    client: Client,
    url: String,
    token: String,
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

pub struct RemoteChanges {
    body: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<JobChange>,
}

impl RemoteFeed {
    pub fn new(client: Client, base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client,
            url: format!("{}/api/jobs/changes", base_url.trim_end_matches('/')),
            token: token.into(),
        }
    }

    pub async fn connect(&self) -> Result<RemoteChanges, RealtimeError> {
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RealtimeError::Status(response.status().as_u16()));
        }
        Ok(RemoteChanges {
            body: Box::pin(response.bytes_stream()),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        })
    }
}

impl RemoteChanges {
    pub async fn next(&mut self) -> Result<Option<JobChange>, RealtimeError> {
        loop {
            if let Some(change) = self.pending.pop_front() {
                return Ok(Some(change));
            }
            let Some(chunk) = self.body.next().await else {
                return Ok(None);
            };
            for event in self.decoder.push(&chunk?) {
                if event.event.as_deref() == Some(CHANGE_EVENT) {
                    self.pending.push_back(serde_json::from_str(&event.data)?);
                }
            }
        }
    }
}
