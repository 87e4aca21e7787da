use std::time::Duration;

use harvest_core::{PollOutcome, MAX_BATCH_SIZE};
use harvest_logging::{harvest_debug, harvest_info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{FailureKind, ProviderError};

/// Status values the provider reports while a snapshot is not ready yet.
const IN_PROGRESS: &[&str] = &["running", "building", "collecting", "starting", "pending"];
/// Status values for snapshots that finished without usable data.
const FINISHED_EMPTY: &[&str] = &["failed", "empty"];
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub dataset_id: String,
    pub api_key: String,
    /// Target page each query is run against.
    pub search_url: String,
    pub language: String,
    pub uule: String,
    pub mobile: String,
    pub output_format: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.brightdata.com/datasets/v3".to_string(),
            dataset_id: String::new(),
            api_key: String::new(),
            search_url: "https://www.google.com/".to_string(),
            language: String::new(),
            uule: String::new(),
            mobile: String::new(),
            output_format: "json".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Submits a pre-split batch of queries and returns the provider's job handle.
///
/// The call is atomic: on error nothing was accepted.
#[async_trait::async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, batch: &[String]) -> Result<String, ProviderError>;
}

/// Asks the provider whether a job has finished.
#[async_trait::async_trait]
pub trait JobRetriever: Send + Sync {
    async fn poll(&self, job_id: &str) -> Result<PollOutcome, ProviderError>;
}

#[derive(Serialize)]
struct TriggerRequest<'a> {
    input: Vec<QueryInput<'a>>,
}

#[derive(Serialize)]
struct QueryInput<'a> {
    url: &'a str,
    keyword: &'a str,
    language: &'a str,
    uule: &'a str,
    brd_mobile: &'a str,
}

#[derive(Deserialize)]
struct TriggerResponse {
    snapshot_id: Option<String>,
}

/// HTTP client for the scraping provider's trigger and snapshot endpoints.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    settings: ProviderSettings,
    client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ProviderError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|err| ProviderError::new(FailureKind::InvalidUrl, err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::new(FailureKind::InvalidUrl, "base url cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn trigger_url(&self) -> Result<Url, ProviderError> {
        let mut url = self.endpoint(&["trigger"])?;
        url.query_pairs_mut()
            .append_pair("dataset_id", &self.settings.dataset_id)
            .append_pair("notify", "false")
            .append_pair("include_errors", "true");
        Ok(url)
    }

    fn snapshot_url(&self, job_id: &str) -> Result<Url, ProviderError> {
        let mut url = self.endpoint(&["snapshot", job_id])?;
        url.query_pairs_mut()
            .append_pair("format", &self.settings.output_format);
        Ok(url)
    }

    fn trigger_body<'a>(&'a self, batch: &'a [String]) -> TriggerRequest<'a> {
        TriggerRequest {
            input: batch
                .iter()
                .map(|keyword| QueryInput {
                    url: &self.settings.search_url,
                    keyword,
                    language: &self.settings.language,
                    uule: &self.settings.uule,
                    brd_mobile: &self.settings.mobile,
                })
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl JobSubmitter for ProviderClient {
    async fn submit(&self, batch: &[String]) -> Result<String, ProviderError> {
        if batch.is_empty() {
            return Err(ProviderError::new(FailureKind::EmptyBatch, "no queries to submit"));
        }
        if batch.len() > MAX_BATCH_SIZE {
            return Err(ProviderError::new(
                FailureKind::BatchTooLarge {
                    max: MAX_BATCH_SIZE,
                    actual: batch.len(),
                },
                "split the batch before submitting",
            ));
        }

        let response = self
            .client
            .post(self.trigger_url()?)
            .bearer_auth(&self.settings.api_key)
            .json(&self.trigger_body(batch))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(http_status_error(status, &body));
        }

        let parsed: TriggerResponse = serde_json::from_str(&body)
            .map_err(|err| ProviderError::new(FailureKind::MalformedResponse, err.to_string()))?;
        match parsed.snapshot_id.filter(|id| !id.trim().is_empty()) {
            Some(job_id) => {
                harvest_info!("Provider accepted {} queries as {}", batch.len(), job_id);
                Ok(job_id)
            }
            None => Err(ProviderError::new(
                FailureKind::MissingJobId,
                "response carried no snapshot_id",
            )),
        }
    }
}

#[async_trait::async_trait]
impl JobRetriever for ProviderClient {
    async fn poll(&self, job_id: &str) -> Result<PollOutcome, ProviderError> {
        let response = self
            .client
            .get(self.snapshot_url(job_id)?)
            .bearer_auth(&self.settings.api_key)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            harvest_debug!("Snapshot {} not ready (202)", job_id);
            return Ok(PollOutcome::Running);
        }
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(http_status_error(status, &body));
        }
        interpret_snapshot_body(&body)
    }
}

/// Classify a 2xx snapshot body.
///
/// A bare `{"status": .., "message": ..}` object is a progress report, not a payload.
fn interpret_snapshot_body(body: &str) -> Result<PollOutcome, ProviderError> {
    if body.trim().is_empty() {
        return Ok(PollOutcome::NoData);
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|err| ProviderError::new(FailureKind::MalformedResponse, err.to_string()))?;

    let outcome = match &value {
        Value::Null => PollOutcome::NoData,
        Value::Array(items) if items.is_empty() => PollOutcome::NoData,
        Value::Object(map) if map.is_empty() => PollOutcome::NoData,
        Value::Object(map) if map.keys().all(|k| k == "status" || k == "message") => {
            match map.get("status").and_then(Value::as_str) {
                Some(s) if IN_PROGRESS.contains(&s.to_ascii_lowercase().as_str()) => {
                    PollOutcome::Running
                }
                Some(s) if FINISHED_EMPTY.contains(&s.to_ascii_lowercase().as_str()) => {
                    PollOutcome::NoData
                }
                _ => PollOutcome::Completed(value),
            }
        }
        _ => PollOutcome::Completed(value),
    };
    Ok(outcome)
}

fn http_status_error(status: StatusCode, body: &str) -> ProviderError {
    let mut message: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    if message.is_empty() {
        message = status.to_string();
    }
    ProviderError::new(FailureKind::HttpStatus(status.as_u16()), message)
}

fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return ProviderError::new(FailureKind::InvalidUrl, err.to_string());
    }
    ProviderError::new(FailureKind::Network, err.to_string())
}
