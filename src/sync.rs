//! Remote run tracking.
//!
//! Reports run progress, publishes saved models, and signals run
//! completion to the tracking service. Every call here is best-effort:
//! network or API trouble is logged and swallowed, so training keeps
//! checkpointing locally even when the tracker is unreachable.

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::archive;
use crate::error::Result;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Tracking API base URL, no trailing slash.
    pub api_url: String,
    pub run_id: String,
    pub instance_id: String,
    /// Optional bearer token for the tracking API.
    pub token: Option<String>,
    /// Minimum time between progress reports.
    pub interval: Duration,
}

/// Progress-report throttle.
///
/// A report goes out when the episode count changed AND the interval
/// elapsed since the previous report; `force` bypasses both checks so
/// the final count always lands.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    last_sent: Option<Instant>,
    last_count: Option<u64>,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            last_count: None,
        }
    }

    /// Decide whether a report for `count` should go out at `now`.
    pub fn should_send(&self, count: u64, force: bool, now: Instant) -> bool {
        if force {
            return true;
        }
        if self.last_count == Some(count) {
            return false;
        }
        if let Some(sent) = self.last_sent {
            if now.duration_since(sent) < self.interval {
                return false;
            }
        }
        true
    }

    /// Record a report that actually reached the tracker. Failed sends
    /// are not recorded, so the same count stays eligible for a retry.
    pub fn mark_sent(&mut self, count: u64, now: Instant) {
        self.last_sent = Some(now);
        self.last_count = Some(count);
    }
}

/// What to do with the tracker's response to a model publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A model record was created; upload the archive and confirm.
    Upload,
    /// The server already holds an equal-or-better model.
    Skip,
    /// Anything else; logged as an error, never fatal to the run.
    Rejected,
}

pub fn interpret_publish_status(status: StatusCode) -> PublishOutcome {
    match status {
        StatusCode::CREATED => PublishOutcome::Upload,
        StatusCode::NO_CONTENT => PublishOutcome::Skip,
        _ => PublishOutcome::Rejected,
    }
}

#[derive(Debug, Deserialize)]
struct ModelRecord {
    id: Value,
    upload_url: String,
}

impl ModelRecord {
    fn id_segment(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub struct RemoteSyncClient {
    client: Client,
    config: SyncConfig,
    heartbeat: Heartbeat,
}

impl RemoteSyncClient {
    pub fn new(config: SyncConfig) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let heartbeat = Heartbeat::new(config.interval);
        Ok(Self {
            client,
            config,
            heartbeat,
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Throttled progress heartbeat: `PATCH .../instances/{id}/`.
    pub fn report_episodes(&mut self, count: u64, force: bool) {
        let now = Instant::now();
        if !self.heartbeat.should_send(count, force, now) {
            return;
        }
        let url = format!(
            "{}/instances/{}/",
            self.config.api_url, self.config.instance_id
        );
        match self
            .request(Method::PATCH, &url)
            .json(&json!({ "episodes": count }))
            .send()
        {
            Ok(response) if response.status().is_success() => {
                self.heartbeat.mark_sent(count, now);
                debug!("reported {count} completed episodes");
            }
            Ok(response) => warn!("progress report rejected: {}", response.status()),
            Err(err) => warn!("progress report failed: {err}"),
        }
    }

    /// Publish a saved model score; on a created record, upload the
    /// model directory as a gzip tar and mark the upload complete.
    pub fn publish_model(&self, score: f64, directory: &Path) {
        let url = format!("{}/runs/{}/models/", self.config.api_url, self.config.run_id);
        let response = match self
            .request(Method::POST, &url)
            .json(&json!({ "score": score }))
            .send()
        {
            Ok(response) => response,
            Err(err) => {
                warn!("model publication failed: {err}");
                return;
            }
        };

        let status = response.status();
        match interpret_publish_status(status) {
            PublishOutcome::Upload => {
                let record: ModelRecord = match response.json() {
                    Ok(record) => record,
                    Err(err) => {
                        warn!("model record response was unreadable: {err}");
                        return;
                    }
                };
                self.upload_model(&record, directory);
            }
            PublishOutcome::Skip => {
                info!("server already holds a model scoring at least {score}, skipping upload");
            }
            PublishOutcome::Rejected => error!("model publication rejected: {status}"),
        }
    }

    fn upload_model(&self, record: &ModelRecord, directory: &Path) {
        let bytes = match archive::pack_directory(directory) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("could not archive {}: {err}", directory.display());
                return;
            }
        };
        let size = bytes.len();

        // upload_url is presigned, no auth header
        if let Err(err) = self
            .client
            .put(&record.upload_url)
            .header("content-type", "application/gzip")
            .body(bytes)
            .send()
            .and_then(|response| response.error_for_status())
        {
            warn!("model upload failed: {err}");
            return;
        }

        let url = format!("{}/models/{}/", self.config.api_url, record.id_segment());
        match self
            .request(Method::PATCH, &url)
            .json(&json!({ "uploaded": true }))
            .send()
        {
            Ok(response) if response.status().is_success() => {
                info!("uploaded model archive ({size} bytes)");
            }
            Ok(response) => warn!("upload confirmation rejected: {}", response.status()),
            Err(err) => warn!("upload confirmation failed: {err}"),
        }
    }

    /// Final run notification: `POST .../finish/` with the outcome.
    pub fn finish(&self, failed: bool) {
        let url = format!(
            "{}/runs/{}/instances/{}/finish/",
            self.config.api_url, self.config.run_id, self.config.instance_id
        );
        match self
            .request(Method::POST, &url)
            .json(&json!({ "failed": failed }))
            .send()
        {
            Ok(response) if response.status().is_success() => {
                info!("run finish reported (failed={failed})");
            }
            Ok(response) => warn!("finish notification rejected: {}", response.status()),
            Err(err) => warn!("finish notification failed: {err}"),
        }
    }
}
