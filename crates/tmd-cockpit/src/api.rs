use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Response, Url};
use tokio::sync::mpsc;
use tracing::warn;

use tmd_core::wire::{
    ControlAck, RemoveTaskRequest, SseFrameDecoder, StreamEnvelope, TaskControlAction,
    TaskControlRequest, TaskKey, TransferTask,
};

use crate::state::DashEvent;

/// Thin client over the server's HTTP surface. Control and poll requests
/// carry a bounded timeout; the stream request deliberately does not.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("invalid endpoint path '{path}'"))
    }

    pub async fn app_version(&self) -> Result<String> {
        let response = self
            .http
            .get(self.endpoint("get_app_version")?)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?.trim().to_string())
    }

    pub async fn download_list(&self, already_down: bool) -> Result<Vec<TransferTask>> {
        let response = self
            .http
            .get(self.endpoint("get_download_list")?)
            .query(&[("already_down", if already_down { "true" } else { "false" })])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Returns the server's next-action label, the only authority on the
    /// resulting global state.
    pub async fn set_download_state(&self, state: &str) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint("set_download_state")?)
            .query(&[("state", state)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    pub async fn clear_history(&self) -> Result<ControlAck> {
        let response = self
            .http
            .post(self.endpoint("clear_history")?)
            .json(&serde_json::json!({}))
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn remove_task(&self, key: &TaskKey) -> Result<ControlAck> {
        let body = RemoveTaskRequest {
            chat_id: key.chat.clone(),
            message_id: key.id.clone(),
        };
        let response = self
            .http
            .post(self.endpoint("remove_task")?)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn task_control(
        &self,
        action: TaskControlAction,
        key: &TaskKey,
    ) -> Result<ControlAck> {
        let body = TaskControlRequest {
            action,
            chat_id: key.chat.clone(),
            message_id: key.id.clone(),
        };
        let response = self
            .http
            .post(self.endpoint("task_control")?)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn open_stream(&self) -> Result<Response> {
        let response = self
            .http
            .get(self.endpoint("stream")?)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }
}

/// Own the stream subscription for the life of the process: connect, decode,
/// forward update envelopes, and reconnect with doubling backoff when the
/// connection drops. Decode errors are logged and skipped; they never tear
/// the connection down.
pub async fn stream_loop(api: ApiClient, tx: mpsc::Sender<DashEvent>) {
    let mut backoff = Duration::from_secs(1);

    loop {
        let response = match api.open_stream().await {
            Ok(response) => response,
            Err(err) => {
                warn!("stream_connect_error: {err}");
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
                continue;
            }
        };
        backoff = Duration::from_secs(1);

        if tx.send(DashEvent::Connected).await.is_err() {
            return;
        }

        let mut decoder = SseFrameDecoder::<StreamEnvelope>::default();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    let report = decoder.push_chunk(&bytes);
                    for err in report.errors {
                        warn!("stream_decode_error: {err}");
                    }
                    for envelope in report.frames {
                        if !envelope.is_update() {
                            continue;
                        }
                        if tx.send(DashEvent::Update(envelope)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!("stream_read_error: {err}");
                    break;
                }
            }
        }

        let final_report = decoder.finish();
        for err in final_report.errors {
            warn!("stream_decode_error: {err}");
        }
        for envelope in final_report.frames {
            if envelope.is_update() && tx.send(DashEvent::Update(envelope)).await.is_err() {
                return;
            }
        }

        if tx.send(DashEvent::Disconnected).await.is_err() {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = next_backoff(backoff);
    }
}

pub fn next_backoff(current: Duration) -> Duration {
    let next = current + current;
    if next > Duration::from_secs(10) {
        Duration::from_secs(10)
    } else {
        next
    }
}
