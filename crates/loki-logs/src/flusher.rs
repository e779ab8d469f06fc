// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of encoded push payloads to Loki.
//!
//! ```text
//!   payload ──> POST ──> 2xx ──────────────> done
//!                 │
//!                 ├── 429 / 5xx / network ─> wait (backoff) ─> POST again
//!                 │                           (budget left)
//!                 └── other status ────────> give up
//! ```
//!
//! Every attempt carries its own deadline. Cancelling the token aborts both
//! an in-flight attempt and a pending wait.

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::backoff::{Backoff, BackoffConfig};
use crate::config::Config;
use crate::constants;
use crate::credentials::Credentials;
use crate::errors::FlushError;

#[derive(Debug, Clone)]
pub struct Flusher {
    client: reqwest::Client,
    push_url: String,
    credentials: Credentials,
    timeout: Duration,
    backoff: BackoffConfig,
}

impl Flusher {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let client = build_client(config.https_proxy.as_deref()).unwrap_or_else(|e| {
            error!(
                "Unable to parse proxy configuration: {}, no proxy will be used",
                e
            );
            reqwest::Client::new()
        });
        Flusher {
            client,
            push_url: config.push_url.clone(),
            credentials: config.credentials.clone(),
            timeout: config.timeout,
            backoff: config.backoff,
        }
    }

    #[must_use]
    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Pushes the payload, retrying per the configured backoff.
    ///
    /// Returns the error of the last attempt when delivery does not succeed.
    pub async fn send(
        &self,
        payload: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<(), FlushError> {
        let mut backoff = Backoff::new(self.backoff);
        self.send_with_backoff(payload, cancel, &mut backoff).await
    }

    /// Like [`Flusher::send`] with caller-owned retry state, so the number of
    /// waits can be inspected afterwards.
    pub async fn send_with_backoff(
        &self,
        payload: impl Into<Bytes>,
        cancel: &CancellationToken,
        backoff: &mut Backoff,
    ) -> Result<(), FlushError> {
        let payload = payload.into();

        loop {
            debug!(
                "LOKI | Sending batch of {} bytes, retry count: {}",
                payload.len(),
                backoff.num_retries()
            );
            let time = Instant::now();
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(FlushError::Cancelled),
                result = self.attempt(payload.clone()) => result,
            };
            let elapsed = time.elapsed();

            let err = match result {
                Ok(()) => {
                    debug!("LOKI | Sent batch in {} ms", elapsed.as_millis());
                    return Ok(());
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                error!("LOKI | Failed to send batch, not retrying: {err}");
                return Err(err);
            }

            if !backoff.can_retry() {
                error!(
                    "LOKI | Failed to send batch after {} attempts: {err}",
                    backoff.num_retries() + 1
                );
                return Err(err);
            }

            warn!(
                "LOKI | Error sending batch after {} ms, will retry (status: {:?}): {err}",
                elapsed.as_millis(),
                err.status()
            );
            backoff.wait(cancel).await?;
        }
    }

    async fn attempt(&self, payload: Bytes) -> Result<(), FlushError> {
        let response = self.create_request(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = read_error_message(response).await;
        Err(FlushError::Status { status, message })
    }

    fn create_request(&self, payload: Bytes) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(&self.push_url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, constants::CONTENT_TYPE)
            .body(payload);
        self.credentials.apply(request)
    }
}

fn build_client(https_proxy: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(proxy) = https_proxy {
        builder = builder.proxy(reqwest::Proxy::https(proxy)?);
    }
    builder.build()
}

/// First line of at most [`constants::MAX_ERR_MSG_LEN`] bytes of the body.
async fn read_error_message(mut response: Response) -> String {
    let mut buf = Vec::with_capacity(constants::MAX_ERR_MSG_LEN);
    while buf.len() < constants::MAX_ERR_MSG_LEN {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(constants::MAX_ERR_MSG_LEN - buf.len());
                buf.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                debug!("LOKI | Failed to read error response body: {e}");
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}
