// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::errors::{FlushError, LoggerError};
use crate::flusher::Flusher;
use crate::record;

#[async_trait]
pub trait Logger {
    /// Ships one Logs API payload (a JSON array of records).
    async fn send_log(&self, log: &str) -> Result<(), LoggerError>;
}

/// Writes Logs API payloads to Loki.
///
/// Delivery is best effort: a batch that cannot be delivered is logged and
/// dropped, and `send_log` still succeeds. Malformed input, encoding
/// failures and cancellation are returned to the caller.
#[derive(Debug, Clone)]
pub struct LokiLogger {
    config: Arc<Config>,
    flusher: Arc<Flusher>,
    cancel: CancellationToken,
}

impl LokiLogger {
    #[must_use]
    pub fn new(config: Arc<Config>, cancel: CancellationToken) -> Self {
        let flusher = Arc::new(Flusher::new(&config));
        LokiLogger {
            config,
            flusher,
            cancel,
        }
    }
}

#[async_trait]
impl Logger for LokiLogger {
    async fn send_log(&self, log: &str) -> Result<(), LoggerError> {
        let messages = record::parse_messages(log).map_err(LoggerError::Parse)?;

        // Convert everything up front so bad input never leaves a partial batch behind.
        let entries = messages
            .iter()
            .map(|message| message.to_entry(&self.config.labels))
            .collect::<Result<Vec<_>, _>>()
            .map_err(LoggerError::Serialize)?;

        let mut aggregator = Aggregator::new(
            &self.config,
            Arc::clone(&self.flusher),
            self.cancel.clone(),
        );
        for entry in entries {
            debug!("LOKI | Preparing to send log message: {}", entry.line());
            best_effort(aggregator.add(entry).await)?;
        }
        best_effort(aggregator.flush().await)
    }
}

fn best_effort(result: Result<(), FlushError>) -> Result<(), LoggerError> {
    match result {
        Ok(()) => Ok(()),
        Err(e @ (FlushError::Cancelled | FlushError::Encode(_))) => Err(e.into()),
        Err(e) => {
            warn!("LOKI | Dropping batch: {e}");
            Ok(())
        }
    }
}
