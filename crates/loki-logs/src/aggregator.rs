// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Size-triggered batching in front of the [`Flusher`].
//!
//! [`Batch::push`] only accumulates. The aggregator decides when the batch is
//! due (accumulated line bytes strictly above `batch_size`) and flushes it
//! inline before `add` returns. A flushed batch is dropped whether or not
//! delivery succeeded.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batch::{Batch, Entry};
use crate::config::Config;
use crate::encoder;
use crate::errors::FlushError;
use crate::flusher::Flusher;

pub struct Aggregator {
    batch: Batch,
    batch_size: usize,
    flusher: Arc<Flusher>,
    cancel: CancellationToken,
}

impl Aggregator {
    #[must_use]
    pub fn new(config: &Config, flusher: Arc<Flusher>, cancel: CancellationToken) -> Self {
        Aggregator {
            batch: Batch::new(),
            batch_size: config.batch_size,
            flusher,
            cancel,
        }
    }

    /// Builds an aggregator and adds every seed entry in order, flushing
    /// whenever the threshold is crossed.
    ///
    /// The returned result is the one of the last entry's add. Failures of
    /// earlier adds are logged.
    pub async fn with_entries(
        config: &Config,
        flusher: Arc<Flusher>,
        cancel: CancellationToken,
        entries: impl IntoIterator<Item = Entry>,
    ) -> (Self, Result<(), FlushError>) {
        let mut aggregator = Self::new(config, flusher, cancel);
        let mut result = Ok(());
        for entry in entries {
            if let Err(e) = result {
                warn!("LOKI | Flush while seeding batch failed: {e}");
            }
            result = aggregator.add(entry).await;
        }
        (aggregator, result)
    }

    /// Adds the entry; flushes synchronously if the batch is now over the
    /// threshold.
    pub async fn add(&mut self, entry: Entry) -> Result<(), FlushError> {
        let size = self.batch.push(entry);
        if size > self.batch_size {
            debug!(
                "LOKI | Batch size {size} exceeds {} bytes, flushing",
                self.batch_size
            );
            return self.flush().await;
        }
        Ok(())
    }

    /// Encodes and delivers the current batch, leaving an empty one behind.
    pub async fn flush(&mut self) -> Result<(), FlushError> {
        let batch = self.batch.take();
        if batch.is_empty() {
            debug!("LOKI | Nothing to flush");
            return Ok(());
        }

        let (payload, entries_count) = encoder::encode(&batch)?;
        debug!(
            "LOKI | Flushing {entries_count} entries in {} streams ({} line bytes, {} bytes compressed)",
            batch.len(),
            batch.size(),
            payload.len()
        );
        self.flusher.send(payload, &self.cancel).await
    }

    #[must_use]
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.batch.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}
