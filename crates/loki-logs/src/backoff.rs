// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff with jitter and a bounded retry budget.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::constants;
use crate::errors::FlushError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    /// Retries after the first attempt. Zero means a single attempt.
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            min_backoff: constants::MIN_BACKOFF,
            max_backoff: constants::MAX_BACKOFF,
            max_retries: constants::MAX_RETRIES,
        }
    }
}

/// Retry state for one delivery.
///
/// The n-th wait sleeps for a random duration in
/// `[min * 2^(n-1), min * 2^n)`, both bounds capped at `max_backoff`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    num_retries: u32,
    next_delay_min: Duration,
    next_delay_max: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Backoff {
            config,
            num_retries: 0,
            next_delay_min: config.min_backoff.min(config.max_backoff),
            next_delay_max: double(config.min_backoff, config.max_backoff),
        }
    }

    /// Waits performed so far.
    #[must_use]
    pub fn num_retries(&self) -> u32 {
        self.num_retries
    }

    /// Whether the budget allows another attempt.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.num_retries < self.config.max_retries
    }

    /// Counts a retry and returns how long to wait before it.
    pub fn next_delay(&mut self) -> Duration {
        self.num_retries += 1;

        let delay = if self.next_delay_min < self.next_delay_max {
            rand::thread_rng().gen_range(self.next_delay_min..self.next_delay_max)
        } else {
            self.next_delay_min
        };

        self.next_delay_min = double(self.next_delay_min, self.config.max_backoff);
        self.next_delay_max = double(self.next_delay_max, self.config.max_backoff);
        delay
    }

    /// Sleeps for the next delay, returning early with
    /// [`FlushError::Cancelled`] if the token fires.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Result<(), FlushError> {
        let delay = self.next_delay();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FlushError::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

fn double(value: Duration, max: Duration) -> Duration {
    value.checked_mul(2).map_or(max, |doubled| doubled.min(max))
}
