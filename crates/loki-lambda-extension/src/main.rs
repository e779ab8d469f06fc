// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{process, sync::Arc};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use loki_logs::{
    config::Config,
    logger::{Logger, LokiLogger},
};

/// Reads one Logs API payload (a JSON array of records) per stdin line and
/// ships it to Loki. Stops at end of input or on Ctrl-C.
#[tokio::main]
pub async fn main() {
    let config = Config::from_env();
    let debug_enabled = config.as_ref().is_ok_and(|c| c.debug);
    let log_level = if debug_enabled { "debug" } else { "info" };
    let env_filter = format!("h2=off,hyper=off,rustls=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Error creating config on loki extension startup: {e}");
            process::exit(1);
        }
    };
    info!(
        "Shipping logs to {} with labels {} (batch size {} bytes)",
        config.push_url, config.labels, config.batch_size
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {e}");
            return;
        }
        info!("Shutdown requested, cancelling in-flight deliveries");
        shutdown.cancel();
    });

    let logger = LokiLogger::new(config, cancel.clone());
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(payload)) => {
                if payload.trim().is_empty() {
                    continue;
                }
                if let Err(e) = logger.send_log(&payload).await {
                    error!("Failed to ship logs: {e}");
                }
            }
            Ok(None) => {
                debug!("End of input");
                break;
            }
            Err(e) => {
                error!("Failed to read from stdin: {e}");
                break;
            }
        }
    }
}
