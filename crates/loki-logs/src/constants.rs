// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Path appended to the configured endpoint URL.
pub const PUSH_PATH: &str = "/loki/api/v1/push";

/// Snappy-compressed protobuf is the only body format we send.
pub const CONTENT_TYPE: &str = "application/x-protobuf";

/// Flush threshold, in accumulated line bytes.
pub const DEFAULT_BATCH_SIZE: usize = 131_072;

/// Carried in the config for timer-driven collectors. The core never reads it.
pub const DEFAULT_BUFFER_TIMEOUT: Duration = Duration::from_millis(200);

/// Deadline for a single push attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const MIN_BACKOFF: Duration = Duration::from_millis(100);
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
pub const MAX_RETRIES: u32 = 10;

/// Only this many bytes of an error response body are read.
pub const MAX_ERR_MSG_LEN: usize = 1024;

/// Logs API record type whose `record` payload is shipped on its own.
pub const FUNCTION_RECORD_TYPE: &str = "function";
