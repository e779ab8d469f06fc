// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// A label set that Loki would reject.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("invalid label name '{0}'")]
    InvalidName(String),

    #[error("label '{0}' has an empty value")]
    EmptyValue(String),
}

/// Startup configuration problems. Any of these aborts the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Required environment variable '{0}' was not found")]
    MissingVariable(String),

    #[error(
        "Invalid value for environment variable LOKI_EXTRA_LABELS. Expected a comma separated list with an even number of entries, got '{0}'"
    )]
    InvalidExtraLabels(String),

    #[error("Invalid label: {0}")]
    InvalidLabel(#[from] LabelError),

    #[error("both username and password must be set if either one is set")]
    CredentialsMismatch,

    #[error("Invalid push URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failure to turn a batch into a push payload, or a payload back into a batch.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to snappy-compress push request: {0}")]
    Compress(#[source] snap::Error),

    #[error("failed to snappy-decompress push request: {0}")]
    Decompress(#[source] snap::Error),

    #[error("failed to decode push request: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Outcome of a failed flush.
#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("error sending batch: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned HTTP status {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("flush cancelled")]
    Cancelled,
}

impl FlushError {
    /// Transport failures, 429 and 5xx are worth another attempt. Everything
    /// else is final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            FlushError::Transport(_) => true,
            FlushError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            FlushError::Encode(_) | FlushError::Cancelled => false,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FlushError::Status { status, .. } => Some(*status),
            FlushError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Errors surfaced by [`crate::logger::Logger::send_log`].
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("failed to parse log payload: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize log line: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Flush(#[from] FlushError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let retryable = [429, 500, 502, 503, 504, 599];
        for code in retryable {
            let err = FlushError::Status {
                status: StatusCode::from_u16(code).unwrap(),
                message: String::new(),
            };
            assert!(err.is_retryable(), "{code} should be retried");
        }

        let terminal = [400, 401, 403, 404, 413, 301];
        for code in terminal {
            let err = FlushError::Status {
                status: StatusCode::from_u16(code).unwrap(),
                message: String::new(),
            };
            assert!(!err.is_retryable(), "{code} should not be retried");
        }
    }

    #[test]
    fn test_cancelled_and_encode_are_terminal() {
        assert!(!FlushError::Cancelled.is_retryable());
        let err = FlushError::Encode(EncodeError::Decompress(snap::Error::Empty));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = FlushError::Status {
            status: StatusCode::BAD_REQUEST,
            message: "entry out of order".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server returned HTTP status 400 Bad Request: entry out of order"
        );
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

        let err = ConfigError::MissingVariable("LOKI_ENDPOINT_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Required environment variable 'LOKI_ENDPOINT_URL' was not found"
        );
    }
}
