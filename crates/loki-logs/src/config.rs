// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::backoff::BackoffConfig;
use crate::constants;
use crate::credentials::Credentials;
use crate::errors::ConfigError;
use crate::labels::LabelSet;

/// Resolved once at startup and shared read-only by every logger.
#[derive(Debug, Clone)]
pub struct Config {
    /// Full push URL, `<endpoint>/loki/api/v1/push`.
    pub push_url: String,
    /// Labels attached to every shipped line.
    pub labels: LabelSet,
    pub credentials: Credentials,
    /// Flush once accumulated line bytes exceed this.
    pub batch_size: usize,
    /// Not enforced by the aggregator; available to timer-driven collectors.
    pub buffer_timeout: Duration,
    /// Deadline for each push attempt.
    pub timeout: Duration,
    pub backoff: BackoffConfig,
    pub https_proxy: Option<String>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            push_url: push_url("http://localhost:3100"),
            labels: LabelSet::new(),
            credentials: Credentials::None,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            buffer_timeout: constants::DEFAULT_BUFFER_TIMEOUT,
            timeout: constants::DEFAULT_TIMEOUT,
            backoff: BackoffConfig::default(),
            https_proxy: None,
            debug: false,
        }
    }
}

impl Config {
    /// Defaults pointed at `endpoint` with the given labels.
    #[must_use]
    pub fn new(endpoint: &str, labels: LabelSet) -> Self {
        Self {
            push_url: push_url(endpoint),
            labels,
            ..Default::default()
        }
    }

    /// Create configuration from `LOKI_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let required = |key: &str| {
            lookup(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
        };

        let endpoint = required("LOKI_ENDPOINT_URL")?;
        let base_labels = LabelSet::from_iter([
            ("application", required("LOKI_APPLICATION_LABEL")?),
            ("environment", required("LOKI_ENV_LABEL")?),
        ]);
        let extra_labels = parse_extra_labels(&lookup("LOKI_EXTRA_LABELS").unwrap_or_default())?;

        let credentials = Credentials::resolve(
            lookup("LOKI_BEARER_TOKEN"),
            lookup("LOKI_USERNAME"),
            lookup("LOKI_PASSWORD"),
        )?;

        let config = Self {
            push_url: push_url(&endpoint),
            labels: base_labels.merge(&extra_labels),
            credentials,
            batch_size: parse_or(&lookup, "LOKI_BATCH_SIZE", constants::DEFAULT_BATCH_SIZE),
            buffer_timeout: Duration::from_millis(parse_or(
                &lookup,
                "LOKI_BUFFER_TIMEOUT_MS",
                millis(constants::DEFAULT_BUFFER_TIMEOUT),
            )),
            timeout: Duration::from_millis(parse_or(
                &lookup,
                "LOKI_TIMEOUT_MS",
                millis(constants::DEFAULT_TIMEOUT),
            )),
            backoff: BackoffConfig::default(),
            https_proxy: lookup("LOKI_HTTPS_PROXY").or_else(|| lookup("HTTPS_PROXY")),
            debug: lookup("LOKI_DEBUG").map_or(false, |v| parse_bool(&v).unwrap_or(false)),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = reqwest::Url::parse(&self.push_url) {
            return Err(ConfigError::InvalidUrl {
                url: self.push_url.clone(),
                reason: e.to_string(),
            });
        }

        self.labels.validate()?;

        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "push timeout must be greater than 0".to_string(),
            ));
        }

        if self.backoff.min_backoff > self.backoff.max_backoff {
            return Err(ConfigError::Invalid(format!(
                "minimum backoff {:?} exceeds maximum backoff {:?}",
                self.backoff.min_backoff, self.backoff.max_backoff
            )));
        }

        Ok(())
    }
}

/// Appends the push path to an endpoint base URL.
#[must_use]
pub fn push_url(endpoint: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), constants::PUSH_PATH)
}

/// Parses `name,value,name,value,...` into a validated label set.
pub fn parse_extra_labels(raw: &str) -> Result<LabelSet, ConfigError> {
    if raw.is_empty() {
        return Ok(LabelSet::new());
    }

    let tokens: Vec<&str> = raw.split(',').collect();
    if tokens.len() % 2 != 0 {
        return Err(ConfigError::InvalidExtraLabels(raw.to_string()));
    }

    let labels: LabelSet = tokens
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect();
    labels.validate()?;
    Ok(labels)
}

/// Accepts the same spellings as Go's `strconv.ParseBool`.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value '{raw}' for {key}, using default {default}");
            default
        }),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
