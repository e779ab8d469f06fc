// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lambda Logs API records and how each one becomes a log line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::Entry;
use crate::constants::FUNCTION_RECORD_TYPE;
use crate::labels::LabelSet;

/// One element of a Logs API payload: `{"type": .., "time": .., "record": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub record: serde_json::Value,
}

impl LogMessage {
    #[must_use]
    pub fn is_function_output(&self) -> bool {
        self.kind == FUNCTION_RECORD_TYPE
    }

    /// Function output ships only its `record`; everything else ships the
    /// whole envelope.
    pub fn line(&self) -> Result<String, serde_json::Error> {
        if self.is_function_output() {
            serde_json::to_string(&self.record)
        } else {
            serde_json::to_string(self)
        }
    }

    /// The parsed `time` field, or now if it does not parse.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        parse_timestamp(&self.time).unwrap_or_else(|| {
            debug!("LOKI | Unparsable time '{}', using current time", self.time);
            Utc::now()
        })
    }

    pub fn to_entry(&self, labels: &LabelSet) -> Result<Entry, serde_json::Error> {
        let line = self.line()?;
        Ok(Entry::new(labels.clone(), line, self.timestamp()))
    }
}

/// Parses a Logs API payload (a JSON array of records).
pub fn parse_messages(raw: &str) -> Result<Vec<LogMessage>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// RFC 3339 with optional fractional seconds.
#[must_use]
pub fn parse_timestamp(time: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(time)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
