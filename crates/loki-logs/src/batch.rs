// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory working set of streams between two flushes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::labels::LabelSet;

/// A single log line with the labels identifying its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    labels: LabelSet,
    line: String,
    timestamp: DateTime<Utc>,
}

impl Entry {
    #[must_use]
    pub fn new(labels: LabelSet, line: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Entry {
            labels,
            line: line.into(),
            timestamp,
        }
    }

    #[must_use]
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub timestamp: DateTime<Utc>,
    pub line: String,
}

/// Lines sharing one label set, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    labels: String,
    entries: Vec<StreamEntry>,
}

impl Stream {
    fn new(labels: String) -> Self {
        Stream {
            labels,
            entries: Vec::new(),
        }
    }

    /// Canonical label string, also the stream key.
    #[must_use]
    pub fn labels(&self) -> &str {
        &self.labels
    }

    #[must_use]
    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }
}

/// Streams keyed by canonical label string, plus the total line bytes held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    streams: BTreeMap<String, Stream>,
    size: usize,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the entry to its stream and returns the new batch size.
    ///
    /// Only the line counts towards the size; labels are free.
    pub fn push(&mut self, entry: Entry) -> usize {
        let key = entry.labels.canonicalize(&[]);
        let stream = self
            .streams
            .entry(key)
            .or_insert_with_key(|key| Stream::new(key.clone()));

        self.size += entry.line.len();
        stream.entries.push(StreamEntry {
            timestamp: entry.timestamp,
            line: entry.line,
        });
        self.size
    }

    /// Sum of the byte lengths of every line held.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of streams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.streams.values().map(|s| s.entries.len()).sum()
    }

    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    #[must_use]
    pub fn stream(&self, labels: &str) -> Option<&Stream> {
        self.streams.get(labels)
    }

    /// Moves everything out, leaving an empty batch with size zero.
    pub fn take(&mut self) -> Batch {
        std::mem::take(self)
    }
}
