// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch to wire payload: prost-encoded `PushRequest`, snappy block format.

use chrono::{DateTime, Utc};
use prost::Message;

use crate::batch::Batch;
use crate::errors::EncodeError;
use crate::logproto::{EntryAdapter, PushRequest, StreamAdapter};

/// Builds the push request and returns it together with the number of
/// entries it carries.
#[must_use]
pub fn push_request(batch: &Batch) -> (PushRequest, usize) {
    let mut entries_count = 0;
    let streams = batch
        .streams()
        .map(|stream| {
            entries_count += stream.entries().len();
            StreamAdapter {
                labels: stream.labels().to_string(),
                entries: stream
                    .entries()
                    .iter()
                    .map(|entry| EntryAdapter {
                        timestamp: Some(to_timestamp(entry.timestamp)),
                        line: entry.line.clone(),
                    })
                    .collect(),
                hash: 0,
            }
        })
        .collect();

    (PushRequest { streams }, entries_count)
}

/// Serializes and compresses the batch. Returns the payload and the entry
/// count.
pub fn encode(batch: &Batch) -> Result<(Vec<u8>, usize), EncodeError> {
    let (request, entries_count) = push_request(batch);
    let buf = request.encode_to_vec();
    let compressed = snap::raw::Encoder::new()
        .compress_vec(&buf)
        .map_err(EncodeError::Compress)?;
    Ok((compressed, entries_count))
}

/// Inverse of [`encode`], as done by the receiving end.
pub fn decode(payload: &[u8]) -> Result<PushRequest, EncodeError> {
    let buf = snap::raw::Decoder::new()
        .decompress_vec(payload)
        .map_err(EncodeError::Decompress)?;
    Ok(PushRequest::decode(buf.as_slice())?)
}

fn to_timestamp(ts: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: ts.timestamp(),
        // Leap seconds report nanos past 1e9, which protobuf rejects.
        nanos: ts.timestamp_subsec_nanos().min(999_999_999) as i32,
    }
}
