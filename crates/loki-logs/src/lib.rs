// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ships structured log records to a Loki push endpoint.
//!
//! Records are grouped into streams by their label set, accumulated into a
//! [`batch::Batch`] until a byte threshold is crossed, encoded as a
//! snappy-compressed `PushRequest` and delivered by the [`flusher::Flusher`]
//! with bounded exponential backoff.
//!
//! ```text
//!   LogMessage ──> Entry ──> Aggregator ──> encoder ──> Flusher ──> Loki
//!                              (Batch)       (prost +    (retry +
//!                                             snappy)     backoff)
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod backoff;
pub mod batch;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod encoder;
pub mod errors;
pub mod flusher;
pub mod labels;
pub mod logger;
pub mod logproto;
pub mod record;
