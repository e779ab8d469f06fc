// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;

use reqwest::RequestBuilder;
use tracing::warn;

use crate::errors::ConfigError;

/// Pre-resolved push credentials. At most one scheme is ever attached to a
/// request.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credentials {
    #[default]
    None,
    Bearer(String),
    Basic {
        username: String,
        password: String,
    },
}

impl Credentials {
    /// Picks the scheme from optional settings. Empty strings count as unset.
    ///
    /// A bearer token takes precedence over a basic-auth pair. A username
    /// without a password (or the reverse) is an error.
    pub fn resolve(
        bearer_token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bearer_token = bearer_token.filter(|t| !t.is_empty());
        let username = username.filter(|u| !u.is_empty());
        let password = password.filter(|p| !p.is_empty());

        let basic = match (username, password) {
            (Some(username), Some(password)) => Some((username, password)),
            (None, None) => None,
            _ => return Err(ConfigError::CredentialsMismatch),
        };

        Ok(match (bearer_token, basic) {
            (Some(token), Some(_)) => {
                warn!("Both a bearer token and basic auth credentials are set, using the bearer token");
                Credentials::Bearer(token)
            }
            (Some(token), None) => Credentials::Bearer(token),
            (None, Some((username, password))) => Credentials::Basic { username, password },
            (None, None) => Credentials::None,
        })
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::None => request,
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::None => write!(f, "Credentials::None"),
            Credentials::Bearer(_) => write!(f, "Credentials::Bearer(<redacted>)"),
            Credentials::Basic { username, .. } => {
                write!(f, "Credentials::Basic({username}, <redacted>)")
            }
        }
    }
}
