// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use reqwest::StatusCode;

use super::*;

/// Reasons the vendor attaches to 403 responses when a quota or rate limit
/// was hit. These are worth retrying, other 403s are not.
const RATE_LIMIT_REASONS: &[&str] =
    &["rateLimitExceeded", "userRateLimitExceeded", "quotaExceeded"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid admin email {0:?}, expected user@domain")]
    InvalidAdminEmail(String),

    #[error("invalid url {url:?}: {detail}")]
    InvalidUrl { url: String, detail: String },

    #[error("config: {0}")]
    Config(String),

    #[error("credentials: {0}")]
    Credentials(String),

    #[error("signing token assertion failed")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("encoding request body for {url} failed")]
    Encode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("decoding response from {url} failed")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("directory returned no customer id for {0}")]
    MissingCustomerId(String),

    #[error("server returned page token {0:?} twice")]
    RepeatedPageToken(String),

    #[error("{0} has no unarchival SKU")]
    NotArchived(String),

    #[error("batch task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(e) => e.is_retryable(),
            Error::Transport { source, .. } => {
                source.is_timeout() || source.is_connect()
            }
            _ => false,
        }
    }

    /// The server-suggested delay before trying again, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Api(e) => e.retry_after,
            _ => None,
        }
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.api().is_some_and(ApiError::is_not_found)
    }

    pub fn is_duplicate(&self) -> bool {
        self.api().is_some_and(ApiError::is_duplicate)
    }
}

/// One entry of the `errors` array in the vendor's error envelope
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct ErrorDetail {
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

/// The body of a vendor error response
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct ErrorBody {
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

/// The vendor wraps every error body as `{"error": {...}}`
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// A non-success response from one of the admin APIs
#[derive(Debug, Clone, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub reasons: Vec<String>,
    pub retry_after: Option<Duration>,
}

impl ApiError {
    /// Build from a status and raw response body. Bodies that are not the
    /// vendor envelope keep their text as the message.
    pub fn from_body(
        status: StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope { error }) => ApiError {
                status,
                message: error.message,
                reasons: error
                    .errors
                    .into_iter()
                    .filter_map(|detail| detail.reason)
                    .collect(),
                retry_after,
            },

            Err(_) => ApiError {
                status,
                message: body.trim().to_string(),
                reasons: vec![],
                retry_after,
            },
        }
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.reasons.iter().any(|r| r == reason)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
            || (self.status == StatusCode::FORBIDDEN
                && RATE_LIMIT_REASONS.iter().any(|r| self.has_reason(r)))
    }

    pub fn is_retryable(&self) -> bool {
        self.is_rate_limited()
            || matches!(
                self.status,
                StatusCode::INTERNAL_SERVER_ERROR
                    | StatusCode::BAD_GATEWAY
                    | StatusCode::SERVICE_UNAVAILABLE
                    | StatusCode::GATEWAY_TIMEOUT
            )
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    pub fn is_duplicate(&self) -> bool {
        self.status == StatusCode::CONFLICT || self.has_reason("duplicate")
    }
}
