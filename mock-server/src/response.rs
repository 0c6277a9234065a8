// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use gadmin_rs::ErrorBody;
use gadmin_rs::ErrorDetail;
use gadmin_rs::ErrorEnvelope;

use super::*;

/// An error answered the way the admin APIs answer them:
/// `{"error": {"code", "message", "errors": [{"reason", ...}]}}`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub reason: &'static str,
    pub message: String,
    pub retry_after: Option<u64>,
}

impl ApiFailure {
    fn new(status: StatusCode, reason: &'static str, message: String) -> Self {
        Self { status, reason, message, retry_after: None }
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "notFound",
            format!("Resource Not Found: {what}"),
        )
    }

    pub fn duplicate(detail: &str) -> Self {
        Self::new(StatusCode::CONFLICT, "duplicate", detail.to_string())
    }

    pub fn invalid(detail: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid", detail)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "authError",
            "Login Required.".to_string(),
        )
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Not Authorized to access this resource/api".to_string(),
        )
    }

    pub fn rate_limited() -> Self {
        Self {
            retry_after: Some(0),
            ..Self::new(
                StatusCode::TOO_MANY_REQUESTS,
                "rateLimitExceeded",
                "Rate Limit Exceeded".to_string(),
            )
        }
    }

    pub fn quota_exceeded() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "quotaExceeded",
            "Quota exceeded for quota metric 'Queries'".to_string(),
        )
    }

    pub fn unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "backendError",
            "The service is currently unavailable.".to_string(),
        )
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                code: self.status.as_u16(),
                message: self.message.clone(),
                errors: vec![ErrorDetail {
                    domain: Some("global".to_string()),
                    reason: Some(self.reason.to_string()),
                    message: Some(self.message.clone()),
                }],
            },
        }
    }

    pub fn to_http_response(&self) -> Result<Response<Body>, http::Error> {
        let mut builder = Response::builder()
            .status(self.status)
            .header("Content-Type", "application/json");

        if let Some(seconds) = self.retry_after {
            builder = builder.header("Retry-After", seconds.to_string());
        }

        match serde_json::to_string(&self.envelope()) {
            Ok(serialized) => builder.body(serialized.into()),
            Err(e) => internal_error(format!("serializing error failed: {e}")),
        }
    }
}

fn internal_error(detail: String) -> Result<Response<Body>, http::Error> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("Content-Type", "application/json")
        .body(
            serde_json::json!({
                "error": {
                    "code": 500,
                    "message": detail,
                    "errors": [{ "reason": "internalError" }],
                }
            })
            .to_string()
            .into(),
        )
}

pub fn json_response<T>(
    status: StatusCode,
    body: &T,
) -> Result<Response<Body>, http::Error>
where
    T: Serialize,
{
    if status == StatusCode::NO_CONTENT {
        return Response::builder().status(status).body(Body::empty());
    }

    match serde_json::to_string(body) {
        Ok(serialized) => Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(serialized.into()),

        Err(e) => internal_error(format!("serializing response failed: {e}")),
    }
}

/// Cut one page out of a full listing. Page tokens are opaque to clients,
/// here they encode the offset of the next item.
pub fn paginate<T>(
    items: Vec<T>,
    page_token: Option<&str>,
    max_results: Option<u32>,
    default_page_size: u32,
    max_page_size: u32,
) -> Result<(Vec<T>, Option<String>), ApiFailure> {
    let offset = match page_token.filter(|t| !t.is_empty()) {
        None => 0,
        Some(token) => token
            .strip_prefix("offset-")
            .and_then(|offset| offset.parse::<usize>().ok())
            .filter(|offset| *offset <= items.len())
            .ok_or_else(|| {
                ApiFailure::invalid(format!("Invalid page token {token}"))
            })?,
    };

    let size = max_results
        .unwrap_or(default_page_size)
        .clamp(1, max_page_size) as usize;

    let end = (offset + size).min(items.len());
    let next = (end < items.len()).then(|| format!("offset-{end}"));
    let page = items.into_iter().skip(offset).take(size).collect();

    Ok((page, next))
}
