// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: u64,
}

/// Pull `assertion` out of a JWT-bearer grant form. The assertion's
/// alphabet is URL safe, so no percent decoding is needed.
fn assertion_of(form: &str) -> Option<&str> {
    let mut grant_type = None;
    let mut assertion = None;

    for pair in form.split('&') {
        match pair.split_once('=') {
            Some(("grant_type", value)) => grant_type = Some(value),
            Some(("assertion", value)) => assertion = Some(value),
            _ => {}
        }
    }

    grant_type
        .filter(|g| g.ends_with("jwt-bearer"))
        .and(assertion)
        .filter(|a| !a.is_empty())
}

/// The OAuth endpoint a service account trades its signed assertion at.
/// Any well formed grant is accepted; the assertions are kept for
/// inspection.
#[endpoint {
    method = POST,
    path = "/token"
}]
pub async fn token(
    rqctx: RequestContext<Arc<ServerContext>>,
    body: UntypedBody,
) -> Result<Response<Body>, HttpError> {
    let apictx = rqctx.context();
    let count = apictx.token_requests.fetch_add(1, Ordering::SeqCst) + 1;

    let form = std::str::from_utf8(body.as_bytes()).unwrap_or_default();

    let result = match assertion_of(form) {
        Some(assertion) => {
            apictx.assertions.lock().unwrap().push(assertion.to_string());
            json_response(
                StatusCode::OK,
                &TokenResponse {
                    access_token: format!("mock-token-{count}"),
                    token_type: "Bearer",
                    expires_in: apictx.token_lifetime.load(Ordering::SeqCst),
                },
            )
        }

        None => Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("Content-Type", "application/json")
            .body(
                serde_json::json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid JWT grant",
                })
                .to_string()
                .into(),
            ),
    };

    result.map_err(HttpError::from)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_assertion_of() {
        let form = "grant_type=\
                    urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer\
                    &assertion=aaa.bbb.ccc";
        assert_eq!(assertion_of(form), Some("aaa.bbb.ccc"));

        assert_eq!(assertion_of("grant_type=password&assertion=a.b.c"), None);
        assert_eq!(assertion_of("grant_type=jwt-bearer"), None);
    }
}
