// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::Url;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use slog::Logger;
use slog::debug;
use slog::warn;

use super::*;

/// Which of the two admin APIs a request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    Directory,
    Licensing,
}

/// Authenticated access to the admin APIs. Cloning is cheap and clones share
/// the connection pool and token cache.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    log: Logger,
    http: reqwest::Client,
    credentials: Credentials,
    config: ClientConfig,
    directory_base: Url,
    licensing_base: Url,
}

fn parse_base(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        detail: e.to_string(),
    })?;

    if parsed.cannot_be_a_base() {
        return Err(Error::InvalidUrl {
            url: url.to_string(),
            detail: "cannot be a base url".to_string(),
        });
    }

    Ok(parsed)
}

impl AdminClient {
    pub fn new(
        log: Logger,
        config: ClientConfig,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        let directory_base = parse_base(&config.directory_base_url)?;
        let licensing_base = parse_base(&config.licensing_base_url)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| Error::Transport {
                url: config.directory_base_url.clone(),
                source,
            })?;

        debug!(log, "admin client built";
            "credentials" => ?credentials,
            "directory" => %directory_base,
            "licensing" => %licensing_base
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                log,
                http,
                credentials,
                config,
                directory_base,
                licensing_base,
            }),
        })
    }

    pub fn log(&self) -> &Logger {
        &self.inner.log
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Build a request URL under one API's base. Path segments are
    /// percent-encoded individually, so emails and SKU names are safe.
    pub fn url(
        &self,
        api: Api,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Url, Error> {
        let mut url = match api {
            Api::Directory => self.inner.directory_base.clone(),
            Api::Licensing => self.inner.licensing_base.clone(),
        };

        {
            let Ok(mut path) = url.path_segments_mut() else {
                return Err(Error::InvalidUrl {
                    url: url.to_string(),
                    detail: "cannot be a base url".to_string(),
                });
            };
            path.pop_if_empty().extend(segments);
        }

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }

    pub async fn get_json<T>(&self, url: Url) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(Method::GET, url.clone(), None).await?;
        decode(url, response).await
    }

    pub async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json_body(&url, body)?;
        let response =
            self.execute(Method::POST, url.clone(), Some(body)).await?;
        decode(url, response).await
    }

    pub async fn put_json<B, T>(&self, url: Url, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json_body(&url, body)?;
        let response =
            self.execute(Method::PUT, url.clone(), Some(body)).await?;
        decode(url, response).await
    }

    pub async fn delete(&self, url: Url) -> Result<(), Error> {
        self.execute(Method::DELETE, url, None).await?;
        Ok(())
    }

    /// Send a request, retrying the failures the retry policy allows.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, Error> {
        let policy = &self.inner.config.retry;
        let mut attempt = 1;

        loop {
            match self.send_once(&method, &url, body.as_ref()).await {
                Ok(response) => return Ok(response),

                Err(error) if policy.should_retry(attempt, &error) => {
                    let delay = policy.delay_for(attempt, &error);
                    warn!(self.inner.log, "request failed, retrying";
                        "method" => %method,
                        "url" => %url,
                        "attempt" => attempt,
                        "delay_ms" => delay.as_millis() as u64,
                        "error" => %error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }

                Err(error) => return Err(error),
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, Error> {
        let inner = &self.inner;
        let token = inner.credentials.bearer(&inner.log, &inner.http).await?;

        let mut request = inner
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token);

        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(self.inner.log, "sending request";
            "method" => %method,
            "url" => %url
        );

        let response = request.send().await.map_err(|source| {
            Error::Transport { url: url.to_string(), source }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.unwrap_or_default();

        Err(ApiError::from_body(status, &body, retry_after).into())
    }
}

fn to_json_body<B>(url: &Url, body: &B) -> Result<serde_json::Value, Error>
where
    B: Serialize + ?Sized,
{
    serde_json::to_value(body)
        .map_err(|source| Error::Encode { url: url.to_string(), source })
}

async fn decode<T>(url: Url, response: reqwest::Response) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    response
        .json()
        .await
        .map_err(|source| Error::Decode { url: url.to_string(), source })
}
