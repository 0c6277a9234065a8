// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory stand-in for the Directory and Licensing APIs, plus the
//! OAuth token endpoint, for exercising `gadmin-rs` without a real tenant.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::anyhow;
use dropshot::ApiDescription;
use dropshot::Body;
use dropshot::ConfigDropshot;
use dropshot::HttpError;
use dropshot::HttpServer;
use dropshot::Path;
use dropshot::Query;
use dropshot::RequestContext;
use dropshot::ServerBuilder;
use dropshot::TypedBody;
use dropshot::UntypedBody;
use dropshot::endpoint;
use http::StatusCode;
use http::header::AUTHORIZATION;
use http::response::Response;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::o;

mod directory;
mod licensing;
mod response;
mod seed;
mod store;
mod token;

pub use response::*;
pub use seed::*;
pub use store::*;

/// An error to answer the next request with instead of serving it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// 429 with `Retry-After: 0`
    RateLimited,
    /// 403 `quotaExceeded`
    QuotaExceeded,
    /// 503
    Unavailable,
    /// 400 `invalid`
    BadRequest,
    /// 403 `forbidden`, which is not worth retrying
    Forbidden,
}

impl Fault {
    fn failure(&self) -> ApiFailure {
        match self {
            Fault::RateLimited => ApiFailure::rate_limited(),
            Fault::QuotaExceeded => ApiFailure::quota_exceeded(),
            Fault::Unavailable => ApiFailure::unavailable(),
            Fault::BadRequest => {
                ApiFailure::invalid("Invalid Input: injected".to_string())
            }
            Fault::Forbidden => ApiFailure::forbidden(),
        }
    }
}

pub struct ServerContext {
    log: Logger,
    state: Mutex<MockState>,

    /// Consumed one per API request. `None` lets a request through.
    faults: Mutex<VecDeque<Option<Fault>>>,

    /// Extra time each write spends in flight
    write_latency: Mutex<Duration>,

    requests: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,

    token_requests: AtomicUsize,
    assertions: Mutex<Vec<String>>,

    /// `expires_in` of issued access tokens, in seconds
    token_lifetime: AtomicU64,
}

impl ServerContext {
    pub fn new(log: &Logger, customer_id: &str) -> Self {
        Self {
            log: log.new(o!("component" => "mock-admin-api")),
            state: Mutex::new(MockState::new(customer_id)),
            faults: Mutex::new(VecDeque::new()),
            write_latency: Mutex::new(Duration::ZERO),
            requests: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            token_requests: AtomicUsize::new(0),
            assertions: Mutex::new(vec![]),
            token_lifetime: AtomicU64::new(3600),
        }
    }

    /// Run `f` against the stored state, for seeding and inspection.
    pub fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    /// Answer the next API request with `fault`.
    pub fn push_fault(&self, fault: Fault) {
        self.faults.lock().unwrap().push_back(Some(fault));
    }

    /// Script the next requests: `None` serves a request normally, `Some`
    /// fails it.
    pub fn script_faults(
        &self,
        faults: impl IntoIterator<Item = Option<Fault>>,
    ) {
        self.faults.lock().unwrap().extend(faults);
    }

    pub fn set_write_latency(&self, latency: Duration) {
        *self.write_latency.lock().unwrap() = latency;
    }

    /// API requests seen, token requests excluded
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// The most writes that were ever in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_token_lifetime(&self, secs: u64) {
        self.token_lifetime.store(secs, Ordering::SeqCst);
    }

    pub fn token_request_count(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    /// Every JWT assertion presented to the token endpoint
    pub fn assertions(&self) -> Vec<String> {
        self.assertions.lock().unwrap().clone()
    }

    fn next_fault(&self) -> Option<Fault> {
        self.faults.lock().unwrap().pop_front().flatten()
    }

    /// Serve one API request: check the bearer token, apply any scripted
    /// fault, then run `op` against the state. Writes pass `write` so that
    /// their concurrency is tracked.
    async fn serve<T, F>(
        &self,
        rqctx: &RequestContext<Arc<ServerContext>>,
        status: StatusCode,
        write: bool,
        op: F,
    ) -> Result<Response<Body>, HttpError>
    where
        T: Serialize,
        F: FnOnce(&mut MockState) -> Result<T, ApiFailure>,
    {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let result = match self.authorize(rqctx) {
            Err(failure) => Err(failure),
            Ok(()) => match self.next_fault() {
                Some(fault) => {
                    debug!(self.log, "injecting fault";
                        "fault" => ?fault,
                        "uri" => %rqctx.request.uri()
                    );
                    Err(fault.failure())
                }

                None if write => {
                    let current =
                        self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

                    let latency = *self.write_latency.lock().unwrap();
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }

                    let result = self.apply(op);
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    result
                }

                None => self.apply(op),
            },
        };

        let response = match result {
            Ok(body) => json_response(status, &body),
            Err(failure) => failure.to_http_response(),
        };

        response.map_err(HttpError::from)
    }

    fn apply<T, F>(&self, op: F) -> Result<T, ApiFailure>
    where
        F: FnOnce(&mut MockState) -> Result<T, ApiFailure>,
    {
        let mut state = self.state.lock().unwrap();
        op(&mut state)
    }

    fn authorize(
        &self,
        rqctx: &RequestContext<Arc<ServerContext>>,
    ) -> Result<(), ApiFailure> {
        let bearer = rqctx
            .request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.trim().is_empty());

        match bearer {
            Some(_) => Ok(()),
            None => Err(ApiFailure::unauthorized()),
        }
    }
}

pub fn api() -> anyhow::Result<ApiDescription<Arc<ServerContext>>> {
    let mut api = ApiDescription::new();

    api.register(directory::list_users)?;
    api.register(directory::get_user)?;
    api.register(directory::list_groups)?;
    api.register(directory::get_group)?;
    api.register(directory::list_members)?;
    api.register(directory::get_member)?;
    api.register(directory::insert_member)?;
    api.register(directory::delete_member)?;

    api.register(licensing::list_for_product)?;
    api.register(licensing::list_for_product_and_sku)?;
    api.register(licensing::get_license)?;
    api.register(licensing::insert_license)?;
    api.register(licensing::update_license)?;
    api.register(licensing::delete_license)?;

    api.register(token::token)?;

    Ok(api)
}

/// Start serving `context`. Binding to port 0 picks a free port, which
/// `HttpServer::local_addr` reports.
pub fn create_http_server(
    log: &Logger,
    bind_address: Option<SocketAddr>,
    context: Arc<ServerContext>,
) -> anyhow::Result<HttpServer<Arc<ServerContext>>> {
    let bind_address =
        bind_address.unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 0)));

    let config = ConfigDropshot { bind_address, ..Default::default() };

    let server = ServerBuilder::new(api()?, context, log.clone())
        .config(config)
        .start()
        .map_err(|e| anyhow!("starting mock server failed: {e}"))?;

    info!(log, "mock admin api listening"; "address" => %server.local_addr());

    Ok(server)
}
