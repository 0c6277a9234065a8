// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use std::sync::Arc;

use dropshot::HttpServer;
use gadmin_mock_server::MockState;
use gadmin_mock_server::ServerContext;
use gadmin_mock_server::create_http_server;
use gadmin_mock_server::user;
use gadmin_rs::AdminClient;
use gadmin_rs::ClientConfig;
use gadmin_rs::Credentials;
use gadmin_rs::RetryPolicy;
use slog::Logger;
use slog::o;

pub const ADMIN_EMAIL: &str = "mscott@dundermifflin.com";
pub const DOMAIN: &str = "dundermifflin.com";
pub const CUSTOMER_ID: &str = "C0dunder";

pub struct TestServer {
    pub log: Logger,
    pub server: HttpServer<Arc<ServerContext>>,
    pub context: Arc<ServerContext>,
}

impl TestServer {
    /// A mock server holding just the administrator, plus whatever `seed`
    /// adds.
    pub fn start(seed: impl FnOnce(&mut MockState)) -> TestServer {
        let log = Logger::root(slog::Discard, o!());
        let context = Arc::new(ServerContext::new(&log, CUSTOMER_ID));

        context.with_state(|state| {
            state.add_user(gadmin_rs::User {
                is_admin: true,
                ..user(ADMIN_EMAIL, "Michael", "Scott")
            });
            seed(state);
        });

        let server = create_http_server(&log, None, context.clone()).unwrap();
        TestServer { log, server, context }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.server.local_addr())
    }

    /// Retries without waiting, so that injected faults cost nothing.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
                multiplier: 2.0,
            },
            ..ClientConfig::default().with_base_url(&self.base_url())
        }
    }

    pub fn client(&self) -> AdminClient {
        AdminClient::new(
            self.log.clone(),
            self.config(),
            Credentials::AccessToken("test-token".to_string()),
        )
        .unwrap()
    }
}
