// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use super::*;

pub const DEFAULT_DIRECTORY_BASE_URL: &str =
    "https://admin.googleapis.com/admin/directory/v1";
pub const DEFAULT_LICENSING_BASE_URL: &str =
    "https://licensing.googleapis.com/apps/licensing/v1";

/// Client settings. Every field has a default, so a config file only needs
/// to name what it changes.
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub directory_base_url: String,

    pub licensing_base_url: String,

    /// Per-request timeout
    pub timeout_secs: u64,

    pub retry: RetryPolicy,

    /// Default worker count for bulk inserts and deletes
    pub max_concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            directory_base_url: DEFAULT_DIRECTORY_BASE_URL.to_string(),
            licensing_base_url: DEFAULT_LICENSING_BASE_URL.to_string(),
            timeout_secs: 30,
            retry: RetryPolicy::default(),
            max_concurrency: 10,
        }
    }
}

impl ClientConfig {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "reading config {} failed: {e}",
                path.display()
            ))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            Error::Config(format!(
                "parsing config {} failed: {e}",
                path.display()
            ))
        })
    }

    /// Point both APIs at one server, as the mock server serves them.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.directory_base_url = format!("{base}/admin/directory/v1");
        self.licensing_base_url = format!("{base}/apps/licensing/v1");
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({
            "max_concurrency": 4,
            "retry": { "max_attempts": 2 }
        }))
        .unwrap();

        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.directory_base_url, DEFAULT_DIRECTORY_BASE_URL);
    }

    #[test]
    fn test_with_base_url() {
        let config =
            ClientConfig::default().with_base_url("http://127.0.0.1:8080/");

        assert_eq!(
            config.directory_base_url,
            "http://127.0.0.1:8080/admin/directory/v1"
        );
        assert_eq!(
            config.licensing_base_url,
            "http://127.0.0.1:8080/apps/licensing/v1"
        );
    }
}
