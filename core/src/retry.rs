// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use super::*;

/// Exponential backoff with a ceiling on both the delay and the number of
/// attempts.
#[derive(Deserialize, Serialize, JsonSchema, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    pub initial_backoff_ms: u64,

    pub max_backoff_ms: u64,

    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 32_000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let millis = self.initial_backoff_ms as f64
            * self.multiplier.max(1.0).powi(exponent);

        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }

    /// The delay to use for a given error: the server's suggestion if it
    /// sent one, otherwise the computed backoff. Both are capped.
    pub fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        let max = Duration::from_millis(self.max_backoff_ms);
        match error.retry_after() {
            Some(suggested) => suggested.min(max),
            None => self.backoff(attempt),
        }
    }

    /// Whether another attempt should follow failed attempt `attempt`.
    pub fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }
}
