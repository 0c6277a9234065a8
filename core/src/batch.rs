// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use slog::Logger;
use slog::info;
use slog::warn;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::*;

/// What a single bulk operation did to the remote state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The change was made
    Applied,

    /// The remote state already matched (member already present, license
    /// already removed, ...)
    Unchanged,
}

#[derive(Debug)]
pub struct BatchFailure<T> {
    pub item: T,
    pub error: Error,
}

/// Per-item results of a bulk operation. Each list keeps the order the
/// items were submitted in.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub applied: Vec<T>,
    pub unchanged: Vec<T>,
    pub failed: Vec<BatchFailure<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self { applied: vec![], unchanged: vec![], failed: vec![] }
    }
}

impl<T> BatchReport<T> {
    pub fn total(&self) -> usize {
        self.applied.len() + self.unchanged.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run `op` over every item with at most `max_concurrency` calls in flight.
/// A finished call frees its slot for the next item right away. A zero
/// limit is treated as one.
pub async fn run_bounded<T, F, Fut>(
    log: &Logger,
    label: &str,
    items: Vec<T>,
    max_concurrency: usize,
    op: F,
) -> BatchReport<T>
where
    T: Clone + Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<Outcome, Error>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return BatchReport::default();
    }

    let max_concurrency = max_concurrency.max(1);
    info!(log, "starting batch";
        "operation" => label,
        "items" => total,
        "max_concurrency" => max_concurrency
    );

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut tasks = JoinSet::new();
    let mut pending = HashMap::with_capacity(total);
    let mut results: Vec<Option<(T, Result<Outcome, Error>)>> =
        std::iter::repeat_with(|| None).take(total).collect();

    for (index, item) in items.into_iter().enumerate() {
        // Waiting here keeps at most `max_concurrency` tasks alive instead
        // of spawning everything up front.
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            let error = Error::TaskFailed("batch semaphore closed".to_string());
            results[index] = Some((item, Err(error)));
            continue;
        };

        let future = op(item.clone());
        let handle = tasks.spawn(async move {
            let result = future.await;
            drop(permit);
            result
        });

        pending.insert(handle.id(), (index, item));
    }

    let mut finished = 0;
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(e) => {
                let id = e.id();
                (id, Err(Error::TaskFailed(e.to_string())))
            }
        };

        let Some((index, item)) = pending.remove(&id) else {
            continue;
        };

        finished += 1;
        if finished % 100 == 0 || finished == total {
            info!(log, "batch progress";
                "operation" => label,
                "finished" => finished,
                "items" => total
            );
        }

        results[index] = Some((item, result));
    }

    let mut report = BatchReport::default();
    for (item, result) in results.into_iter().flatten() {
        match result {
            Ok(Outcome::Applied) => report.applied.push(item),
            Ok(Outcome::Unchanged) => report.unchanged.push(item),
            Err(error) => {
                warn!(log, "batch item failed";
                    "operation" => label,
                    "error" => %error
                );
                report.failed.push(BatchFailure { item, error });
            }
        }
    }

    info!(log, "batch finished";
        "operation" => label,
        "applied" => report.applied.len(),
        "unchanged" => report.unchanged.len(),
        "failed" => report.failed.len()
    );

    report
}
