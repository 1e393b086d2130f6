//! Bounded fan-out over a fixed set of worker tasks.

use crate::utils::DeployError;
use crate::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Concurrency of every tree walk and apply phase.
pub const DEFAULT_WORKERS: usize = 10;

const MAX_BUFFER: usize = 100;

/// Run `worker` for every item of `input` on at most `num_workers` tasks.
///
/// Results come back in completion order; `Ok(None)` results are dropped.
/// The first error stops dispatching and is returned once in-flight items
/// have finished. If `cancel` fires before every item ran, the result is
/// [`DeployError::Cancelled`].
pub async fn run_workers<T, K, F, Fut>(
    cancel: &CancellationToken,
    num_workers: usize,
    input: Vec<T>,
    worker: F,
) -> Result<Vec<K>>
where
    T: Send + 'static,
    K: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<K>>> + Send + 'static,
{
    let total = input.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let num_workers = num_workers.clamp(1, total);
    let buffer = total.min(MAX_BUFFER);
    let stop = cancel.child_token();
    let worker = Arc::new(worker);

    let (job_tx, job_rx) = mpsc::channel::<T>(buffer);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::channel::<Result<Option<K>>>(buffer);

    debug!(items = total, workers = num_workers, "Starting worker pool");

    let mut tasks = JoinSet::new();
    for _ in 0..num_workers {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let worker = Arc::clone(&worker);
        let stop = stop.clone();

        tasks.spawn(async move {
            loop {
                let job = job_rx.lock().await.recv().await;
                let Some(job) = job else { break };
                if stop.is_cancelled() {
                    break;
                }

                let result = worker(job).await;
                if result.is_err() {
                    stop.cancel();
                }
                if result_tx.send(result).await.is_err() {
                    break;
                }
            }
        });
    }
    // Workers hold the only handles, so dispatch fails fast if they all die.
    drop(job_rx);
    drop(result_tx);

    let dispatch_stop = stop.clone();
    tasks.spawn(async move {
        for item in input {
            tokio::select! {
                biased;
                _ = dispatch_stop.cancelled() => break,
                sent = job_tx.send(item) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut results = Vec::new();
    let mut first_error = None;
    let mut processed = 0;

    while let Some(result) = result_rx.recv().await {
        processed += 1;
        match result {
            Ok(Some(value)) => results.push(value),
            Ok(None) => {}
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if first_error.is_none() {
                first_error = Some(DeployError::Worker(e.to_string()));
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    if processed < total {
        debug!(processed, total, "Worker pool cancelled");
        return Err(DeployError::Cancelled);
    }

    Ok(results)
}
