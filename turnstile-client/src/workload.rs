//! Synthetic workload generation

use crate::http::Endpoint;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time;
use tracing::{debug, warn};
use turnstile_common::WorkloadConfig;

/// Response-code tally for one simulated client
#[derive(Debug)]
pub struct WorkloadReport {
    pub client_id: String,
    pub responses: BTreeMap<u16, u64>,
    pub transport_failures: u64,
}

/// Run every configured simulated client to completion.
pub async fn run_workload(endpoint: &Endpoint, config: &WorkloadConfig) -> Vec<WorkloadReport> {
    let runs = config
        .clients
        .iter()
        .map(|client_id| run_client(endpoint.clone(), client_id.clone(), config.clone()));
    join_all(runs).await
}

/// Drive one simulated client: `workers` tasks share a single tick budget,
/// so the client's combined request rate follows the configured interval.
async fn run_client(
    endpoint: Endpoint,
    client_id: String,
    config: WorkloadConfig,
) -> WorkloadReport {
    let (tick_tx, tick_rx) = mpsc::channel::<()>(1);
    let period = Duration::from_millis(config.tick_interval_ms);

    let ticker = tokio::spawn(async move {
        let mut interval = time::interval(period);
        loop {
            interval.tick().await;
            if tick_tx.send(()).await.is_err() {
                // Every worker is done; no one left to pace.
                break;
            }
        }
    });

    let tick_rx = Arc::new(Mutex::new(tick_rx));
    let responses = Arc::new(Mutex::new(BTreeMap::new()));
    let transport_failures = Arc::new(AtomicU64::new(0));

    let mut workers = Vec::new();
    for worker_id in 0..config.workers {
        let endpoint = endpoint.clone();
        let client_id = client_id.clone();
        let tick_rx = tick_rx.clone();
        let responses = responses.clone();
        let transport_failures = transport_failures.clone();
        let quota = config.requests_per_worker;

        workers.push(tokio::spawn(async move {
            for _ in 0..quota {
                // Holding the lock across recv serializes the workers on the
                // shared tick.
                {
                    let mut rx = tick_rx.lock().await;
                    if rx.recv().await.is_none() {
                        break;
                    }
                }

                match endpoint.submit(&client_id).await {
                    Ok(status) => {
                        let mut tally = responses.lock().await;
                        *tally.entry(status.as_u16()).or_insert(0) += 1;
                    }
                    Err(e) => {
                        warn!(
                            "Client {} worker {}: request failed: {}",
                            client_id, worker_id, e
                        );
                        transport_failures.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                }
            }
            debug!("Client {} worker {} finished", client_id, worker_id);
        }));
    }

    // Drop the local receiver handle so the ticker stops once the workers
    // release theirs.
    drop(tick_rx);

    for worker in workers {
        let _ = worker.await;
    }
    let _ = ticker.await;

    let responses = responses.lock().await.clone();
    WorkloadReport {
        client_id,
        responses,
        transport_failures: transport_failures.load(Ordering::Relaxed),
    }
}
