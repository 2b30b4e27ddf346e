//! Turnstile Client - synthetic workload driver and health checker

mod health;
mod http;
mod workload;

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use turnstile_common::{Outcome, StatsSnapshot, TurnstileConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("turnstile_client=info".parse()?),
        )
        .init();

    info!(
        "Starting Turnstile workload driver v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Determine config path
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("turnstile.toml"));

    let config = if config_path.exists() {
        info!("Loading configuration from {}", config_path.display());
        TurnstileConfig::load(&config_path)?
    } else {
        info!("No configuration file found, using defaults");
        TurnstileConfig::default()
    };
    config.validate()?;

    let endpoint = http::Endpoint::new(&config.workload.base_url);
    info!(
        "Driving workload against {} ({} clients x {} workers x {} requests)",
        config.workload.base_url,
        config.workload.clients.len(),
        config.workload.workers,
        config.workload.requests_per_worker
    );

    // The health checker runs alongside the workload until signalled off.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let health_handle = if config.health.enabled {
        let poller = endpoint.clone();
        let period = Duration::from_secs(config.health.interval_secs);
        Some(tokio::spawn(health::run_health_checker(
            poller,
            period,
            shutdown_rx,
        )))
    } else {
        None
    };

    // Run the workload to completion; termination is join-based, never
    // sleep-bounded.
    let reports = workload::run_workload(&endpoint, &config.workload).await;

    for report in &reports {
        info!(
            "Client {} finished ({} transport failures)",
            report.client_id, report.transport_failures
        );
        for (code, count) in &report.responses {
            match Outcome::try_from(*code) {
                Ok(outcome) => info!("  {} {}: {}", code, outcome.reason(), count),
                Err(_) => info!("  {} (other): {}", code, count),
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(handle) = health_handle {
        let _ = handle.await;
    }

    // One final aggregate read so the run log ends with the server's view.
    match endpoint.fetch_stats(None).await {
        Ok((status, body)) if status.is_success() => {
            match serde_json::from_slice::<StatsSnapshot>(&body) {
                Ok(snapshot) => {
                    let recorded: u64 = snapshot
                        .values()
                        .flat_map(|counters| counters.values())
                        .sum();
                    info!(
                        "Server aggregate: {} clients, {} recorded outcomes",
                        snapshot.len(),
                        recorded
                    );
                }
                Err(e) => warn!("Could not parse aggregate statistics: {}", e),
            }
        }
        Ok((status, _)) => warn!("Aggregate read returned {}", status),
        Err(e) => warn!("Server unavailable for final aggregate: {}", e),
    }

    info!("Workload complete");
    Ok(())
}
