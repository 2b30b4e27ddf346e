//! Periodic liveness polling

use crate::http::Endpoint;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{info, warn};

/// Poll the read endpoint on a fixed period and log liveness, until the
/// shutdown signal flips.
pub async fn run_health_checker(
    endpoint: Endpoint,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(period);
    // Consume the immediate first tick so polls start one period in.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match endpoint.fetch_stats(None).await {
                    Ok((status, _)) => info!("Server status: {}", status.as_u16()),
                    Err(_) => warn!("Server unavailable"),
                }
            }
            _ = shutdown.changed() => {
                break;
            }
        }
    }
}
