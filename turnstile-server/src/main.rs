//! Turnstile Server - bounded-admission statistics endpoint

mod admission;
mod resolver;
mod server;
mod stats;

use admission::AdmissionGate;
use anyhow::Result;
use resolver::{OutcomeResolver, WeightedResolver};
use stats::StatsStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};
use turnstile_common::{StatsSnapshot, TurnstileConfig};

/// Shared application state
pub struct AppState {
    pub config: TurnstileConfig,
    pub gate: AdmissionGate,
    pub resolver: Box<dyn OutcomeResolver>,
    pub stats: StatsStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("turnstile=info".parse()?),
        )
        .init();

    info!("Starting Turnstile Server v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("turnstile.toml"));

    // Load or create default configuration
    let config = if config_path.exists() {
        info!("Loading configuration from {}", config_path.display());
        TurnstileConfig::load(&config_path)?
    } else {
        info!("No configuration file found, using defaults");
        let config = TurnstileConfig::default();
        // Save default config for reference
        if let Err(e) = config.save(&config_path) {
            error!("Failed to save default config: {}", e);
        }
        config
    };
    config.validate()?;

    info!(
        "Admission capacity {}, snapshot target {}",
        config.admission.max_in_flight, config.snapshot.path
    );

    // Create shared state
    let state = Arc::new(AppState {
        gate: AdmissionGate::new(config.admission.max_in_flight),
        resolver: Box::new(WeightedResolver::new()),
        stats: StatsStore::new(),
        config,
    });

    // Readiness and shutdown signalling for the serve loop
    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server_state = state.clone();
    let mut server_handle =
        tokio::spawn(async move { server::run_server(server_state, ready_tx, shutdown_rx).await });

    // The accept loop reports its bound address once listening; nothing
    // sleeps waiting for startup.
    match ready_rx.await {
        Ok(addr) => info!("Ready to serve on http://{}", addr),
        Err(_) => warn!("Server exited before binding"),
    }

    // Wait for shutdown signal
    let signalled = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            true
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => warn!("Server exited unexpectedly"),
                Ok(Err(e)) => error!("HTTP server error: {}", e),
                Err(e) => error!("Server task failed: {}", e),
            }
            false
        }
    };

    if signalled {
        match server_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("HTTP server error: {}", e),
            Err(e) => error!("Server task failed: {}", e),
        }
    }

    // Persist the final snapshot. The core exposes the copy; the binary owns
    // the file I/O. A persistence failure must not take the process down a
    // non-zero path.
    let (snapshot, totals) = state.stats.snapshot_with_totals().await;
    info!(
        "Final totals: {} positive, {} negative",
        totals.total_positive, totals.total_negative
    );
    match persist_snapshot(Path::new(&state.config.snapshot.path), &snapshot) {
        Ok(()) => info!("Statistics saved to {}", state.config.snapshot.path),
        Err(e) => error!(
            "Failed to persist snapshot to {}: {}",
            state.config.snapshot.path, e
        ),
    }

    info!("Turnstile Server shutdown complete");
    Ok(())
}

/// Write the snapshot as indented, key-ordered JSON
fn persist_snapshot(path: &Path, snapshot: &StatsSnapshot) -> Result<()> {
    let data = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_common::ClientCounters;

    #[test]
    fn test_persist_snapshot_writes_pretty_json() {
        let mut snapshot = StatsSnapshot::new();
        let mut counters = ClientCounters::new();
        counters.insert(200, 3);
        counters.insert(500, 1);
        snapshot.insert("Client1".to_string(), counters);

        let dir = std::env::temp_dir().join("turnstile-persist-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("client_stats.json");

        persist_snapshot(&path, &snapshot).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        // Indented output, key-ordered map
        assert!(written.contains("\n"));
        assert!(written.contains("\"Client1\""));
        let parsed: StatsSnapshot = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, snapshot);

        std::fs::remove_file(&path).unwrap();
    }
}
