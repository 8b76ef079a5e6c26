// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "bastion_node=debug,tower_http=debug";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the log subscriber (`RUST_LOG` overrides the default filter) and
/// the Prometheus recorder, then registers metric descriptions.
pub fn init_telemetry() -> Result<(), BuildError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let handle = PrometheusBuilder::new().install_recorder()?;
    if PROM_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus recorder installed twice; keeping the first handle");
    }

    metrics::describe_counter!("bastion_sessions_started_total", "Sessions opened");
    metrics::describe_counter!("bastion_sessions_ended_total", "Sessions closed, explicitly or by expiry");
    metrics::describe_counter!("bastion_sessions_evicted_total", "Ended sessions dropped after retention");
    metrics::describe_counter!("bastion_segments_verified_total", "Segments accepted after replay");
    metrics::describe_counter!("bastion_segments_rejected_total", "Segments rejected, by reason");
    metrics::describe_counter!("bastion_segments_duplicate_total", "Retried segments answered from history");
    metrics::describe_histogram!("bastion_replay_duration_seconds", "Time spent verifying one segment");
    metrics::describe_gauge!("bastion_active_sessions", "Sessions currently active");
    metrics::describe_gauge!("bastion_snapshot_size_bytes", "Size of the last saved snapshot in bytes");

    metrics::gauge!("bastion_node_up", 1.0);
    Ok(())
}

/// Renders the Prometheus exposition text for `/metrics`.
pub fn get_metrics() -> String {
    PROM_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_else(|| "# metrics not initialized\n".to_string())
}
