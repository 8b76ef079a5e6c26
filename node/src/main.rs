// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use bastion_node::config::NodeConfig;
use bastion_node::engine::Engine;
use bastion_node::ledger::unix_now;
use bastion_node::persistence::SnapshotManager;
use bastion_node::server::{build_router, SharedEngine};
use bastion_node::storage::MemoryStore;
use bastion_node::telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_telemetry()?;

    let cfg = NodeConfig::from_env()?;
    cfg.validate()?;
    tracing::info!(
        bind = %cfg.bind_addr,
        sim_version = %cfg.live_sim_version,
        replay_workers = cfg.replay_workers,
        "Initializing Bastion Node"
    );

    // Load Snapshot if present
    let store = match &cfg.snapshot_path {
        Some(path) => match SnapshotManager::load(path)? {
            Some(snapshot) => {
                tracing::info!(
                    "Snapshot restored from {:?}: {} players, {} sessions",
                    path,
                    snapshot.players.len(),
                    snapshot.sessions.len()
                );
                MemoryStore::from_snapshot(snapshot)
            }
            None => MemoryStore::new(),
        },
        None => MemoryStore::new(),
    };

    let engine: SharedEngine = Arc::new(Engine::new(&cfg, Arc::new(store))?);

    // Spawn Expiry + Eviction Sweep
    {
        let engine = engine.clone();
        let secs = cfg.sweep_interval_secs;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(secs));
            loop {
                interval.tick().await;
                let now = unix_now();
                let expired = engine.expire_idle(now).await;
                if expired > 0 {
                    tracing::info!("Expired {} idle sessions", expired);
                }
                let evicted = engine.evict_ended(now).await;
                if evicted > 0 {
                    let remaining = engine.ledger().indexed_sessions().await;
                    tracing::info!(
                        remaining = remaining,
                        "Evicted {} ended sessions",
                        evicted
                    );
                }
            }
        });
    }

    // Spawn Persistence Task
    if let (Some(path), Some(secs)) = (cfg.snapshot_path.clone(), cfg.auto_snapshot_interval_secs) {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(secs));
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                tracing::debug!("Auto-snapshotting...");
                match engine.save_snapshot(&path) {
                    Ok(bytes) => tracing::info!("Snapshot saved to {:?} ({} bytes)", path, bytes),
                    Err(e) => tracing::error!("Snapshot failed: {}", e),
                }
            }
        });
    }

    let app = build_router(engine.clone());

    let addr = cfg.bind_addr;
    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    if let Some(path) = &cfg.snapshot_path {
        engine.save_snapshot(path)?;
        tracing::info!("Final snapshot saved to {:?}", path);
    }
    Ok(())
}
