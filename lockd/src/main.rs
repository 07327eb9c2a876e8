//! Process entry point: loads configuration, wires the replicator
//! (single-node or Raft-backed) to the Service facade, and serves the
//! HTTP boundary alongside the periodic expiration sweep and (when
//! clustered) the Raft driver and peer transport.
//!
//! Environment configuration, `tracing_subscriber` init, a `watch`
//! channel for graceful shutdown, background tasks spawned before the
//! foreground `axum::serve` call.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use lockd_core::{LockStateMachine, Replicator, SystemClock, UuidGen};
use lockd_raft::{RaftConfig, RaftLogStorage, RaftReplicator, SingleNodeReplicator};
use lockd_service::{Config, Service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        self_address = %config.self_address,
        partners = config.partner_addresses.len(),
        api_port = config.api_port,
        "starting lockd"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut background_tasks = Vec::new();

    let (replicator, state_machine): (Arc<dyn Replicator>, Arc<RwLock<LockStateMachine>>) =
        if config.is_single_node() {
            tracing::info!("no partner addresses configured; running single-node");
            let replicator = SingleNodeReplicator::new(config.self_address.clone());
            let state_machine = replicator.state_machine();
            (Arc::new(replicator), state_machine)
        } else {
            let assignment = lockd_raft::assign_node_ids(&config.all_addresses());
            let self_id = assignment
                .iter()
                .find(|(_, addr)| addr == &config.self_address)
                .map(|(id, _)| *id)
                .expect("self_address is always present in all_addresses()");
            let peers: Vec<u64> = assignment
                .iter()
                .filter(|(id, _)| *id != self_id)
                .map(|(id, _)| *id)
                .collect();
            let addresses: HashMap<u64, String> = assignment.into_iter().collect();

            let storage = match std::env::var("LOCKD_DATA_DIR") {
                Ok(dir) => {
                    std::fs::create_dir_all(&dir)?;
                    let path = std::path::Path::new(&dir).join(format!("raft-{self_id}.redb"));
                    RaftLogStorage::open(path)?
                }
                Err(_) => RaftLogStorage::open_temporary()?,
            };

            let raft_config = RaftConfig {
                id: self_id,
                peers,
                ..Default::default()
            };

            let (handle, driver) = RaftReplicator::new(raft_config, storage, addresses)?;
            let state_machine = handle.state_machine();

            let raft_bind: SocketAddr = config.self_address.parse()?;
            let peer_clients = lockd_raft::transport::peer_clients();

            background_tasks.push(tokio::spawn(driver.run(peer_clients, shutdown_rx.clone())));

            let transport_replicator = handle.clone();
            let transport_shutdown = shutdown_rx.clone();
            background_tasks.push(tokio::spawn(async move {
                if let Err(e) =
                    lockd_raft::transport::serve(raft_bind, transport_replicator, transport_shutdown)
                        .await
                {
                    tracing::error!(error = %e, "raft transport server failed");
                }
            }));

            // The lowest-numbered replica campaigns immediately on a fresh
            // cluster so there is a leader without waiting out a full
            // election timeout; other nodes wait to hear from it.
            if self_id == 1 {
                if let Err(e) = handle.campaign().await {
                    tracing::warn!(error = %e, "initial campaign failed");
                }
            }

            (Arc::new(handle), state_machine)
        };

    let service = Service::new(
        replicator,
        state_machine,
        Arc::new(SystemClock),
        Arc::new(UuidGen),
    );

    let sweep_shutdown = shutdown_rx.clone();
    let sweep_service = service.clone();
    background_tasks.push(tokio::spawn(lockd_service::sweep::run(
        sweep_service,
        lockd_service::sweep::interval_for(5),
        sweep_shutdown,
    )));

    let app = lockd_http::create_router(lockd_http::AppState::new(service));
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.api_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(addr = %http_addr, "HTTP boundary listening");

    let shutdown_signal = async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    for handle in background_tasks {
        handle.await.ok();
    }

    Ok(())
}
