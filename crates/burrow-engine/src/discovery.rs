//! Periodic backend discovery
//!
//! Diffs backend-reported workloads against stored rows:
//! create-if-missing, update-if-changed, never delete. A workload absent
//! upstream is surfaced in the log and kept in the store: pruning on a
//! transient backend error would destroy route associations.

use std::sync::Arc;
use std::time::Duration;

use burrow_backend::{BackendRegistry, ServerConn};
use burrow_db::entities::server;
use burrow_db::store::{DiscoveredContainer, DiscoveredVm};
use burrow_db::Store;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::Result;

/// What one sweep saw
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub servers_swept: usize,
    pub servers_failed: usize,
    pub containers_seen: usize,
    pub vms_seen: usize,
}

/// Adapter-side view of a server row
pub fn server_conn(server: &server::Model) -> ServerConn {
    ServerConn {
        name: server.name.clone(),
        hostname: server.hostname.clone(),
        ip_address: server.ip_address.clone(),
        ssh_port: u16::try_from(server.ssh_port).unwrap_or(22),
        username: server.username.clone(),
        password: server.password.clone(),
        api_token: server.api_token.clone(),
        namespace: server.namespace.clone(),
    }
}

/// One pass over every server. Per-server failures are logged and skipped;
/// the sweep itself never aborts.
pub async fn run_sweep(store: &Store, registry: &BackendRegistry) -> SweepReport {
    let mut report = SweepReport::default();

    let servers = match store.servers().list().await {
        Ok(servers) => servers,
        Err(store_err) => {
            error!(error = %store_err, "Discovery sweep could not list servers");
            return report;
        }
    };

    for server in servers {
        match sweep_server(store, registry, &server).await {
            Ok((containers, vms)) => {
                report.servers_swept += 1;
                report.containers_seen += containers;
                report.vms_seen += vms;
            }
            Err(sweep_err) => {
                warn!(
                    server = %server.name,
                    error = %sweep_err,
                    "Discovery failed for server; skipping it this sweep"
                );
                report.servers_failed += 1;
            }
        }
    }

    info!(
        servers = report.servers_swept,
        failed = report.servers_failed,
        containers = report.containers_seen,
        vms = report.vms_seen,
        "Discovery sweep finished"
    );
    report
}

async fn sweep_server(
    store: &Store,
    registry: &BackendRegistry,
    server: &server::Model,
) -> Result<(usize, usize)> {
    let conn = server_conn(server);

    let containers = registry
        .list_containers(server.container_manager, &conn)
        .await?;
    let known_containers = store.containers().list_for_server(server.id).await?;

    for descriptor in &containers {
        store
            .containers()
            .upsert_discovered(
                server.id,
                &DiscoveredContainer {
                    name: descriptor.name.clone(),
                    image: descriptor.image_or_os.clone(),
                    state: descriptor.state.clone(),
                },
            )
            .await?;
    }
    for stored in &known_containers {
        if !containers.iter().any(|d| d.name == stored.name) {
            warn!(
                server = %server.name,
                container = %stored.name,
                "Container missing upstream; keeping stored row"
            );
        }
    }

    let vms = registry.list_vms(server.vm_manager, &conn).await?;
    let known_vms = store.vms().list_for_server(server.id).await?;

    for descriptor in &vms {
        store
            .vms()
            .upsert_discovered(
                server.id,
                &DiscoveredVm {
                    name: descriptor.name.clone(),
                    os_name: descriptor.image_or_os.clone(),
                    state: descriptor.state.clone(),
                },
            )
            .await?;
    }
    for stored in &known_vms {
        if !vms.iter().any(|d| d.name == stored.name) {
            warn!(
                server = %server.name,
                vm = %stored.name,
                "VM missing upstream; keeping stored row"
            );
        }
    }

    Ok((containers.len(), vms.len()))
}

/// Runs sweeps on a fixed interval, independent of request traffic.
pub fn spawn_sweep(
    store: Arc<Store>,
    registry: Arc<BackendRegistry>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_sweep(&store, &registry).await;
        }
    })
}
