//! Snapshot assembly: store rows → compiler input

use burrow_cloudflared::ingress::{ApplicationEntry, TldEntry, TunnelSnapshot};
use burrow_db::entities::tld;
use burrow_db::Store;
use tracing::warn;

use crate::error::Result;

/// Loads everything the compiler needs for one tunnel.
///
/// Applications without a usable port are skipped with a warning; they
/// cannot produce a reachable service address.
pub async fn load_tunnel_snapshot(store: &Store, tunnel_id: i32) -> Result<TunnelSnapshot> {
    let tunnel = store.tunnels().get(tunnel_id).await?;
    let tlds = store.tunnels().tlds(tunnel_id).await?;
    let applications = store.tunnels().routed_applications(tunnel_id).await?;

    let mut entries = Vec::with_capacity(applications.len());
    for application in applications {
        let Some(port) = application.exposed_ports.primary_port() else {
            warn!(
                application = %application.name,
                tunnel = %tunnel.name,
                "Application exposes no ports; skipping its ingress rules"
            );
            continue;
        };

        let server = store.servers().get(application.server_id).await?;
        let workload_enabled = match (application.container_id, application.vm_id) {
            (Some(container_id), _) => store.containers().get(container_id).await?.enabled,
            (None, Some(vm_id)) => store.vms().get(vm_id).await?.enabled,
            // Bare applications have no workload gate
            (None, None) => true,
        };

        entries.push(ApplicationEntry {
            id: application.id,
            hostname: application.hostname,
            enabled: application.enabled,
            workload_enabled,
            service_ip: server.ip_address,
            service_port: port,
        });
    }

    Ok(TunnelSnapshot {
        name: tunnel.name,
        uuid: tunnel.uuid,
        tlds: tlds
            .iter()
            .map(|tld| TldEntry {
                id: tld.id,
                name: tld.name.clone(),
            })
            .collect(),
        applications: entries,
    })
}

/// The fully-qualified hostnames one application yields under a tunnel's
/// TLDs, matching the fan-out the compiler performs.
pub fn route_hostnames(app_hostname: &str, tlds: &[tld::Model]) -> Vec<String> {
    tlds.iter()
        .map(|tld| format!("{}.{}", app_hostname, tld.name))
        .collect()
}
