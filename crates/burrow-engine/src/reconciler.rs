//! Reconciliation engine
//!
//! Sequences every model mutation that touches the daemon: validate →
//! mutate store → invoke daemon → regenerate and persist the compiled
//! configuration, with compensating actions when a later step fails. Store
//! transactions are never held across daemon calls; the per-tunnel lock is
//! what serializes a whole transition.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use burrow_backend::BackendRegistry;
use burrow_cloudflared::{compile, TunnelDaemon};
use burrow_db::entities::tunnel::{self, TunnelState};
use burrow_db::store::NewTunnel;
use burrow_db::{DbError, Store};
use tempfile::NamedTempFile;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::discovery::{self, SweepReport};
use crate::error::{EngineError, Result};
use crate::locks::TunnelLocks;
use crate::snapshot::{load_tunnel_snapshot, route_hostnames};

/// Request to create a tunnel; TLDs are referenced by name
pub struct CreateTunnel {
    pub name: String,
    pub domain: String,
    pub description: Option<String>,
    pub tld_names: Vec<String>,
}

pub struct Reconciler {
    store: Arc<Store>,
    daemon: Arc<dyn TunnelDaemon>,
    registry: Arc<BackendRegistry>,
    config_dir: PathBuf,
    locks: TunnelLocks,
}

impl Reconciler {
    /// All collaborators are injected; the engine owns no globals.
    pub fn new(
        store: Arc<Store>,
        daemon: Arc<dyn TunnelDaemon>,
        registry: Arc<BackendRegistry>,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            daemon,
            registry,
            config_dir: config_dir.into(),
            locks: TunnelLocks::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Creates a tunnel: provisional store row, daemon-side create, uuid
    /// confirmation, config write. A daemon failure deletes the
    /// provisional row, so no orphan rows without a uuid survive the
    /// request.
    pub async fn create_tunnel(&self, request: CreateTunnel) -> Result<tunnel::Model> {
        if request.name.trim().is_empty() {
            return Err(EngineError::Validation("tunnel name is empty".to_string()));
        }
        if request.domain.trim().is_empty() {
            return Err(EngineError::Validation("tunnel domain is empty".to_string()));
        }

        let mut tld_ids = Vec::with_capacity(request.tld_names.len());
        for name in &request.tld_names {
            tld_ids.push(self.store.tlds().get_by_name(name).await?.id);
        }

        let provisional = self
            .store
            .tunnels()
            .create(NewTunnel {
                name: request.name,
                domain: request.domain,
                description: request.description,
                tld_ids,
            })
            .await?;
        let _guard = self.locks.acquire(provisional.id).await;

        let uuid = match self.daemon.create_tunnel(&provisional.name).await {
            Ok(uuid) => uuid,
            Err(daemon_err) => {
                warn!(
                    tunnel = %provisional.name,
                    error = %daemon_err,
                    "Daemon-side tunnel create failed; removing provisional row"
                );
                if let Err(store_err) = self.store.tunnels().delete(provisional.id).await {
                    error!(
                        tunnel = %provisional.name,
                        error = %store_err,
                        "Failed to remove provisional tunnel row"
                    );
                }
                return Err(daemon_err.into());
            }
        };

        let confirmed = match self.store.tunnels().confirm_uuid(provisional.id, uuid).await {
            Ok(model) => model,
            Err(store_err) => {
                // The daemon tunnel exists but the model does not reflect
                // it; undo the daemon side rather than leave them split
                warn!(
                    tunnel = %provisional.name,
                    error = %store_err,
                    "Failed to record daemon uuid; deleting daemon-side tunnel"
                );
                if let Err(daemon_err) = self.daemon.delete_tunnel(uuid).await {
                    error!(
                        tunnel = %provisional.name,
                        error = %daemon_err,
                        "Compensating daemon-side delete failed; tunnel is stranded"
                    );
                }
                if let Err(cleanup_err) = self.store.tunnels().delete(provisional.id).await {
                    error!(
                        tunnel = %provisional.name,
                        error = %cleanup_err,
                        "Failed to remove provisional tunnel row"
                    );
                }
                return Err(store_err.into());
            }
        };

        self.write_config(confirmed.id).await?;
        info!(tunnel = %confirmed.name, uuid = %uuid, "Tunnel created");
        Ok(confirmed)
    }

    /// Deletes a tunnel: daemon stop, daemon delete, config removal, row
    /// removal. A daemon failure parks the tunnel in `failed` with its row
    /// and config intact so the operator can retry this same call.
    pub async fn delete_tunnel(&self, tunnel_id: i32) -> Result<()> {
        let _guard = self.locks.acquire(tunnel_id).await;

        let tunnel = self.store.tunnels().get(tunnel_id).await?;

        if let Some(uuid) = tunnel.uuid {
            self.store
                .tunnels()
                .set_state(tunnel_id, TunnelState::Deleting)
                .await?;

            if let Err(daemon_err) = self.daemon.stop_tunnel(uuid).await {
                error!(
                    tunnel = %tunnel.name,
                    error = %daemon_err,
                    "Daemon-side stop failed; marking tunnel failed"
                );
                self.store
                    .tunnels()
                    .set_state(tunnel_id, TunnelState::Failed)
                    .await?;
                return Err(daemon_err.into());
            }

            if let Err(daemon_err) = self.daemon.delete_tunnel(uuid).await {
                error!(
                    tunnel = %tunnel.name,
                    error = %daemon_err,
                    "Daemon-side delete failed; marking tunnel failed"
                );
                self.store
                    .tunnels()
                    .set_state(tunnel_id, TunnelState::Failed)
                    .await?;
                return Err(daemon_err.into());
            }
        }

        self.remove_config(&tunnel.name)?;
        self.store.tunnels().delete(tunnel_id).await?;
        info!(tunnel = %tunnel.name, "Tunnel deleted");
        Ok(())
    }

    /// Adds a route: validates both endpoints locally, issues the
    /// daemon-side route per derived hostname, then commits the
    /// association and rewrites the config. If the store commit fails
    /// after the daemon accepted the routes, a best-effort compensating
    /// removal runs: a stranded daemon route is less harmful than a
    /// silently inconsistent model.
    pub async fn add_route(&self, tunnel_id: i32, application_id: i32) -> Result<()> {
        let _guard = self.locks.acquire(tunnel_id).await;

        let tunnel = self.store.tunnels().get(tunnel_id).await?;
        let application = self.store.applications().get(application_id).await?;

        let uuid = tunnel.uuid.ok_or_else(|| {
            EngineError::Validation(format!(
                "tunnel '{}' has no confirmed uuid; no routes may be attached",
                tunnel.name
            ))
        })?;
        if self
            .store
            .tunnels()
            .route_exists(tunnel_id, application_id)
            .await?
        {
            return Err(DbError::DuplicateKey {
                entity: "route",
                constraint: "tunnel/application",
            }
            .into());
        }

        let port = application.exposed_ports.primary_port().ok_or_else(|| {
            EngineError::Validation(format!(
                "application '{}' exposes no ports",
                application.name
            ))
        })?;
        let server = self.store.servers().get(application.server_id).await?;
        let service = format!("http://{}:{}", server.ip_address, port);

        let tlds = self.store.tunnels().tlds(tunnel_id).await?;
        let hostnames = route_hostnames(&application.hostname, &tlds);

        let mut added: Vec<String> = Vec::new();
        for hostname in &hostnames {
            if let Err(daemon_err) = self.daemon.add_route(uuid, hostname, &service).await {
                warn!(
                    tunnel = %tunnel.name,
                    hostname = %hostname,
                    error = %daemon_err,
                    "Daemon-side route add failed; rolling back routes added so far"
                );
                self.compensate_routes(uuid, &added).await;
                return Err(daemon_err.into());
            }
            added.push(hostname.clone());
        }

        if let Err(store_err) = self.store.tunnels().add_route(tunnel_id, application_id).await {
            self.compensate_routes(uuid, &added).await;
            return Err(store_err.into());
        }

        self.write_config(tunnel_id).await?;
        info!(
            tunnel = %tunnel.name,
            application = %application.name,
            "Route added"
        );
        Ok(())
    }

    /// Removes a route: daemon-side deletes first, association second,
    /// config rewrite last.
    pub async fn remove_route(&self, tunnel_id: i32, application_id: i32) -> Result<()> {
        let _guard = self.locks.acquire(tunnel_id).await;

        let tunnel = self.store.tunnels().get(tunnel_id).await?;
        let application = self.store.applications().get(application_id).await?;

        if !self
            .store
            .tunnels()
            .route_exists(tunnel_id, application_id)
            .await?
        {
            return Err(DbError::not_found(
                "route",
                format!("{}/{}", tunnel_id, application_id),
            )
            .into());
        }

        if let Some(uuid) = tunnel.uuid {
            let tlds = self.store.tunnels().tlds(tunnel_id).await?;
            for hostname in route_hostnames(&application.hostname, &tlds) {
                self.daemon.remove_route(uuid, &hostname).await?;
            }
        }

        self.store
            .tunnels()
            .remove_route(tunnel_id, application_id)
            .await?;
        self.write_config(tunnel_id).await?;
        info!(
            tunnel = %tunnel.name,
            application = %application.name,
            "Route removed"
        );
        Ok(())
    }

    /// Recompiles and rewrites one tunnel's configuration; for model edits
    /// that do not touch the daemon (enable flags, hostname changes).
    pub async fn refresh_config(&self, tunnel_id: i32) -> Result<()> {
        let _guard = self.locks.acquire(tunnel_id).await;
        self.write_config(tunnel_id).await
    }

    /// One discovery pass over every server.
    pub async fn sweep(&self) -> SweepReport {
        discovery::run_sweep(&self.store, &self.registry).await
    }

    pub fn config_path(&self, tunnel_name: &str) -> PathBuf {
        self.config_dir.join(format!("{}.yml", tunnel_name))
    }

    async fn compensate_routes(&self, uuid: Uuid, hostnames: &[String]) {
        for hostname in hostnames {
            if let Err(daemon_err) = self.daemon.remove_route(uuid, hostname).await {
                error!(
                    hostname = %hostname,
                    error = %daemon_err,
                    "Compensating route removal failed; daemon-side route is stranded"
                );
            }
        }
    }

    /// Compile the tunnel's snapshot and persist it atomically
    /// (write-to-temp-then-rename), so the daemon never reads a torn
    /// document.
    async fn write_config(&self, tunnel_id: i32) -> Result<()> {
        let snapshot = load_tunnel_snapshot(&self.store, tunnel_id).await?;
        let yaml = compile(&snapshot)?.to_yaml()?;

        let path = self.config_path(&snapshot.name);
        write_atomic(&self.config_dir, &path, yaml.as_bytes())
            .map_err(|e| EngineError::ConfigWrite(format!("{}: {}", path.display(), e)))?;

        info!(
            tunnel = %snapshot.name,
            path = %path.display(),
            "Ingress configuration written"
        );
        Ok(())
    }

    fn remove_config(&self, tunnel_name: &str) -> Result<()> {
        let path = self.config_path(tunnel_name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::ConfigWrite(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
