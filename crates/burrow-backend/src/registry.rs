//! Backend registry: closed kind vocabulary resolved to driver instances
//!
//! Built once at startup. Resolution failure is a typed
//! [`BackendError::UnsupportedKind`], and every call through the registry is
//! bounded by a timeout, since drivers talk to machines that may hang.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use burrow_db::entities::server::{ContainerManagerKind, VmManagerKind};
use tokio::time::timeout;
use tracing::debug;

use crate::drivers::docker::DockerCliBackend;
use crate::drivers::kubernetes::KubernetesBackend;
use crate::drivers::proxmox::ProxmoxBackend;
use crate::error::{BackendError, Result};
use crate::exec::SshExec;
use crate::http::ApiClient;
use crate::types::{EntityDescriptor, ServerConn};

/// The two read operations every backend implements
#[async_trait]
pub trait Backend: Send + Sync {
    async fn list(&self, server: &ServerConn) -> Result<Vec<EntityDescriptor>>;

    async fn describe(&self, server: &ServerConn, name: &str) -> Result<EntityDescriptor>;
}

pub struct BackendRegistry {
    containers: HashMap<ContainerManagerKind, Arc<dyn Backend>>,
    vms: HashMap<VmManagerKind, Arc<dyn Backend>>,
    call_timeout: Duration,
}

impl BackendRegistry {
    /// An empty registry; every kind resolves to `UnsupportedKind` until
    /// drivers are registered.
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            containers: HashMap::new(),
            vms: HashMap::new(),
            call_timeout,
        }
    }

    /// Registry with the built-in drivers: docker and podman over SSH exec,
    /// kubernetes and proxmox over HTTPS.
    pub fn with_defaults(call_timeout: Duration) -> Result<Self> {
        let exec = Arc::new(SshExec);

        let mut registry = Self::new(call_timeout);
        registry.register_container(
            ContainerManagerKind::Docker,
            Arc::new(DockerCliBackend::docker(exec.clone())),
        );
        registry.register_container(
            ContainerManagerKind::Podman,
            Arc::new(DockerCliBackend::podman(exec)),
        );
        registry.register_container(
            ContainerManagerKind::Kubernetes,
            Arc::new(KubernetesBackend::new(ApiClient::new(call_timeout)?)),
        );
        registry.register_vm(
            VmManagerKind::Proxmox,
            Arc::new(ProxmoxBackend::new(ApiClient::new(call_timeout)?)),
        );
        Ok(registry)
    }

    pub fn register_container(&mut self, kind: ContainerManagerKind, backend: Arc<dyn Backend>) {
        self.containers.insert(kind, backend);
    }

    pub fn register_vm(&mut self, kind: VmManagerKind, backend: Arc<dyn Backend>) {
        self.vms.insert(kind, backend);
    }

    pub fn supported_container_kinds(&self) -> Vec<ContainerManagerKind> {
        self.containers.keys().copied().collect()
    }

    pub fn supported_vm_kinds(&self) -> Vec<VmManagerKind> {
        self.vms.keys().copied().collect()
    }

    pub async fn list_containers(
        &self,
        kind: ContainerManagerKind,
        server: &ServerConn,
    ) -> Result<Vec<EntityDescriptor>> {
        debug!(kind = %kind, server = %server.name, "Listing containers");
        let backend = self.container_backend(kind)?;
        self.bounded(backend.list(server)).await
    }

    pub async fn describe_container(
        &self,
        kind: ContainerManagerKind,
        server: &ServerConn,
        name: &str,
    ) -> Result<EntityDescriptor> {
        let backend = self.container_backend(kind)?;
        self.bounded(backend.describe(server, name)).await
    }

    pub async fn list_vms(
        &self,
        kind: VmManagerKind,
        server: &ServerConn,
    ) -> Result<Vec<EntityDescriptor>> {
        debug!(kind = %kind, server = %server.name, "Listing VMs");
        let backend = self.vm_backend(kind)?;
        self.bounded(backend.list(server)).await
    }

    pub async fn describe_vm(
        &self,
        kind: VmManagerKind,
        server: &ServerConn,
        name: &str,
    ) -> Result<EntityDescriptor> {
        let backend = self.vm_backend(kind)?;
        self.bounded(backend.describe(server, name)).await
    }

    fn container_backend(&self, kind: ContainerManagerKind) -> Result<Arc<dyn Backend>> {
        self.containers
            .get(&kind)
            .cloned()
            .ok_or_else(|| BackendError::UnsupportedKind(kind.to_string()))
    }

    fn vm_backend(&self, kind: VmManagerKind) -> Result<Arc<dyn Backend>> {
        self.vms
            .get(&kind)
            .cloned()
            .ok_or_else(|| BackendError::UnsupportedKind(kind.to_string()))
    }

    async fn bounded<T>(&self, call: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        timeout(self.call_timeout, call)
            .await
            .map_err(|_| BackendError::Timeout(self.call_timeout))?
    }
}
