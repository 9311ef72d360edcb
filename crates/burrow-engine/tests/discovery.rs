//! Discovery sweep integration tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use burrow_backend::{Backend, BackendError, BackendRegistry, EntityDescriptor, ServerConn};
use burrow_db::entities::server::{ContainerManagerKind, VmManagerKind};
use burrow_db::store::NewServer;
use burrow_db::Store;
use burrow_engine::run_sweep;

/// Backend double returning a scripted entity list
struct FakeBackend {
    entities: Mutex<Vec<EntityDescriptor>>,
    fail: bool,
}

impl FakeBackend {
    fn with_entities(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            entities: Mutex::new(names.iter().map(|name| descriptor(name)).collect()),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            entities: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    fn set_entities(&self, names: &[&str]) {
        *self.entities.lock().unwrap() = names.iter().map(|name| descriptor(name)).collect();
    }
}

fn descriptor(name: &str) -> EntityDescriptor {
    EntityDescriptor {
        name: name.to_string(),
        image_or_os: "nginx:1.25".to_string(),
        state: "running".to_string(),
        exposed_ports: BTreeMap::new(),
        labels: BTreeMap::new(),
        ip_addresses: Vec::new(),
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn list(&self, _server: &ServerConn) -> Result<Vec<EntityDescriptor>, BackendError> {
        if self.fail {
            return Err(BackendError::Unreachable("scripted failure".to_string()));
        }
        Ok(self.entities.lock().unwrap().clone())
    }

    async fn describe(
        &self,
        _server: &ServerConn,
        name: &str,
    ) -> Result<EntityDescriptor, BackendError> {
        self.entities
            .lock()
            .unwrap()
            .iter()
            .find(|entity| entity.name == name)
            .cloned()
            .ok_or_else(|| BackendError::EntityNotFound(name.to_string()))
    }
}

async fn setup_store() -> Store {
    let db = burrow_db::connect("sqlite::memory:").await.unwrap();
    burrow_db::migrate(&db).await.unwrap();
    Store::new(db)
}

fn seed_server(name: &str, octet: u8) -> NewServer {
    NewServer {
        name: name.to_string(),
        hostname: format!("{}.lan", name),
        ip_address: format!("10.0.0.{}", octet),
        ssh_port: 22,
        username: "root".to_string(),
        password: "hunter2".to_string(),
        api_token: None,
        container_manager: ContainerManagerKind::Docker,
        vm_manager: VmManagerKind::Proxmox,
        namespace: None,
    }
}

#[tokio::test]
async fn sweep_records_discovered_workloads() {
    let store = setup_store().await;
    let server = store.servers().create(seed_server("alpha", 5)).await.unwrap();

    let containers = FakeBackend::with_entities(&["web", "db"]);
    let vms = FakeBackend::with_entities(&["guest"]);

    let mut registry = BackendRegistry::new(Duration::from_secs(5));
    registry.register_container(ContainerManagerKind::Docker, containers);
    registry.register_vm(VmManagerKind::Proxmox, vms);

    let report = run_sweep(&store, &registry).await;
    assert_eq!(report.servers_swept, 1);
    assert_eq!(report.servers_failed, 0);
    assert_eq!(report.containers_seen, 2);
    assert_eq!(report.vms_seen, 1);

    let stored = store.containers().list_for_server(server.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    // Discovered rows start disabled until an operator opts them in
    assert!(stored.iter().all(|container| !container.enabled));

    assert_eq!(store.vms().list_for_server(server.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn absent_upstream_entities_are_kept() {
    let store = setup_store().await;
    let server = store.servers().create(seed_server("alpha", 5)).await.unwrap();

    let containers = FakeBackend::with_entities(&["web", "db"]);
    let vms = FakeBackend::with_entities(&[]);

    let mut registry = BackendRegistry::new(Duration::from_secs(5));
    registry.register_container(ContainerManagerKind::Docker, containers.clone());
    registry.register_vm(VmManagerKind::Proxmox, vms);

    run_sweep(&store, &registry).await;

    // The backend stops reporting one container; the stored row survives
    containers.set_entities(&["web"]);
    run_sweep(&store, &registry).await;

    let stored = store.containers().list_for_server(server.id).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn failing_server_is_skipped_not_fatal() {
    let store = setup_store().await;
    store.servers().create(seed_server("alpha", 5)).await.unwrap();
    let healthy = store.servers().create(seed_server("beta", 6)).await.unwrap();

    // alpha stays on the failing docker driver, beta moves to the healthy
    // podman driver
    let failing = FakeBackend::failing();
    let working = FakeBackend::with_entities(&["web"]);
    let vms = FakeBackend::with_entities(&[]);

    let mut registry = BackendRegistry::new(Duration::from_secs(5));
    registry.register_container(ContainerManagerKind::Docker, failing);
    registry.register_container(ContainerManagerKind::Podman, working);
    registry.register_vm(VmManagerKind::Proxmox, vms);

    // Move beta onto the healthy podman driver
    store
        .servers()
        .update(
            healthy.id,
            burrow_db::store::UpdateServer {
                container_manager: Some(ContainerManagerKind::Podman),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let report = run_sweep(&store, &registry).await;

    assert_eq!(report.servers_failed, 1);
    assert_eq!(report.servers_swept, 1);
    assert_eq!(
        store
            .containers()
            .list_for_server(healthy.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn unsupported_kind_counts_as_failed_server() {
    let store = setup_store().await;
    store.servers().create(seed_server("alpha", 5)).await.unwrap();

    // Nothing registered at all
    let registry = BackendRegistry::new(Duration::from_secs(5));

    let report = run_sweep(&store, &registry).await;
    assert_eq!(report.servers_failed, 1);
    assert_eq!(report.servers_swept, 0);
}
