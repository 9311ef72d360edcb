//! Integration tests for burrow-db
//!
//! Exercises store operations with a real SQLite in-memory database

use std::collections::BTreeMap;
use std::time::Duration;

use burrow_db::entities::application::ExposedPorts;
use burrow_db::entities::server::{ContainerManagerKind, VmManagerKind};
use burrow_db::entities::tunnel::TunnelState;
use burrow_db::store::{DiscoveredContainer, NewApplication, NewContainer, NewServer, NewTunnel, NewVm};
use burrow_db::{connect, migrate, DbError, Store};
use uuid::Uuid;

/// Helper to create a migrated store on an in-memory database
async fn setup_store() -> Store {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    Store::new(db)
}

fn test_server(name: &str) -> NewServer {
    NewServer {
        name: name.to_string(),
        hostname: format!("{}.lan", name),
        ip_address: format!("10.0.0.{}", name.len()),
        ssh_port: 22,
        username: "root".to_string(),
        password: "hunter2".to_string(),
        api_token: None,
        container_manager: ContainerManagerKind::Docker,
        vm_manager: VmManagerKind::Proxmox,
        namespace: None,
    }
}

fn http_ports(port: u16) -> ExposedPorts {
    let mut map = BTreeMap::new();
    map.insert("http".to_string(), vec![port]);
    ExposedPorts(map)
}

#[tokio::test]
async fn test_migrations_run_successfully() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");
    assert!(migrate(&db).await.is_ok());
}

#[tokio::test]
async fn test_create_and_get_server() {
    let store = setup_store().await;

    let created = store.servers().create(test_server("alpha")).await.unwrap();
    assert_eq!(created.name, "alpha");

    let fetched = store.servers().get(created.id).await.unwrap();
    assert_eq!(fetched.hostname, "alpha.lan");
    assert_eq!(fetched.container_manager, ContainerManagerKind::Docker);
}

#[tokio::test]
async fn test_duplicate_server_hostname_rejected() {
    let store = setup_store().await;

    store.servers().create(test_server("alpha")).await.unwrap();

    let mut second = test_server("beta");
    second.hostname = "alpha.lan".to_string();

    let err = store.servers().create(second).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::DuplicateKey {
            entity: "server",
            constraint: "hostname"
        }
    ));

    // The second server must not have been persisted
    assert!(store.servers().get_by_name("beta").await.is_err());
}

#[tokio::test]
async fn test_container_name_unique_per_server_only() {
    let store = setup_store().await;

    let alpha = store.servers().create(test_server("alpha")).await.unwrap();
    let beta = store.servers().create(test_server("beta")).await.unwrap();

    let new_container = |server_id| NewContainer {
        server_id,
        name: "web".to_string(),
        image: "nginx:latest".to_string(),
        state: "running".to_string(),
        hostname: None,
        enabled: false,
    };

    store.containers().create(new_container(alpha.id)).await.unwrap();

    // Same name on a different server is fine
    store.containers().create(new_container(beta.id)).await.unwrap();

    // Same name on the same server is not
    let err = store
        .containers()
        .create(new_container(alpha.id))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey { entity: "container", .. }));
}

#[tokio::test]
async fn test_server_delete_cascades_to_workloads() {
    let store = setup_store().await;

    let server = store.servers().create(test_server("alpha")).await.unwrap();
    let container = store
        .containers()
        .create(NewContainer {
            server_id: server.id,
            name: "web".to_string(),
            image: "nginx:latest".to_string(),
            state: "running".to_string(),
            hostname: None,
            enabled: true,
        })
        .await
        .unwrap();

    store
        .applications()
        .create(NewApplication {
            name: "site".to_string(),
            server_id: server.id,
            container_id: Some(container.id),
            vm_id: None,
            hostname: "site".to_string(),
            exposed_ports: http_ports(8080),
            enabled: true,
        })
        .await
        .unwrap();

    store.servers().delete(server.id).await.unwrap();

    assert!(store.containers().get(container.id).await.is_err());
    assert!(store
        .applications()
        .list_for_server(server.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_vm_delete_nullifies_applications() {
    let store = setup_store().await;

    let server = store.servers().create(test_server("alpha")).await.unwrap();
    let vm = store
        .vms()
        .create(NewVm {
            server_id: server.id,
            name: "guest".to_string(),
            os_name: "debian".to_string(),
            os_version: Some("12".to_string()),
            cpu_cores: Some(2),
            memory_mb: Some(2048),
            state: "running".to_string(),
            hostname: None,
            enabled: true,
        })
        .await
        .unwrap();

    let app = store
        .applications()
        .create(NewApplication {
            name: "api".to_string(),
            server_id: server.id,
            container_id: None,
            vm_id: Some(vm.id),
            hostname: "api".to_string(),
            exposed_ports: http_ports(3000),
            enabled: true,
        })
        .await
        .unwrap();

    store.vms().delete(vm.id).await.unwrap();

    // The application survives, detached from the deleted VM
    let app = store.applications().get(app.id).await.unwrap();
    assert_eq!(app.vm_id, None);
}

#[tokio::test]
async fn test_application_workload_must_match_server() {
    let store = setup_store().await;

    let alpha = store.servers().create(test_server("alpha")).await.unwrap();
    let beta = store.servers().create(test_server("beta")).await.unwrap();

    let container = store
        .containers()
        .create(NewContainer {
            server_id: alpha.id,
            name: "web".to_string(),
            image: "nginx:latest".to_string(),
            state: "running".to_string(),
            hostname: None,
            enabled: true,
        })
        .await
        .unwrap();

    let err = store
        .applications()
        .create(NewApplication {
            name: "site".to_string(),
            server_id: beta.id,
            container_id: Some(container.id),
            vm_id: None,
            hostname: "site".to_string(),
            exposed_ports: http_ports(8080),
            enabled: true,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Conflict(_)));
}

#[tokio::test]
async fn test_tunnel_created_provisional() {
    let store = setup_store().await;

    let tld = store.tlds().create("example.com").await.unwrap();
    let tunnel = store
        .tunnels()
        .create(NewTunnel {
            name: "edge".to_string(),
            domain: "edge.example.com".to_string(),
            description: None,
            tld_ids: vec![tld.id],
        })
        .await
        .unwrap();

    assert_eq!(tunnel.uuid, None);
    assert_eq!(tunnel.state, TunnelState::Provisioning);

    let tlds = store.tunnels().tlds(tunnel.id).await.unwrap();
    assert_eq!(tlds.len(), 1);
    assert_eq!(tlds[0].name, "example.com");
}

#[tokio::test]
async fn test_duplicate_tunnel_name_and_domain_rejected() {
    let store = setup_store().await;

    store
        .tunnels()
        .create(NewTunnel {
            name: "edge".to_string(),
            domain: "edge.example.com".to_string(),
            description: None,
            tld_ids: vec![],
        })
        .await
        .unwrap();

    let err = store
        .tunnels()
        .create(NewTunnel {
            name: "edge".to_string(),
            domain: "other.example.com".to_string(),
            description: None,
            tld_ids: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::DuplicateKey {
            entity: "tunnel",
            constraint: "name"
        }
    ));

    let err = store
        .tunnels()
        .create(NewTunnel {
            name: "other".to_string(),
            domain: "edge.example.com".to_string(),
            description: None,
            tld_ids: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::DuplicateKey {
            entity: "tunnel",
            constraint: "domain"
        }
    ));
}

#[tokio::test]
async fn test_confirm_uuid_is_immutable() {
    let store = setup_store().await;

    let tunnel = store
        .tunnels()
        .create(NewTunnel {
            name: "edge".to_string(),
            domain: "edge.example.com".to_string(),
            description: None,
            tld_ids: vec![],
        })
        .await
        .unwrap();

    let uuid = Uuid::new_v4();
    let confirmed = store.tunnels().confirm_uuid(tunnel.id, uuid).await.unwrap();
    assert_eq!(confirmed.uuid, Some(uuid));
    assert_eq!(confirmed.state, TunnelState::Active);

    let err = store
        .tunnels()
        .confirm_uuid(tunnel.id, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    // The original uuid is untouched
    let fetched = store.tunnels().get(tunnel.id).await.unwrap();
    assert_eq!(fetched.uuid, Some(uuid));
}

#[tokio::test]
async fn test_routes_add_remove() {
    let store = setup_store().await;

    let server = store.servers().create(test_server("alpha")).await.unwrap();
    let app = store
        .applications()
        .create(NewApplication {
            name: "site".to_string(),
            server_id: server.id,
            container_id: None,
            vm_id: None,
            hostname: "site".to_string(),
            exposed_ports: http_ports(8080),
            enabled: true,
        })
        .await
        .unwrap();
    let tunnel = store
        .tunnels()
        .create(NewTunnel {
            name: "edge".to_string(),
            domain: "edge.example.com".to_string(),
            description: None,
            tld_ids: vec![],
        })
        .await
        .unwrap();

    store.tunnels().add_route(tunnel.id, app.id).await.unwrap();
    assert!(store.tunnels().route_exists(tunnel.id, app.id).await.unwrap());

    let routed = store.tunnels().routed_applications(tunnel.id).await.unwrap();
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].id, app.id);

    // Duplicate association is rejected
    let err = store.tunnels().add_route(tunnel.id, app.id).await.unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey { entity: "route", .. }));

    store.tunnels().remove_route(tunnel.id, app.id).await.unwrap();
    assert!(!store.tunnels().route_exists(tunnel.id, app.id).await.unwrap());

    // Removing again reports NotFound
    let err = store.tunnels().remove_route(tunnel.id, app.id).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { entity: "route", .. }));
}

#[tokio::test]
async fn test_route_requires_existing_endpoints() {
    let store = setup_store().await;

    let tunnel = store
        .tunnels()
        .create(NewTunnel {
            name: "edge".to_string(),
            domain: "edge.example.com".to_string(),
            description: None,
            tld_ids: vec![],
        })
        .await
        .unwrap();

    let err = store.tunnels().add_route(tunnel.id, 999).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { entity: "application", .. }));

    let err = store.tunnels().add_route(999, 1).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { entity: "tunnel", .. }));
}

#[tokio::test]
async fn test_tunnel_cache_invalidated_on_write() {
    let db = connect("sqlite::memory:").await.unwrap();
    migrate(&db).await.unwrap();
    // Long TTL: only explicit invalidation can refresh reads
    let store = Store::with_cache_ttl(db, Duration::from_secs(3600));

    let tunnel = store
        .tunnels()
        .create(NewTunnel {
            name: "edge".to_string(),
            domain: "edge.example.com".to_string(),
            description: None,
            tld_ids: vec![],
        })
        .await
        .unwrap();

    // Prime the cache
    let cached = store.tunnels().get(tunnel.id).await.unwrap();
    assert_eq!(cached.state, TunnelState::Provisioning);

    // A write through the store must be visible immediately
    store
        .tunnels()
        .set_state(tunnel.id, TunnelState::Failed)
        .await
        .unwrap();
    let fetched = store.tunnels().get(tunnel.id).await.unwrap();
    assert_eq!(fetched.state, TunnelState::Failed);
}

#[tokio::test]
async fn test_settings_roundtrip_and_invalidation() {
    let store = setup_store().await;

    assert_eq!(store.settings().get("theme").await.unwrap(), None);

    store.settings().set("theme", "dark").await.unwrap();
    assert_eq!(
        store.settings().get("theme").await.unwrap(),
        Some("dark".to_string())
    );

    // Upsert replaces and invalidates the cached map
    store.settings().set("theme", "light").await.unwrap();
    assert_eq!(
        store.settings().get("theme").await.unwrap(),
        Some("light".to_string())
    );
}

#[tokio::test]
async fn test_discovery_upsert_preserves_operator_fields() {
    let store = setup_store().await;

    let server = store.servers().create(test_server("alpha")).await.unwrap();

    let discovered = DiscoveredContainer {
        name: "web".to_string(),
        image: "nginx:1.25".to_string(),
        state: "running".to_string(),
    };

    // First sweep creates the row, disabled by default
    let created = store
        .containers()
        .upsert_discovered(server.id, &discovered)
        .await
        .unwrap();
    assert!(!created.enabled);

    // Operator enables it and assigns a hostname
    store.containers().set_enabled(created.id, true).await.unwrap();
    store
        .containers()
        .set_hostname(created.id, Some("web".to_string()))
        .await
        .unwrap();

    // A later sweep sees a new image; operator fields must survive
    let changed = DiscoveredContainer {
        image: "nginx:1.27".to_string(),
        ..discovered
    };
    let updated = store
        .containers()
        .upsert_discovered(server.id, &changed)
        .await
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.image, "nginx:1.27");
    assert!(updated.enabled);
    assert_eq!(updated.hostname.as_deref(), Some("web"));
}
