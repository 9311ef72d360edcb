//! Server entity: a managed host that runs workloads behind one container
//! manager and one VM manager

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Container manager kinds a server can declare
///
/// Closed vocabulary: resolving a kind to a driver happens through the
/// backend registry, and kinds without a registered driver are rejected
/// there, not here.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum ContainerManagerKind {
    #[sea_orm(string_value = "docker")]
    Docker,

    #[sea_orm(string_value = "podman")]
    Podman,

    #[sea_orm(string_value = "kubernetes")]
    Kubernetes,

    #[sea_orm(string_value = "truenas")]
    Truenas,

    #[sea_orm(string_value = "unraid")]
    Unraid,
}

/// VM manager kinds a server can declare
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum VmManagerKind {
    #[sea_orm(string_value = "esxi")]
    Esxi,

    #[sea_orm(string_value = "nutanix")]
    Nutanix,

    #[sea_orm(string_value = "openstack")]
    Openstack,

    #[sea_orm(string_value = "proxmox")]
    Proxmox,

    #[sea_orm(string_value = "truenas")]
    Truenas,

    #[sea_orm(string_value = "unraid")]
    Unraid,

    #[sea_orm(string_value = "xcp")]
    Xcp,

    #[sea_orm(string_value = "xen")]
    Xen,
}

impl ContainerManagerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerManagerKind::Docker => "docker",
            ContainerManagerKind::Podman => "podman",
            ContainerManagerKind::Kubernetes => "kubernetes",
            ContainerManagerKind::Truenas => "truenas",
            ContainerManagerKind::Unraid => "unraid",
        }
    }
}

impl VmManagerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmManagerKind::Esxi => "esxi",
            VmManagerKind::Nutanix => "nutanix",
            VmManagerKind::Openstack => "openstack",
            VmManagerKind::Proxmox => "proxmox",
            VmManagerKind::Truenas => "truenas",
            VmManagerKind::Unraid => "unraid",
            VmManagerKind::Xcp => "xcp",
            VmManagerKind::Xen => "xen",
        }
    }
}

impl std::fmt::Display for ContainerManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for VmManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "servers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Server name (unique, human-readable)
    #[sea_orm(unique)]
    pub name: String,

    /// DNS hostname (unique)
    #[sea_orm(unique)]
    pub hostname: String,

    /// IP address reachable from the tunnel daemon (unique)
    #[sea_orm(unique)]
    pub ip_address: String,

    /// SSH port for shell-exec transports
    pub ssh_port: i32,

    /// SSH username
    pub username: String,

    /// SSH credential, never serialized in API responses
    #[serde(skip_serializing)]
    pub password: String,

    /// API token for HTTPS backends (kubernetes, proxmox), never serialized
    #[serde(skip_serializing)]
    pub api_token: Option<String>,

    /// Declared container manager kind
    pub container_manager: ContainerManagerKind,

    /// Declared VM manager kind
    pub vm_manager: VmManagerKind,

    /// Namespace for manager kinds that partition by namespace (kubernetes)
    pub namespace: Option<String>,

    /// When the server was registered
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Server owns containers (cascade-delete)
    #[sea_orm(has_many = "super::container::Entity")]
    Containers,

    /// Server owns VMs (cascade-delete)
    #[sea_orm(has_many = "super::vm::Entity")]
    Vms,

    /// Server owns applications (cascade-delete)
    #[sea_orm(has_many = "super::application::Entity")]
    Applications,
}

impl Related<super::container::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Containers.def()
    }
}

impl Related<super::vm::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vms.def()
    }
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
