//! Adapter-level types shared by every driver

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Normalized shape of a workload reported by any backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Workload name, unique within its server
    pub name: String,

    /// Container image or guest OS descriptor
    pub image_or_os: String,

    /// Backend-reported state (running, exited, stopped, ...)
    pub state: String,

    /// Host-exposed ports by protocol
    #[serde(default)]
    pub exposed_ports: BTreeMap<String, Vec<u16>>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

/// Connection view of a server row; drivers never see the entity store.
#[derive(Debug, Clone)]
pub struct ServerConn {
    pub name: String,
    pub hostname: String,
    pub ip_address: String,
    pub ssh_port: u16,
    pub username: String,
    pub password: String,
    pub api_token: Option<String>,
    pub namespace: Option<String>,
}
