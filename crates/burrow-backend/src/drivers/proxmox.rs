//! Proxmox VE driver: qemu VMs on the server's node via the HTTPS API

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BackendError, Result};
use crate::http::ApiClient;
use crate::registry::Backend;
use crate::types::{EntityDescriptor, ServerConn};

const API_PORT: u16 = 8006;

pub struct ProxmoxBackend {
    api: ApiClient,
}

impl ProxmoxBackend {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn list_vms(&self, server: &ServerConn) -> Result<Vec<Value>> {
        let token = server.api_token.as_deref().ok_or_else(|| {
            BackendError::AuthFailed(format!("server {} has no API token", server.name))
        })?;

        // The Proxmox node name is the server name unless a namespace
        // overrides it
        let node = server.namespace.as_deref().unwrap_or(&server.name);
        let url = format!(
            "https://{}:{}/api2/json/nodes/{}/qemu",
            server.hostname, API_PORT, node
        );

        let body = self
            .api
            .get_json(&url, Some(&format!("PVEAPIToken={}", token)))
            .await?;

        body.pointer("/data")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| BackendError::Protocol("qemu list without data".to_string()))
    }
}

#[async_trait]
impl Backend for ProxmoxBackend {
    async fn list(&self, server: &ServerConn) -> Result<Vec<EntityDescriptor>> {
        let vms = self.list_vms(server).await?;
        Ok(vms.iter().filter_map(descriptor_from_vm).collect())
    }

    async fn describe(&self, server: &ServerConn, name: &str) -> Result<EntityDescriptor> {
        let vms = self.list_vms(server).await?;

        vms.iter()
            .filter_map(descriptor_from_vm)
            .find(|descriptor| descriptor.name == name)
            .ok_or_else(|| BackendError::EntityNotFound(name.to_string()))
    }
}

fn descriptor_from_vm(vm: &Value) -> Option<EntityDescriptor> {
    let name = vm.get("name").and_then(Value::as_str)?;
    let status = vm
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    let mut labels = BTreeMap::new();
    if let Some(vmid) = vm.get("vmid").and_then(Value::as_u64) {
        labels.insert("vmid".to_string(), vmid.to_string());
    }
    if let Some(cpus) = vm.get("cpus").and_then(Value::as_u64) {
        labels.insert("cpus".to_string(), cpus.to_string());
    }
    if let Some(maxmem) = vm.get("maxmem").and_then(Value::as_u64) {
        labels.insert("maxmem_mb".to_string(), (maxmem / (1024 * 1024)).to_string());
    }

    Some(EntityDescriptor {
        name: name.to_string(),
        image_or_os: "qemu".to_string(),
        state: status.to_string(),
        exposed_ports: BTreeMap::new(),
        labels,
        ip_addresses: Vec::new(),
    })
}
