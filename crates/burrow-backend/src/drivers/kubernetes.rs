//! Kubernetes driver: pods under the server's namespace via the API server

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BackendError, Result};
use crate::http::ApiClient;
use crate::registry::Backend;
use crate::types::{EntityDescriptor, ServerConn};

const DEFAULT_NAMESPACE: &str = "default";
const API_PORT: u16 = 6443;

pub struct KubernetesBackend {
    api: ApiClient,
}

impl KubernetesBackend {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn list_pods(&self, server: &ServerConn) -> Result<Vec<Value>> {
        let token = server.api_token.as_deref().ok_or_else(|| {
            BackendError::AuthFailed(format!("server {} has no API token", server.name))
        })?;

        let namespace = server.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        let url = format!(
            "https://{}:{}/api/v1/namespaces/{}/pods",
            server.hostname, API_PORT, namespace
        );

        let body = self
            .api
            .get_json(&url, Some(&format!("Bearer {}", token)))
            .await?;

        body.pointer("/items")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| BackendError::Protocol("pod list without items".to_string()))
    }
}

#[async_trait]
impl Backend for KubernetesBackend {
    async fn list(&self, server: &ServerConn) -> Result<Vec<EntityDescriptor>> {
        let pods = self.list_pods(server).await?;

        let mut descriptors = Vec::new();
        for pod in &pods {
            descriptors.extend(descriptors_from_pod(pod));
        }
        Ok(descriptors)
    }

    async fn describe(&self, server: &ServerConn, name: &str) -> Result<EntityDescriptor> {
        let pods = self.list_pods(server).await?;

        pods.iter()
            .flat_map(descriptors_from_pod)
            .find(|descriptor| descriptor.name == name)
            .ok_or_else(|| BackendError::EntityNotFound(name.to_string()))
    }
}

/// One descriptor per container in the pod; pod-level phase, labels and IP
/// apply to each.
fn descriptors_from_pod(pod: &Value) -> Vec<EntityDescriptor> {
    let phase = pod
        .pointer("/status/phase")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();

    let labels: BTreeMap<String, String> = pod
        .pointer("/metadata/labels")
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let ip_addresses: Vec<String> = pod
        .pointer("/status/podIP")
        .and_then(Value::as_str)
        .map(|ip| vec![ip.to_string()])
        .unwrap_or_default();

    let Some(containers) = pod.pointer("/spec/containers").and_then(Value::as_array) else {
        return Vec::new();
    };

    containers
        .iter()
        .filter_map(|container| {
            let name = container.get("name").and_then(Value::as_str)?;
            let image = container
                .get("image")
                .and_then(Value::as_str)
                .unwrap_or_default();

            let mut exposed_ports: BTreeMap<String, Vec<u16>> = BTreeMap::new();
            if let Some(ports) = container.get("ports").and_then(Value::as_array) {
                for port in ports {
                    let Some(container_port) = port
                        .get("containerPort")
                        .and_then(Value::as_u64)
                        .and_then(|p| u16::try_from(p).ok())
                    else {
                        continue;
                    };
                    let protocol = port
                        .get("protocol")
                        .and_then(Value::as_str)
                        .unwrap_or("TCP")
                        .to_lowercase();
                    exposed_ports.entry(protocol).or_default().push(container_port);
                }
            }

            Some(EntityDescriptor {
                name: name.to_string(),
                image_or_os: image.to_string(),
                state: phase.clone(),
                exposed_ports,
                labels: labels.clone(),
                ip_addresses: ip_addresses.clone(),
            })
        })
        .collect()
}
