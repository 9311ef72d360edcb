//! Docker-compatible CLI driver
//!
//! Speaks the docker CLI's JSON output, which podman reproduces verbatim,
//! so both kinds share this driver with a different binary name. The argv
//! runs through an [`Exec`] transport, local or SSH.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BackendError, Result};
use crate::exec::{Exec, ExecOutput};
use crate::registry::Backend;
use crate::types::{EntityDescriptor, ServerConn};

pub struct DockerCliBackend {
    binary: &'static str,
    exec: Arc<dyn Exec>,
}

impl DockerCliBackend {
    pub fn docker(exec: Arc<dyn Exec>) -> Self {
        Self {
            binary: "docker",
            exec,
        }
    }

    pub fn podman(exec: Arc<dyn Exec>) -> Self {
        Self {
            binary: "podman",
            exec,
        }
    }

    fn stdout_or_error(&self, output: ExecOutput) -> Result<String> {
        if output.success() {
            return Ok(output.stdout);
        }

        let stderr = output.stderr.trim().to_string();
        let lowered = stderr.to_lowercase();
        if lowered.contains("no such object") || lowered.contains("no such container") {
            Err(BackendError::EntityNotFound(stderr))
        } else {
            Err(BackendError::Protocol(format!(
                "{} exited with {}: {}",
                self.binary, output.exit_code, stderr
            )))
        }
    }
}

#[async_trait]
impl Backend for DockerCliBackend {
    async fn list(&self, server: &ServerConn) -> Result<Vec<EntityDescriptor>> {
        let output = self
            .exec
            .run(server, self.binary, &["ps", "--all", "--format", "{{json .}}"])
            .await?;
        let stdout = self.stdout_or_error(output)?;

        let mut descriptors = Vec::new();
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            let entry: Value = serde_json::from_str(line).map_err(|e| {
                BackendError::Protocol(format!("unparseable {} ps line: {}", self.binary, e))
            })?;
            descriptors.push(descriptor_from_ps(&entry)?);
        }
        Ok(descriptors)
    }

    async fn describe(&self, server: &ServerConn, name: &str) -> Result<EntityDescriptor> {
        let output = self
            .exec
            .run(server, self.binary, &["inspect", name])
            .await?;
        let stdout = self.stdout_or_error(output)?;

        let parsed: Value = serde_json::from_str(&stdout).map_err(|e| {
            BackendError::Protocol(format!("unparseable {} inspect output: {}", self.binary, e))
        })?;
        let entry = parsed
            .as_array()
            .and_then(|entries| entries.first())
            .ok_or_else(|| BackendError::EntityNotFound(name.to_string()))?;

        descriptor_from_inspect(entry)
    }
}

fn descriptor_from_ps(entry: &Value) -> Result<EntityDescriptor> {
    let names = str_field(entry, "Names")?;
    // `ps` may report several names; the first is canonical
    let name = names.split(',').next().unwrap_or(&names).to_string();

    Ok(EntityDescriptor {
        name,
        image_or_os: str_field(entry, "Image")?,
        state: str_field(entry, "State")?,
        exposed_ports: parse_port_text(entry.get("Ports").and_then(Value::as_str).unwrap_or("")),
        labels: parse_label_text(entry.get("Labels").and_then(Value::as_str).unwrap_or("")),
        ip_addresses: Vec::new(),
    })
}

fn descriptor_from_inspect(entry: &Value) -> Result<EntityDescriptor> {
    let name = str_field(entry, "Name")?
        .trim_start_matches('/')
        .to_string();

    let image = entry
        .pointer("/Config/Image")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let state = entry
        .pointer("/State/Status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let labels = entry
        .pointer("/Config/Labels")
        .and_then(Value::as_object)
        .map(|object| {
            object
                .iter()
                .filter_map(|(key, value)| {
                    value.as_str().map(|v| (key.clone(), v.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut ip_addresses = Vec::new();
    if let Some(ip) = entry
        .pointer("/NetworkSettings/IPAddress")
        .and_then(Value::as_str)
    {
        if !ip.is_empty() {
            ip_addresses.push(ip.to_string());
        }
    }
    if let Some(networks) = entry
        .pointer("/NetworkSettings/Networks")
        .and_then(Value::as_object)
    {
        for network in networks.values() {
            if let Some(ip) = network.get("IPAddress").and_then(Value::as_str) {
                if !ip.is_empty() && !ip_addresses.iter().any(|known| known == ip) {
                    ip_addresses.push(ip.to_string());
                }
            }
        }
    }

    Ok(EntityDescriptor {
        name,
        image_or_os: image,
        state,
        exposed_ports: parse_port_bindings(entry.pointer("/HostConfig/PortBindings")),
        labels,
        ip_addresses,
    })
}

fn str_field(entry: &Value, field: &str) -> Result<String> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BackendError::Protocol(format!("missing field '{}'", field)))
}

/// Parses `ps`-style port text such as
/// `0.0.0.0:8080->80/tcp, :::8080->80/tcp` into protocol → host ports.
fn parse_port_text(text: &str) -> BTreeMap<String, Vec<u16>> {
    let mut ports: BTreeMap<String, Vec<u16>> = BTreeMap::new();

    for entry in text.split(',').map(str::trim) {
        let Some((host_part, container_part)) = entry.split_once("->") else {
            // Exposed but unpublished; nothing reachable to route at
            continue;
        };
        let Some(host_port) = host_part
            .rsplit(':')
            .next()
            .and_then(|port| port.parse::<u16>().ok())
        else {
            continue;
        };
        let protocol = container_part
            .rsplit('/')
            .next()
            .unwrap_or("tcp")
            .to_string();

        let entry = ports.entry(protocol).or_default();
        if !entry.contains(&host_port) {
            entry.push(host_port);
        }
    }

    ports
}

/// Parses inspect's `HostConfig.PortBindings` into protocol → host ports.
fn parse_port_bindings(bindings: Option<&Value>) -> BTreeMap<String, Vec<u16>> {
    let mut ports: BTreeMap<String, Vec<u16>> = BTreeMap::new();

    let Some(bindings) = bindings.and_then(Value::as_object) else {
        return ports;
    };

    for (container_port, host_bindings) in bindings {
        let protocol = container_port
            .rsplit('/')
            .next()
            .unwrap_or("tcp")
            .to_string();

        let Some(host_bindings) = host_bindings.as_array() else {
            continue;
        };
        for binding in host_bindings {
            if let Some(host_port) = binding
                .get("HostPort")
                .and_then(Value::as_str)
                .and_then(|port| port.parse::<u16>().ok())
            {
                let entry = ports.entry(protocol.clone()).or_default();
                if !entry.contains(&host_port) {
                    entry.push(host_port);
                }
            }
        }
    }

    ports
}

fn parse_label_text(text: &str) -> BTreeMap<String, String> {
    text.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_port_text_extracts_published_ports() {
        let ports = parse_port_text("0.0.0.0:8080->80/tcp, :::8080->80/tcp, 9000/tcp");
        assert_eq!(ports.get("tcp"), Some(&vec![8080]));
    }

    #[test]
    fn parse_port_text_empty() {
        assert!(parse_port_text("").is_empty());
    }

    #[test]
    fn parse_label_text_splits_pairs() {
        let labels = parse_label_text("app=web,tier=front");
        assert_eq!(labels.get("app").map(String::as_str), Some("web"));
        assert_eq!(labels.get("tier").map(String::as_str), Some("front"));
    }

    #[test]
    fn descriptor_from_ps_line() {
        let entry: Value = serde_json::from_str(
            r#"{"Names":"web","Image":"nginx:1.25","State":"running","Ports":"0.0.0.0:8080->80/tcp","Labels":"app=web"}"#,
        )
        .unwrap();

        let descriptor = descriptor_from_ps(&entry).unwrap();
        assert_eq!(descriptor.name, "web");
        assert_eq!(descriptor.image_or_os, "nginx:1.25");
        assert_eq!(descriptor.state, "running");
        assert_eq!(descriptor.exposed_ports.get("tcp"), Some(&vec![8080]));
    }

    #[test]
    fn descriptor_from_inspect_entry() {
        let entry: Value = serde_json::from_str(
            r#"{
                "Name": "/web",
                "Config": {"Image": "nginx:1.25", "Labels": {"app": "web"}},
                "State": {"Status": "running"},
                "HostConfig": {"PortBindings": {"80/tcp": [{"HostIp": "0.0.0.0", "HostPort": "8080"}]}},
                "NetworkSettings": {"IPAddress": "172.17.0.2", "Networks": {"bridge": {"IPAddress": "172.17.0.2"}}}
            }"#,
        )
        .unwrap();

        let descriptor = descriptor_from_inspect(&entry).unwrap();
        assert_eq!(descriptor.name, "web");
        assert_eq!(descriptor.exposed_ports.get("tcp"), Some(&vec![8080]));
        assert_eq!(descriptor.ip_addresses, vec!["172.17.0.2".to_string()]);
        assert_eq!(descriptor.labels.get("app").map(String::as_str), Some("web"));
    }
}
