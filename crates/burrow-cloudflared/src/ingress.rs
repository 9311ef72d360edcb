//! Ingress configuration compiler
//!
//! A pure function from a tunnel snapshot to the daemon's declarative
//! ingress document. No I/O: the engine assembles the snapshot from the
//! store and persists the rendered document itself.
//!
//! The daemon evaluates rules top to bottom, so the catch-all rule must be
//! the last element; anything after it would be unreachable.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Where the daemon finds its tunnel credentials
pub const CREDENTIALS_FILE: &str = "/etc/cloudflared/cert.pem";

/// The terminal rule's service
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

#[derive(Debug, Error)]
pub enum CompileError {
    /// The tunnel has no daemon-confirmed uuid; nothing may be compiled
    /// for it
    #[error("tunnel '{0}' has no confirmed uuid")]
    MissingUuid(String),

    #[error("failed to render ingress config: {0}")]
    Render(String),
}

/// A TLD attached to the tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TldEntry {
    pub id: i32,
    pub name: String,
}

/// An application routed through the tunnel, with its resolved backend
/// address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEntry {
    pub id: i32,
    pub hostname: String,
    pub enabled: bool,
    /// Whether the owning container/VM (if any) is enabled
    pub workload_enabled: bool,
    pub service_ip: String,
    pub service_port: u16,
}

/// Everything the compiler needs to know about one tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSnapshot {
    pub name: String,
    pub uuid: Option<Uuid>,
    pub tlds: Vec<TldEntry>,
    pub applications: Vec<ApplicationEntry>,
}

/// One hostname → service mapping; the terminal rule has no hostname
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub service: String,
}

/// The document the daemon consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressConfig {
    pub tunnel: Uuid,
    #[serde(rename = "credentials-file")]
    pub credentials_file: String,
    pub ingress: Vec<IngressRule>,
}

impl IngressConfig {
    pub fn to_yaml(&self) -> Result<String, CompileError> {
        serde_yaml::to_string(self).map_err(|e| CompileError::Render(e.to_string()))
    }
}

/// Compiles a tunnel snapshot into its ingress document.
///
/// One rule per (enabled application × tunnel TLD), ordered by application
/// id then TLD id, followed by exactly one catch-all. Deterministic: the
/// same snapshot always renders byte-identically.
pub fn compile(snapshot: &TunnelSnapshot) -> Result<IngressConfig, CompileError> {
    let uuid = snapshot
        .uuid
        .ok_or_else(|| CompileError::MissingUuid(snapshot.name.clone()))?;

    let mut applications: Vec<&ApplicationEntry> = snapshot
        .applications
        .iter()
        .filter(|app| app.enabled && app.workload_enabled)
        .collect();
    applications.sort_by_key(|app| app.id);

    let mut tlds: Vec<&TldEntry> = snapshot.tlds.iter().collect();
    tlds.sort_by_key(|tld| tld.id);

    let mut ingress = Vec::with_capacity(applications.len() * tlds.len() + 1);
    for app in &applications {
        for tld in &tlds {
            ingress.push(IngressRule {
                hostname: Some(format!("{}.{}", app.hostname, tld.name)),
                service: format!("http://{}:{}", app.service_ip, app.service_port),
            });
        }
    }

    ingress.push(IngressRule {
        hostname: None,
        service: CATCH_ALL_SERVICE.to_string(),
    });

    Ok(IngressConfig {
        tunnel: uuid,
        credentials_file: CREDENTIALS_FILE.to_string(),
        ingress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: i32, hostname: &str, port: u16) -> ApplicationEntry {
        ApplicationEntry {
            id,
            hostname: hostname.to_string(),
            enabled: true,
            workload_enabled: true,
            service_ip: "10.0.0.5".to_string(),
            service_port: port,
        }
    }

    fn tld(id: i32, name: &str) -> TldEntry {
        TldEntry {
            id,
            name: name.to_string(),
        }
    }

    fn snapshot(uuid: Option<Uuid>) -> TunnelSnapshot {
        TunnelSnapshot {
            name: "edge".to_string(),
            uuid,
            tlds: vec![tld(1, "a.com"), tld(2, "b.com")],
            applications: vec![app(1, "app1", 8080)],
        }
    }

    #[test]
    fn missing_uuid_is_rejected() {
        let err = compile(&snapshot(None)).unwrap_err();
        assert!(matches!(err, CompileError::MissingUuid(name) if name == "edge"));
    }

    #[test]
    fn hostname_fans_out_per_tld() {
        let config = compile(&snapshot(Some(Uuid::new_v4()))).unwrap();

        // One rule per TLD plus the catch-all
        assert_eq!(config.ingress.len(), 3);
        assert_eq!(config.ingress[0].hostname.as_deref(), Some("app1.a.com"));
        assert_eq!(config.ingress[1].hostname.as_deref(), Some("app1.b.com"));
        assert_eq!(config.ingress[0].service, "http://10.0.0.5:8080");
    }

    #[test]
    fn catch_all_is_always_last() {
        let populated = compile(&snapshot(Some(Uuid::new_v4()))).unwrap();
        let last = populated.ingress.last().unwrap();
        assert_eq!(last.hostname, None);
        assert_eq!(last.service, CATCH_ALL_SERVICE);

        // Holds for an empty rule set too
        let empty = compile(&TunnelSnapshot {
            name: "edge".to_string(),
            uuid: Some(Uuid::new_v4()),
            tlds: vec![],
            applications: vec![],
        })
        .unwrap();
        assert_eq!(empty.ingress.len(), 1);
        assert_eq!(empty.ingress[0].service, CATCH_ALL_SERVICE);
        assert_eq!(empty.ingress[0].hostname, None);
    }

    #[test]
    fn disabled_applications_are_skipped() {
        let mut snap = snapshot(Some(Uuid::new_v4()));
        snap.applications[0].enabled = false;
        let config = compile(&snap).unwrap();
        assert_eq!(config.ingress.len(), 1);

        let mut snap = snapshot(Some(Uuid::new_v4()));
        snap.applications[0].workload_enabled = false;
        let config = compile(&snap).unwrap();
        assert_eq!(config.ingress.len(), 1);
    }

    #[test]
    fn rules_are_ordered_by_application_then_tld() {
        let mut snap = snapshot(Some(Uuid::new_v4()));
        // Deliberately unsorted input
        snap.applications = vec![app(7, "later", 9000), app(2, "earlier", 8000)];
        snap.tlds = vec![tld(5, "z.com"), tld(3, "a.com")];

        let config = compile(&snap).unwrap();
        let hostnames: Vec<_> = config
            .ingress
            .iter()
            .filter_map(|rule| rule.hostname.as_deref())
            .collect();
        assert_eq!(
            hostnames,
            vec!["earlier.a.com", "earlier.z.com", "later.a.com", "later.z.com"]
        );
    }

    #[test]
    fn compilation_is_idempotent() {
        let snap = snapshot(Some(Uuid::new_v4()));

        let first = compile(&snap).unwrap().to_yaml().unwrap();
        let second = compile(&snap).unwrap().to_yaml().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn yaml_document_shape() {
        let uuid = Uuid::new_v4();
        let config = compile(&snapshot(Some(uuid))).unwrap();
        let yaml = config.to_yaml().unwrap();

        assert!(yaml.contains(&format!("tunnel: {}", uuid)));
        assert!(yaml.contains("credentials-file: /etc/cloudflared/cert.pem"));
        assert!(yaml.contains("hostname: app1.a.com"));
        assert!(yaml.contains("service: http_status:404"));
    }
}
