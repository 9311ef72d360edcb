//! cloudflared command runner
//!
//! The narrow waist every daemon-side operation passes through: build an
//! argument vector, spawn the binary, optionally feed it JSON on stdin,
//! classify the outcome. Callers are thin argv builders over [`run`].
//!
//! [`run`]: CloudflaredRunner::run

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{CloudflaredError, Result};

const DEFAULT_BINARY: &str = "cloudflared";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Decoded daemon output: structured when stdout is JSON, raw otherwise
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Json(Value),
    Text(String),
}

pub struct CloudflaredRunner {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for CloudflaredRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudflaredRunner {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Runner for an explicit binary path (tests, packaged installs)
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the binary is resolvable before every invocation; a missing
    /// binary is an environment defect, not a transient failure.
    fn resolve_binary(&self) -> Result<PathBuf> {
        if self.binary.components().count() > 1 {
            if self.binary.is_file() {
                return Ok(self.binary.clone());
            }
            return Err(CloudflaredError::NotInstalled);
        }

        let path_var = std::env::var_os("PATH").ok_or(CloudflaredError::NotInstalled)?;
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(&self.binary);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        Err(CloudflaredError::NotInstalled)
    }

    /// Runs `cloudflared <args>`, optionally piping a JSON payload to
    /// stdin, and classifies the result.
    pub async fn run(&self, args: &[&str], stdin_json: Option<&Value>) -> Result<CommandOutput> {
        let binary = self.resolve_binary()?;
        debug!(binary = %binary.display(), ?args, "Running cloudflared command");

        let mut command = Command::new(&binary);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command.stdin(if stdin_json.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command.spawn()?;

        if let Some(payload) = stdin_json {
            let mut stdin = child.stdin.take().ok_or_else(|| {
                CloudflaredError::Protocol("child stdin unavailable".to_string())
            })?;
            let bytes = serde_json::to_vec(payload)
                .map_err(|e| CloudflaredError::Protocol(format!("stdin payload: {}", e)))?;
            stdin.write_all(&bytes).await?;
            // Close stdin so the daemon sees EOF
            drop(stdin);
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CloudflaredError::Timeout(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(CloudflaredError::CommandFailed {
                stderr: if stderr.trim().is_empty() {
                    format!("exit status {}", output.status.code().unwrap_or(-1))
                } else {
                    stderr.trim().to_string()
                },
            });
        }

        // Daemons log informationally to stderr even on success
        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr.trim(), "cloudflared command wrote to stderr");
        }

        match serde_json::from_str(&stdout) {
            Ok(value) => Ok(CommandOutput::Json(value)),
            Err(_) => Ok(CommandOutput::Text(stdout)),
        }
    }

    // --- tunnel commands ---

    /// `tunnel create <name>`: returns the daemon-assigned tunnel UUID.
    pub async fn tunnel_create(&self, name: &str) -> Result<Uuid> {
        let output = self.run(&["tunnel", "create", name], None).await?;
        extract_uuid(&output)
    }

    pub async fn tunnel_list(&self) -> Result<CommandOutput> {
        self.run(&["tunnel", "list"], None).await
    }

    pub async fn tunnel_info(&self, id_or_name: &str) -> Result<CommandOutput> {
        self.run(&["tunnel", "info", id_or_name], None).await
    }

    pub async fn tunnel_run(&self, id_or_name: &str) -> Result<CommandOutput> {
        self.run(&["tunnel", "run", id_or_name], None).await
    }

    pub async fn tunnel_status(&self, id_or_name: &str) -> Result<CommandOutput> {
        self.run(&["tunnel", "status", id_or_name], None).await
    }

    pub async fn tunnel_stop(&self, id_or_name: &str) -> Result<CommandOutput> {
        self.run(&["tunnel", "stop", id_or_name], None).await
    }

    pub async fn tunnel_delete(&self, id_or_name: &str) -> Result<CommandOutput> {
        self.run(&["tunnel", "delete", id_or_name], None).await
    }

    // --- route commands ---

    pub async fn route_list(&self) -> Result<CommandOutput> {
        self.run(&["route", "list"], None).await
    }

    pub async fn route_add(
        &self,
        tunnel_uuid: &str,
        hostname: &str,
        service: &str,
    ) -> Result<CommandOutput> {
        self.run(&["route", "add", tunnel_uuid, hostname, service], None)
            .await
    }

    pub async fn route_delete(&self, hostname: &str) -> Result<CommandOutput> {
        self.run(&["route", "delete", hostname], None).await
    }

    // --- login / token / teams commands ---

    /// `login --no-autoupdate` with the API token on stdin
    pub async fn login(&self, token: &str) -> Result<CommandOutput> {
        let payload = serde_json::json!({ "token": token });
        self.run(&["login", "--no-autoupdate"], Some(&payload)).await
    }

    pub async fn token_create(&self, name: &str, scopes: &[&str]) -> Result<CommandOutput> {
        let mut args = vec!["token", "create", name];
        args.extend_from_slice(scopes);
        self.run(&args, None).await
    }

    pub async fn token_list(&self) -> Result<CommandOutput> {
        self.run(&["token", "list"], None).await
    }

    pub async fn token_delete(&self, name: &str) -> Result<CommandOutput> {
        self.run(&["token", "delete", name], None).await
    }

    pub async fn teams_list(&self) -> Result<CommandOutput> {
        self.run(&["teams", "list"], None).await
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

/// Pulls the tunnel UUID out of a `tunnel create` response: the `id` field
/// when stdout was JSON, or the first UUID-shaped token in text output.
fn extract_uuid(output: &CommandOutput) -> Result<Uuid> {
    match output {
        CommandOutput::Json(value) => value
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| {
                CloudflaredError::Protocol("tunnel create response without an id".to_string())
            }),
        CommandOutput::Text(text) => text
            .split_whitespace()
            .find_map(|token| Uuid::parse_str(token).ok())
            .ok_or_else(|| {
                CloudflaredError::Protocol(format!(
                    "no tunnel id in output: {}",
                    text.trim()
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_uuid_from_json() {
        let uuid = Uuid::new_v4();
        let output = CommandOutput::Json(serde_json::json!({ "id": uuid.to_string() }));
        assert_eq!(extract_uuid(&output).unwrap(), uuid);
    }

    #[test]
    fn extract_uuid_from_text() {
        let uuid = Uuid::new_v4();
        let output = CommandOutput::Text(format!(
            "Created tunnel edge with id {}\n",
            uuid
        ));
        assert_eq!(extract_uuid(&output).unwrap(), uuid);
    }

    #[test]
    fn extract_uuid_rejects_garbage() {
        let output = CommandOutput::Text("no identifiers here".to_string());
        assert!(matches!(
            extract_uuid(&output),
            Err(CloudflaredError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn missing_binary_is_not_installed() {
        let runner = CloudflaredRunner::with_binary("/nonexistent/cloudflared");
        let err = runner.run(&["tunnel", "list"], None).await.unwrap_err();
        assert!(matches!(err, CloudflaredError::NotInstalled));
    }

    #[tokio::test]
    async fn json_stdout_is_decoded() {
        // `echo` stands in for the daemon: argv becomes stdout
        let runner = CloudflaredRunner::with_binary("/bin/echo");
        let output = runner.run(&[r#"{"ok":true}"#], None).await.unwrap();
        assert_eq!(
            output,
            CommandOutput::Json(serde_json::json!({ "ok": true }))
        );
    }

    #[tokio::test]
    async fn non_json_stdout_falls_back_to_text() {
        let runner = CloudflaredRunner::with_binary("/bin/echo");
        let output = runner.run(&["plain", "text"], None).await.unwrap();
        match output {
            CommandOutput::Text(text) => assert_eq!(text.trim(), "plain text"),
            other => panic!("expected text output, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_is_command_failed() {
        let runner = CloudflaredRunner::with_binary("/bin/false");
        let err = runner.run(&[], None).await.unwrap_err();
        assert!(matches!(err, CloudflaredError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn slow_commands_time_out() {
        let runner =
            CloudflaredRunner::with_binary("/bin/sleep").with_timeout(Duration::from_millis(50));
        let err = runner.run(&["5"], None).await.unwrap_err();
        assert!(matches!(err, CloudflaredError::Timeout(_)));
    }
}
