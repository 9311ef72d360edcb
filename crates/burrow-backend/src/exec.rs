//! Command-exec transports
//!
//! CLI-speaking drivers (docker, podman) run their binary through an
//! [`Exec`] implementation: locally on this host, or on the managed server
//! over SSH. The driver builds the same argv either way.

use std::io::Read;
use std::net::TcpStream;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{BackendError, Result};
use crate::types::ServerConn;

/// Captured output of an executed command
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait Exec: Send + Sync {
    /// Runs `program` with `args` in the context of `server` and captures
    /// its output. A non-zero exit is not an error at this layer; drivers
    /// decide what it means.
    async fn run(&self, server: &ServerConn, program: &str, args: &[&str]) -> Result<ExecOutput>;
}

/// Runs the program on this host (the manager shares a host with the
/// backend, e.g. a local docker socket).
pub struct LocalExec;

#[async_trait]
impl Exec for LocalExec {
    async fn run(&self, _server: &ServerConn, program: &str, args: &[&str]) -> Result<ExecOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| BackendError::Unreachable(format!("failed to run {}: {}", program, e)))?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Runs the program on the managed server over SSH.
///
/// ssh2 is blocking, so each call opens a session inside `spawn_blocking`.
pub struct SshExec;

#[async_trait]
impl Exec for SshExec {
    async fn run(&self, server: &ServerConn, program: &str, args: &[&str]) -> Result<ExecOutput> {
        let server = server.clone();
        let command = shell_command(program, args);

        tokio::task::spawn_blocking(move || run_over_ssh(&server, &command))
            .await
            .map_err(|e| BackendError::Protocol(format!("ssh task panicked: {}", e)))?
    }
}

fn shell_command(program: &str, args: &[&str]) -> String {
    let mut command = String::from(program);
    for arg in args {
        command.push(' ');
        // Quote anything that is not a plain word
        if arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./:{}".contains(c))
        {
            command.push_str(arg);
        } else {
            command.push('\'');
            command.push_str(&arg.replace('\'', r"'\''"));
            command.push('\'');
        }
    }
    command
}

fn run_over_ssh(server: &ServerConn, command: &str) -> Result<ExecOutput> {
    let tcp = TcpStream::connect((server.hostname.as_str(), server.ssh_port)).map_err(|e| {
        BackendError::Unreachable(format!(
            "TCP connection to {}:{} failed: {}",
            server.hostname, server.ssh_port, e
        ))
    })?;

    let mut session = ssh2::Session::new()
        .map_err(|e| BackendError::Protocol(format!("SSH session creation failed: {}", e)))?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| BackendError::Unreachable(format!("SSH handshake failed: {}", e)))?;

    session
        .userauth_password(&server.username, &server.password)
        .map_err(|e| BackendError::AuthFailed(format!("SSH password auth failed: {}", e)))?;
    if !session.authenticated() {
        return Err(BackendError::AuthFailed(
            "SSH authentication failed".to_string(),
        ));
    }

    let mut channel = session
        .channel_session()
        .map_err(|e| BackendError::Protocol(format!("SSH channel open failed: {}", e)))?;
    channel
        .exec(command)
        .map_err(|e| BackendError::Protocol(format!("SSH exec failed: {}", e)))?;

    let mut stdout = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|e| BackendError::Protocol(format!("SSH stdout read failed: {}", e)))?;

    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|e| BackendError::Protocol(format!("SSH stderr read failed: {}", e)))?;

    channel
        .wait_close()
        .map_err(|e| BackendError::Protocol(format!("SSH channel close failed: {}", e)))?;
    let exit_code = channel
        .exit_status()
        .map_err(|e| BackendError::Protocol(format!("SSH exit status failed: {}", e)))?;

    Ok(ExecOutput {
        stdout,
        stderr,
        exit_code,
    })
}
