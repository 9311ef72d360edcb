//! cloudflared integration for burrow
//!
//! Two halves: the command runner that drives the external `cloudflared`
//! binary as a request/response protocol over process execution, and the
//! pure compiler that renders a tunnel's ingress configuration document.

pub mod daemon;
pub mod error;
pub mod ingress;
pub mod runner;

pub use daemon::TunnelDaemon;
pub use error::CloudflaredError;
pub use ingress::{compile, CompileError, IngressConfig, IngressRule, TunnelSnapshot};
pub use runner::{CloudflaredRunner, CommandOutput};
