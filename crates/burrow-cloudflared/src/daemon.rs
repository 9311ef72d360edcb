//! Daemon control trait
//!
//! The reconciliation engine drives the daemon through this seam; the
//! production implementation is [`CloudflaredRunner`], tests substitute a
//! scripted fake.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::runner::CloudflaredRunner;

#[async_trait]
pub trait TunnelDaemon: Send + Sync {
    /// Creates a daemon-side tunnel; the daemon assigns and returns its
    /// UUID.
    async fn create_tunnel(&self, name: &str) -> Result<Uuid>;

    async fn stop_tunnel(&self, uuid: Uuid) -> Result<()>;

    async fn delete_tunnel(&self, uuid: Uuid) -> Result<()>;

    async fn add_route(&self, uuid: Uuid, hostname: &str, service: &str) -> Result<()>;

    async fn remove_route(&self, uuid: Uuid, hostname: &str) -> Result<()>;
}

#[async_trait]
impl TunnelDaemon for CloudflaredRunner {
    async fn create_tunnel(&self, name: &str) -> Result<Uuid> {
        self.tunnel_create(name).await
    }

    async fn stop_tunnel(&self, uuid: Uuid) -> Result<()> {
        self.tunnel_stop(&uuid.to_string()).await?;
        Ok(())
    }

    async fn delete_tunnel(&self, uuid: Uuid) -> Result<()> {
        self.tunnel_delete(&uuid.to_string()).await?;
        Ok(())
    }

    async fn add_route(&self, uuid: Uuid, hostname: &str, service: &str) -> Result<()> {
        self.route_add(&uuid.to_string(), hostname, service).await?;
        Ok(())
    }

    async fn remove_route(&self, _uuid: Uuid, hostname: &str) -> Result<()> {
        self.route_delete(hostname).await?;
        Ok(())
    }
}
