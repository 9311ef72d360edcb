//! Server operations

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter, Set,
    TransactionTrait,
};

use crate::entities::server::{self, ContainerManagerKind, VmManagerKind};
use crate::entities::Server;
use crate::error::{DbError, Result};

use super::Store;

pub struct Servers<'a> {
    pub(super) store: &'a Store,
}

pub struct NewServer {
    pub name: String,
    pub hostname: String,
    pub ip_address: String,
    pub ssh_port: i32,
    pub username: String,
    pub password: String,
    pub api_token: Option<String>,
    pub container_manager: ContainerManagerKind,
    pub vm_manager: VmManagerKind,
    pub namespace: Option<String>,
}

/// Partial update; `None` fields are left unchanged
#[derive(Default)]
pub struct UpdateServer {
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub ssh_port: Option<i32>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_token: Option<Option<String>>,
    pub container_manager: Option<ContainerManagerKind>,
    pub vm_manager: Option<VmManagerKind>,
    pub namespace: Option<Option<String>>,
}

impl Servers<'_> {
    pub async fn create(&self, new: NewServer) -> Result<server::Model> {
        let txn = self.store.db.begin().await?;

        if Server::find()
            .filter(server::Column::Name.eq(&new.name))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "server",
                constraint: "name",
            });
        }
        if Server::find()
            .filter(server::Column::Hostname.eq(&new.hostname))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "server",
                constraint: "hostname",
            });
        }
        if Server::find()
            .filter(server::Column::IpAddress.eq(&new.ip_address))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "server",
                constraint: "ip_address",
            });
        }

        let model = server::ActiveModel {
            name: Set(new.name),
            hostname: Set(new.hostname),
            ip_address: Set(new.ip_address),
            ssh_port: Set(new.ssh_port),
            username: Set(new.username),
            password: Set(new.password),
            api_token: Set(new.api_token),
            container_manager: Set(new.container_manager),
            vm_manager: Set(new.vm_manager),
            namespace: Set(new.namespace),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<server::Model> {
        Server::find_by_id(id)
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("server", id))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<server::Model> {
        Server::find()
            .filter(server::Column::Name.eq(name))
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("server", name))
    }

    pub async fn list(&self) -> Result<Vec<server::Model>> {
        Ok(Server::find().all(&self.store.db).await?)
    }

    pub async fn update(&self, id: i32, update: UpdateServer) -> Result<server::Model> {
        let txn = self.store.db.begin().await?;

        let existing = Server::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("server", id))?;

        if let Some(hostname) = &update.hostname {
            let taken = Server::find()
                .filter(server::Column::Hostname.eq(hostname))
                .filter(server::Column::Id.ne(id))
                .one(&txn)
                .await?;
            if taken.is_some() {
                return Err(DbError::DuplicateKey {
                    entity: "server",
                    constraint: "hostname",
                });
            }
        }
        if let Some(ip_address) = &update.ip_address {
            let taken = Server::find()
                .filter(server::Column::IpAddress.eq(ip_address))
                .filter(server::Column::Id.ne(id))
                .one(&txn)
                .await?;
            if taken.is_some() {
                return Err(DbError::DuplicateKey {
                    entity: "server",
                    constraint: "ip_address",
                });
            }
        }

        let mut active = existing.into_active_model();
        if let Some(hostname) = update.hostname {
            active.hostname = Set(hostname);
        }
        if let Some(ip_address) = update.ip_address {
            active.ip_address = Set(ip_address);
        }
        if let Some(ssh_port) = update.ssh_port {
            active.ssh_port = Set(ssh_port);
        }
        if let Some(username) = update.username {
            active.username = Set(username);
        }
        if let Some(password) = update.password {
            active.password = Set(password);
        }
        if let Some(api_token) = update.api_token {
            active.api_token = Set(api_token);
        }
        if let Some(kind) = update.container_manager {
            active.container_manager = Set(kind);
        }
        if let Some(kind) = update.vm_manager {
            active.vm_manager = Set(kind);
        }
        if let Some(namespace) = update.namespace {
            active.namespace = Set(namespace);
        }

        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    /// Deletes the server and, through FK cascades, its containers, VMs and
    /// applications.
    pub async fn delete(&self, id: i32) -> Result<()> {
        let txn = self.store.db.begin().await?;

        let server = Server::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("server", id))?;

        server.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
