//! Application operations

use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::entities::application::{self, ExposedPorts};
use crate::entities::{Application, Container, Server, Vm};
use crate::error::{DbError, Result};

use super::Store;

pub struct Applications<'a> {
    pub(super) store: &'a Store,
}

pub struct NewApplication {
    pub name: String,
    pub server_id: i32,
    pub container_id: Option<i32>,
    pub vm_id: Option<i32>,
    pub hostname: String,
    pub exposed_ports: ExposedPorts,
    pub enabled: bool,
}

impl Applications<'_> {
    pub async fn create(&self, new: NewApplication) -> Result<application::Model> {
        let txn = self.store.db.begin().await?;

        if Server::find_by_id(new.server_id).one(&txn).await?.is_none() {
            return Err(DbError::not_found("server", new.server_id));
        }

        // An owning workload must exist and live on the same server
        if let Some(container_id) = new.container_id {
            let container = Container::find_by_id(container_id)
                .one(&txn)
                .await?
                .ok_or_else(|| DbError::not_found("container", container_id))?;
            if container.server_id != new.server_id {
                return Err(DbError::Conflict(format!(
                    "container {} belongs to server {}, not {}",
                    container_id, container.server_id, new.server_id
                )));
            }
        }
        if let Some(vm_id) = new.vm_id {
            let vm = Vm::find_by_id(vm_id)
                .one(&txn)
                .await?
                .ok_or_else(|| DbError::not_found("vm", vm_id))?;
            if vm.server_id != new.server_id {
                return Err(DbError::Conflict(format!(
                    "vm {} belongs to server {}, not {}",
                    vm_id, vm.server_id, new.server_id
                )));
            }
        }

        let model = application::ActiveModel {
            name: Set(new.name),
            server_id: Set(new.server_id),
            container_id: Set(new.container_id),
            vm_id: Set(new.vm_id),
            hostname: Set(new.hostname),
            exposed_ports: Set(new.exposed_ports),
            enabled: Set(new.enabled),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<application::Model> {
        Application::find_by_id(id)
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("application", id))
    }

    pub async fn list_for_server(&self, server_id: i32) -> Result<Vec<application::Model>> {
        Ok(Application::find()
            .filter(application::Column::ServerId.eq(server_id))
            .order_by_asc(application::Column::Id)
            .all(&self.store.db)
            .await?)
    }

    pub async fn set_enabled(&self, id: i32, enabled: bool) -> Result<application::Model> {
        let txn = self.store.db.begin().await?;
        let application = Application::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("application", id))?;

        let mut active = application.into_active_model();
        active.enabled = Set(enabled);
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    pub async fn set_exposed_ports(&self, id: i32, ports: ExposedPorts) -> Result<application::Model> {
        let txn = self.store.db.begin().await?;
        let application = Application::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("application", id))?;

        let mut active = application.into_active_model();
        active.exposed_ports = Set(ports);
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        let txn = self.store.db.begin().await?;
        let application = Application::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("application", id))?;
        application.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
