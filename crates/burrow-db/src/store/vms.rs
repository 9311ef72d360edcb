//! VM operations, including the discovery-sweep upsert

use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use crate::entities::{vm, Server, Vm};
use crate::error::{DbError, Result};

use super::Store;

pub struct Vms<'a> {
    pub(super) store: &'a Store,
}

pub struct NewVm {
    pub server_id: i32,
    pub name: String,
    pub os_name: String,
    pub os_version: Option<String>,
    pub cpu_cores: Option<i32>,
    pub memory_mb: Option<i64>,
    pub state: String,
    pub hostname: Option<String>,
    pub enabled: bool,
}

/// Backend-reported VM shape, as normalized by the adapter
#[derive(Debug, Clone)]
pub struct DiscoveredVm {
    pub name: String,
    pub os_name: String,
    pub state: String,
}

impl Vms<'_> {
    pub async fn create(&self, new: NewVm) -> Result<vm::Model> {
        let txn = self.store.db.begin().await?;

        if Server::find_by_id(new.server_id).one(&txn).await?.is_none() {
            return Err(DbError::not_found("server", new.server_id));
        }

        if Vm::find()
            .filter(vm::Column::ServerId.eq(new.server_id))
            .filter(vm::Column::Name.eq(&new.name))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "vm",
                constraint: "name",
            });
        }

        let model = vm::ActiveModel {
            server_id: Set(new.server_id),
            name: Set(new.name),
            os_name: Set(new.os_name),
            os_version: Set(new.os_version),
            cpu_cores: Set(new.cpu_cores),
            memory_mb: Set(new.memory_mb),
            state: Set(new.state),
            hostname: Set(new.hostname),
            enabled: Set(new.enabled),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<vm::Model> {
        Vm::find_by_id(id)
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("vm", id))
    }

    pub async fn get_by_name(&self, server_id: i32, name: &str) -> Result<Option<vm::Model>> {
        Ok(Vm::find()
            .filter(vm::Column::ServerId.eq(server_id))
            .filter(vm::Column::Name.eq(name))
            .one(&self.store.db)
            .await?)
    }

    pub async fn list_for_server(&self, server_id: i32) -> Result<Vec<vm::Model>> {
        Ok(Vm::find()
            .filter(vm::Column::ServerId.eq(server_id))
            .order_by_asc(vm::Column::Id)
            .all(&self.store.db)
            .await?)
    }

    pub async fn set_enabled(&self, id: i32, enabled: bool) -> Result<vm::Model> {
        let txn = self.store.db.begin().await?;
        let vm = Vm::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("vm", id))?;

        let mut active = vm.into_active_model();
        active.enabled = Set(enabled);
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    /// Create-if-missing / update-if-changed from a discovery sweep; never
    /// deletes and never touches operator-owned fields.
    pub async fn upsert_discovered(&self, server_id: i32, discovered: &DiscoveredVm) -> Result<vm::Model> {
        let txn = self.store.db.begin().await?;

        let existing = Vm::find()
            .filter(vm::Column::ServerId.eq(server_id))
            .filter(vm::Column::Name.eq(&discovered.name))
            .one(&txn)
            .await?;

        let model = match existing {
            Some(vm) if vm.os_name == discovered.os_name && vm.state == discovered.state => vm,
            Some(vm) => {
                debug!(server_id, vm = %discovered.name, "Refreshing discovered VM");
                let mut active = vm.into_active_model();
                active.os_name = Set(discovered.os_name.clone());
                active.state = Set(discovered.state.clone());
                active.update(&txn).await?
            }
            None => {
                debug!(server_id, vm = %discovered.name, "Recording newly discovered VM");
                vm::ActiveModel {
                    server_id: Set(server_id),
                    name: Set(discovered.name.clone()),
                    os_name: Set(discovered.os_name.clone()),
                    os_version: Set(None),
                    cpu_cores: Set(None),
                    memory_mb: Set(None),
                    state: Set(discovered.state.clone()),
                    hostname: Set(None),
                    enabled: Set(false),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        txn.commit().await?;
        Ok(model)
    }

    /// Deletes the VM; owned applications are nullified, not removed.
    pub async fn delete(&self, id: i32) -> Result<()> {
        let txn = self.store.db.begin().await?;
        let vm = Vm::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("vm", id))?;
        vm.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
