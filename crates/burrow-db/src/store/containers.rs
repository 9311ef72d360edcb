//! Container operations, including the discovery-sweep upsert

use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::debug;

use crate::entities::{container, Container, Server};
use crate::error::{DbError, Result};

use super::Store;

pub struct Containers<'a> {
    pub(super) store: &'a Store,
}

pub struct NewContainer {
    pub server_id: i32,
    pub name: String,
    pub image: String,
    pub state: String,
    pub hostname: Option<String>,
    pub enabled: bool,
}

/// Backend-reported container shape, as normalized by the adapter
#[derive(Debug, Clone)]
pub struct DiscoveredContainer {
    pub name: String,
    pub image: String,
    pub state: String,
}

impl Containers<'_> {
    pub async fn create(&self, new: NewContainer) -> Result<container::Model> {
        let txn = self.store.db.begin().await?;

        if Server::find_by_id(new.server_id).one(&txn).await?.is_none() {
            return Err(DbError::not_found("server", new.server_id));
        }

        if Container::find()
            .filter(container::Column::ServerId.eq(new.server_id))
            .filter(container::Column::Name.eq(&new.name))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "container",
                constraint: "name",
            });
        }

        let model = container::ActiveModel {
            server_id: Set(new.server_id),
            name: Set(new.name),
            image: Set(new.image),
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

    pub async fn get(&self, id: i32) -> Result<container::Model> {
        Container::find_by_id(id)
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("container", id))
    }

    pub async fn get_by_name(&self, server_id: i32, name: &str) -> Result<Option<container::Model>> {
        Ok(Container::find()
            .filter(container::Column::ServerId.eq(server_id))
            .filter(container::Column::Name.eq(name))
            .one(&self.store.db)
            .await?)
    }

    pub async fn list_for_server(&self, server_id: i32) -> Result<Vec<container::Model>> {
        Ok(Container::find()
            .filter(container::Column::ServerId.eq(server_id))
            .order_by_asc(container::Column::Id)
            .all(&self.store.db)
            .await?)
    }

    pub async fn set_enabled(&self, id: i32, enabled: bool) -> Result<container::Model> {
        let txn = self.store.db.begin().await?;
        let container = Container::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("container", id))?;

        let mut active = container.into_active_model();
        active.enabled = Set(enabled);
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    pub async fn set_hostname(&self, id: i32, hostname: Option<String>) -> Result<container::Model> {
        let txn = self.store.db.begin().await?;
        let container = Container::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("container", id))?;

        let mut active = container.into_active_model();
        active.hostname = Set(hostname);
        let model = active.update(&txn).await?;
        txn.commit().await?;
        Ok(model)
    }

    /// Create-if-missing / update-if-changed from a discovery sweep.
    ///
    /// Operator-owned fields (`enabled`, `hostname`) are never touched, and
    /// rows are never deleted here: absence upstream is the caller's signal
    /// to surface, not ours to act on.
    pub async fn upsert_discovered(
        &self,
        server_id: i32,
        discovered: &DiscoveredContainer,
    ) -> Result<container::Model> {
        let txn = self.store.db.begin().await?;

        let existing = Container::find()
            .filter(container::Column::ServerId.eq(server_id))
            .filter(container::Column::Name.eq(&discovered.name))
            .one(&txn)
            .await?;

        let model = match existing {
            Some(container)
                if container.image == discovered.image && container.state == discovered.state =>
            {
                container
            }
            Some(container) => {
                debug!(
                    server_id,
                    container = %discovered.name,
                    "Refreshing discovered container"
                );
                let mut active = container.into_active_model();
                active.image = Set(discovered.image.clone());
                active.state = Set(discovered.state.clone());
                active.update(&txn).await?
            }
            None => {
                debug!(
                    server_id,
                    container = %discovered.name,
                    "Recording newly discovered container"
                );
                container::ActiveModel {
                    server_id: Set(server_id),
                    name: Set(discovered.name.clone()),
                    image: Set(discovered.image.clone()),
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

    pub async fn delete(&self, id: i32) -> Result<()> {
        let txn = self.store.db.begin().await?;
        let container = Container::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("container", id))?;
        container.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
