//! Tunnel and route operations
//!
//! Tunnel reads are cached; every write path here invalidates the affected
//! keys before returning.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::entities::tunnel::{self, TunnelState};
use crate::entities::{
    application, tld, tunnel_application, tunnel_tld, Application, Tld, Tunnel, TunnelApplication,
};
use crate::error::{DbError, Result};

use super::Store;

pub struct Tunnels<'a> {
    pub(super) store: &'a Store,
}

pub struct NewTunnel {
    pub name: String,
    pub domain: String,
    pub description: Option<String>,
    pub tld_ids: Vec<i32>,
}

impl Tunnels<'_> {
    /// Inserts a provisional tunnel row: no uuid yet, state `provisioning`.
    /// The reconciler confirms or deletes it depending on the daemon outcome.
    pub async fn create(&self, new: NewTunnel) -> Result<tunnel::Model> {
        let txn = self.store.db.begin().await?;

        if Tunnel::find()
            .filter(tunnel::Column::Name.eq(&new.name))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "tunnel",
                constraint: "name",
            });
        }
        if Tunnel::find()
            .filter(tunnel::Column::Domain.eq(&new.domain))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "tunnel",
                constraint: "domain",
            });
        }

        for tld_id in &new.tld_ids {
            if Tld::find_by_id(*tld_id).one(&txn).await?.is_none() {
                return Err(DbError::not_found("tld", *tld_id));
            }
        }

        let model = tunnel::ActiveModel {
            name: Set(new.name),
            uuid: Set(None),
            domain: Set(new.domain),
            description: Set(new.description),
            state: Set(TunnelState::Provisioning),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for tld_id in new.tld_ids {
            tunnel_tld::ActiveModel {
                tunnel_id: Set(model.id),
                tld_id: Set(tld_id),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        self.store.cache.invalidate_tunnels(model.id);
        Ok(model)
    }

    pub async fn get(&self, id: i32) -> Result<tunnel::Model> {
        if let Some(cached) = self.store.cache.tunnel_by_id.get(&id) {
            return Ok(cached);
        }

        let model = Tunnel::find_by_id(id)
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("tunnel", id))?;

        self.store.cache.tunnel_by_id.put(id, model.clone());
        Ok(model)
    }

    pub async fn get_by_name(&self, name: &str) -> Result<tunnel::Model> {
        Tunnel::find()
            .filter(tunnel::Column::Name.eq(name))
            .one(&self.store.db)
            .await?
            .ok_or_else(|| DbError::not_found("tunnel", name))
    }

    pub async fn list(&self) -> Result<Vec<tunnel::Model>> {
        if let Some(cached) = self.store.cache.tunnel_list.get(&()) {
            return Ok(cached);
        }

        let models = Tunnel::find()
            .order_by_asc(tunnel::Column::Id)
            .all(&self.store.db)
            .await?;

        self.store.cache.tunnel_list.put((), models.clone());
        Ok(models)
    }

    /// Records the daemon-assigned uuid and activates the tunnel.
    ///
    /// The uuid is immutable: confirming a tunnel that already has one is a
    /// conflict, not an update.
    pub async fn confirm_uuid(&self, id: i32, uuid: Uuid) -> Result<tunnel::Model> {
        let txn = self.store.db.begin().await?;

        let existing = Tunnel::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("tunnel", id))?;

        if existing.uuid.is_some() {
            return Err(DbError::Conflict(format!(
                "tunnel {} already has a confirmed uuid",
                existing.name
            )));
        }

        let mut active = existing.into_active_model();
        active.uuid = Set(Some(uuid));
        active.state = Set(TunnelState::Active);
        let model = active.update(&txn).await?;

        txn.commit().await?;
        self.store.cache.invalidate_tunnels(id);
        Ok(model)
    }

    pub async fn set_state(&self, id: i32, state: TunnelState) -> Result<tunnel::Model> {
        let txn = self.store.db.begin().await?;

        let existing = Tunnel::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("tunnel", id))?;

        let mut active = existing.into_active_model();
        active.state = Set(state);
        let model = active.update(&txn).await?;

        txn.commit().await?;
        self.store.cache.invalidate_tunnels(id);
        Ok(model)
    }

    /// Removes the row; join rows cascade.
    pub async fn delete(&self, id: i32) -> Result<()> {
        let txn = self.store.db.begin().await?;

        let tunnel = Tunnel::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| DbError::not_found("tunnel", id))?;

        tunnel.delete(&txn).await?;
        txn.commit().await?;
        self.store.cache.invalidate_tunnels(id);
        Ok(())
    }

    /// TLDs attached to this tunnel, ordered by id for deterministic fan-out.
    pub async fn tlds(&self, id: i32) -> Result<Vec<tld::Model>> {
        let tunnel = self.get(id).await?;
        Ok(tunnel
            .find_related(Tld)
            .order_by_asc(tld::Column::Id)
            .all(&self.store.db)
            .await?)
    }

    pub async fn replace_tlds(&self, id: i32, tld_ids: Vec<i32>) -> Result<()> {
        let txn = self.store.db.begin().await?;

        if Tunnel::find_by_id(id).one(&txn).await?.is_none() {
            return Err(DbError::not_found("tunnel", id));
        }
        for tld_id in &tld_ids {
            if Tld::find_by_id(*tld_id).one(&txn).await?.is_none() {
                return Err(DbError::not_found("tld", *tld_id));
            }
        }

        tunnel_tld::Entity::delete_many()
            .filter(tunnel_tld::Column::TunnelId.eq(id))
            .exec(&txn)
            .await?;
        for tld_id in tld_ids {
            tunnel_tld::ActiveModel {
                tunnel_id: Set(id),
                tld_id: Set(tld_id),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        self.store.cache.invalidate_tunnels(id);
        Ok(())
    }

    /// Associates an application with a tunnel. Both sides must exist; a
    /// second identical association is a duplicate, not a no-op.
    pub async fn add_route(&self, tunnel_id: i32, application_id: i32) -> Result<()> {
        let txn = self.store.db.begin().await?;

        if Tunnel::find_by_id(tunnel_id).one(&txn).await?.is_none() {
            return Err(DbError::not_found("tunnel", tunnel_id));
        }
        if Application::find_by_id(application_id)
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(DbError::not_found("application", application_id));
        }
        if TunnelApplication::find_by_id((tunnel_id, application_id))
            .one(&txn)
            .await?
            .is_some()
        {
            return Err(DbError::DuplicateKey {
                entity: "route",
                constraint: "tunnel/application",
            });
        }

        tunnel_application::ActiveModel {
            tunnel_id: Set(tunnel_id),
            application_id: Set(application_id),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        self.store.cache.invalidate_tunnels(tunnel_id);
        Ok(())
    }

    pub async fn remove_route(&self, tunnel_id: i32, application_id: i32) -> Result<()> {
        let txn = self.store.db.begin().await?;

        let route = TunnelApplication::find_by_id((tunnel_id, application_id))
            .one(&txn)
            .await?
            .ok_or_else(|| {
                DbError::not_found("route", format!("{}/{}", tunnel_id, application_id))
            })?;

        route.delete(&txn).await?;
        txn.commit().await?;
        self.store.cache.invalidate_tunnels(tunnel_id);
        Ok(())
    }

    /// Applications routed through this tunnel, ordered by id for
    /// deterministic compilation.
    pub async fn routed_applications(&self, id: i32) -> Result<Vec<application::Model>> {
        let tunnel = self.get(id).await?;
        Ok(tunnel
            .find_related(Application)
            .order_by_asc(application::Column::Id)
            .all(&self.store.db)
            .await?)
    }

    pub async fn route_exists(&self, tunnel_id: i32, application_id: i32) -> Result<bool> {
        Ok(TunnelApplication::find_by_id((tunnel_id, application_id))
            .one(&self.store.db)
            .await?
            .is_some())
    }
}
