//! Tunnel entity: a daemon-managed ingress channel
//!
//! The `uuid` column is assigned by the tunnel daemon at creation time, not
//! by us. A row without a uuid is provisional: no ingress configuration is
//! ever compiled for it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reconciliation state of a tunnel
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TunnelState {
    /// Row inserted, daemon-side create not yet confirmed
    #[sea_orm(string_value = "provisioning")]
    Provisioning,

    /// Daemon confirmed the tunnel; routes may be compiled
    #[sea_orm(string_value = "active")]
    Active,

    /// Delete sequence in progress
    #[sea_orm(string_value = "deleting")]
    Deleting,

    /// A daemon step failed mid-sequence; kept for operator retry
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tunnels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Tunnel name (unique)
    #[sea_orm(unique)]
    pub name: String,

    /// Daemon-assigned identity; null until the daemon confirms creation,
    /// immutable afterwards
    #[sea_orm(unique)]
    pub uuid: Option<Uuid>,

    /// Base domain (unique)
    #[sea_orm(unique)]
    pub domain: String,

    /// Free-form description
    pub description: Option<String>,

    /// Current reconciliation state
    pub state: TunnelState,

    /// When the tunnel row was created
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<super::tld::Entity> for Entity {
    fn to() -> RelationDef {
        super::tunnel_tld::Relation::Tld.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::tunnel_tld::Relation::Tunnel.def().rev())
    }
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        super::tunnel_application::Relation::Application.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::tunnel_application::Relation::Tunnel.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
