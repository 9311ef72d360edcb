//! Container entity: a workload unit discovered on or declared for a server

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "containers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Container name (unique per server)
    pub name: String,

    /// Image the container runs
    pub image: String,

    /// Backend-reported state (running, exited, ...)
    pub state: String,

    /// Owning server
    pub server_id: i32,

    /// Hostname fragment used when exposing applications from this container
    pub hostname: Option<String>,

    /// Whether routes through this container are eligible for compilation
    pub enabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::server::Entity",
        from = "Column::ServerId",
        to = "super::server::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Server,

    /// Container owns applications (cascade-delete)
    #[sea_orm(has_many = "super::application::Entity")]
    Applications,
}

impl Related<super::server::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl Related<super::application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Applications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
