//! VM entity: a virtual machine discovered on or declared for a server

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// VM name (unique per server)
    pub name: String,

    /// Guest OS name
    pub os_name: String,

    /// Guest OS version
    pub os_version: Option<String>,

    /// Allocated vCPU count
    pub cpu_cores: Option<i32>,

    /// Allocated memory in MiB
    pub memory_mb: Option<i64>,

    /// Backend-reported state (running, stopped, ...)
    pub state: String,

    /// Owning server
    pub server_id: i32,

    /// Hostname fragment used when exposing applications from this VM
    pub hostname: Option<String>,

    /// Whether routes through this VM are eligible for compilation
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

    /// Applications survive VM deletion (reparenting is deliberate)
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
