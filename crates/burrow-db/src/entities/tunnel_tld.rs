//! Join table for the tunnel ↔ TLD many-to-many relation

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tunnel_tlds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tunnel_id: i32,

    #[sea_orm(primary_key, auto_increment = false)]
    pub tld_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tunnel::Entity",
        from = "Column::TunnelId",
        to = "super::tunnel::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Tunnel,

    #[sea_orm(
        belongs_to = "super::tld::Entity",
        from = "Column::TldId",
        to = "super::tld::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Tld,
}

impl ActiveModelBehavior for ActiveModel {}
