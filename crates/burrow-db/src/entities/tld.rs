//! TLD entity: a registrable domain tunnels may mint hostnames under

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tlds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Registrable domain name (unique)
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl Related<super::tunnel::Entity> for Entity {
    fn to() -> RelationDef {
        super::tunnel_tld::Relation::Tunnel.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::tunnel_tld::Relation::Tld.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
