//! Application entity: the unit of exposure through tunnels

use std::collections::BTreeMap;

use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Exposed ports by protocol, e.g. `{"http": [8080], "tcp": [5432]}`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ExposedPorts(pub BTreeMap<String, Vec<u16>>);

impl ExposedPorts {
    /// The port ingress rules point at: the first http port, or the first
    /// port of any protocol when no http port is declared.
    pub fn primary_port(&self) -> Option<u16> {
        if let Some(port) = self.0.get("http").and_then(|ports| ports.first()) {
            return Some(*port);
        }
        self.0.values().flatten().next().copied()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Application name
    pub name: String,

    /// Owning server
    pub server_id: i32,

    /// Owning container, if containerized (cascade-delete)
    pub container_id: Option<i32>,

    /// Owning VM, if VM-hosted (nullify-on-delete)
    pub vm_id: Option<i32>,

    /// Hostname fragment; full hostnames are derived per tunnel TLD
    pub hostname: String,

    /// Exposed ports by protocol
    #[sea_orm(column_type = "Json")]
    pub exposed_ports: ExposedPorts,

    /// Whether this application is eligible for ingress compilation
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

    #[sea_orm(
        belongs_to = "super::container::Entity",
        from = "Column::ContainerId",
        to = "super::container::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Container,

    #[sea_orm(
        belongs_to = "super::vm::Entity",
        from = "Column::VmId",
        to = "super::vm::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Vm,
}

impl Related<super::server::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl Related<super::container::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Container.def()
    }
}

impl Related<super::vm::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vm.def()
    }
}

/// Routes: applications reach tunnels through the tunnel_applications join
impl Related<super::tunnel::Entity> for Entity {
    fn to() -> RelationDef {
        super::tunnel_application::Relation::Tunnel.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::tunnel_application::Relation::Application.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_port_prefers_http() {
        let mut map = BTreeMap::new();
        map.insert("http".to_string(), vec![8080, 8081]);
        map.insert("tcp".to_string(), vec![5432]);
        assert_eq!(ExposedPorts(map).primary_port(), Some(8080));
    }

    #[test]
    fn primary_port_falls_back_to_any_protocol() {
        let mut map = BTreeMap::new();
        map.insert("tcp".to_string(), vec![5432]);
        assert_eq!(ExposedPorts(map).primary_port(), Some(5432));
    }

    #[test]
    fn primary_port_empty() {
        assert_eq!(ExposedPorts::default().primary_port(), None);
    }
}
