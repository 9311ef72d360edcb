//! Initial schema: servers, workloads, applications, tunnels, TLDs, routes,
//! settings

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Servers::Table)
                    .if_not_exists()
                    .col(pk_auto(Servers::Id))
                    .col(string_len_uniq(Servers::Name, 80))
                    .col(string_len_uniq(Servers::Hostname, 255))
                    .col(string_len_uniq(Servers::IpAddress, 45))
                    .col(integer(Servers::SshPort).default(22))
                    .col(string_len(Servers::Username, 80))
                    .col(string_len(Servers::Password, 255))
                    .col(string_len_null(Servers::ApiToken, 255))
                    .col(string_len(Servers::ContainerManager, 32))
                    .col(string_len(Servers::VmManager, 32))
                    .col(string_len_null(Servers::Namespace, 80))
                    .col(
                        timestamp_with_time_zone(Servers::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Containers::Table)
                    .if_not_exists()
                    .col(pk_auto(Containers::Id))
                    .col(string_len(Containers::Name, 255))
                    .col(string_len(Containers::Image, 255))
                    .col(string_len(Containers::State, 80))
                    .col(integer(Containers::ServerId))
                    .col(string_len_null(Containers::Hostname, 255))
                    .col(boolean(Containers::Enabled).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_containers_server")
                            .from(Containers::Table, Containers::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Container names are unique per server, not globally
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_containers_server_name")
                    .table(Containers::Table)
                    .col(Containers::ServerId)
                    .col(Containers::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Vms::Table)
                    .if_not_exists()
                    .col(pk_auto(Vms::Id))
                    .col(string_len(Vms::Name, 255))
                    .col(string_len(Vms::OsName, 80))
                    .col(string_len_null(Vms::OsVersion, 80))
                    .col(integer_null(Vms::CpuCores))
                    .col(big_integer_null(Vms::MemoryMb))
                    .col(string_len(Vms::State, 80))
                    .col(integer(Vms::ServerId))
                    .col(string_len_null(Vms::Hostname, 255))
                    .col(boolean(Vms::Enabled).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vms_server")
                            .from(Vms::Table, Vms::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_vms_server_name")
                    .table(Vms::Table)
                    .col(Vms::ServerId)
                    .col(Vms::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Applications::Table)
                    .if_not_exists()
                    .col(pk_auto(Applications::Id))
                    .col(string_len(Applications::Name, 80))
                    .col(integer(Applications::ServerId))
                    .col(integer_null(Applications::ContainerId))
                    .col(integer_null(Applications::VmId))
                    .col(string_len(Applications::Hostname, 255))
                    .col(json(Applications::ExposedPorts))
                    .col(boolean(Applications::Enabled).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_applications_server")
                            .from(Applications::Table, Applications::ServerId)
                            .to(Servers::Table, Servers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_applications_container")
                            .from(Applications::Table, Applications::ContainerId)
                            .to(Containers::Table, Containers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_applications_vm")
                            .from(Applications::Table, Applications::VmId)
                            .to(Vms::Table, Vms::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tunnels::Table)
                    .if_not_exists()
                    .col(pk_auto(Tunnels::Id))
                    .col(string_len_uniq(Tunnels::Name, 80))
                    .col(ColumnDef::new(Tunnels::Uuid).uuid().null().unique_key())
                    .col(string_len_uniq(Tunnels::Domain, 255))
                    .col(string_len_null(Tunnels::Description, 255))
                    .col(string_len(Tunnels::State, 16).default("provisioning"))
                    .col(
                        timestamp_with_time_zone(Tunnels::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tlds::Table)
                    .if_not_exists()
                    .col(pk_auto(Tlds::Id))
                    .col(string_len_uniq(Tlds::Name, 255))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TunnelTlds::Table)
                    .if_not_exists()
                    .col(integer(TunnelTlds::TunnelId))
                    .col(integer(TunnelTlds::TldId))
                    .primary_key(
                        Index::create()
                            .col(TunnelTlds::TunnelId)
                            .col(TunnelTlds::TldId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tunnel_tlds_tunnel")
                            .from(TunnelTlds::Table, TunnelTlds::TunnelId)
                            .to(Tunnels::Table, Tunnels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tunnel_tlds_tld")
                            .from(TunnelTlds::Table, TunnelTlds::TldId)
                            .to(Tlds::Table, Tlds::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TunnelApplications::Table)
                    .if_not_exists()
                    .col(integer(TunnelApplications::TunnelId))
                    .col(integer(TunnelApplications::ApplicationId))
                    .primary_key(
                        Index::create()
                            .col(TunnelApplications::TunnelId)
                            .col(TunnelApplications::ApplicationId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tunnel_applications_tunnel")
                            .from(TunnelApplications::Table, TunnelApplications::TunnelId)
                            .to(Tunnels::Table, Tunnels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tunnel_applications_application")
                            .from(TunnelApplications::Table, TunnelApplications::ApplicationId)
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(pk_auto(Settings::Id))
                    .col(string_len_uniq(Settings::Name, 80))
                    .col(string_len(Settings::Value, 255))
                    .col(
                        timestamp_with_time_zone(Settings::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TunnelApplications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TunnelTlds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tlds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tunnels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Applications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vms::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Containers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Servers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Servers {
    Table,
    Id,
    Name,
    Hostname,
    IpAddress,
    SshPort,
    Username,
    Password,
    ApiToken,
    ContainerManager,
    VmManager,
    Namespace,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Containers {
    Table,
    Id,
    Name,
    Image,
    State,
    ServerId,
    Hostname,
    Enabled,
}

#[derive(DeriveIden)]
enum Vms {
    Table,
    Id,
    Name,
    OsName,
    OsVersion,
    CpuCores,
    MemoryMb,
    State,
    ServerId,
    Hostname,
    Enabled,
}

#[derive(DeriveIden)]
enum Applications {
    Table,
    Id,
    Name,
    ServerId,
    ContainerId,
    VmId,
    Hostname,
    ExposedPorts,
    Enabled,
}

#[derive(DeriveIden)]
enum Tunnels {
    Table,
    Id,
    Name,
    Uuid,
    Domain,
    Description,
    State,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tlds {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum TunnelTlds {
    Table,
    TunnelId,
    TldId,
}

#[derive(DeriveIden)]
enum TunnelApplications {
    Table,
    TunnelId,
    ApplicationId,
}

#[derive(DeriveIden)]
enum Settings {
    Table,
    Id,
    Name,
    Value,
    UpdatedAt,
}
