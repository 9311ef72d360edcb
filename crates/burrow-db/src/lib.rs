//! Entity store for burrow
//!
//! The relational graph of servers, workloads, applications, tunnels and
//! TLDs, persisted through SeaORM. All mutation goes through [`Store`]
//! operations, which enforce the uniqueness and referential invariants and
//! report typed [`DbError`]s.

pub mod cache;
pub mod entities;
pub mod error;
pub mod migrator;
pub mod store;

pub use error::DbError;
pub use store::Store;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::info;

/// Initialize database connection
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    let backend = db.get_database_backend();
    info!("Connected to database backend: {:?}", backend);

    Ok(db)
}

/// Run migrations
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    use sea_orm_migration::MigratorTrait;

    info!("Running database migrations...");
    migrator::Migrator::up(db, None).await?;
    info!("Database migrations completed");

    Ok(())
}
