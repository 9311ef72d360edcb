//! Store operations
//!
//! [`Store`] wraps a database connection and exposes per-entity operation
//! groups. Every mutating operation runs in its own transaction; a dropped
//! transaction rolls back, so partial writes are never visible to other
//! readers. Cached reads are invalidated by the write paths that affect
//! them, inside the same operation.

mod applications;
mod containers;
mod servers;
mod settings;
mod tlds;
mod tunnels;
mod vms;

pub use applications::{Applications, NewApplication};
pub use containers::{Containers, DiscoveredContainer, NewContainer};
pub use servers::{NewServer, Servers, UpdateServer};
pub use settings::Settings;
pub use tlds::Tlds;
pub use tunnels::{NewTunnel, Tunnels};
pub use vms::{DiscoveredVm, NewVm, Vms};

use std::collections::BTreeMap;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::cache::TtlCache;
use crate::entities::tunnel;

/// How long read-mostly lookups may be served from cache
const CACHE_TTL: Duration = Duration::from_secs(300);

pub struct Store {
    db: DatabaseConnection,
    cache: StoreCache,
}

pub(crate) struct StoreCache {
    pub(crate) settings: TtlCache<(), BTreeMap<String, String>>,
    pub(crate) tunnel_by_id: TtlCache<i32, tunnel::Model>,
    pub(crate) tunnel_list: TtlCache<(), Vec<tunnel::Model>>,
}

impl StoreCache {
    fn new(ttl: Duration) -> Self {
        Self {
            settings: TtlCache::new(ttl),
            tunnel_by_id: TtlCache::new(ttl),
            tunnel_list: TtlCache::new(ttl),
        }
    }

    /// Drop every cached tunnel read; called by all tunnel write paths.
    pub(crate) fn invalidate_tunnels(&self, id: i32) {
        self.tunnel_by_id.invalidate(&id);
        self.tunnel_list.clear();
    }
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            cache: StoreCache::new(CACHE_TTL),
        }
    }

    /// Store with a custom cache TTL (tests use a zero TTL)
    pub fn with_cache_ttl(db: DatabaseConnection, ttl: Duration) -> Self {
        Self {
            db,
            cache: StoreCache::new(ttl),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn servers(&self) -> Servers<'_> {
        Servers { store: self }
    }

    pub fn containers(&self) -> Containers<'_> {
        Containers { store: self }
    }

    pub fn vms(&self) -> Vms<'_> {
        Vms { store: self }
    }

    pub fn applications(&self) -> Applications<'_> {
        Applications { store: self }
    }

    pub fn tunnels(&self) -> Tunnels<'_> {
        Tunnels { store: self }
    }

    pub fn tlds(&self) -> Tlds<'_> {
        Tlds { store: self }
    }

    pub fn settings(&self) -> Settings<'_> {
        Settings { store: self }
    }
}
