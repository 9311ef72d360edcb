//! Reconciliation engine for burrow
//!
//! Ties the entity store, backend adapter and daemon runner together: a
//! model mutation is validated, applied to the store, pushed to the daemon
//! and compiled into the persisted ingress configuration, with
//! compensating actions when a step fails partway. All retry and
//! compensation policy lives here; the lower layers never retry on their
//! own.

pub mod discovery;
pub mod error;
pub mod locks;
pub mod reconciler;
pub mod snapshot;

pub use discovery::{run_sweep, spawn_sweep, SweepReport};
pub use error::EngineError;
pub use reconciler::{CreateTunnel, Reconciler};
