//! Backend adapter for burrow
//!
//! A uniform capability-query interface over heterogeneous compute
//! backends. Concrete drivers implement [`Backend`] (list and describe)
//! against their native protocol; the [`BackendRegistry`] resolves a
//! server's declared manager kind to a driver, bounds every call with a
//! timeout, and normalizes failures into [`BackendError`]. This crate
//! never writes to the entity store.

pub mod drivers;
pub mod error;
pub mod exec;
pub mod http;
pub mod registry;
pub mod types;

pub use error::BackendError;
pub use registry::{Backend, BackendRegistry};
pub use types::{EntityDescriptor, ServerConn};
