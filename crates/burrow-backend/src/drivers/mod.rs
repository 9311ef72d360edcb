//! Concrete backend drivers
//!
//! Each driver is a thin shim from one native protocol onto the
//! [`Backend`](crate::registry::Backend) contract; everything above the
//! contract is backend-agnostic.

pub mod docker;
pub mod kubernetes;
pub mod proxmox;
