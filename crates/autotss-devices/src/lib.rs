//! `autotss-devices` — per-user device lists and the rules a device must
//! satisfy before it is stored.
//!
//! Persistence is a single flat table keyed by Discord user id; each row holds
//! the user's devices as one JSON array plus an `enabled` flag.

pub mod db;
pub mod error;
pub mod registry;
pub mod store;
pub mod types;
pub mod validate;

pub use error::{DeviceError, Result};
pub use registry::DeviceRegistry;
pub use store::{DeviceStore, SqliteStore};
pub use types::{NewDevice, UserRecord};
pub use validate::ValidationError;
