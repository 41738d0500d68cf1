//! `autotss-catalog` — client for the firmware metadata service.
//!
//! Answers two kinds of question:
//! - what is currently signed for a device identifier (release + beta), used
//!   by the reconciler every pass;
//! - what devices, boards and chip ids exist, used when validating a new
//!   device record.

pub mod client;
pub mod error;
pub mod types;

pub use client::{FirmwareCatalog, IpswClient};
pub use error::{CatalogError, Result};
pub use types::{Board, DeviceInfo};
