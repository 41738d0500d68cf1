//! `autotss-core` — shared configuration, error type, device data model and
//! on-disk blob layout used by every other AutoTSS crate.

pub mod blobs;
pub mod config;
pub mod error;
pub mod types;

pub use blobs::BlobTree;
pub use config::AutotssConfig;
pub use error::{AutotssError, Result};
pub use types::{Device, Firmware, FirmwareType, SavedBlob, UserId};
