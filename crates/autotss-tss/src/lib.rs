//! `autotss-tss` — everything between "this firmware is signed" and "its
//! tickets are on disk".
//!
//! - [`manifest`]: fetch `BuildManifest.plist` for a firmware URL, either as
//!   a sibling object or by range-reading the remote archive.
//! - [`tool`]: narrow adapter around the `tsschecker` subprocess.
//! - [`acquirer`]: generator fan-out, idempotent destination handling and the
//!   all-or-nothing move of result files.

pub mod acquirer;
pub mod error;
pub mod manifest;
pub mod remote_zip;
pub mod tool;
pub mod types;

pub use acquirer::{TicketAcquirer, DEFAULT_GENERATORS};
pub use error::{Result, TssError};
pub use manifest::{HttpManifestFetcher, ManifestFetcher, MANIFEST_FILE_NAME};
pub use tool::{SigningTool, Tsschecker, SUCCESS_MARKER};
pub use types::ExecResult;
