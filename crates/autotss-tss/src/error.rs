//! Error types for the autotss-tss crate.

use thiserror::Error;

/// Failures while fetching a manifest or running the signing tool.
///
/// None of these abort a batch: the reconciler records the firmware as
/// failed and the next pass retries it.
#[derive(Debug, Error)]
pub enum TssError {
    /// The signing tool could not be spawned (missing binary, permissions).
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Underlying filesystem or pipe failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The signing tool exceeded its configured time budget and was killed.
    #[error("Signing tool timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server does not honour `Range` requests for this archive.
    #[error("Range requests not supported by {url}")]
    RangeUnsupported { url: String },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Archive was readable but has no `BuildManifest` entry.
    #[error("No BuildManifest in {url}")]
    ManifestNotInArchive { url: String },

    #[error("Manifest in {url} exceeds {limit} bytes")]
    ManifestTooLarge { url: String, limit: u64 },

    /// Sibling request and archive fallback both failed.
    #[error("Manifest unavailable for {url}: {reason}")]
    ManifestUnavailable { url: String, reason: String },
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TssError>;
