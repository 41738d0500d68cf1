//! On-disk layout of saved tickets.
//!
//! ```text
//! {root}/{ecid}/{version}/{buildid}/{apnonce | "no-apnonce"}/*.shsh2
//! ```
//!
//! Distinct ECIDs never share a directory, so devices can be processed
//! independently; within one device the layout is single-writer.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::types::Device;

/// Directory segment used when the device has no custom ApNonce.
pub const NO_APNONCE: &str = "no-apnonce";

/// Returns true for ticket files (`.shsh`, `.shsh2`).
pub fn is_blob_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.contains(".shsh"))
}

#[derive(Debug, Clone)]
pub struct BlobTree {
    root: PathBuf,
}

impl BlobTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ecid_dir(&self, ecid: &str) -> PathBuf {
        self.root.join(ecid)
    }

    /// Destination directory for one device/firmware pair.
    pub fn dest_dir(&self, device: &Device, version: &str, buildid: &str) -> PathBuf {
        let nonce = device.apnonce.as_deref().unwrap_or(NO_APNONCE);
        self.ecid_dir(&device.ecid)
            .join(version)
            .join(buildid)
            .join(nonce)
    }

    /// Count ticket files below one ECID, or below the whole tree when `ecid`
    /// is `None`. A missing directory counts as zero.
    pub fn count_blobs(&self, ecid: Option<&str>) -> Result<usize> {
        let start = match ecid {
            Some(ecid) => self.ecid_dir(ecid),
            None => self.root.clone(),
        };
        if !start.exists() {
            return Ok(0);
        }
        count_recursive(&start)
    }

    /// Delete everything saved for `ecid`. Used on device removal.
    pub fn remove_ecid(&self, ecid: &str) -> Result<bool> {
        let dir = self.ecid_dir(ecid);
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        info!(path = %dir.display(), "removed saved blobs");
        Ok(true)
    }
}

fn count_recursive(dir: &Path) -> Result<usize> {
    let mut total = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            total += count_recursive(&path)?;
        } else if is_blob_file(&path) {
            total += 1;
        }
    }
    Ok(total)
}
