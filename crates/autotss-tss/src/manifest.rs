//! Obtain `BuildManifest.plist` for a firmware archive.
//!
//! Apple publishes the manifest next to most archives, so the cheap path is a
//! plain GET of the sibling URL. When that fails the archive itself is opened
//! with range requests and the manifest entry is pulled out of it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::error::{Result, TssError};
use crate::remote_zip;

/// File name the manifest is written under inside the work directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.plist";

#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Write the manifest for `firmware_url` into `dest_dir` and return its path.
    async fn fetch_manifest(&self, firmware_url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

pub struct HttpManifestFetcher {
    client: reqwest::Client,
    timeout: Duration,
    range_read_only: bool,
}

impl HttpManifestFetcher {
    pub fn new(timeout_secs: u64, range_read_only: bool) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("autotss/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            timeout,
            range_read_only,
        })
    }

    /// GET the sibling manifest. `Ok(None)` on any non-success status.
    async fn sibling(&self, firmware_url: &str) -> Result<Option<Vec<u8>>> {
        let Some(url) = sibling_manifest_url(firmware_url) else {
            return Ok(None);
        };
        debug!(%url, "requesting sibling manifest");
        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            debug!(%url, status = %resp.status(), "no sibling manifest");
            return Ok(None);
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }

    async fn from_archive(&self, firmware_url: &str) -> Result<Vec<u8>> {
        let url = firmware_url.to_string();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || remote_zip::extract_manifest(&url, timeout))
            .await
            .map_err(|e| TssError::ManifestUnavailable {
                url: firmware_url.to_string(),
                reason: format!("extract task failed: {e}"),
            })?
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch_manifest(&self, firmware_url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let sibling = if self.range_read_only {
            None
        } else {
            match self.sibling(firmware_url).await {
                Ok(found) => found,
                Err(e) => {
                    debug!(firmware_url, error = %e, "sibling manifest request failed");
                    None
                }
            }
        };

        let bytes = match sibling {
            Some(bytes) => bytes,
            None => self.from_archive(firmware_url).await.map_err(|e| {
                warn!(firmware_url, error = %e, "could not extract manifest from archive");
                TssError::ManifestUnavailable {
                    url: firmware_url.to_string(),
                    reason: e.to_string(),
                }
            })?,
        };

        let path = dest_dir.join(MANIFEST_FILE_NAME);
        tokio::fs::write(&path, &bytes).await?;
        info!(firmware_url, path = %path.display(), size = bytes.len(), "manifest ready");
        Ok(path)
    }
}

/// `https://host/a/b/Firmware.ipsw` -> `https://host/a/b/BuildManifest.plist`.
pub fn sibling_manifest_url(firmware_url: &str) -> Option<Url> {
    Url::parse(firmware_url)
        .ok()?
        .join("BuildManifest.plist")
        .ok()
}
