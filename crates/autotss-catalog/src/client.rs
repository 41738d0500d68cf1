use std::time::Duration;

use async_trait::async_trait;
use autotss_core::config::CatalogConfig;
use autotss_core::types::{Firmware, FirmwareType};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{CatalogError, Result};
use crate::types::{ApiFirmware, DeviceInfo, DeviceListEntry};

/// Read-only view of the firmware metadata service.
///
/// The reconciler only needs `list_signed_builds` and `resolve_version`;
/// the remaining methods back device validation.
#[async_trait]
pub trait FirmwareCatalog: Send + Sync {
    /// Signed release builds followed by signed beta builds.
    ///
    /// An unreachable or failing beta endpoint contributes nothing; a failing
    /// release endpoint is an error.
    async fn list_signed_builds(&self, identifier: &str) -> Result<Vec<Firmware>>;

    /// Version string of `buildid` in the release catalog.
    async fn resolve_version(&self, identifier: &str, buildid: &str) -> Result<String>;

    /// Every device identifier the service knows about.
    async fn known_identifiers(&self) -> Result<Vec<String>>;

    /// Full release-catalog entry for one identifier.
    async fn device_info(&self, identifier: &str) -> Result<DeviceInfo>;

    /// Lowercased board configs for `identifier`.
    async fn boards(&self, identifier: &str) -> Result<Vec<String>> {
        let info = self.device_info(identifier).await?;
        Ok(info
            .boards
            .iter()
            .map(|b| b.boardconfig.to_lowercase())
            .collect())
    }

    /// Chip id for a specific board, falling back to the device-level value.
    async fn cpid(&self, identifier: &str, board_config: &str) -> Result<Option<u32>> {
        let info = self.device_info(identifier).await?;
        let board_cpid = info
            .boards
            .iter()
            .find(|b| b.boardconfig.eq_ignore_ascii_case(board_config))
            .and_then(|b| b.cpid);
        Ok(board_cpid.or(info.cpid))
    }
}

/// HTTP client for ipsw.me-compatible release catalogs plus a beta catalog.
pub struct IpswClient {
    client: reqwest::Client,
    api_url: String,
    beta_api_url: String,
}

impl IpswClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("autotss/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(
            client,
            &config.api_url,
            &config.beta_api_url,
        ))
    }

    pub fn with_client(client: reqwest::Client, api_url: &str, beta_api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            beta_api_url: beta_api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(%url, "catalog request");
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| CatalogError::Parse(format!("{url}: {e}")))
    }

    /// Signed betas, or nothing when the beta service can't answer.
    async fn signed_betas(&self, identifier: &str) -> Vec<Firmware> {
        let url = format!("{}/{}", self.beta_api_url, identifier);
        match self.get_json::<Vec<ApiFirmware>>(&url).await {
            Ok(firms) => signed(firms, FirmwareType::Beta),
            Err(e) => {
                debug!(identifier, error = %e, "beta catalog unavailable, skipping betas");
                Vec::new()
            }
        }
    }
}

fn signed(firms: Vec<ApiFirmware>, kind: FirmwareType) -> Vec<Firmware> {
    firms
        .into_iter()
        .filter(|f| f.signed)
        .map(|f| Firmware {
            version: f.version,
            buildid: f.buildid,
            url: f.url,
            signed: true,
            kind,
        })
        .collect()
}

#[async_trait]
impl FirmwareCatalog for IpswClient {
    async fn list_signed_builds(&self, identifier: &str) -> Result<Vec<Firmware>> {
        let info = self.device_info(identifier).await?;
        let mut firms = signed(info.firmwares, FirmwareType::Release);
        firms.extend(self.signed_betas(identifier).await);
        debug!(identifier, count = firms.len(), "signed builds");
        Ok(firms)
    }

    async fn resolve_version(&self, identifier: &str, buildid: &str) -> Result<String> {
        let info = self.device_info(identifier).await?;
        info.firmwares
            .into_iter()
            .find(|f| f.buildid == buildid)
            .map(|f| f.version)
            .ok_or_else(|| {
                warn!(identifier, buildid, "buildid missing from release catalog");
                CatalogError::BuildNotFound {
                    identifier: identifier.to_string(),
                    buildid: buildid.to_string(),
                }
            })
    }

    async fn known_identifiers(&self) -> Result<Vec<String>> {
        let url = format!("{}/devices", self.api_url);
        let devices: Vec<DeviceListEntry> = self.get_json(&url).await?;
        Ok(devices.into_iter().map(|d| d.identifier).collect())
    }

    async fn device_info(&self, identifier: &str) -> Result<DeviceInfo> {
        let url = format!("{}/device/{}?type=ipsw", self.api_url, identifier);
        match self.get_json(&url).await {
            Err(CatalogError::Api { status: 404, .. }) => {
                Err(CatalogError::UnknownDevice(identifier.to_string()))
            }
            other => other,
        }
    }
}
