use std::collections::HashSet;
use std::sync::Arc;

use autotss_catalog::{CatalogError, FirmwareCatalog};
use autotss_core::types::{Device, Firmware, FirmwareType};
use autotss_tss::{ManifestFetcher, TicketAcquirer};
use tracing::{debug, info, warn};

use crate::error::{Result, SchedulerError};
use crate::types::ReconcileOutcome;

/// Brings one device up to date with what is currently signed.
pub struct DeviceReconciler {
    catalog: Arc<dyn FirmwareCatalog>,
    fetcher: Arc<dyn ManifestFetcher>,
    acquirer: Arc<TicketAcquirer>,
}

impl DeviceReconciler {
    pub fn new(
        catalog: Arc<dyn FirmwareCatalog>,
        fetcher: Arc<dyn ManifestFetcher>,
        acquirer: Arc<TicketAcquirer>,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            acquirer,
        }
    }

    /// Save tickets for every signed build not yet in `device.saved_blobs`.
    ///
    /// Per-build failures end up in `failed` and never stop the pass. An
    /// error means the device could not be reconciled at all and should be
    /// kept as it was.
    pub async fn reconcile(&self, mut device: Device) -> Result<ReconcileOutcome> {
        let signed = self.catalog.list_signed_builds(&device.identifier).await?;

        let mut seen = HashSet::new();
        let mut saved = Vec::new();
        let mut failed = Vec::new();

        for firmware in signed {
            if device.has_saved(&firmware.buildid) || !seen.insert(firmware.buildid.clone()) {
                continue;
            }

            let version = match self.resolve_version(&device, &firmware).await {
                Ok(version) => version,
                Err(e) if e.is_invariant() => return Err(e),
                Err(e) => {
                    warn!(
                        device = %device.name,
                        buildid = %firmware.buildid,
                        error = %e,
                        "version lookup failed"
                    );
                    failed.push(firmware);
                    continue;
                }
            };
            let firmware = Firmware { version, ..firmware };

            if self.attempt(&device, &firmware).await {
                device.record_saved(firmware.to_saved());
                saved.push(firmware);
            } else {
                failed.push(firmware);
            }
        }

        if saved.is_empty() && failed.is_empty() {
            debug!(device = %device.name, "nothing outstanding");
        } else {
            info!(
                device = %device.name,
                saved = saved.len(),
                failed = failed.len(),
                "device reconciled"
            );
        }
        Ok(ReconcileOutcome {
            device,
            saved,
            failed,
        })
    }

    /// Release builds are named by the release catalog; beta builds carry
    /// their own version.
    async fn resolve_version(&self, device: &Device, firmware: &Firmware) -> Result<String> {
        if firmware.kind == FirmwareType::Beta {
            return Ok(firmware.version.clone());
        }
        match self
            .catalog
            .resolve_version(&device.identifier, &firmware.buildid)
            .await
        {
            Ok(version) => Ok(version),
            Err(CatalogError::BuildNotFound { identifier, buildid }) => {
                Err(SchedulerError::Invariant(format!(
                    "{identifier} lists {buildid} as signed but cannot resolve its version"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Manifest + acquisition for one build. The temp dir is removed when it
    /// goes out of scope, whichever way this returns.
    async fn attempt(&self, device: &Device, firmware: &Firmware) -> bool {
        let work = match tempfile::Builder::new().prefix("autotss-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "could not create work directory");
                return false;
            }
        };

        let manifest = match self.fetcher.fetch_manifest(&firmware.url, work.path()).await {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    device = %device.name,
                    version = %firmware.version,
                    buildid = %firmware.buildid,
                    error = %e,
                    "manifest unavailable"
                );
                return false;
            }
        };

        let blob = firmware.to_saved();
        match self
            .acquirer
            .acquire(device, &blob, &manifest, work.path())
            .await
        {
            Ok(saved) => saved,
            Err(e) => {
                warn!(
                    device = %device.name,
                    version = %firmware.version,
                    buildid = %firmware.buildid,
                    error = %e,
                    "ticket acquisition failed"
                );
                false
            }
        }
    }
}
