use std::sync::Arc;

use autotss_core::types::{Device, UserId};
use autotss_devices::DeviceStore;
use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::error::{Result, SchedulerError};
use crate::reconcile::DeviceReconciler;
use crate::types::{BatchSummary, DeviceRun};

/// Held while a user's devices are being processed. Dropping it frees the
/// user for the next run.
struct RunToken {
    running: Arc<DashMap<UserId, ()>>,
    user: UserId,
}

impl Drop for RunToken {
    fn drop(&mut self) {
        self.running.remove(&self.user);
    }
}

/// Runs reconcile passes over users, at most one at a time per user.
pub struct BatchScheduler {
    store: Arc<dyn DeviceStore>,
    reconciler: DeviceReconciler,
    running: Arc<DashMap<UserId, ()>>,
}

impl BatchScheduler {
    pub fn new(store: Arc<dyn DeviceStore>, reconciler: DeviceReconciler) -> Self {
        Self {
            store,
            reconciler,
            running: Arc::new(DashMap::new()),
        }
    }

    pub fn is_running(&self, user: UserId) -> bool {
        self.running.contains_key(&user)
    }

    fn try_claim(&self, user: UserId) -> Option<RunToken> {
        match self.running.entry(user) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(RunToken {
                    running: Arc::clone(&self.running),
                    user,
                })
            }
        }
    }

    /// One pass over every enabled user. Users already being saved are
    /// skipped; their devices are picked up next pass.
    pub async fn run_batch(&self) -> Result<BatchSummary> {
        let users = self.store.get_enabled_users()?;
        let mut summary = BatchSummary::default();

        for record in users {
            let user = record.user;
            let Some(_token) = self.try_claim(user) else {
                info!(%user, "save already in progress, skipping user this pass");
                continue;
            };

            let devices = match self.store.get_devices(user) {
                Ok(devices) => devices,
                Err(e) => {
                    error!(%user, error = %e, "could not load devices");
                    continue;
                }
            };
            if devices.is_empty() {
                continue;
            }

            let (updated, runs) = self.process_user(user, devices).await;
            for run in &runs {
                summary.record(run);
            }
            // Devices added or removed during the pass stay as they are.
            if let Err(e) = self.store.merge_saved_blobs(user, &updated) {
                error!(%user, error = %e, "could not persist saved blobs");
            }
        }

        info!(
            blobs_saved = summary.blobs_saved,
            devices_saved_for = summary.devices_saved_for,
            blobs_failed = summary.blobs_failed,
            "{}",
            summary.message()
        );
        Ok(summary)
    }

    /// On-demand run for one user, regardless of the enabled flag.
    pub async fn save_user(&self, user: UserId) -> Result<Vec<DeviceRun>> {
        let _token = self
            .try_claim(user)
            .ok_or(SchedulerError::AlreadyRunning { user })?;

        let devices = self.store.get_devices(user)?;
        if devices.is_empty() {
            return Ok(Vec::new());
        }

        let (updated, runs) = self.process_user(user, devices).await;
        self.store.merge_saved_blobs(user, &updated)?;

        let mut summary = BatchSummary::default();
        for run in &runs {
            summary.record(run);
        }
        info!(%user, "{}", summary.message());
        Ok(runs)
    }

    /// Reconcile each device in order. A device that errors is returned
    /// unchanged.
    async fn process_user(&self, user: UserId, devices: Vec<Device>) -> (Vec<Device>, Vec<DeviceRun>) {
        let mut updated = Vec::with_capacity(devices.len());
        let mut runs = Vec::with_capacity(devices.len());

        for device in devices {
            match self.reconciler.reconcile(device.clone()).await {
                Ok(outcome) => {
                    updated.push(outcome.device.clone());
                    runs.push(DeviceRun::Reconciled(outcome));
                }
                Err(e) => {
                    if e.is_invariant() {
                        error!(%user, device = %device.name, error = %e, "device skipped");
                    } else {
                        warn!(%user, device = %device.name, error = %e, "device skipped");
                    }
                    runs.push(DeviceRun::Errored {
                        device: device.name.clone(),
                        error: e,
                    });
                    updated.push(device);
                }
            }
        }
        (updated, runs)
    }
}
