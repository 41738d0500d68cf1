use autotss_core::types::{Device, Firmware};
use serde::Serialize;

use crate::error::SchedulerError;

/// Result of one reconcile pass over a single device.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// The device with any newly saved builds appended.
    pub device: Device,
    /// Builds saved in this pass, with resolved versions.
    pub saved: Vec<Firmware>,
    /// Builds attempted and not saved; retried next pass.
    pub failed: Vec<Firmware>,
}

/// Per-device entry of a user run.
#[derive(Debug)]
pub enum DeviceRun {
    Reconciled(ReconcileOutcome),
    /// The device was left unchanged.
    Errored { device: String, error: SchedulerError },
}

impl DeviceRun {
    pub fn device_name(&self) -> &str {
        match self {
            DeviceRun::Reconciled(o) => &o.device.name,
            DeviceRun::Errored { device, .. } => device,
        }
    }
}

/// Totals for one batch (or one on-demand user run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub devices_checked: usize,
    pub blobs_saved: usize,
    pub devices_saved_for: usize,
    pub blobs_failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, run: &DeviceRun) {
        self.devices_checked += 1;
        if let DeviceRun::Reconciled(outcome) = run {
            self.blobs_saved += outcome.saved.len();
            self.blobs_failed += outcome.failed.len();
            if !outcome.saved.is_empty() {
                self.devices_saved_for += 1;
            }
        }
    }

    pub fn merge(&mut self, other: BatchSummary) {
        self.devices_checked += other.devices_checked;
        self.blobs_saved += other.blobs_saved;
        self.devices_saved_for += other.devices_saved_for;
        self.blobs_failed += other.blobs_failed;
    }

    /// One-line human summary.
    pub fn message(&self) -> String {
        if self.devices_checked == 0 {
            return "No blobs need to be saved.".to_string();
        }
        if self.blobs_saved == 0 {
            return "No new blobs were saved.".to_string();
        }
        format!(
            "Saved {} blob{} for {} device{}.",
            self.blobs_saved,
            plural(self.blobs_saved),
            self.devices_saved_for,
            plural(self.devices_saved_for),
        )
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
