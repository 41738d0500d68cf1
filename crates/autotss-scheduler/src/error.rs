use autotss_core::types::UserId;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
///
/// Per-firmware acquisition failures are not errors; they are reported in
/// [`crate::ReconcileOutcome::failed`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Signed-build lookup failed; the device is skipped for this pass.
    #[error("Catalog error: {0}")]
    Catalog(#[from] autotss_catalog::CatalogError),

    #[error("Store error: {0}")]
    Store(#[from] autotss_devices::DeviceError),

    /// The catalog contradicted itself (a signed build it cannot resolve).
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Another run already holds this user's run token.
    #[error("A save is already running for user {user}")]
    AlreadyRunning { user: UserId },
}

impl SchedulerError {
    pub fn is_invariant(&self) -> bool {
        matches!(self, SchedulerError::Invariant(_))
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
