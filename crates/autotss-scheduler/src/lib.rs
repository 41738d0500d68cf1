//! `autotss-scheduler` — periodic blob-saving passes.
//!
//! # Overview
//!
//! [`engine::SchedulerEngine`] ticks on a fixed interval and asks the
//! [`batch::BatchScheduler`] for one pass over every enabled user. Each device
//! goes through the [`reconcile::DeviceReconciler`], which diffs the signed
//! builds against what is already saved and drives the manifest fetcher and
//! ticket acquirer for the rest.
//!
//! | Failure                        | Effect                               |
//! |--------------------------------|--------------------------------------|
//! | manifest or signing tool       | firmware lands in `failed`, retried next pass |
//! | version lookup unreachable     | firmware lands in `failed`           |
//! | signed-build list unreachable  | device skipped for this pass         |
//! | build missing from catalog     | device skipped, logged at `error`    |
//! | store write                    | logged, other users still processed |
//!
//! Results are written back with [`autotss_devices::DeviceStore::merge_saved_blobs`],
//! so devices added or removed while a pass runs are not overwritten.

pub mod batch;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod types;

pub use batch::BatchScheduler;
pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use reconcile::DeviceReconciler;
pub use types::{BatchSummary, DeviceRun, ReconcileOutcome};
