use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use autotss_catalog::IpswClient;
use autotss_core::{AutotssConfig, BlobTree};
use autotss_devices::{DeviceRegistry, SqliteStore};
use autotss_scheduler::{BatchScheduler, DeviceReconciler};
use autotss_tss::{HttpManifestFetcher, TicketAcquirer, Tsschecker};
use tracing::info;

/// Everything a subcommand may need, built once from config.
pub struct AppState {
    pub config: AutotssConfig,
    pub blobs: BlobTree,
    pub store: Arc<SqliteStore>,
    pub registry: DeviceRegistry,
    pub batch: Arc<BatchScheduler>,
    pub tool: Arc<Tsschecker>,
}

impl AppState {
    pub fn build(config: AutotssConfig) -> anyhow::Result<Self> {
        let db_path = &config.database.path;
        ensure_parent_dir(db_path);
        info!(path = %db_path, "opening SQLite database");

        let db = rusqlite::Connection::open(db_path)
            .with_context(|| format!("opening database {db_path}"))?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        autotss_devices::db::init_db(&db)?;
        let store = Arc::new(SqliteStore::new(Arc::new(Mutex::new(db))));

        let blobs = BlobTree::new(&config.blobs.root);
        let catalog = Arc::new(IpswClient::new(&config.catalog)?);
        let fetcher = Arc::new(HttpManifestFetcher::new(
            config.catalog.timeout_secs,
            config.manifest.range_read_only,
        )?);
        let tool = Arc::new(Tsschecker::new(
            &config.tsschecker.binary,
            config.tsschecker.timeout_secs,
        ));
        let acquirer = Arc::new(TicketAcquirer::new(
            tool.clone(),
            blobs.clone(),
            config.tsschecker.generator_policy,
        ));

        let reconciler = DeviceReconciler::new(catalog.clone(), fetcher, acquirer);
        let batch = Arc::new(BatchScheduler::new(store.clone(), reconciler));
        let registry = DeviceRegistry::new(
            store.clone(),
            catalog,
            blobs.clone(),
            config.devices.max_devices,
        );

        Ok(Self {
            config,
            blobs,
            store,
            registry,
            batch,
            tool,
        })
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
