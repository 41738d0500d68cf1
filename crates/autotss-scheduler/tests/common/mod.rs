// Shared fakes for the scheduler integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use autotss_catalog::types::DeviceInfo;
use autotss_catalog::{CatalogError, FirmwareCatalog};
use autotss_core::config::GeneratorPolicy;
use autotss_core::types::{Device, Firmware, FirmwareType};
use autotss_core::BlobTree;
use autotss_devices::db::init_db;
use autotss_devices::SqliteStore;
use autotss_scheduler::{BatchScheduler, DeviceReconciler};
use autotss_tss::{ExecResult, ManifestFetcher, SigningTool, TicketAcquirer, TssError};
use rusqlite::Connection;
use tokio::sync::Semaphore;

pub fn release(version: &str, buildid: &str) -> Firmware {
    Firmware {
        version: version.to_string(),
        buildid: buildid.to_string(),
        url: format!("https://cdn.example/{buildid}/Restore.ipsw"),
        signed: true,
        kind: FirmwareType::Release,
    }
}

pub fn beta(version: &str, buildid: &str) -> Firmware {
    Firmware {
        kind: FirmwareType::Beta,
        ..release(version, buildid)
    }
}

pub fn iphone8() -> Device {
    Device {
        name: "My iPhone".to_string(),
        identifier: "iPhone10,1".to_string(),
        board_config: "d201ap".to_string(),
        ecid: "1a2b3c4d5e".to_string(),
        generator: None,
        apnonce: None,
        saved_blobs: vec![],
    }
}

/// Signed builds per identifier; release versions resolved from the same
/// list unless overridden in `versions`.
#[derive(Default)]
pub struct FakeCatalog {
    pub signed: Mutex<HashMap<String, Vec<Firmware>>>,
    pub versions: Mutex<HashMap<String, String>>,
    /// Buildids whose version lookup fails with a server error.
    pub unavailable: Mutex<HashSet<String>>,
    pub list_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn with(identifier: &str, firmwares: Vec<Firmware>) -> Self {
        let catalog = Self::default();
        catalog.set(identifier, firmwares);
        catalog
    }

    pub fn set(&self, identifier: &str, firmwares: Vec<Firmware>) {
        let mut versions = self.versions.lock().unwrap();
        for f in firmwares.iter().filter(|f| f.kind == FirmwareType::Release) {
            versions.insert(f.buildid.clone(), f.version.clone());
        }
        self.signed
            .lock()
            .unwrap()
            .insert(identifier.to_string(), firmwares);
    }
}

#[async_trait]
impl FirmwareCatalog for FakeCatalog {
    async fn list_signed_builds(&self, identifier: &str) -> Result<Vec<Firmware>, CatalogError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.signed
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownDevice(identifier.to_string()))
    }

    async fn resolve_version(&self, identifier: &str, buildid: &str) -> Result<String, CatalogError> {
        if self.unavailable.lock().unwrap().contains(buildid) {
            return Err(CatalogError::Api {
                status: 503,
                url: format!("https://api.example/device/{identifier}"),
            });
        }
        self.versions
            .lock()
            .unwrap()
            .get(buildid)
            .cloned()
            .ok_or_else(|| CatalogError::BuildNotFound {
                identifier: identifier.to_string(),
                buildid: buildid.to_string(),
            })
    }

    async fn known_identifiers(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.signed.lock().unwrap().keys().cloned().collect())
    }

    async fn device_info(&self, identifier: &str) -> Result<DeviceInfo, CatalogError> {
        Err(CatalogError::UnknownDevice(identifier.to_string()))
    }
}

/// Writes the firmware URL into `manifest.plist`; fails for URLs containing
/// `no-manifest`.
#[derive(Default)]
pub struct FakeFetcher {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ManifestFetcher for FakeFetcher {
    async fn fetch_manifest(&self, firmware_url: &str, dest_dir: &Path) -> Result<PathBuf, TssError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if firmware_url.contains("no-manifest") {
            return Err(TssError::ManifestUnavailable {
                url: firmware_url.to_string(),
                reason: "404".to_string(),
            });
        }
        let path = dest_dir.join("manifest.plist");
        std::fs::write(&path, firmware_url)?;
        Ok(path)
    }
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Signing tool fake. Fails when the manifest names a URL containing
/// `tool-fails`, or for the generator in `fail_generator`. Optionally takes a
/// permit from `gate` before answering.
#[derive(Default)]
pub struct ScriptedTool {
    pub calls: AtomicUsize,
    pub fail_generator: Option<String>,
    pub gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl SigningTool for ScriptedTool {
    async fn invoke(&self, args: &[String]) -> Result<ExecResult, TssError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let manifest = std::fs::read_to_string(flag(args, "-m").unwrap())?;
        let generator = flag(args, "-g").unwrap_or("none");
        let fails = manifest.contains("tool-fails")
            || self.fail_generator.as_deref() == Some(generator);
        if fails {
            return Ok(ExecResult {
                exit_code: 1,
                stdout: "[Error] failed to get ticket\n".to_string(),
                stderr: String::new(),
            });
        }

        let save_path = Path::new(flag(args, "--save-path").unwrap());
        let ecid = flag(args, "-e").unwrap();
        std::fs::write(save_path.join(format!("{ecid}_{generator}.shsh2")), b"blob")?;
        Ok(ExecResult {
            exit_code: 0,
            stdout: "Saved shsh blobs!\n".to_string(),
            stderr: String::new(),
        })
    }
}

pub struct Harness {
    pub _root: tempfile::TempDir,
    pub blobs: BlobTree,
    pub catalog: Arc<FakeCatalog>,
    pub fetcher: Arc<FakeFetcher>,
    pub tool: Arc<ScriptedTool>,
    pub store: Arc<SqliteStore>,
}

impl Harness {
    pub fn new(catalog: FakeCatalog, tool: ScriptedTool) -> Self {
        let root = tempfile::tempdir().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        Self {
            blobs: BlobTree::new(root.path().join("Blobs")),
            _root: root,
            catalog: Arc::new(catalog),
            fetcher: Arc::new(FakeFetcher::default()),
            tool: Arc::new(tool),
            store: Arc::new(SqliteStore::new(Arc::new(Mutex::new(conn)))),
        }
    }

    pub fn reconciler(&self) -> DeviceReconciler {
        let acquirer = TicketAcquirer::new(
            self.tool.clone(),
            self.blobs.clone(),
            GeneratorPolicy::Append,
        );
        DeviceReconciler::new(self.catalog.clone(), self.fetcher.clone(), Arc::new(acquirer))
    }

    pub fn batch(&self) -> BatchScheduler {
        BatchScheduler::new(self.store.clone(), self.reconciler())
    }

    pub fn tool_calls(&self) -> usize {
        self.tool.calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetcher.calls.load(Ordering::SeqCst)
    }
}
