//! Ticket acquisition for one device and one firmware build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use autotss_core::blobs::is_blob_file;
use autotss_core::config::GeneratorPolicy;
use autotss_core::types::{Device, SavedBlob};
use autotss_core::BlobTree;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::tool::SigningTool;

/// Generators tried for every device without an ApNonce.
pub const DEFAULT_GENERATORS: [&str; 2] = ["0x1111111111111111", "0xbd34a880be0b53f3"];

/// Generator values to request tickets for. Empty means a single run
/// without `-g`.
pub fn generators_for(device: &Device, policy: GeneratorPolicy) -> Vec<String> {
    let mut generators: Vec<String> = if device.apnonce.is_some() {
        Vec::new()
    } else {
        DEFAULT_GENERATORS.iter().map(|g| g.to_string()).collect()
    };

    if let Some(custom) = &device.generator {
        match policy {
            GeneratorPolicy::Replace => generators = vec![custom.clone()],
            GeneratorPolicy::Append => {
                if !generators.iter().any(|g| g.eq_ignore_ascii_case(custom)) {
                    generators.push(custom.clone());
                }
            }
        }
    }
    generators
}

/// Argument vector for one tool run, excluding `-g`.
pub fn base_args(device: &Device, manifest: &Path, work_dir: &Path) -> Vec<String> {
    let mut args = vec![
        "-d".to_string(),
        device.identifier.clone(),
        "-B".to_string(),
        device.board_config.clone(),
        "-e".to_string(),
        device.ecid_arg(),
        "-m".to_string(),
        manifest.display().to_string(),
        "--save-path".to_string(),
        work_dir.display().to_string(),
        "-s".to_string(),
    ];
    if let Some(nonce) = &device.apnonce {
        args.push("--apnonce".to_string());
        args.push(nonce.clone());
    }
    args
}

pub struct TicketAcquirer {
    tool: Arc<dyn SigningTool>,
    blobs: BlobTree,
    policy: GeneratorPolicy,
}

impl TicketAcquirer {
    pub fn new(tool: Arc<dyn SigningTool>, blobs: BlobTree, policy: GeneratorPolicy) -> Self {
        Self {
            tool,
            blobs,
            policy,
        }
    }

    pub fn blobs(&self) -> &BlobTree {
        &self.blobs
    }

    /// Acquire every ticket for `firmware` and move them into the blob tree.
    ///
    /// `Ok(false)` means the tool did not confirm a save for at least one
    /// generator; nothing is moved in that case. `Err` is reserved for
    /// filesystem faults and tool spawn failures.
    pub async fn acquire(
        &self,
        device: &Device,
        firmware: &SavedBlob,
        manifest: &Path,
        work_dir: &Path,
    ) -> Result<bool> {
        let generators = generators_for(device, self.policy);
        let expected = generators.len().max(1);
        let dest = self
            .blobs
            .dest_dir(device, &firmware.version, &firmware.buildid);

        let existing = list_blob_files(&dest).await?;
        if existing.len() == expected {
            debug!(
                device = %device.name,
                buildid = %firmware.buildid,
                "tickets already on disk"
            );
            return Ok(true);
        }
        if !existing.is_empty() {
            warn!(
                dest = %dest.display(),
                found = existing.len(),
                expected,
                "unexpected ticket count, clearing destination"
            );
            for path in &existing {
                tokio::fs::remove_file(path).await?;
            }
        }

        let args = base_args(device, manifest, work_dir);
        let runs: Vec<Option<&str>> = if generators.is_empty() {
            vec![None]
        } else {
            generators.iter().map(|g| Some(g.as_str())).collect()
        };

        for generator in runs {
            let mut run_args = args.clone();
            if let Some(g) = generator {
                run_args.push("-g".to_string());
                run_args.push(g.to_string());
            }
            let out = self.tool.invoke(&run_args).await?;
            if !out.saved() {
                warn!(
                    device = %device.name,
                    version = %firmware.version,
                    buildid = %firmware.buildid,
                    generator = generator.unwrap_or("none"),
                    exit_code = out.exit_code,
                    last_line = out.last_line(),
                    "signing tool did not save a ticket"
                );
                return Ok(false);
            }
        }

        let produced = list_blob_files(work_dir).await?;
        if produced.len() != expected {
            warn!(
                device = %device.name,
                buildid = %firmware.buildid,
                produced = produced.len(),
                expected,
                "signing tool reported success but ticket count is wrong"
            );
            return Ok(false);
        }

        tokio::fs::create_dir_all(&dest).await?;
        for src in &produced {
            if let Some(name) = src.file_name() {
                move_file(src, &dest.join(name)).await?;
            }
        }

        info!(
            device = %device.name,
            version = %firmware.version,
            buildid = %firmware.buildid,
            tickets = produced.len(),
            "saved tickets"
        );
        Ok(true)
    }
}

/// Ticket files directly inside `dir`. A missing directory is empty.
async fn list_blob_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_blob_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Rename, or copy then remove when source and destination are on
/// different filesystems.
async fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if tokio::fs::rename(src, dest).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(src, dest).await?;
    tokio::fs::remove_file(src).await?;
    Ok(())
}
