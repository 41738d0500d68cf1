use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.ipsw.me/v4";
pub const DEFAULT_BETA_API_URL: &str = "https://api.m1sta.xyz/betas";
pub const DEFAULT_BLOBS_ROOT: &str = "Data/Blobs";
pub const DEFAULT_TSSCHECKER: &str = "tsschecker";
pub const DEFAULT_INTERVAL_SECS: u64 = 1800; // one full pass every 30 minutes
pub const DEFAULT_MAX_DEVICES: usize = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Top-level config (autotss.toml + AUTOTSS_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AutotssConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub blobs: BlobsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub tsschecker: TsscheckerConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub devices: DevicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where saved tickets live: `{root}/{ecid}/{version}/{buildid}/{apnonce|no-apnonce}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobsConfig {
    #[serde(default = "default_blobs_root")]
    pub root: String,
}

impl Default for BlobsConfig {
    fn default() -> Self {
        Self {
            root: default_blobs_root(),
        }
    }
}

/// Firmware metadata service endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Release catalog (ipsw.me v4 compatible), without trailing slash.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Beta catalog; returns a bare JSON array per identifier.
    #[serde(default = "default_beta_api_url")]
    pub beta_api_url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            beta_api_url: default_beta_api_url(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// How a custom generator combines with the two default generators when the
/// device has no ApNonce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorPolicy {
    /// Defaults are always attempted; a custom generator is added alongside.
    #[default]
    Append,
    /// A custom generator is the only one attempted.
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsscheckerConfig {
    /// Binary name (resolved via PATH) or absolute path.
    #[serde(default = "default_tsschecker")]
    pub binary: String,
    /// Kill the tool after this many seconds. `None` waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub generator_policy: GeneratorPolicy,
}

impl Default for TsscheckerConfig {
    fn default() -> Self {
        Self {
            binary: default_tsschecker(),
            timeout_secs: None,
            generator_policy: GeneratorPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ManifestConfig {
    /// Skip the sibling `BuildManifest.plist` request and always range-read
    /// the firmware archive.
    #[serde(default)]
    pub range_read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Per-user device cap; the bot owner is exempt.
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            max_devices: default_max_devices(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.autotss/autotss.db", home)
}
fn default_blobs_root() -> String {
    DEFAULT_BLOBS_ROOT.to_string()
}
fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_beta_api_url() -> String {
    DEFAULT_BETA_API_URL.to_string()
}
fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn default_tsschecker() -> String {
    DEFAULT_TSSCHECKER.to_string()
}
fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_max_devices() -> usize {
    DEFAULT_MAX_DEVICES
}

impl AutotssConfig {
    /// Load config from a TOML file with AUTOTSS_* env var overrides
    /// (nested keys use a double underscore: `AUTOTSS_SCHEDULER__INTERVAL_SECS`).
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.autotss/autotss.toml
    ///
    /// A missing file is not an error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: AutotssConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("AUTOTSS_").split("__"))
            .extract()
            .map_err(|e| crate::error::AutotssError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::error::Result<()> {
        if self.scheduler.interval_secs == 0 {
            return Err(crate::error::AutotssError::Config(
                "scheduler.interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.autotss/autotss.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = AutotssConfig::load(path.to_str()).unwrap();
        assert_eq!(config.scheduler.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(config.blobs.root, DEFAULT_BLOBS_ROOT);
        assert_eq!(config.tsschecker.generator_policy, GeneratorPolicy::Append);
        assert!(config.tsschecker.timeout_secs.is_none());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autotss.toml");
        std::fs::write(&path, "[scheduler]\ninterval_secs = 0\n").unwrap();

        let err = AutotssConfig::load(path.to_str()).unwrap_err();
        assert!(matches!(err, crate::error::AutotssError::Config(msg) if msg.contains("interval_secs")));
    }

    #[test]
    fn toml_sections_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autotss.toml");
        std::fs::write(
            &path,
            r#"
            [scheduler]
            interval_secs = 600

            [tsschecker]
            binary = "/opt/tsschecker"
            timeout_secs = 120
            generator_policy = "replace"

            [manifest]
            range_read_only = true
            "#,
        )
        .unwrap();

        let config = AutotssConfig::load(path.to_str()).unwrap();
        assert_eq!(config.scheduler.interval_secs, 600);
        assert_eq!(config.tsschecker.binary, "/opt/tsschecker");
        assert_eq!(config.tsschecker.timeout_secs, Some(120));
        assert_eq!(config.tsschecker.generator_policy, GeneratorPolicy::Replace);
        assert!(config.manifest.range_read_only);
        // untouched sections keep their defaults
        assert_eq!(config.catalog.api_url, DEFAULT_API_URL);
        assert_eq!(config.devices.max_devices, DEFAULT_MAX_DEVICES);
    }
}
