//! Scan configuration.
//!
//! Loaded from a YAML file (`driftscan.yaml` in the working directory unless
//! `--config` points elsewhere) and then overridden by command-line flags.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::SetupError;
use crate::probes::kind::{GLOBAL_REGION, ServiceKind};
use crate::traits::FileSystem;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "driftscan.yaml";

/// Upper bound for cache `ttl_seconds` and `bucket_seconds` (one year)
pub const MAX_CACHE_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Organization id recorded in the inventory metadata
    pub org_id: Option<String>,
    /// Accounts to scan; merged with discovered accounts
    pub accounts: Vec<AccountConfig>,
    /// List active accounts from the organization API
    pub discover_accounts: bool,
    /// Profile name for discovered accounts, `{account_id}` is substituted
    pub profile_template: Option<String>,
    /// Regions to scan in every account
    pub regions: Vec<String>,
    /// Restrict the scan to these kinds (plural names); empty means all
    pub services: Vec<String>,
    /// Maximum number of probes running at once
    pub max_parallel: usize,
    pub cache: CacheSettings,
    pub provider: ProviderSettings,
    /// Binary named in generated import commands (`terraform` or `tofu`)
    pub iac_binary: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            org_id: None,
            accounts: Vec::new(),
            discover_accounts: false,
            profile_template: None,
            regions: vec!["us-east-1".to_string()],
            services: Vec::new(),
            max_parallel: 8,
            cache: CacheSettings::default(),
            provider: ProviderSettings::default(),
            iac_binary: "terraform".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// CLI profile used for this account; the default credential chain otherwise
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// Directory for persisted entries; `~/.driftscan/cache` when unset
    pub dir: Option<PathBuf>,
    pub ttl_seconds: u64,
    /// Width of the time bucket folded into cache keys
    pub bucket_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            ttl_seconds: 3600,
            bucket_seconds: 3600,
        }
    }
}

impl CacheSettings {
    /// Resolve the cache directory
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.dir {
            return Ok(dir.clone());
        }

        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;

        Ok(home_dir.join(".driftscan").join("cache"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Provider CLI binary
    pub cli: String,
    pub connect_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
    /// Attempts the CLI makes per call; 1 disables its internal retries
    pub max_attempts: u32,
    pub page_size: u32,
    /// Upper bound on pages fetched by one probe
    pub max_pages: usize,
    /// Region used for calls made on behalf of the `global` region
    pub global_region: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            cli: "aws".to_string(),
            connect_timeout_seconds: 10,
            read_timeout_seconds: 60,
            max_attempts: 1,
            page_size: 100,
            max_pages: 200,
            global_region: "us-east-1".to_string(),
        }
    }
}

impl ScanConfig {
    /// Load configuration, falling back to defaults when no file is present
    pub fn load(fs: &dyn FileSystem, path: Option<&Path>) -> Result<Self, SetupError> {
        let path = match path {
            Some(p) => {
                if !fs.exists(p) {
                    return Err(SetupError::MissingInput(p.to_path_buf()));
                }
                p.to_path_buf()
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fs.exists(&default_path) {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = fs
            .read_to_string(&path)
            .map_err(|e| SetupError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
            .map_err(|e| SetupError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Check the configuration before any work starts
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.max_parallel == 0 {
            return Err(SetupError::InvalidConfig(
                "max_parallel must be at least 1".to_string(),
            ));
        }

        if self.regions.is_empty() {
            return Err(SetupError::InvalidConfig(
                "at least one region is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.trim().is_empty() || region == GLOBAL_REGION {
                return Err(SetupError::InvalidConfig(format!(
                    "invalid region name '{}'",
                    region
                )));
            }
            if !seen.insert(region) {
                return Err(SetupError::InvalidConfig(format!(
                    "region '{}' listed twice",
                    region
                )));
            }
        }

        if self.cache.ttl_seconds == 0 || self.cache.bucket_seconds == 0 {
            return Err(SetupError::InvalidConfig(
                "cache ttl_seconds and bucket_seconds must be positive".to_string(),
            ));
        }

        if self.cache.ttl_seconds > MAX_CACHE_SECONDS || self.cache.bucket_seconds > MAX_CACHE_SECONDS {
            return Err(SetupError::InvalidConfig(format!(
                "cache ttl_seconds and bucket_seconds must not exceed {}",
                MAX_CACHE_SECONDS
            )));
        }

        if self.provider.page_size == 0 || self.provider.page_size > 1000 {
            return Err(SetupError::InvalidConfig(
                "provider.page_size must be between 1 and 1000".to_string(),
            ));
        }

        if self.provider.max_pages == 0 {
            return Err(SetupError::InvalidConfig(
                "provider.max_pages must be at least 1".to_string(),
            ));
        }

        if self.iac_binary.trim().is_empty() {
            return Err(SetupError::InvalidConfig(
                "iac_binary must not be empty".to_string(),
            ));
        }

        self.service_kinds()?;

        if !self.discover_accounts && self.accounts.is_empty() {
            return Err(SetupError::InvalidConfig(
                "no accounts configured and account discovery is disabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve the service filter into kinds
    pub fn service_kinds(&self) -> Result<Vec<ServiceKind>, SetupError> {
        if self.services.is_empty() {
            return Ok(ServiceKind::all().to_vec());
        }

        let mut kinds = Vec::new();
        for name in &self.services {
            let kind = ServiceKind::from_plural(name).ok_or_else(|| {
                SetupError::InvalidConfig(format!("unknown service kind '{}'", name))
            })?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        Ok(kinds)
    }
}
