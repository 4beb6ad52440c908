use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::probes::{Category, ResourceRecord, ServiceKind};
use crate::scan::{ScanTarget, TaskResult, TaskStatus};
use crate::traits::FileSystem;

/// Hierarchical inventory: account -> region -> category -> kind -> records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryDocument {
    pub metadata: InventoryMetadata,
    pub accounts: Vec<AccountInventory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMetadata {
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub org_id: Option<String>,
    pub accounts_scanned: usize,
    pub regions_scanned: Vec<String>,
    pub duration_seconds: f64,
    pub probe_stats: ProbeStats,
}

/// Counters describing how a scan went
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProbeStats {
    pub total_probes: usize,
    pub failed_probes: usize,
    pub partial_probes: usize,
    pub cache_hits: usize,
    pub live_calls: usize,
    /// Share of probes that returned data, 0-100
    pub coverage_percent: f64,
}

impl ProbeStats {
    pub fn from_results(results: &BTreeMap<ScanTarget, TaskResult>) -> Self {
        let mut stats = ProbeStats {
            total_probes: results.len(),
            ..Default::default()
        };

        for result in results.values() {
            match result.status {
                TaskStatus::Live => stats.live_calls += 1,
                TaskStatus::Cached => stats.cache_hits += 1,
                TaskStatus::Partial => {
                    stats.live_calls += 1;
                    stats.partial_probes += 1;
                }
                TaskStatus::Failed(_) => stats.failed_probes += 1,
            }
        }

        stats.coverage_percent = if stats.total_probes == 0 {
            100.0
        } else {
            let succeeded = (stats.total_probes - stats.failed_probes) as f64;
            (succeeded * 1000.0 / stats.total_probes as f64).round() / 10.0
        };

        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInventory {
    pub account_id: String,
    #[serde(default)]
    pub account_name: Option<String>,
    pub regions: Vec<RegionInventory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionInventory {
    pub region: String,
    pub services: BTreeMap<Category, BTreeMap<ServiceKind, Vec<ResourceRecord>>>,
}

/// A record together with where it was found
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub account_id: &'a str,
    pub region: &'a str,
    pub record: &'a ResourceRecord,
}

impl InventoryDocument {
    /// Every record in document order
    pub fn records(&self) -> impl Iterator<Item = Located<'_>> {
        self.accounts.iter().flat_map(|account| {
            account.regions.iter().flat_map(move |region| {
                region
                    .services
                    .values()
                    .flat_map(|kinds| kinds.values())
                    .flatten()
                    .map(move |record| Located {
                        account_id: &account.account_id,
                        region: &region.region,
                        record,
                    })
            })
        })
    }

    pub fn total_resources(&self) -> usize {
        self.records().count()
    }

    /// Resource counts per category across all accounts
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for located in self.records() {
            *counts.entry(located.record.kind.category()).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize inventory")
    }

    pub fn save(&self, fs: &dyn FileSystem, path: &Path) -> Result<()> {
        fs.write(path, &self.to_json()?)
            .with_context(|| format!("Failed to write inventory to {}", path.display()))
    }

    pub fn load(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        let content = fs
            .read_to_string(path)
            .with_context(|| format!("Failed to read inventory {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse inventory {}", path.display()))
    }
}
