use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use super::document::{AccountInventory, InventoryDocument, InventoryMetadata, ProbeStats, RegionInventory};
use crate::scan::{ScanTarget, TaskResult};

/// Fold per-target results into per-account inventories.
///
/// Pure: the output depends only on the contents of `results`, never on the
/// order tasks finished in. Accounts come out sorted by id, regions by name,
/// categories and kinds in their declared order.
pub fn aggregate(
    results: &BTreeMap<ScanTarget, TaskResult>,
    account_names: &BTreeMap<String, String>,
) -> Vec<AccountInventory> {
    let mut tree: BTreeMap<&str, BTreeMap<&str, RegionInventory>> = BTreeMap::new();

    for (target, result) in results {
        let region = tree
            .entry(target.account_id.as_str())
            .or_default()
            .entry(target.region.as_str())
            .or_insert_with(|| RegionInventory {
                region: target.region.clone(),
                services: BTreeMap::new(),
            });

        let mut records = result.records.clone();
        records.sort_by(|a, b| a.native_id.cmp(&b.native_id));

        region
            .services
            .entry(target.service_kind.category())
            .or_default()
            .entry(target.service_kind)
            .or_default()
            .extend(records);
    }

    tree.into_iter()
        .map(|(account_id, regions)| AccountInventory {
            account_id: account_id.to_string(),
            account_name: account_names.get(account_id).cloned(),
            regions: regions.into_values().collect(),
        })
        .collect()
}

/// Build the full inventory document for a finished scan
pub fn build_document(
    results: &BTreeMap<ScanTarget, TaskResult>,
    account_names: &BTreeMap<String, String>,
    org_id: Option<String>,
    generated_at: DateTime<Utc>,
    duration_seconds: f64,
) -> InventoryDocument {
    let accounts = aggregate(results, account_names);

    let regions_scanned: BTreeSet<String> = results.keys().map(|t| t.region.clone()).collect();

    InventoryDocument {
        metadata: InventoryMetadata {
            generated_at,
            org_id,
            accounts_scanned: accounts.len(),
            regions_scanned: regions_scanned.into_iter().collect(),
            duration_seconds,
            probe_stats: ProbeStats::from_results(results),
        },
        accounts,
    }
}
