//! Finds discovered resources that no state document manages.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use super::priority::{Tier, classify};
use super::state_loader::ManagedResource;
use super::type_map;
use crate::inventory::InventoryDocument;
use crate::probes::{ResourceRecord, ServiceKind};

/// Managed set keyed by `(iac_type, canonical_id)`
pub struct ManagedIndex {
    keys: HashSet<(String, String)>,
}

impl ManagedIndex {
    pub fn new(managed: &[ManagedResource]) -> Self {
        Self {
            keys: managed
                .iter()
                .map(|m| (m.iac_type.clone(), m.canonical_id.clone()))
                .collect(),
        }
    }

    /// Exact match on both type and identifier
    pub fn contains(&self, iac_type: &str, identifier: &str) -> bool {
        self.keys
            .contains(&(iac_type.to_string(), identifier.to_string()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

/// A discovered resource with no managed counterpart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmanagedResourceEntry {
    pub record: ResourceRecord,
    pub account_id: String,
    pub region: String,
    pub iac_type: String,
    /// Identifier the import command uses
    pub identifier: String,
    pub suggested_address: String,
    pub import_command: String,
    pub tier: Tier,
}

/// Turn an identifier into an IaC resource label.
///
/// Takes the last segment of an ARN, URL or path, lower-cases it, collapses
/// runs of other characters into `_`, and prefixes a leading digit with `r_`.
pub fn derive_label(identifier: &str) -> String {
    let segment = identifier
        .rsplit(['/', ':'])
        .find(|s| !s.is_empty())
        .unwrap_or(identifier);

    let mut label = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.ends_with('_') {
            label.push('_');
        }
    }

    let label = label.trim_matches('_');

    match label.chars().next() {
        None => "resource".to_string(),
        Some(c) if c.is_ascii_digit() => format!("r_{}", label),
        Some(_) => label.to_string(),
    }
}

/// Quote a shell word when it contains anything beyond a safe set
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.:/@=+,".contains(c));

    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r#"'\''"#))
    }
}

/// Build the import command for one entry
pub fn import_command(iac_binary: &str, address: &str, identifier: &str) -> String {
    format!(
        "{} import {} {}",
        iac_binary,
        shell_quote(address),
        shell_quote(identifier)
    )
}

/// Walk the inventory in document order and report every unmanaged record.
///
/// Kinds without a type mapping are skipped. Addresses are unique within the
/// result: a repeated label gets `_2`, `_3`, ... in discovery order.
pub fn find_unmanaged(
    inventory: &InventoryDocument,
    managed: &ManagedIndex,
    iac_binary: &str,
) -> Vec<UnmanagedResourceEntry> {
    let mut entries = Vec::new();
    let mut used: HashSet<String> = HashSet::new();
    let mut skipped_kinds: HashSet<ServiceKind> = HashSet::new();

    for located in inventory.records() {
        let record = located.record;

        let Some(mapping) = type_map::for_kind(record.kind) else {
            if skipped_kinds.insert(record.kind) {
                info!("No IaC type for {}, not reconciled", record.kind);
            }
            continue;
        };

        let Some(identifier) = mapping.identifier.extract(record) else {
            debug!(
                "{} {}: no identifier attribute, skipping",
                record.kind, record.native_id
            );
            continue;
        };

        if managed.contains(mapping.iac_type, identifier) {
            continue;
        }

        let base = format!("{}.{}", mapping.iac_type, derive_label(identifier));
        let mut address = base.clone();
        let mut n = 1;
        while !used.insert(address.clone()) {
            n += 1;
            address = format!("{}_{}", base, n);
        }

        entries.push(UnmanagedResourceEntry {
            record: record.clone(),
            account_id: located.account_id.to_string(),
            region: located.region.to_string(),
            iac_type: mapping.iac_type.to_string(),
            identifier: identifier.to_string(),
            import_command: import_command(iac_binary, &address, identifier),
            suggested_address: address,
            tier: classify(mapping.iac_type),
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::document::{AccountInventory, InventoryMetadata, ProbeStats, RegionInventory};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn inventory_with(records: Vec<(&str, ResourceRecord)>) -> InventoryDocument {
        let mut regions: BTreeMap<String, RegionInventory> = BTreeMap::new();
        for (region, record) in records {
            regions
                .entry(region.to_string())
                .or_insert_with(|| RegionInventory {
                    region: region.to_string(),
                    services: BTreeMap::new(),
                })
                .services
                .entry(record.kind.category())
                .or_default()
                .entry(record.kind)
                .or_default()
                .push(record);
        }

        InventoryDocument {
            metadata: InventoryMetadata {
                generated_at: Utc::now(),
                org_id: None,
                accounts_scanned: 1,
                regions_scanned: regions.keys().cloned().collect(),
                duration_seconds: 0.0,
                probe_stats: ProbeStats::default(),
            },
            accounts: vec![AccountInventory {
                account_id: "111111111111".to_string(),
                account_name: None,
                regions: regions.into_values().collect(),
            }],
        }
    }

    fn bucket(name: &str) -> ResourceRecord {
        ResourceRecord::new(ServiceKind::S3Buckets, name).with_attr("bucket", Some(name))
    }

    fn managed(iac_type: &str, address: &str, id: &str) -> ManagedResource {
        ManagedResource {
            iac_type: iac_type.to_string(),
            address: address.to_string(),
            canonical_id: id.to_string(),
        }
    }

    #[test]
    fn test_alpha_managed_beta_unmanaged() {
        let inventory = inventory_with(vec![("global", bucket("alpha")), ("global", bucket("beta"))]);
        let index = ManagedIndex::new(&[managed("aws_s3_bucket", "aws_s3_bucket.logs", "alpha")]);

        let entries = find_unmanaged(&inventory, &index, "terraform");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].identifier, "beta");
        assert_eq!(entries[0].suggested_address, "aws_s3_bucket.beta");
        assert_eq!(entries[0].tier, Tier::High);
        assert_eq!(entries[0].import_command, "terraform import aws_s3_bucket.beta beta");
    }

    #[test]
    fn test_managed_pairs_never_reported() {
        let inventory = inventory_with(vec![
            ("global", bucket("alpha")),
            (
                "us-east-1",
                ResourceRecord::new(ServiceKind::LambdaFunctions, "fn")
                    .with_attr("function_name", Some("fn"))
                    .with_attr("arn", Some("arn:aws:lambda:us-east-1:1:function:fn")),
            ),
        ]);
        let index = ManagedIndex::new(&[
            managed("aws_s3_bucket", "aws_s3_bucket.a", "alpha"),
            managed("aws_lambda_function", "aws_lambda_function.f", "fn"),
        ]);

        assert!(find_unmanaged(&inventory, &index, "terraform").is_empty());
    }

    #[test]
    fn test_match_requires_same_type() {
        let inventory = inventory_with(vec![("global", bucket("shared-name"))]);
        let index = ManagedIndex::new(&[managed("aws_dynamodb_table", "aws_dynamodb_table.t", "shared-name")]);

        assert_eq!(find_unmanaged(&inventory, &index, "terraform").len(), 1);
    }

    #[test]
    fn test_exact_string_comparison() {
        let inventory = inventory_with(vec![("global", bucket("Alpha"))]);
        let index = ManagedIndex::new(&[managed("aws_s3_bucket", "aws_s3_bucket.a", "alpha")]);

        assert_eq!(find_unmanaged(&inventory, &index, "terraform").len(), 1);
    }

    #[test]
    fn test_label_collisions_get_suffixes() {
        let inventory = inventory_with(vec![
            ("global", bucket("app.logs")),
            ("global", bucket("app-logs")),
            ("global", bucket("APP_LOGS")),
        ]);
        let index = ManagedIndex::new(&[]);

        let addresses: Vec<_> = find_unmanaged(&inventory, &index, "tofu")
            .into_iter()
            .map(|e| e.suggested_address)
            .collect();

        assert_eq!(
            addresses,
            vec![
                "aws_s3_bucket.app_logs",
                "aws_s3_bucket.app_logs_2",
                "aws_s3_bucket.app_logs_3",
            ]
        );
    }

    #[test]
    fn test_derive_label() {
        assert_eq!(derive_label("beta"), "beta");
        assert_eq!(derive_label("arn:aws:sns:us-east-1:123:Order-Events"), "order_events");
        assert_eq!(derive_label("https://sqs.us-east-1.amazonaws.com/123/jobs.fifo"), "jobs_fifo");
        assert_eq!(derive_label("/aws/lambda/handler"), "handler");
        assert_eq!(derive_label("2024-archive"), "r_2024_archive");
        assert_eq!(derive_label("--"), "resource");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("arn:aws:sns:us-east-1:1:t"), "arn:aws:sns:us-east-1:1:t");
        assert_eq!(
            shell_quote("aws_iam_role.r[\"a\"]"),
            "'aws_iam_role.r[\"a\"]'"
        );
        assert_eq!(shell_quote("it's"), r#"'it'\''s'"#);
    }
}
