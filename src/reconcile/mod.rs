//! Reconciliation of a discovered inventory against IaC state.
//!
//! ```text
//! inventory ──┐
//!             ├─> diff ─> classify ─> plan
//! state ──────┘
//! ```
//!
//! Both sides go through the same type table (`type_map`) to decide which
//! attribute identifies a resource, and comparison is by exact string.

pub mod diff;
pub mod plan;
pub mod priority;
pub mod state_loader;
pub mod type_map;

pub use diff::{ManagedIndex, UnmanagedResourceEntry, find_unmanaged};
pub use plan::{PlanFormat, RemediationPlan};
pub use priority::{Tier, classify};
pub use state_loader::{ManagedResource, StateLoader, StateSource};

use crate::inventory::InventoryDocument;

/// Build the remediation plan for an inventory and a managed set
pub fn reconcile(
    inventory: &InventoryDocument,
    managed: &[ManagedResource],
    iac_binary: &str,
) -> RemediationPlan {
    let index = ManagedIndex::new(managed);
    RemediationPlan::from_entries(find_unmanaged(inventory, &index, iac_binary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::build_document;
    use crate::probes::{ResourceRecord, ServiceKind};
    use crate::scan::{ScanTarget, TaskResult, TaskStatus};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn scanned(records: Vec<(&str, ResourceRecord)>) -> InventoryDocument {
        let mut results: BTreeMap<ScanTarget, TaskResult> = BTreeMap::new();
        for (region, record) in records {
            results
                .entry(ScanTarget::new("111111111111", region, record.kind))
                .or_insert_with(|| TaskResult {
                    records: Vec::new(),
                    status: TaskStatus::Live,
                })
                .records
                .push(record);
        }
        build_document(&results, &BTreeMap::new(), None, Utc::now(), 0.0)
    }

    #[test]
    fn test_five_resources_against_empty_state() {
        let inventory = scanned(vec![
            (
                "us-east-1",
                ResourceRecord::new(ServiceKind::Vpcs, "vpc-1").with_attr("id", Some("vpc-1")),
            ),
            (
                "global",
                ResourceRecord::new(ServiceKind::IamRoles, "deployer").with_attr("name", Some("deployer")),
            ),
            (
                "us-east-1",
                ResourceRecord::new(ServiceKind::LambdaFunctions, "api")
                    .with_attr("function_name", Some("api")),
            ),
            (
                "us-east-1",
                ResourceRecord::new(ServiceKind::EcrRepositories, "web").with_attr("name", Some("web")),
            ),
            (
                "us-east-1",
                ResourceRecord::new(ServiceKind::LogGroups, "/aws/lambda/api")
                    .with_attr("name", Some("/aws/lambda/api")),
            ),
        ]);

        let plan = reconcile(&inventory, &[], "terraform");

        assert_eq!(plan.total(), 5);
        assert_eq!(plan.high.len(), 2);
        assert_eq!(plan.medium.len(), 2);
        assert_eq!(plan.low.len(), 1);
        assert_eq!(
            plan.low[0].import_command,
            "terraform import aws_cloudwatch_log_group.api /aws/lambda/api"
        );
    }

    #[test]
    fn test_plan_is_deterministic() {
        let records = || {
            vec![
                (
                    "global",
                    ResourceRecord::new(ServiceKind::S3Buckets, "a").with_attr("bucket", Some("a")),
                ),
                (
                    "eu-west-1",
                    ResourceRecord::new(ServiceKind::SnsTopics, "arn:aws:sns:eu-west-1:1:a")
                        .with_attr("arn", Some("arn:aws:sns:eu-west-1:1:a")),
                ),
            ]
        };

        let first = reconcile(&scanned(records()), &[], "terraform");
        let mut reversed = records();
        reversed.reverse();
        let second = reconcile(&scanned(reversed), &[], "terraform");

        assert_eq!(
            first.render(PlanFormat::Commands).unwrap(),
            second.render(PlanFormat::Commands).unwrap()
        );
    }

    #[test]
    fn test_state_document_round_trip_through_reconcile() {
        let state = r#"{"resources": [{"mode": "managed", "type": "aws_s3_bucket", "name": "a",
            "instances": [{"attributes": {"bucket": "alpha"}}]}]}"#;
        let managed = state_loader::parse_state(state, std::path::Path::new("s.tfstate")).unwrap();

        let inventory = scanned(vec![
            (
                "global",
                ResourceRecord::new(ServiceKind::S3Buckets, "alpha").with_attr("bucket", Some("alpha")),
            ),
            (
                "global",
                ResourceRecord::new(ServiceKind::S3Buckets, "beta").with_attr("bucket", Some("beta")),
            ),
        ]);

        let plan = reconcile(&inventory, &managed, "terraform");
        assert_eq!(plan.total(), 1);
        assert_eq!(plan.high[0].suggested_address, "aws_s3_bucket.beta");
    }
}
