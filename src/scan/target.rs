use serde::{Deserialize, Serialize};
use std::fmt;

use crate::probes::ServiceKind;
use crate::probes::kind::GLOBAL_REGION;

/// One unit of scan work: a service kind in one region of one account.
///
/// Ordered by account, then region, then kind, so maps keyed by target
/// iterate in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScanTarget {
    pub account_id: String,
    pub region: String,
    pub service_kind: ServiceKind,
}

impl ScanTarget {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>, service_kind: ServiceKind) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            service_kind,
        }
    }
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.account_id, self.region, self.service_kind)
    }
}

/// Enumerate the full target space.
///
/// Every account gets each regional kind in each region, plus the global
/// kinds once under the synthetic `global` region.
pub fn enumerate_targets(
    account_ids: &[String],
    regions: &[String],
    kinds: &[ServiceKind],
) -> Vec<ScanTarget> {
    let mut targets = Vec::new();

    for account_id in account_ids {
        for region in regions {
            for kind in kinds.iter().filter(|k| !k.is_global()) {
                targets.push(ScanTarget::new(account_id.as_str(), region.as_str(), *kind));
            }
        }

        for kind in kinds.iter().filter(|k| k.is_global()) {
            targets.push(ScanTarget::new(account_id.as_str(), GLOBAL_REGION, *kind));
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_enumerate_full_space() {
        let targets = enumerate_targets(
            &ids(&["111", "222"]),
            &ids(&["us-east-1", "eu-west-1"]),
            ServiceKind::all(),
        );

        // 16 regional kinds x 2 regions + 4 global kinds, per account
        assert_eq!(targets.len(), 2 * (16 * 2 + 4));
        assert!(
            targets
                .iter()
                .filter(|t| t.region == GLOBAL_REGION)
                .all(|t| t.service_kind.is_global())
        );
        assert!(
            !targets
                .iter()
                .any(|t| t.region != GLOBAL_REGION && t.service_kind.is_global())
        );
    }

    #[test]
    fn test_enumerate_filtered_kinds() {
        let targets = enumerate_targets(
            &ids(&["111"]),
            &ids(&["us-east-1"]),
            &[ServiceKind::Vpcs, ServiceKind::S3Buckets],
        );

        assert_eq!(
            targets,
            vec![
                ScanTarget::new("111", "us-east-1", ServiceKind::Vpcs),
                ScanTarget::new("111", "global", ServiceKind::S3Buckets),
            ]
        );
    }

    #[test]
    fn test_ordering_and_display() {
        let a = ScanTarget::new("111", "us-east-1", ServiceKind::Vpcs);
        let b = ScanTarget::new("111", "us-west-2", ServiceKind::Ec2Instances);
        let c = ScanTarget::new("222", "eu-west-1", ServiceKind::Ec2Instances);

        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.to_string(), "111/us-east-1/vpcs");
    }
}
