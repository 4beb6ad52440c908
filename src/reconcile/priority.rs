use serde::{Deserialize, Serialize};
use std::fmt;

use super::type_map;

/// Remediation priority of an unmanaged resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }

    pub fn all() -> [Tier; 3] {
        [Tier::High, Tier::Medium, Tier::Low]
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier for an IaC type; types outside the table are medium
pub fn classify(iac_type: &str) -> Tier {
    type_map::for_iac_type(iac_type)
        .map(|m| m.tier)
        .unwrap_or(Tier::Medium)
}
