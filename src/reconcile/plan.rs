//! Remediation plan: unmanaged resources grouped by tier.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Write;

use super::diff::UnmanagedResourceEntry;
use super::priority::Tier;

/// Output format for a rendered plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PlanFormat {
    /// Shell import commands
    #[default]
    Commands,
    /// `import {}` blocks
    Hcl,
    /// Machine-readable JSON
    Json,
}

impl PlanFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PlanFormat::Commands => "sh",
            PlanFormat::Hcl => "tf",
            PlanFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RemediationPlan {
    pub high: Vec<UnmanagedResourceEntry>,
    pub medium: Vec<UnmanagedResourceEntry>,
    pub low: Vec<UnmanagedResourceEntry>,
}

impl RemediationPlan {
    /// Group entries by tier, keeping their order within each tier
    pub fn from_entries(entries: Vec<UnmanagedResourceEntry>) -> Self {
        let mut plan = Self::default();
        for entry in entries {
            match entry.tier {
                Tier::High => plan.high.push(entry),
                Tier::Medium => plan.medium.push(entry),
                Tier::Low => plan.low.push(entry),
            }
        }
        plan
    }

    pub fn tier(&self, tier: Tier) -> &[UnmanagedResourceEntry] {
        match tier {
            Tier::High => &self.high,
            Tier::Medium => &self.medium,
            Tier::Low => &self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn render(&self, format: PlanFormat) -> Result<String> {
        match format {
            PlanFormat::Commands => Ok(self.render_commands()),
            PlanFormat::Hcl => Ok(self.render_hcl()),
            PlanFormat::Json => {
                serde_json::to_string_pretty(self).context("Failed to serialize remediation plan")
            }
        }
    }

    fn summary_line(&self) -> String {
        format!(
            "{} unmanaged resource(s): {} high, {} medium, {} low",
            self.total(),
            self.high.len(),
            self.medium.len(),
            self.low.len()
        )
    }

    fn render_commands(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "#!/bin/sh");
        let _ = writeln!(out, "# Remediation plan");
        let _ = writeln!(out, "# {}", self.summary_line());

        for tier in Tier::all() {
            let entries = self.tier(tier);
            let _ = writeln!(out);
            let _ = writeln!(out, "# === {} ({}) ===", tier.as_str().to_uppercase(), entries.len());

            for entry in entries {
                let _ = writeln!(
                    out,
                    "# {} {} {}",
                    entry.account_id,
                    entry.region,
                    entry.record.kind
                );
                let _ = writeln!(out, "{}", entry.import_command);
            }
        }

        out
    }

    fn render_hcl(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Remediation plan");
        let _ = writeln!(out, "# {}", self.summary_line());

        for tier in Tier::all() {
            let entries = self.tier(tier);
            let _ = writeln!(out);
            let _ = writeln!(out, "# === {} ({}) ===", tier.as_str().to_uppercase(), entries.len());

            for entry in entries {
                let _ = writeln!(out);
                let _ = writeln!(out, "# {} {}", entry.account_id, entry.region);
                let _ = writeln!(out, "import {{");
                let _ = writeln!(out, "  to = {}", entry.suggested_address);
                let _ = writeln!(out, "  id = {:?}", entry.identifier);
                let _ = writeln!(out, "}}");
            }
        }

        out
    }
}
