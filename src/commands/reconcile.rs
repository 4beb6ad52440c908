use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::error::{SetupError, StateParseError};
use crate::inventory::InventoryDocument;
use crate::reconcile::{self, PlanFormat, RemediationPlan, StateLoader, StateSource, Tier};

/// Where reconciliation reads state from and writes the plan to
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub state_files: Vec<PathBuf>,
    pub state_dirs: Vec<PathBuf>,
    pub pull_dirs: Vec<PathBuf>,
    pub format: PlanFormat,
    pub output: Option<PathBuf>,
    pub iac_binary: String,
}

impl ReconcileOptions {
    /// Check every input exists before anything runs
    pub fn validate(&self, ctx: &Context) -> Result<(), SetupError> {
        if self.state_files.is_empty() && self.state_dirs.is_empty() && self.pull_dirs.is_empty() {
            return Err(SetupError::InvalidConfig(
                "at least one of --state, --state-dir or --state-pull is required".to_string(),
            ));
        }

        for path in &self.state_files {
            if !ctx.fs.exists(path) {
                return Err(SetupError::MissingInput(path.clone()));
            }
        }

        for dir in self.state_dirs.iter().chain(&self.pull_dirs) {
            if !ctx.fs.is_dir(dir) {
                return Err(SetupError::MissingInput(dir.clone()));
            }
        }

        Ok(())
    }

    fn sources(&self) -> Vec<StateSource> {
        self.state_files
            .iter()
            .cloned()
            .map(StateSource::File)
            .chain(self.state_dirs.iter().cloned().map(StateSource::Dir))
            .chain(self.pull_dirs.iter().cloned().map(StateSource::Pull))
            .collect()
    }

    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!("remediation-plan.{}", self.format.extension()))
        })
    }
}

pub struct ReconcileCommand;

impl ReconcileCommand {
    /// Execute the reconcile command against a saved inventory
    pub fn execute(ctx: &Context, inventory_path: &Path, options: &ReconcileOptions) -> Result<()> {
        if !ctx.fs.exists(inventory_path) {
            return Err(SetupError::MissingInput(inventory_path.to_path_buf()).into());
        }
        options.validate(ctx)?;

        let inventory = InventoryDocument::load(&*ctx.fs, inventory_path)?;
        Self::reconcile(ctx, &inventory, options)?;

        Ok(())
    }

    /// Reconcile an inventory and write the plan.
    ///
    /// A state that cannot be loaded is reported and yields `None`; it never
    /// fails the command.
    pub fn reconcile(
        ctx: &Context,
        inventory: &InventoryDocument,
        options: &ReconcileOptions,
    ) -> Result<Option<RemediationPlan>> {
        ctx.output.section("Reconciliation");

        let loader = StateLoader::new(ctx.fs.clone(), ctx.command.clone(), &options.iac_binary);
        let managed = match loader.load(&options.sources()) {
            Ok(managed) => managed,
            Err(e) => {
                Self::report_state_error(ctx, &e);
                return Ok(None);
            }
        };

        ctx.output
            .key_value("Discovered", &inventory.total_resources().to_string());
        ctx.output.key_value("Managed", &managed.len().to_string());

        let plan = reconcile::reconcile(inventory, &managed, &options.iac_binary);

        let output_path = options.output_path();
        ctx.fs.write(&output_path, &plan.render(options.format)?)?;

        Self::report(ctx, &plan);
        ctx.output.blank();
        ctx.output
            .success(&format!("Remediation plan written to {}", output_path.display()));

        Ok(Some(plan))
    }

    fn report_state_error(ctx: &Context, error: &StateParseError) {
        ctx.output.error(&error.to_string());
        ctx.output
            .warning("Reconciliation skipped; the inventory is unaffected");
    }

    fn report(ctx: &Context, plan: &RemediationPlan) {
        ctx.output.subsection("Unmanaged resources");

        if plan.is_empty() {
            ctx.output
                .dimmed("Every discovered resource is managed by the given state");
            return;
        }

        for tier in Tier::all() {
            ctx.output
                .key_value(tier.as_str(), &plan.tier(tier).len().to_string());
        }
        ctx.output
            .key_value_highlight("Total", &plan.total().to_string());

        if !plan.high.is_empty() {
            ctx.output.blank();
            ctx.output.info("High priority:");
            for entry in &plan.high {
                ctx.output.command(&entry.import_command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::document::{AccountInventory, InventoryMetadata, ProbeStats, RegionInventory};
    use crate::probes::{ResourceRecord, ServiceKind};
    use crate::traits::{FileSystem, MockCommandExecutor, MockFileSystem, MockOutput};
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn inventory() -> InventoryDocument {
        let mut kinds = BTreeMap::new();
        kinds.insert(
            ServiceKind::S3Buckets,
            vec![
                ResourceRecord::new(ServiceKind::S3Buckets, "alpha").with_attr("bucket", Some("alpha")),
                ResourceRecord::new(ServiceKind::S3Buckets, "beta").with_attr("bucket", Some("beta")),
            ],
        );
        let services = BTreeMap::from([(ServiceKind::S3Buckets.category(), kinds)]);

        InventoryDocument {
            metadata: InventoryMetadata {
                generated_at: Utc::now(),
                org_id: None,
                accounts_scanned: 1,
                regions_scanned: vec!["global".to_string()],
                duration_seconds: 1.0,
                probe_stats: ProbeStats::default(),
            },
            accounts: vec![AccountInventory {
                account_id: "111111111111".to_string(),
                account_name: None,
                regions: vec![RegionInventory {
                    region: "global".to_string(),
                    services,
                }],
            }],
        }
    }

    const STATE: &str = r#"{"version": 4, "resources": [{"mode": "managed", "type": "aws_s3_bucket",
        "name": "a", "instances": [{"attributes": {"bucket": "alpha"}}]}]}"#;

    fn setup() -> (Context, Arc<MockFileSystem>, Arc<MockOutput>) {
        let fs = Arc::new(MockFileSystem::new());
        inventory().save(&*fs, Path::new("/work/inventory.json")).unwrap();
        let output = Arc::new(MockOutput::new());
        let ctx = Context::test_with(fs.clone(), output.clone(), Arc::new(MockCommandExecutor::new()));
        (ctx, fs, output)
    }

    fn options(state: &str) -> ReconcileOptions {
        ReconcileOptions {
            state_files: vec![PathBuf::from(state)],
            output: Some(PathBuf::from("/work/plan.sh")),
            iac_binary: "terraform".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_reconcile_writes_plan() {
        let (ctx, fs, output) = setup();
        fs.write(Path::new("/work/terraform.tfstate"), STATE).unwrap();

        ReconcileCommand::execute(&ctx, Path::new("/work/inventory.json"), &options("/work/terraform.tfstate"))
            .unwrap();

        let plan = fs.get_file_contents(Path::new("/work/plan.sh")).unwrap();
        assert!(plan.contains("terraform import aws_s3_bucket.beta beta"));
        assert!(!plan.contains("aws_s3_bucket.alpha"));
        assert_eq!(output.value_of("high").as_deref(), Some("1"));
        assert_eq!(
            output.get_commands(),
            vec!["terraform import aws_s3_bucket.beta beta"]
        );
    }

    #[test]
    fn test_missing_state_file_is_setup_error() {
        let (ctx, _, _) = setup();

        let err = ReconcileCommand::execute(&ctx, Path::new("/work/inventory.json"), &options("/nope.tfstate"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::MissingInput(_))
        ));
    }

    #[test]
    fn test_no_sources_is_setup_error() {
        let (ctx, _, _) = setup();
        let options = ReconcileOptions {
            iac_binary: "terraform".to_string(),
            ..Default::default()
        };

        let err = ReconcileCommand::execute(&ctx, Path::new("/work/inventory.json"), &options).unwrap_err();
        assert!(err.downcast_ref::<SetupError>().is_some());
    }

    #[test]
    fn test_malformed_state_is_reported_not_fatal() {
        let (ctx, fs, output) = setup();
        fs.write(Path::new("/work/terraform.tfstate"), "{ not json").unwrap();

        ReconcileCommand::execute(&ctx, Path::new("/work/inventory.json"), &options("/work/terraform.tfstate"))
            .unwrap();

        assert!(fs.get_file_contents(Path::new("/work/plan.sh")).is_none());
        assert_eq!(output.get_errors().len(), 1);
        assert!(output.get_errors()[0].contains("Malformed state document"));
    }

    #[test]
    fn test_fully_managed_inventory() {
        let (ctx, fs, output) = setup();
        fs.write(
            Path::new("/work/terraform.tfstate"),
            r#"{"resources": [{"mode": "managed", "type": "aws_s3_bucket", "name": "a", "instances": [
                {"index_key": 0, "attributes": {"bucket": "alpha"}},
                {"index_key": 1, "attributes": {"bucket": "beta"}}]}]}"#,
        )
        .unwrap();

        ReconcileCommand::execute(&ctx, Path::new("/work/inventory.json"), &options("/work/terraform.tfstate"))
            .unwrap();

        assert!(output.get_commands().is_empty());
        let plan = fs.get_file_contents(Path::new("/work/plan.sh")).unwrap();
        assert!(plan.contains("0 unmanaged resource(s)"));
    }
}
