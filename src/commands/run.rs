use anyhow::Result;
use std::path::{Path, PathBuf};

use super::reconcile::{ReconcileCommand, ReconcileOptions};
use super::scan::{DEFAULT_INVENTORY_FILE, ScanCommand, ScanOverrides};
use crate::context::Context;

pub struct RunCommand;

impl RunCommand {
    /// Scan, save the inventory, then reconcile it.
    ///
    /// Every input is checked before the scan starts. The inventory is saved
    /// before reconciliation, so a bad state document still leaves it on disk.
    pub fn execute(
        ctx: &Context,
        overrides: &ScanOverrides,
        inventory_path: Option<&Path>,
        options: &ReconcileOptions,
    ) -> Result<()> {
        let config = overrides.resolve_config(ctx)?;
        options.validate(ctx)?;

        let options = ReconcileOptions {
            iac_binary: if options.iac_binary.is_empty() {
                config.iac_binary.clone()
            } else {
                options.iac_binary.clone()
            },
            ..options.clone()
        };

        let inventory = ScanCommand::scan(ctx, &config)?;

        let inventory_path = inventory_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY_FILE));
        inventory.save(&*ctx.fs, &inventory_path)?;
        ctx.output.blank();
        ctx.output
            .success(&format!("Inventory written to {}", inventory_path.display()));

        ReconcileCommand::reconcile(ctx, &inventory, &options)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SetupError;
    use crate::inventory::InventoryDocument;
    use crate::traits::{FileSystem, MockCommandExecutor, MockCommandResult, MockFileSystem, MockOutput};
    use std::sync::Arc;

    const CONFIG: &str = r#"
accounts:
  - id: "111111111111"
services: [s3_buckets]
cache:
  enabled: false
"#;

    fn setup() -> (Context, Arc<MockFileSystem>, Arc<MockOutput>, Arc<MockCommandExecutor>) {
        let fs = Arc::new(MockFileSystem::new());
        fs.write(Path::new("/work/driftscan.yaml"), CONFIG).unwrap();
        let output = Arc::new(MockOutput::new());
        let command = Arc::new(MockCommandExecutor::with_outputs(vec![MockCommandResult::ok(
            "s3api list-buckets",
            r#"{"Buckets": [{"Name": "alpha"}, {"Name": "beta"}]}"#,
        )]));
        let ctx = Context::test_with(fs.clone(), output.clone(), command.clone());
        (ctx, fs, output, command)
    }

    fn overrides() -> ScanOverrides {
        ScanOverrides {
            config: Some(PathBuf::from("/work/driftscan.yaml")),
            ..Default::default()
        }
    }

    fn options() -> ReconcileOptions {
        ReconcileOptions {
            state_files: vec![PathBuf::from("/work/terraform.tfstate")],
            output: Some(PathBuf::from("/work/plan.sh")),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_end_to_end() {
        let (ctx, fs, _, _) = setup();
        fs.write(
            Path::new("/work/terraform.tfstate"),
            r#"{"resources": [{"mode": "managed", "type": "aws_s3_bucket", "name": "logs",
                "instances": [{"attributes": {"bucket": "alpha"}}]}]}"#,
        )
        .unwrap();

        RunCommand::execute(&ctx, &overrides(), Some(Path::new("/work/inv.json")), &options()).unwrap();

        let inventory = InventoryDocument::load(&*fs, Path::new("/work/inv.json")).unwrap();
        assert_eq!(inventory.total_resources(), 2);

        let plan = fs.get_file_contents(Path::new("/work/plan.sh")).unwrap();
        assert!(plan.contains("terraform import aws_s3_bucket.beta beta"));
    }

    #[test]
    fn test_bad_state_keeps_inventory() {
        let (ctx, fs, output, _) = setup();
        fs.write(Path::new("/work/terraform.tfstate"), "{ truncated").unwrap();

        RunCommand::execute(&ctx, &overrides(), Some(Path::new("/work/inv.json")), &options()).unwrap();

        assert!(fs.get_file_contents(Path::new("/work/inv.json")).is_some());
        assert!(fs.get_file_contents(Path::new("/work/plan.sh")).is_none());
        assert_eq!(output.get_errors().len(), 1);
    }

    #[test]
    fn test_missing_state_stops_before_scanning() {
        let (ctx, _, _, command) = setup();

        let err = RunCommand::execute(&ctx, &overrides(), None, &options()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SetupError>(),
            Some(SetupError::MissingInput(_))
        ));
        assert!(command.invocations().is_empty());
    }
}
