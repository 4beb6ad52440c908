//! Integration tests for the driftscan CLI
//!
//! These tests run the built binary end-to-end. None of them reach a cloud
//! provider: scans are only exercised up to their setup checks.

use std::path::Path;
use std::process::Command;

/// Get the path to the driftscan binary
fn driftscan_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test executable name
    path.pop(); // Remove deps directory

    path.push("driftscan");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    path
}

/// Run driftscan in `dir` and return output
fn run_in(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(driftscan_binary())
        .args(args)
        .current_dir(dir)
        .env_remove("DRIFTSCAN_CONFIG")
        .env_remove("DRIFTSCAN_LOG")
        .output()
        .expect("Failed to execute driftscan")
}

fn run_driftscan(args: &[&str]) -> std::process::Output {
    run_in(&std::env::temp_dir(), args)
}

#[test]
fn test_driftscan_version() {
    let output = run_driftscan(&["--version"]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("driftscan"));
}

#[test]
fn test_driftscan_help() {
    let output = run_driftscan(&["--help"]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("Commands:"));
    assert!(stdout.contains("scan"));
    assert!(stdout.contains("reconcile"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("cache"));
}

#[test]
fn test_driftscan_scan_help() {
    let output = run_driftscan(&["scan", "--help"]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--regions"));
    assert!(stdout.contains("--max-parallel"));
    assert!(stdout.contains("--no-cache"));
}

#[test]
fn test_driftscan_reconcile_help() {
    let output = run_driftscan(&["reconcile", "--help"]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--state"));
    assert!(stdout.contains("--state-dir"));
    assert!(stdout.contains("--state-pull"));
    assert!(stdout.contains("--format"));
}

#[test]
fn test_driftscan_cache_help() {
    let output = run_driftscan(&["cache", "--help"]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("prune"));
    assert!(stdout.contains("clear"));
}

#[test]
fn test_driftscan_invalid_command() {
    let output = run_driftscan(&["nonexistent"]);

    assert!(!output.status.success());
}

#[test]
fn test_driftscan_invalid_format() {
    let output = run_driftscan(&["reconcile", "--state", "x.tfstate", "--format", "yaml"]);

    assert!(!output.status.success());
}

// ============================================================================
// End-to-end workflow tests with temp directories
// ============================================================================

mod workflow_tests {
    use super::*;
    use tempfile::TempDir;

    const INVENTORY: &str = r#"{
  "metadata": {
    "generated_at": "2026-01-01T00:00:00Z",
    "org_id": null,
    "accounts_scanned": 1,
    "regions_scanned": ["us-east-1"],
    "duration_seconds": 1.5,
    "probe_stats": {
      "total_probes": 2,
      "failed_probes": 0,
      "partial_probes": 0,
      "cache_hits": 0,
      "live_calls": 2,
      "coverage_percent": 100.0
    }
  },
  "accounts": [
    {
      "account_id": "111111111111",
      "account_name": "sandbox",
      "regions": [
        {
          "region": "global",
          "services": {
            "storage": {
              "s3_buckets": [
                {"kind": "s3_buckets", "native_id": "alpha", "attributes": {"bucket": "alpha"}},
                {"kind": "s3_buckets", "native_id": "beta", "attributes": {"bucket": "beta"}}
              ]
            }
          }
        }
      ]
    }
  ]
}"#;

    const STATE: &str = r#"{
  "version": 4,
  "resources": [
    {
      "mode": "managed",
      "type": "aws_s3_bucket",
      "name": "alpha",
      "instances": [{"attributes": {"bucket": "alpha", "arn": "arn:aws:s3:::alpha"}}]
    }
  ]
}"#;

    /// Helper to verify no panic occurred in command output
    fn assert_no_panic(output: &std::process::Output, context: &str) {
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            !stderr.contains("panic") && !stderr.contains("RUST_BACKTRACE"),
            "{} panicked.\nstderr: {}",
            context,
            stderr
        );
    }

    fn workspace() -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("inventory.json"), INVENTORY).unwrap();
        std::fs::write(temp_dir.path().join("terraform.tfstate"), STATE).unwrap();
        temp_dir
    }

    #[test]
    fn test_reconcile_writes_import_commands() {
        let temp_dir = workspace();

        let output = run_in(temp_dir.path(), &["reconcile", "--state", "terraform.tfstate"]);
        assert_no_panic(&output, "reconcile");
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );

        let plan = std::fs::read_to_string(temp_dir.path().join("remediation-plan.sh")).unwrap();
        assert!(plan.contains("terraform import aws_s3_bucket.beta beta"));
        assert!(!plan.contains("aws_s3_bucket.alpha"));
    }

    #[test]
    fn test_reconcile_hcl_with_tofu() {
        let temp_dir = workspace();

        let output = run_in(
            temp_dir.path(),
            &[
                "reconcile",
                "--state-dir",
                ".",
                "--format",
                "hcl",
                "--iac-binary",
                "tofu",
                "--plan-output",
                "imports.tf",
            ],
        );
        assert_no_panic(&output, "reconcile --format hcl");
        assert!(output.status.success());

        let plan = std::fs::read_to_string(temp_dir.path().join("imports.tf")).unwrap();
        assert!(plan.contains("to = aws_s3_bucket.beta"));
        assert!(plan.contains("id = \"beta\""));
    }

    #[test]
    fn test_reconcile_missing_state_fails() {
        let temp_dir = workspace();

        let output = run_in(temp_dir.path(), &["reconcile", "--state", "missing.tfstate"]);
        assert_no_panic(&output, "reconcile with missing state");

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("missing.tfstate"));
        assert!(!temp_dir.path().join("remediation-plan.sh").exists());
    }

    #[test]
    fn test_reconcile_without_sources_fails() {
        let temp_dir = workspace();

        let output = run_in(temp_dir.path(), &["reconcile"]);
        assert_no_panic(&output, "reconcile without sources");

        assert!(!output.status.success());
    }

    #[test]
    fn test_reconcile_malformed_state_is_not_fatal() {
        let temp_dir = workspace();
        std::fs::write(temp_dir.path().join("broken.tfstate"), "{ not json").unwrap();

        let output = run_in(temp_dir.path(), &["reconcile", "--state", "broken.tfstate"]);
        assert_no_panic(&output, "reconcile with malformed state");

        assert!(output.status.success());
        assert!(!temp_dir.path().join("remediation-plan.sh").exists());
    }

    #[test]
    fn test_scan_with_invalid_config_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("driftscan.yaml"), "max_parallel: 0\n").unwrap();

        let output = run_in(temp_dir.path(), &["scan"]);
        assert_no_panic(&output, "scan with invalid config");

        assert!(!output.status.success());
        assert!(!temp_dir.path().join("inventory.json").exists());
    }

    #[test]
    fn test_cache_clear_on_empty_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("driftscan.yaml"), "cache:\n  dir: cache\n").unwrap();

        let output = run_in(temp_dir.path(), &["cache", "clear"]);
        assert_no_panic(&output, "cache clear");

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Removed 0 entries"));
    }
}
