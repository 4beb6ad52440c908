mod accounts;
mod cache;
mod commands;
mod config;
mod context;
mod error;
mod inventory;
mod logging;
mod output;
mod probes;
mod reconcile;
mod scan;
mod traits;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{CacheCommand, ReconcileCommand, ReconcileOptions, RunCommand, ScanCommand, ScanOverrides};
use context::Context;
use reconcile::PlanFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "driftscan")]
#[command(about = "Discover cloud resources across accounts and regions and find the ones IaC does not manage", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./driftscan.yaml when present)
    #[arg(short, long, global = true, env = "DRIFTSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every account and region and write the inventory
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Inventory file to write
        #[arg(short, long, default_value = "inventory.json")]
        output: PathBuf,
    },

    /// Compare a saved inventory against IaC state and write a remediation plan
    Reconcile {
        /// Inventory file produced by `scan`
        #[arg(short, long, default_value = "inventory.json")]
        inventory: PathBuf,

        #[command(flatten)]
        state: StateArgs,
    },

    /// Scan, then reconcile the fresh inventory
    Run {
        #[command(flatten)]
        scan: ScanArgs,

        /// Inventory file to write
        #[arg(short, long, default_value = "inventory.json")]
        inventory: PathBuf,

        #[command(flatten)]
        state: StateArgs,
    },

    /// Manage the on-disk probe cache
    Cache {
        #[command(subcommand)]
        command: CacheSubcommands,
    },
}

#[derive(Subcommand)]
enum CacheSubcommands {
    /// Remove expired and unreadable entries
    Prune,

    /// Remove every entry
    Clear,
}

#[derive(Args)]
struct ScanArgs {
    /// Account ids to scan; disables organization discovery
    #[arg(long, value_delimiter = ',')]
    accounts: Vec<String>,

    /// Regions to scan
    #[arg(long, value_delimiter = ',')]
    regions: Vec<String>,

    /// Service kinds to scan (e.g. s3_buckets,vpcs)
    #[arg(long, value_delimiter = ',')]
    services: Vec<String>,

    /// Maximum number of probes running at once
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Cache entry lifetime in seconds
    #[arg(long)]
    ttl: Option<u64>,

    /// Always call the provider, ignoring and not writing the cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Args)]
struct StateArgs {
    /// State file to read (repeatable)
    #[arg(long = "state")]
    state_files: Vec<PathBuf>,

    /// Directory searched recursively for *.tfstate files (repeatable)
    #[arg(long = "state-dir")]
    state_dirs: Vec<PathBuf>,

    /// Working directory to run `state pull` in (repeatable)
    #[arg(long = "state-pull")]
    pull_dirs: Vec<PathBuf>,

    /// Plan format
    #[arg(long, value_enum, default_value_t = PlanFormat::Commands)]
    format: PlanFormat,

    /// IaC binary used for `state pull` and in import commands
    #[arg(long)]
    iac_binary: Option<String>,

    /// Plan file to write (defaults to remediation-plan.<ext>)
    #[arg(long)]
    plan_output: Option<PathBuf>,
}

impl ScanArgs {
    fn into_overrides(self, config: Option<PathBuf>) -> ScanOverrides {
        ScanOverrides {
            config,
            accounts: self.accounts,
            regions: self.regions,
            services: self.services,
            max_parallel: self.max_parallel,
            ttl_seconds: self.ttl,
            no_cache: self.no_cache,
        }
    }
}

impl StateArgs {
    fn into_options(self, default_binary: String) -> ReconcileOptions {
        ReconcileOptions {
            state_files: self.state_files,
            state_dirs: self.state_dirs,
            pull_dirs: self.pull_dirs,
            format: self.format,
            output: self.plan_output,
            iac_binary: self.iac_binary.unwrap_or(default_binary),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let ctx = Context::new();
    let config_path = cli.config;

    match cli.command {
        Commands::Scan { scan, output } => {
            ScanCommand::execute(&ctx, &scan.into_overrides(config_path), Some(output.as_path()))?;
        }
        Commands::Reconcile { inventory, state } => {
            let config = config::ScanConfig::load(&*ctx.fs, config_path.as_deref())?;
            ReconcileCommand::execute(&ctx, &inventory, &state.into_options(config.iac_binary))?;
        }
        Commands::Run {
            scan,
            inventory,
            state,
        } => {
            // empty binary defers to the config file
            RunCommand::execute(
                &ctx,
                &scan.into_overrides(config_path),
                Some(inventory.as_path()),
                &state.into_options(String::new()),
            )?;
        }
        Commands::Cache { command } => match command {
            CacheSubcommands::Prune => CacheCommand::execute_prune(&ctx, config_path.as_deref())?,
            CacheSubcommands::Clear => CacheCommand::execute_clear(&ctx, config_path.as_deref())?,
        },
    }

    Ok(())
}
