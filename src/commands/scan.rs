use anyhow::{Context as AnyhowContext, Result};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::accounts::{self, ResolvedAccount};
use crate::cache::{FileCacheStore, ScanCache, SystemClock};
use crate::config::{AccountConfig, ScanConfig};
use crate::context::Context;
use crate::inventory::{InventoryDocument, build_document};
use crate::probes::{AwsCliApi, CloudApi, ProbeRegistry};
use crate::scan::{ScanTarget, Scheduler, TaskResult, TaskStatus, enumerate_targets};

/// Inventory file written when `--output` is not given
pub const DEFAULT_INVENTORY_FILE: &str = "inventory.json";

/// Command-line overrides applied on top of the config file
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub config: Option<PathBuf>,
    pub accounts: Vec<String>,
    pub regions: Vec<String>,
    pub services: Vec<String>,
    pub max_parallel: Option<usize>,
    pub ttl_seconds: Option<u64>,
    pub no_cache: bool,
}

impl ScanOverrides {
    /// Load the config file and apply the overrides; validation errors are
    /// returned as `SetupError`s inside the anyhow chain
    pub fn resolve_config(&self, ctx: &Context) -> Result<ScanConfig> {
        let mut config = ScanConfig::load(&*ctx.fs, self.config.as_deref())?;

        if !self.accounts.is_empty() {
            let configured = std::mem::take(&mut config.accounts);
            config.accounts = self
                .accounts
                .iter()
                .map(|id| {
                    configured
                        .iter()
                        .find(|a| &a.id == id)
                        .cloned()
                        .unwrap_or_else(|| AccountConfig {
                            id: id.clone(),
                            name: None,
                            profile: None,
                        })
                })
                .collect();
            config.discover_accounts = false;
        }

        if !self.regions.is_empty() {
            config.regions = self.regions.clone();
        }

        if !self.services.is_empty() {
            config.services = self.services.clone();
        }

        if let Some(max_parallel) = self.max_parallel {
            config.max_parallel = max_parallel;
        }

        if let Some(ttl) = self.ttl_seconds {
            config.cache.ttl_seconds = ttl;
        }

        if self.no_cache {
            config.cache.enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}

pub struct ScanCommand;

impl ScanCommand {
    /// Execute the scan command
    pub fn execute(ctx: &Context, overrides: &ScanOverrides, output: Option<&Path>) -> Result<()> {
        let config = overrides.resolve_config(ctx)?;
        let inventory = Self::scan(ctx, &config)?;

        let output_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY_FILE));
        inventory.save(&*ctx.fs, &output_path)?;

        ctx.output.blank();
        ctx.output
            .success(&format!("Inventory written to {}", output_path.display()));

        Ok(())
    }

    /// Run the full scan and print its report
    pub fn scan(ctx: &Context, config: &ScanConfig) -> Result<InventoryDocument> {
        ctx.output.section("Cloud Inventory Scan");

        accounts::check_cli(&*ctx.command, &config.provider.cli)?;
        ctx.output.status_check(&format!("{} CLI", config.provider.cli), true);

        let setup_api = AwsCliApi::new(ctx.command.clone(), config.provider.clone(), HashMap::new());
        let accounts = accounts::resolve_accounts(config, &setup_api)?;
        let org_id = accounts::resolve_org_id(config, &setup_api);

        let api: Arc<dyn CloudApi> = Arc::new(AwsCliApi::new(
            ctx.command.clone(),
            config.provider.clone(),
            accounts::profile_map(&accounts),
        ));
        accounts::check_credentials(api.as_ref(), &accounts)?;
        ctx.output
            .status_check(&format!("Credentials for {} account(s)", accounts.len()), true);
        ctx.output.blank();

        let account_ids: Vec<String> = accounts.iter().map(|a| a.id.clone()).collect();
        let targets = enumerate_targets(&account_ids, &config.regions, &config.service_kinds()?);

        ctx.output.key_value("Accounts", &account_ids.len().to_string());
        ctx.output.key_value("Regions", &config.regions.join(", "));
        ctx.output.key_value("Probes", &targets.len().to_string());
        ctx.output
            .key_value("Max parallel", &config.max_parallel.to_string());

        let cache = Self::build_cache(ctx, config)?;
        let scheduler = Scheduler::new(
            Arc::new(ProbeRegistry::with_defaults(config.provider.max_pages)),
            api,
            cache,
            config.max_parallel,
        );

        let started = Instant::now();
        let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        let results = runtime.block_on(scheduler.schedule(targets));
        let duration = started.elapsed().as_secs_f64();

        info!("Scan finished in {:.1}s", duration);

        let names = account_names(&accounts);
        let inventory = build_document(&results, &names, org_id, Utc::now(), duration);

        Self::report(ctx, &inventory, &results);

        Ok(inventory)
    }

    fn build_cache(ctx: &Context, config: &ScanConfig) -> Result<Option<Arc<ScanCache>>> {
        if !config.cache.enabled {
            return Ok(None);
        }

        let dir = config.cache.resolve_dir()?;
        let cache = ScanCache::new(
            Arc::new(SystemClock),
            config.cache.ttl_seconds,
            config.cache.bucket_seconds,
        )
        .with_backing(Arc::new(FileCacheStore::new(ctx.fs.clone(), dir)));

        Ok(Some(Arc::new(cache)))
    }

    fn report(ctx: &Context, inventory: &InventoryDocument, results: &BTreeMap<ScanTarget, TaskResult>) {
        let stats = &inventory.metadata.probe_stats;

        ctx.output.subsection("Resources");
        for (category, count) in inventory.category_counts() {
            ctx.output.key_value(category.as_str(), &count.to_string());
        }
        ctx.output
            .key_value_highlight("Total", &inventory.total_resources().to_string());

        ctx.output.subsection("Probes");
        ctx.output
            .key_value("Live calls", &stats.live_calls.to_string());
        ctx.output
            .key_value("Cache hits", &stats.cache_hits.to_string());
        ctx.output
            .key_value("Partial", &stats.partial_probes.to_string());
        ctx.output
            .key_value("Failed", &stats.failed_probes.to_string());
        ctx.output
            .key_value_highlight("Coverage", &format!("{:.1}%", stats.coverage_percent));

        for (target, result) in results {
            match &result.status {
                TaskStatus::Failed(e) => ctx.output.warning(&format!("{}: {}", target, e)),
                TaskStatus::Partial => {
                    ctx.output
                        .warning(&format!("{}: incomplete listing", target))
                }
                TaskStatus::Live | TaskStatus::Cached => {}
            }
        }

        if stats.failed_probes > 0 {
            ctx.output.warning(&format!(
                "{} of {} probes failed; their resources are missing from the inventory",
                stats.failed_probes, stats.total_probes
            ));
        }
    }
}

fn account_names(accounts: &[ResolvedAccount]) -> BTreeMap<String, String> {
    accounts
        .iter()
        .filter_map(|a| a.name.clone().map(|n| (a.id.clone(), n)))
        .collect()
}
