use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::cache::{FileCacheStore, ScanCache, SystemClock};
use crate::config::ScanConfig;
use crate::context::Context;

pub struct CacheCommand;

impl CacheCommand {
    fn open(ctx: &Context, config_path: Option<&Path>) -> Result<(ScanCache, String)> {
        let config = ScanConfig::load(&*ctx.fs, config_path)?;
        let dir = config.cache.resolve_dir()?;
        let label = dir.display().to_string();

        let cache = ScanCache::new(
            Arc::new(SystemClock),
            config.cache.ttl_seconds,
            config.cache.bucket_seconds,
        )
        .with_backing(Arc::new(FileCacheStore::new(ctx.fs.clone(), dir)));

        Ok((cache, label))
    }

    /// Execute the cache prune command
    pub fn execute_prune(ctx: &Context, config_path: Option<&Path>) -> Result<()> {
        ctx.output.section("Cache Prune");

        let (cache, dir) = Self::open(ctx, config_path)?;
        ctx.output.key_value("Directory", &dir);

        let removed = cache.prune()?;
        ctx.output
            .success(&format!("Removed {} expired entr{}", removed, plural_y(removed)));

        Ok(())
    }

    /// Execute the cache clear command
    pub fn execute_clear(ctx: &Context, config_path: Option<&Path>) -> Result<()> {
        ctx.output.section("Cache Clear");

        let (cache, dir) = Self::open(ctx, config_path)?;
        ctx.output.key_value("Directory", &dir);

        let removed = cache.clear()?;
        ctx.output
            .success(&format!("Removed {} entr{}", removed, plural_y(removed)));

        Ok(())
    }
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 { "y" } else { "ies" }
}
