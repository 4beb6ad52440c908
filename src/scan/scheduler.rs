//! Bounded-concurrency fan-out of probes over scan targets.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::target::ScanTarget;
use crate::cache::ScanCache;
use crate::error::ProbeError;
use crate::probes::{CloudApi, ProbeRegistry, ResourceRecord, ServiceProbe};

/// How a target's records were obtained
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// Fetched from the provider in full
    Live,
    /// Served from the cache, no provider call made
    Cached,
    /// Fetched from the provider, but pagination stopped early
    Partial,
    /// Probe failed; records are empty
    Failed(ProbeError),
}

/// Outcome of one scan target
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub records: Vec<ResourceRecord>,
    pub status: TaskStatus,
}

impl TaskResult {
    fn failed(error: ProbeError) -> Self {
        Self {
            records: Vec::new(),
            status: TaskStatus::Failed(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, TaskStatus::Failed(_))
    }
}

/// Runs probes for a set of targets under a shared concurrency bound
pub struct Scheduler {
    registry: Arc<ProbeRegistry>,
    api: Arc<dyn CloudApi>,
    cache: Option<Arc<ScanCache>>,
    max_parallel: usize,
}

impl Scheduler {
    pub fn new(
        registry: Arc<ProbeRegistry>,
        api: Arc<dyn CloudApi>,
        cache: Option<Arc<ScanCache>>,
        max_parallel: usize,
    ) -> Self {
        Self {
            registry,
            api,
            cache,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Run every target and collect one result per target.
    ///
    /// Targets are grouped per account; each account's results are merged
    /// only once all of its tasks have finished. Accounts run side by side
    /// and share the same permit pool.
    pub async fn schedule(&self, targets: Vec<ScanTarget>) -> BTreeMap<ScanTarget, TaskResult> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));

        let mut by_account: BTreeMap<String, Vec<ScanTarget>> = BTreeMap::new();
        for target in targets {
            by_account
                .entry(target.account_id.clone())
                .or_default()
                .push(target);
        }

        let account_runs = by_account
            .into_iter()
            .map(|(account_id, targets)| self.run_account(account_id, targets, semaphore.clone()));

        let mut results = BTreeMap::new();
        for account_results in join_all(account_runs).await {
            results.extend(account_results);
        }

        results
    }

    async fn run_account(
        &self,
        account_id: String,
        targets: Vec<ScanTarget>,
        semaphore: Arc<Semaphore>,
    ) -> Vec<(ScanTarget, TaskResult)> {
        let mut results = Vec::new();
        let mut handles = Vec::new();

        for target in targets {
            let probe = match self.registry.get(target.service_kind) {
                Ok(probe) => probe,
                Err(e) => {
                    warn!("{}: {}", target, e);
                    results.push((target, TaskResult::failed(ProbeError::Internal(e.to_string()))));
                    continue;
                }
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    results.push((target, TaskResult::failed(ProbeError::Internal(e.to_string()))));
                    continue;
                }
            };

            let api = self.api.clone();
            let cache = self.cache.clone();
            let task_target = target.clone();

            let handle = tokio::spawn(async move {
                // Cache I/O and provider calls both block
                let result = tokio::task::spawn_blocking(move || {
                    run_target(probe.as_ref(), api.as_ref(), cache.as_deref(), &task_target)
                })
                .await;

                drop(permit);

                result.map_err(|e| ProbeError::Internal(format!("probe task panicked: {}", e)))
            });

            handles.push((target, handle));
        }

        for (target, handle) in handles {
            let result = match handle.await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!("{}: {}", target, e);
                    TaskResult::failed(e)
                }
                Err(e) => {
                    warn!("{}: task failed: {}", target, e);
                    TaskResult::failed(ProbeError::Internal(e.to_string()))
                }
            };
            results.push((target, result));
        }

        let failed = results.iter().filter(|(_, r)| r.is_failed()).count();
        info!(
            "Account {} finished: {} target(s), {} failed",
            account_id,
            results.len(),
            failed
        );

        results
    }
}

/// Serve one target from the cache, or probe it and cache a complete result
fn run_target(
    probe: &dyn ServiceProbe,
    api: &dyn CloudApi,
    cache: Option<&ScanCache>,
    target: &ScanTarget,
) -> TaskResult {
    if let Some(cache) = cache
        && let Some(entry) = cache.get(target)
    {
        debug!("{}: cache hit", target);
        return TaskResult {
            records: entry.records,
            status: TaskStatus::Cached,
        };
    }

    match probe.probe(api, target) {
        Ok(output) if output.complete => {
            if let Some(cache) = cache {
                cache.put(target, &output.records);
            }
            TaskResult {
                records: output.records,
                status: TaskStatus::Live,
            }
        }
        Ok(output) => TaskResult {
            records: output.records,
            status: TaskStatus::Partial,
        },
        Err(e) => {
            warn!("{}: {}", target, e);
            TaskResult::failed(e)
        }
    }
}
