//! The seam between probes and the cloud provider.
//!
//! Probes describe *what* to list; a `CloudApi` performs one read-only page
//! request. The production implementation drives the `aws` CLI through the
//! injected `CommandExecutor`, so every call inherits the CLI's credential
//! chain and its per-call connect/read timeouts.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::kind::GLOBAL_REGION;
use crate::config::ProviderSettings;
use crate::error::ProbeError;
use crate::traits::CommandExecutor;

/// One page request against a provider list/describe operation
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub account_id: String,
    pub region: String,
    pub service: &'static str,
    pub operation: &'static str,
    pub args: Vec<String>,
    /// Ask for a bounded page and honour `starting_token`
    pub paginated: bool,
    pub starting_token: Option<String>,
}

/// One page of a provider response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiPage {
    pub body: Value,
    pub next_token: Option<String>,
}

/// Read-only access to the provider, one page per call
pub trait CloudApi: Send + Sync {
    fn call(&self, request: &ApiRequest) -> Result<ApiPage, ProbeError>;
}

/// `CloudApi` backed by the `aws` command-line tool
pub struct AwsCliApi {
    executor: Arc<dyn CommandExecutor>,
    settings: ProviderSettings,
    /// account id -> CLI profile
    profiles: HashMap<String, String>,
}

impl AwsCliApi {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        settings: ProviderSettings,
        profiles: HashMap<String, String>,
    ) -> Self {
        Self {
            executor,
            settings,
            profiles,
        }
    }

    fn effective_region<'a>(&'a self, region: &'a str) -> &'a str {
        if region == GLOBAL_REGION {
            &self.settings.global_region
        } else {
            region
        }
    }

    /// Build the full CLI argument list for a request
    pub fn build_args(&self, request: &ApiRequest) -> Vec<String> {
        let mut args = vec![request.service.to_string(), request.operation.to_string()];
        args.extend(request.args.iter().cloned());

        args.push("--region".to_string());
        args.push(self.effective_region(&request.region).to_string());
        args.push("--output".to_string());
        args.push("json".to_string());
        args.push("--no-cli-pager".to_string());
        args.push("--cli-connect-timeout".to_string());
        args.push(self.settings.connect_timeout_seconds.to_string());
        args.push("--cli-read-timeout".to_string());
        args.push(self.settings.read_timeout_seconds.to_string());

        if let Some(profile) = self.profiles.get(&request.account_id) {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }

        if request.paginated {
            args.push("--max-items".to_string());
            args.push(self.settings.page_size.to_string());

            if let Some(token) = &request.starting_token {
                args.push("--starting-token".to_string());
                args.push(token.clone());
            }
        }

        args
    }

    fn envs(&self) -> Vec<(String, String)> {
        vec![(
            "AWS_MAX_ATTEMPTS".to_string(),
            self.settings.max_attempts.to_string(),
        )]
    }
}

impl CloudApi for AwsCliApi {
    fn call(&self, request: &ApiRequest) -> Result<ApiPage, ProbeError> {
        let args = self.build_args(request);

        debug!(
            account = %request.account_id,
            region = %request.region,
            "{} {}",
            request.service,
            request.operation
        );

        let output = self
            .executor
            .execute(&self.settings.cli, &args, &self.envs(), None)
            .map_err(|e| ProbeError::Provider(e.to_string()))?;

        if !output.status.success() {
            return Err(ProbeError::from_stderr(&String::from_utf8_lossy(
                &output.stderr,
            )));
        }

        parse_page(&output.stdout)
    }
}

/// Decode CLI stdout into a page
fn parse_page(stdout: &[u8]) -> Result<ApiPage, ProbeError> {
    let text = String::from_utf8_lossy(stdout);

    // Some operations print nothing at all when there is nothing to list
    if text.trim().is_empty() {
        return Ok(ApiPage {
            body: Value::Object(Default::default()),
            next_token: None,
        });
    }

    let body: Value = serde_json::from_str(&text)
        .map_err(|e| ProbeError::MalformedResponse(e.to_string()))?;

    let next_token = body
        .get("NextToken")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string());

    Ok(ApiPage { body, next_token })
}

/// Scripted `CloudApi` for tests.
///
/// Pages are keyed by `(account, region, operation)` and served in order,
/// one per call; a scripted error is returned in place of a page.
#[cfg(test)]
pub struct MockCloudApi {
    pages: std::sync::Mutex<HashMap<(String, String, String), Vec<Result<Value, ProbeError>>>>,
    calls: std::sync::atomic::AtomicUsize,
    in_flight: std::sync::atomic::AtomicUsize,
    peak_in_flight: std::sync::atomic::AtomicUsize,
    delay: std::time::Duration,
    fallback: Option<Value>,
}

#[cfg(test)]
impl MockCloudApi {
    pub fn new() -> Self {
        Self {
            pages: std::sync::Mutex::new(HashMap::new()),
            calls: std::sync::atomic::AtomicUsize::new(0),
            in_flight: std::sync::atomic::AtomicUsize::new(0),
            peak_in_flight: std::sync::atomic::AtomicUsize::new(0),
            delay: std::time::Duration::ZERO,
            fallback: Some(serde_json::json!({})),
        }
    }

    /// Sleep inside every call, to make overlap observable
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail calls that have no scripted page instead of returning `{}`
    pub fn strict(mut self) -> Self {
        self.fallback = None;
        self
    }

    pub fn page(self, account: &str, region: &str, operation: &str, body: Value) -> Self {
        self.push(account, region, operation, Ok(body));
        self
    }

    pub fn error(self, account: &str, region: &str, operation: &str, error: ProbeError) -> Self {
        self.push(account, region, operation, Err(error));
        self
    }

    fn push(&self, account: &str, region: &str, operation: &str, item: Result<Value, ProbeError>) {
        self.pages
            .lock()
            .unwrap()
            .entry((account.to_string(), region.to_string(), operation.to_string()))
            .or_default()
            .push(item);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl CloudApi for MockCloudApi {
    fn call(&self, request: &ApiRequest) -> Result<ApiPage, ProbeError> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let key = (
            request.account_id.clone(),
            request.region.clone(),
            request.operation.to_string(),
        );
        let next = {
            let mut pages = self.pages.lock().unwrap();
            match pages.get_mut(&key) {
                Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
                _ => None,
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match next {
            Some(Ok(body)) => {
                let next_token = body
                    .get("NextToken")
                    .and_then(|t| t.as_str())
                    .map(|t| t.to_string());
                Ok(ApiPage { body, next_token })
            }
            Some(Err(e)) => Err(e),
            None => match &self.fallback {
                Some(body) => Ok(ApiPage {
                    body: body.clone(),
                    next_token: None,
                }),
                None => Err(ProbeError::Provider(format!(
                    "no scripted page for {:?}",
                    key
                ))),
            },
        }
    }
}
