//! Account resolution and pre-scan setup checks.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::{AccountConfig, ScanConfig};
use crate::error::SetupError;
use crate::probes::CloudApi;
use crate::probes::api::ApiRequest;
use crate::probes::kind::GLOBAL_REGION;
use crate::probes::paginate::collect_pages;
use crate::traits::CommandExecutor;

/// An account that will be scanned
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAccount {
    pub id: String,
    pub name: Option<String>,
    pub profile: Option<String>,
}

impl From<&AccountConfig> for ResolvedAccount {
    fn from(account: &AccountConfig) -> Self {
        Self {
            id: account.id.clone(),
            name: account.name.clone(),
            profile: account.profile.clone(),
        }
    }
}

/// Account id -> CLI profile, for accounts that have one
pub fn profile_map(accounts: &[ResolvedAccount]) -> HashMap<String, String> {
    accounts
        .iter()
        .filter_map(|a| a.profile.clone().map(|p| (a.id.clone(), p)))
        .collect()
}

fn organization_request(operation: &'static str, paginated: bool, token: Option<&str>) -> ApiRequest {
    ApiRequest {
        // Organization calls run with the default credentials
        account_id: String::new(),
        region: GLOBAL_REGION.to_string(),
        service: "organizations",
        operation,
        args: Vec::new(),
        paginated,
        starting_token: token.map(|t| t.to_string()),
    }
}

/// Determine the account set: configured accounts first, then any active
/// accounts the organization listing adds.
pub fn resolve_accounts(config: &ScanConfig, api: &dyn CloudApi) -> Result<Vec<ResolvedAccount>, SetupError> {
    let mut accounts: Vec<ResolvedAccount> = config.accounts.iter().map(ResolvedAccount::from).collect();

    if config.discover_accounts {
        let pages = collect_pages(
            |token| api.call(&organization_request("list-accounts", true, token)),
            usize::MAX,
            "organizations list-accounts",
        )
        .map_err(|e| SetupError::MissingCredentials {
            account: "organization".to_string(),
            message: e.to_string(),
        })?;

        if !pages.complete {
            warn!("Account listing was cut short; scanning the accounts found so far");
        }

        let listed = pages
            .bodies
            .iter()
            .filter_map(|body| body.get("Accounts").and_then(|a| a.as_array()))
            .flatten();

        for account in listed {
            let Some(id) = account.get("Id").and_then(|v| v.as_str()) else {
                continue;
            };

            if account.get("Status").and_then(|v| v.as_str()) != Some("ACTIVE") {
                debug!("Skipping inactive account {}", id);
                continue;
            }

            if accounts.iter().any(|a| a.id == id) {
                continue;
            }

            accounts.push(ResolvedAccount {
                id: id.to_string(),
                name: account
                    .get("Name")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string()),
                profile: config
                    .profile_template
                    .as_ref()
                    .map(|t| t.replace("{account_id}", id)),
            });
        }
    }

    accounts.sort_by(|a, b| a.id.cmp(&b.id));

    if accounts.is_empty() {
        return Err(SetupError::InvalidConfig("no accounts to scan".to_string()));
    }

    info!("Resolved {} account(s)", accounts.len());
    Ok(accounts)
}

/// Organization id from configuration, or from the organization API
pub fn resolve_org_id(config: &ScanConfig, api: &dyn CloudApi) -> Option<String> {
    if config.org_id.is_some() || !config.discover_accounts {
        return config.org_id.clone();
    }

    match api.call(&organization_request("describe-organization", false, None)) {
        Ok(page) => page
            .body
            .get("Organization")
            .and_then(|o| o.get("Id"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        Err(e) => {
            warn!("Could not read organization id: {}", e);
            None
        }
    }
}

/// Make sure the provider CLI runs at all
pub fn check_cli(command: &dyn CommandExecutor, cli: &str) -> Result<(), SetupError> {
    let output = command
        .execute(cli, &["--version".to_string()], &[], None)
        .map_err(|e| SetupError::CliUnavailable(format!("{}: {}", cli, e)))?;

    if !output.status.success() {
        return Err(SetupError::CliUnavailable(format!(
            "{} --version exited with {}",
            cli, output.status
        )));
    }

    debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
    Ok(())
}

/// Confirm every account has working credentials
pub fn check_credentials(api: &dyn CloudApi, accounts: &[ResolvedAccount]) -> Result<(), SetupError> {
    for account in accounts {
        let request = ApiRequest {
            account_id: account.id.clone(),
            region: GLOBAL_REGION.to_string(),
            service: "sts",
            operation: "get-caller-identity",
            args: Vec::new(),
            paginated: false,
            starting_token: None,
        };

        let page = api.call(&request).map_err(|e| SetupError::MissingCredentials {
            account: account.id.clone(),
            message: e.to_string(),
        })?;

        if let Some(caller) = page.body.get("Account").and_then(|v| v.as_str())
            && caller != account.id
        {
            warn!(
                "Credentials for account {} resolve to account {}",
                account.id, caller
            );
        }
    }

    Ok(())
}
