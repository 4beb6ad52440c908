//! The built-in probe catalog.
//!
//! Every supported kind is a `ListProbe` driven by a `ProbeSpec`: which CLI
//! operation to call, where the items live in the response, and how to turn
//! one item into a `ResourceRecord`. Normalizers emit attributes under the
//! IaC attribute names of the mapped resource type.

use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use super::api::{ApiRequest, CloudApi};
use super::kind::ServiceKind;
use super::paginate::collect_pages;
use super::record::ResourceRecord;
use super::{ProbeOutput, ServiceProbe};
use crate::error::ProbeError;
use crate::scan::target::ScanTarget;

/// Declarative description of one list operation
#[derive(Clone, Copy)]
pub struct ProbeSpec {
    pub kind: ServiceKind,
    pub service: &'static str,
    pub operation: &'static str,
    pub args: &'static [&'static str],
    /// Path to the item array inside each page
    pub items_path: &'static [&'static str],
    /// Field holding a nested array to flatten each item into
    pub flatten: Option<&'static str>,
    pub paginated: bool,
    /// Item -> record; `None` skips the item
    pub normalize: fn(&Value) -> Option<ResourceRecord>,
}

/// Generic probe executing a `ProbeSpec`
pub struct ListProbe {
    spec: ProbeSpec,
    max_pages: usize,
}

impl ListProbe {
    pub fn new(spec: ProbeSpec, max_pages: usize) -> Self {
        Self { spec, max_pages }
    }

    fn items<'a>(&self, body: &'a Value) -> Result<Vec<&'a Value>, ProbeError> {
        let mut node = body;
        for key in self.spec.items_path {
            match node.get(key) {
                Some(next) => node = next,
                None => return Ok(Vec::new()),
            }
        }

        let array = node.as_array().ok_or_else(|| {
            ProbeError::MalformedResponse(format!(
                "{} {}: expected an array at {}",
                self.spec.service,
                self.spec.operation,
                self.spec.items_path.join(".")
            ))
        })?;

        let items = match self.spec.flatten {
            None => array.iter().collect(),
            Some(field) => array
                .iter()
                .filter_map(|item| item.get(field).and_then(|v| v.as_array()))
                .flatten()
                .collect(),
        };

        Ok(items)
    }
}

impl ServiceProbe for ListProbe {
    fn kind(&self) -> ServiceKind {
        self.spec.kind
    }

    fn probe(&self, api: &dyn CloudApi, target: &ScanTarget) -> Result<ProbeOutput, ProbeError> {
        let context = target.to_string();
        let pages = collect_pages(
            |token| {
                api.call(&ApiRequest {
                    account_id: target.account_id.clone(),
                    region: target.region.clone(),
                    service: self.spec.service,
                    operation: self.spec.operation,
                    args: self.spec.args.iter().map(|a| a.to_string()).collect(),
                    paginated: self.spec.paginated,
                    starting_token: token.map(|t| t.to_string()),
                })
            },
            if self.spec.paginated { self.max_pages } else { 1 },
            &context,
        )?;

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut complete = pages.complete;

        for (index, body) in pages.bodies.iter().enumerate() {
            let items = match self.items(body) {
                Ok(items) => items,
                Err(e) if index > 0 => {
                    warn!("{}: page {} unusable, keeping earlier pages: {}", context, index + 1, e);
                    complete = false;
                    break;
                }
                Err(e) => return Err(e),
            };

            for item in items {
                if let Some(record) = (self.spec.normalize)(item)
                    && seen.insert(record.native_id.clone())
                {
                    records.push(record);
                }
            }
        }

        Ok(ProbeOutput { records, complete })
    }
}

fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// Value of the `Name` tag in EC2-style `Tags: [{Key, Value}]`
fn name_tag(item: &Value) -> Option<&str> {
    item.get("Tags")?
        .as_array()?
        .iter()
        .find(|tag| tag.get("Key").and_then(|k| k.as_str()) == Some("Name"))
        .and_then(|tag| tag.get("Value"))
        .and_then(|v| v.as_str())
}

/// Last `/`- or `:`-separated segment of an ARN or URL
fn last_segment(value: &str) -> &str {
    value
        .rsplit(|c| c == '/' || c == ':')
        .find(|s| !s.is_empty())
        .unwrap_or(value)
}

fn ec2_instance(item: &Value) -> Option<ResourceRecord> {
    let id = str_field(item, "InstanceId")?;
    let state = item
        .get("State")
        .and_then(|s| s.get("Name"))
        .and_then(|n| n.as_str());

    if state == Some("terminated") {
        return None;
    }

    Some(
        ResourceRecord::new(ServiceKind::Ec2Instances, id)
            .with_attr("id", Some(id))
            .with_attr("name", name_tag(item))
            .with_attr("instance_type", str_field(item, "InstanceType"))
            .with_attr("instance_state", state),
    )
}

fn eks_cluster(item: &Value) -> Option<ResourceRecord> {
    let name = item.as_str()?;
    Some(ResourceRecord::new(ServiceKind::EksClusters, name).with_attr("name", Some(name)))
}

fn lambda_function(item: &Value) -> Option<ResourceRecord> {
    let name = str_field(item, "FunctionName")?;
    Some(
        ResourceRecord::new(ServiceKind::LambdaFunctions, name)
            .with_attr("function_name", Some(name))
            .with_attr("arn", str_field(item, "FunctionArn"))
            .with_attr("runtime", str_field(item, "Runtime")),
    )
}

fn dynamodb_table(item: &Value) -> Option<ResourceRecord> {
    let name = item.as_str()?;
    Some(ResourceRecord::new(ServiceKind::DynamodbTables, name).with_attr("name", Some(name)))
}

fn rds_instance(item: &Value) -> Option<ResourceRecord> {
    let identifier = str_field(item, "DBInstanceIdentifier")?;
    Some(
        ResourceRecord::new(ServiceKind::RdsInstances, identifier)
            .with_attr("identifier", Some(identifier))
            .with_attr("arn", str_field(item, "DBInstanceArn"))
            .with_attr("engine", str_field(item, "Engine")),
    )
}

fn s3_bucket(item: &Value) -> Option<ResourceRecord> {
    let name = str_field(item, "Name")?;
    Some(
        ResourceRecord::new(ServiceKind::S3Buckets, name)
            .with_attr("bucket", Some(name))
            .with_attr("creation_date", str_field(item, "CreationDate")),
    )
}

fn vpc(item: &Value) -> Option<ResourceRecord> {
    let id = str_field(item, "VpcId")?;
    Some(
        ResourceRecord::new(ServiceKind::Vpcs, id)
            .with_attr("id", Some(id))
            .with_attr("name", name_tag(item))
            .with_attr("cidr_block", str_field(item, "CidrBlock"))
            .with_value("is_default", item.get("IsDefault")),
    )
}

fn load_balancer(item: &Value) -> Option<ResourceRecord> {
    let arn = str_field(item, "LoadBalancerArn")?;
    Some(
        ResourceRecord::new(ServiceKind::LoadBalancers, arn)
            .with_attr("arn", Some(arn))
            .with_attr("name", str_field(item, "LoadBalancerName"))
            .with_attr("load_balancer_type", str_field(item, "Type")),
    )
}

fn rest_api(item: &Value) -> Option<ResourceRecord> {
    let id = str_field(item, "id")?;
    Some(
        ResourceRecord::new(ServiceKind::ApiGateways, id)
            .with_attr("id", Some(id))
            .with_attr("name", str_field(item, "name")),
    )
}

fn ecr_repository(item: &Value) -> Option<ResourceRecord> {
    let name = str_field(item, "repositoryName")?;
    Some(
        ResourceRecord::new(ServiceKind::EcrRepositories, name)
            .with_attr("name", Some(name))
            .with_attr("arn", str_field(item, "repositoryArn")),
    )
}

fn secret(item: &Value) -> Option<ResourceRecord> {
    let arn = str_field(item, "ARN")?;
    Some(
        ResourceRecord::new(ServiceKind::Secrets, arn)
            .with_attr("arn", Some(arn))
            .with_attr("name", str_field(item, "Name")),
    )
}

/// Customer-managed keys, found through their aliases
fn kms_alias(item: &Value) -> Option<ResourceRecord> {
    let alias = str_field(item, "AliasName")?;
    if alias.starts_with("alias/aws/") {
        return None;
    }

    let key_id = str_field(item, "TargetKeyId")?;
    Some(
        ResourceRecord::new(ServiceKind::KmsKeys, key_id)
            .with_attr("key_id", Some(key_id))
            .with_attr("name", Some(alias)),
    )
}

fn hosted_zone(item: &Value) -> Option<ResourceRecord> {
    let raw_id = str_field(item, "Id")?;
    let zone_id = raw_id.trim_start_matches("/hostedzone/");
    Some(
        ResourceRecord::new(ServiceKind::HostedZones, zone_id)
            .with_attr("zone_id", Some(zone_id))
            .with_attr("name", str_field(item, "Name").map(|n| n.trim_end_matches('.')))
            .with_value(
                "private_zone",
                item.get("Config").and_then(|c| c.get("PrivateZone")),
            ),
    )
}

fn iam_role(item: &Value) -> Option<ResourceRecord> {
    let name = str_field(item, "RoleName")?;

    // Service-linked roles are owned by AWS services
    if str_field(item, "Path").is_some_and(|p| p.starts_with("/aws-service-role/")) {
        return None;
    }

    Some(
        ResourceRecord::new(ServiceKind::IamRoles, name)
            .with_attr("name", Some(name))
            .with_attr("arn", str_field(item, "Arn")),
    )
}

fn log_group(item: &Value) -> Option<ResourceRecord> {
    let name = str_field(item, "logGroupName")?;
    Some(
        ResourceRecord::new(ServiceKind::LogGroups, name)
            .with_attr("name", Some(name))
            .with_attr("arn", str_field(item, "arn"))
            .with_value("retention_in_days", item.get("retentionInDays")),
    )
}

fn event_rule(item: &Value) -> Option<ResourceRecord> {
    // Rules created on behalf of other AWS services
    if str_field(item, "ManagedBy").is_some() {
        return None;
    }

    let name = str_field(item, "Name")?;
    Some(
        ResourceRecord::new(ServiceKind::EventRules, name)
            .with_attr("name", Some(name))
            .with_attr("arn", str_field(item, "Arn"))
            .with_attr("event_bus_name", str_field(item, "EventBusName")),
    )
}

fn sns_topic(item: &Value) -> Option<ResourceRecord> {
    let arn = str_field(item, "TopicArn")?;
    Some(
        ResourceRecord::new(ServiceKind::SnsTopics, arn)
            .with_attr("arn", Some(arn))
            .with_attr("name", Some(last_segment(arn))),
    )
}

fn sqs_queue(item: &Value) -> Option<ResourceRecord> {
    let url = item.as_str().filter(|s| !s.is_empty())?;
    Some(
        ResourceRecord::new(ServiceKind::SqsQueues, url)
            .with_attr("url", Some(url))
            .with_attr("name", Some(last_segment(url))),
    )
}

fn amplify_app(item: &Value) -> Option<ResourceRecord> {
    let app_id = str_field(item, "appId")?;
    Some(
        ResourceRecord::new(ServiceKind::AmplifyApps, app_id)
            .with_attr("id", Some(app_id))
            .with_attr("arn", str_field(item, "appArn"))
            .with_attr("name", str_field(item, "name")),
    )
}

fn cloudfront_distribution(item: &Value) -> Option<ResourceRecord> {
    let id = str_field(item, "Id")?;
    Some(
        ResourceRecord::new(ServiceKind::CloudfrontDistributions, id)
            .with_attr("id", Some(id))
            .with_attr("arn", str_field(item, "ARN"))
            .with_attr("domain_name", str_field(item, "DomainName")),
    )
}

/// Specs for every built-in kind
pub fn builtin_specs() -> Vec<ProbeSpec> {
    vec![
        ProbeSpec {
            kind: ServiceKind::Ec2Instances,
            service: "ec2",
            operation: "describe-instances",
            args: &[],
            items_path: &["Reservations"],
            flatten: Some("Instances"),
            paginated: true,
            normalize: ec2_instance,
        },
        ProbeSpec {
            kind: ServiceKind::EksClusters,
            service: "eks",
            operation: "list-clusters",
            args: &[],
            items_path: &["clusters"],
            flatten: None,
            paginated: true,
            normalize: eks_cluster,
        },
        ProbeSpec {
            kind: ServiceKind::LambdaFunctions,
            service: "lambda",
            operation: "list-functions",
            args: &[],
            items_path: &["Functions"],
            flatten: None,
            paginated: true,
            normalize: lambda_function,
        },
        ProbeSpec {
            kind: ServiceKind::DynamodbTables,
            service: "dynamodb",
            operation: "list-tables",
            args: &[],
            items_path: &["TableNames"],
            flatten: None,
            paginated: true,
            normalize: dynamodb_table,
        },
        ProbeSpec {
            kind: ServiceKind::RdsInstances,
            service: "rds",
            operation: "describe-db-instances",
            args: &[],
            items_path: &["DBInstances"],
            flatten: None,
            paginated: true,
            normalize: rds_instance,
        },
        ProbeSpec {
            kind: ServiceKind::S3Buckets,
            service: "s3api",
            operation: "list-buckets",
            args: &[],
            items_path: &["Buckets"],
            flatten: None,
            paginated: false,
            normalize: s3_bucket,
        },
        ProbeSpec {
            kind: ServiceKind::Vpcs,
            service: "ec2",
            operation: "describe-vpcs",
            args: &[],
            items_path: &["Vpcs"],
            flatten: None,
            paginated: true,
            normalize: vpc,
        },
        ProbeSpec {
            kind: ServiceKind::LoadBalancers,
            service: "elbv2",
            operation: "describe-load-balancers",
            args: &[],
            items_path: &["LoadBalancers"],
            flatten: None,
            paginated: true,
            normalize: load_balancer,
        },
        ProbeSpec {
            kind: ServiceKind::ApiGateways,
            service: "apigateway",
            operation: "get-rest-apis",
            args: &[],
            items_path: &["items"],
            flatten: None,
            paginated: true,
            normalize: rest_api,
        },
        ProbeSpec {
            kind: ServiceKind::EcrRepositories,
            service: "ecr",
            operation: "describe-repositories",
            args: &[],
            items_path: &["repositories"],
            flatten: None,
            paginated: true,
            normalize: ecr_repository,
        },
        ProbeSpec {
            kind: ServiceKind::Secrets,
            service: "secretsmanager",
            operation: "list-secrets",
            args: &[],
            items_path: &["SecretList"],
            flatten: None,
            paginated: true,
            normalize: secret,
        },
        ProbeSpec {
            kind: ServiceKind::KmsKeys,
            service: "kms",
            operation: "list-aliases",
            args: &[],
            items_path: &["Aliases"],
            flatten: None,
            paginated: true,
            normalize: kms_alias,
        },
        ProbeSpec {
            kind: ServiceKind::HostedZones,
            service: "route53",
            operation: "list-hosted-zones",
            args: &[],
            items_path: &["HostedZones"],
            flatten: None,
            paginated: true,
            normalize: hosted_zone,
        },
        ProbeSpec {
            kind: ServiceKind::IamRoles,
            service: "iam",
            operation: "list-roles",
            args: &[],
            items_path: &["Roles"],
            flatten: None,
            paginated: true,
            normalize: iam_role,
        },
        ProbeSpec {
            kind: ServiceKind::LogGroups,
            service: "logs",
            operation: "describe-log-groups",
            args: &[],
            items_path: &["logGroups"],
            flatten: None,
            paginated: true,
            normalize: log_group,
        },
        ProbeSpec {
            kind: ServiceKind::EventRules,
            service: "events",
            operation: "list-rules",
            args: &[],
            items_path: &["Rules"],
            flatten: None,
            paginated: true,
            normalize: event_rule,
        },
        ProbeSpec {
            kind: ServiceKind::SnsTopics,
            service: "sns",
            operation: "list-topics",
            args: &[],
            items_path: &["Topics"],
            flatten: None,
            paginated: true,
            normalize: sns_topic,
        },
        ProbeSpec {
            kind: ServiceKind::SqsQueues,
            service: "sqs",
            operation: "list-queues",
            args: &[],
            items_path: &["QueueUrls"],
            flatten: None,
            paginated: true,
            normalize: sqs_queue,
        },
        ProbeSpec {
            kind: ServiceKind::AmplifyApps,
            service: "amplify",
            operation: "list-apps",
            args: &[],
            items_path: &["apps"],
            flatten: None,
            paginated: true,
            normalize: amplify_app,
        },
        ProbeSpec {
            kind: ServiceKind::CloudfrontDistributions,
            service: "cloudfront",
            operation: "list-distributions",
            args: &[],
            items_path: &["DistributionList", "Items"],
            flatten: None,
            paginated: true,
            normalize: cloudfront_distribution,
        },
    ]
}
