use serde::{Deserialize, Serialize};
use std::fmt;

/// Grouping used for the `services` level of the inventory document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Compute,
    Storage,
    Database,
    Networking,
    Containers,
    Security,
    Dns,
    Auth,
    Monitoring,
    Messaging,
    Frontend,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Compute => "compute",
            Category::Storage => "storage",
            Category::Database => "database",
            Category::Networking => "networking",
            Category::Containers => "containers",
            Category::Security => "security",
            Category::Dns => "dns",
            Category::Auth => "auth",
            Category::Monitoring => "monitoring",
            Category::Messaging => "messaging",
            Category::Frontend => "frontend",
        }
    }

    pub fn all() -> &'static [Category] {
        &[
            Category::Compute,
            Category::Storage,
            Category::Database,
            Category::Networking,
            Category::Containers,
            Category::Security,
            Category::Dns,
            Category::Auth,
            Category::Monitoring,
            Category::Messaging,
            Category::Frontend,
        ]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a service kind is scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Once per configured region
    Regional,
    /// Once per account, under the synthetic `global` region
    Global,
}

/// Name of the synthetic region that holds account-wide services
pub const GLOBAL_REGION: &str = "global";

/// Every resource kind the probe registry knows how to discover.
///
/// Serialized as the plural name used as the key in the inventory document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Ec2Instances,
    EksClusters,
    LambdaFunctions,
    DynamodbTables,
    RdsInstances,
    S3Buckets,
    Vpcs,
    LoadBalancers,
    ApiGateways,
    EcrRepositories,
    Secrets,
    KmsKeys,
    HostedZones,
    IamRoles,
    LogGroups,
    EventRules,
    SnsTopics,
    SqsQueues,
    AmplifyApps,
    CloudfrontDistributions,
}

impl ServiceKind {
    /// Plural name, as used in the inventory document and on the command line
    pub fn plural(&self) -> &'static str {
        match self {
            ServiceKind::Ec2Instances => "ec2_instances",
            ServiceKind::EksClusters => "eks_clusters",
            ServiceKind::LambdaFunctions => "lambda_functions",
            ServiceKind::DynamodbTables => "dynamodb_tables",
            ServiceKind::RdsInstances => "rds_instances",
            ServiceKind::S3Buckets => "s3_buckets",
            ServiceKind::Vpcs => "vpcs",
            ServiceKind::LoadBalancers => "load_balancers",
            ServiceKind::ApiGateways => "api_gateways",
            ServiceKind::EcrRepositories => "ecr_repositories",
            ServiceKind::Secrets => "secrets",
            ServiceKind::KmsKeys => "kms_keys",
            ServiceKind::HostedZones => "hosted_zones",
            ServiceKind::IamRoles => "iam_roles",
            ServiceKind::LogGroups => "log_groups",
            ServiceKind::EventRules => "event_rules",
            ServiceKind::SnsTopics => "sns_topics",
            ServiceKind::SqsQueues => "sqs_queues",
            ServiceKind::AmplifyApps => "amplify_apps",
            ServiceKind::CloudfrontDistributions => "cloudfront_distributions",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            ServiceKind::Ec2Instances | ServiceKind::LambdaFunctions => Category::Compute,
            ServiceKind::S3Buckets => Category::Storage,
            ServiceKind::DynamodbTables | ServiceKind::RdsInstances => Category::Database,
            ServiceKind::Vpcs | ServiceKind::LoadBalancers | ServiceKind::ApiGateways => {
                Category::Networking
            }
            ServiceKind::EksClusters | ServiceKind::EcrRepositories => Category::Containers,
            ServiceKind::Secrets | ServiceKind::KmsKeys => Category::Security,
            ServiceKind::HostedZones => Category::Dns,
            ServiceKind::IamRoles => Category::Auth,
            ServiceKind::LogGroups => Category::Monitoring,
            ServiceKind::EventRules | ServiceKind::SnsTopics | ServiceKind::SqsQueues => {
                Category::Messaging
            }
            ServiceKind::AmplifyApps | ServiceKind::CloudfrontDistributions => Category::Frontend,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            ServiceKind::S3Buckets
            | ServiceKind::HostedZones
            | ServiceKind::IamRoles
            | ServiceKind::CloudfrontDistributions => Scope::Global,
            _ => Scope::Regional,
        }
    }

    pub fn is_global(&self) -> bool {
        self.scope() == Scope::Global
    }

    /// Parse from the plural name (case-insensitive)
    pub fn from_plural(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::all().iter().copied().find(|kind| kind.plural() == s)
    }

    pub fn all() -> &'static [ServiceKind] {
        &[
            ServiceKind::Ec2Instances,
            ServiceKind::EksClusters,
            ServiceKind::LambdaFunctions,
            ServiceKind::DynamodbTables,
            ServiceKind::RdsInstances,
            ServiceKind::S3Buckets,
            ServiceKind::Vpcs,
            ServiceKind::LoadBalancers,
            ServiceKind::ApiGateways,
            ServiceKind::EcrRepositories,
            ServiceKind::Secrets,
            ServiceKind::KmsKeys,
            ServiceKind::HostedZones,
            ServiceKind::IamRoles,
            ServiceKind::LogGroups,
            ServiceKind::EventRules,
            ServiceKind::SnsTopics,
            ServiceKind::SqsQueues,
            ServiceKind::AmplifyApps,
            ServiceKind::CloudfrontDistributions,
        ]
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}
