//! Resource Type Mapper
//!
//! One table links each discovered service kind to its IaC resource type,
//! the attributes that identify an instance of that type, and the priority
//! tier of an unmanaged instance. Both the state loader and the diff engine
//! read identifiers through this table, so the two sides always agree.

use serde_json::Value;
use std::collections::HashMap;

use lazy_static::lazy_static;

use super::priority::Tier;
use crate::probes::{ResourceRecord, ServiceKind};

/// Attributes tried, in order, to identify an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierRule(pub &'static [&'static str]);

/// Rule used for IaC types that are not in the table
pub const FALLBACK_RULE: IdentifierRule = IdentifierRule(&["arn", "id"]);

impl IdentifierRule {
    /// First non-empty string attribute named by the rule
    pub fn extract<'a>(&self, record: &'a ResourceRecord) -> Option<&'a str> {
        self.0
            .iter()
            .find_map(|key| record.attr_str(key).filter(|s| !s.is_empty()))
    }

    /// Same as `extract`, for attribute maps coming straight out of JSON
    pub fn extract_json<'a>(&self, attributes: &'a serde_json::Map<String, Value>) -> Option<&'a str> {
        self.0.iter().find_map(|key| {
            attributes
                .get(*key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        })
    }
}

/// One row of the mapping table
#[derive(Debug, Clone, Copy)]
pub struct TypeMapping {
    pub kind: ServiceKind,
    pub iac_type: &'static str,
    pub identifier: IdentifierRule,
    pub tier: Tier,
}

impl TypeMapping {
    const fn new(kind: ServiceKind, iac_type: &'static str, identifier: &'static [&'static str], tier: Tier) -> Self {
        Self {
            kind,
            iac_type,
            identifier: IdentifierRule(identifier),
            tier,
        }
    }
}

const MAPPINGS: &[TypeMapping] = &[
    TypeMapping::new(ServiceKind::Ec2Instances, "aws_instance", &["id"], Tier::Medium),
    TypeMapping::new(ServiceKind::EksClusters, "aws_eks_cluster", &["name"], Tier::Medium),
    TypeMapping::new(ServiceKind::LambdaFunctions, "aws_lambda_function", &["function_name", "arn"], Tier::Medium),
    TypeMapping::new(ServiceKind::DynamodbTables, "aws_dynamodb_table", &["name"], Tier::High),
    TypeMapping::new(ServiceKind::RdsInstances, "aws_db_instance", &["identifier"], Tier::High),
    TypeMapping::new(ServiceKind::S3Buckets, "aws_s3_bucket", &["bucket"], Tier::High),
    TypeMapping::new(ServiceKind::Vpcs, "aws_vpc", &["id"], Tier::High),
    TypeMapping::new(ServiceKind::LoadBalancers, "aws_lb", &["arn"], Tier::High),
    TypeMapping::new(ServiceKind::ApiGateways, "aws_api_gateway_rest_api", &["id"], Tier::Medium),
    TypeMapping::new(ServiceKind::EcrRepositories, "aws_ecr_repository", &["name"], Tier::Medium),
    TypeMapping::new(ServiceKind::Secrets, "aws_secretsmanager_secret", &["arn"], Tier::High),
    TypeMapping::new(ServiceKind::KmsKeys, "aws_kms_key", &["key_id"], Tier::High),
    TypeMapping::new(ServiceKind::HostedZones, "aws_route53_zone", &["zone_id"], Tier::High),
    TypeMapping::new(ServiceKind::IamRoles, "aws_iam_role", &["name"], Tier::High),
    TypeMapping::new(ServiceKind::LogGroups, "aws_cloudwatch_log_group", &["name"], Tier::Low),
    TypeMapping::new(ServiceKind::EventRules, "aws_cloudwatch_event_rule", &["name"], Tier::Low),
    TypeMapping::new(ServiceKind::SnsTopics, "aws_sns_topic", &["arn"], Tier::Low),
    TypeMapping::new(ServiceKind::SqsQueues, "aws_sqs_queue", &["url", "id"], Tier::Low),
    TypeMapping::new(ServiceKind::AmplifyApps, "aws_amplify_app", &["id"], Tier::Medium),
    TypeMapping::new(
        ServiceKind::CloudfrontDistributions,
        "aws_cloudfront_distribution",
        &["id"],
        Tier::Medium,
    ),
];

lazy_static! {
    static ref BY_KIND: HashMap<ServiceKind, &'static TypeMapping> =
        MAPPINGS.iter().map(|m| (m.kind, m)).collect();
    static ref BY_IAC_TYPE: HashMap<&'static str, &'static TypeMapping> =
        MAPPINGS.iter().map(|m| (m.iac_type, m)).collect();
}

/// Mapping for a discovered kind; `None` means the kind is not reconciled
pub fn for_kind(kind: ServiceKind) -> Option<&'static TypeMapping> {
    BY_KIND.get(&kind).copied()
}

/// Mapping for an IaC resource type
pub fn for_iac_type(iac_type: &str) -> Option<&'static TypeMapping> {
    BY_IAC_TYPE.get(iac_type).copied()
}

/// Identifier rule for an IaC type, falling back to `arn` then `id`
pub fn identifier_rule(iac_type: &str) -> IdentifierRule {
    for_iac_type(iac_type)
        .map(|m| m.identifier)
        .unwrap_or(FALLBACK_RULE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_kind_is_mapped_once() {
        for kind in ServiceKind::all() {
            assert!(for_kind(*kind).is_some(), "{} is unmapped", kind);
        }
        assert_eq!(BY_IAC_TYPE.len(), MAPPINGS.len());
    }

    #[test]
    fn test_bidirectional() {
        let lambda = for_kind(ServiceKind::LambdaFunctions).unwrap();
        assert_eq!(lambda.iac_type, "aws_lambda_function");
        assert_eq!(
            for_iac_type("aws_lambda_function").unwrap().kind,
            ServiceKind::LambdaFunctions
        );
        assert!(for_iac_type("aws_route53_record").is_none());
    }

    #[test]
    fn test_identifier_rule_order() {
        let rule = identifier_rule("aws_lambda_function");
        let arn_only = ResourceRecord::new(ServiceKind::LambdaFunctions, "f")
            .with_attr("arn", Some("arn:aws:lambda:us-east-1:1:function:f"));
        let both = arn_only.clone().with_attr("function_name", Some("f"));
        assert_eq!(rule.extract(&both), Some("f"));

        assert_eq!(
            rule.extract(&arn_only),
            Some("arn:aws:lambda:us-east-1:1:function:f")
        );
    }

    #[test]
    fn test_fallback_rule() {
        let rule = identifier_rule("aws_route53_record");
        assert_eq!(rule, FALLBACK_RULE);

        let attrs = json!({"id": "Z1_www_A", "arn": ""});
        assert_eq!(rule.extract_json(attrs.as_object().unwrap()), Some("Z1_www_A"));

        let none = json!({"name": "www"});
        assert_eq!(rule.extract_json(none.as_object().unwrap()), None);
    }
}
