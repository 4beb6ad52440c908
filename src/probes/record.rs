use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::kind::ServiceKind;

/// One discovered cloud resource, normalized out of the provider response.
///
/// Attribute keys follow the IaC attribute vocabulary of the mapped resource
/// type (`bucket`, `function_name`, `arn`, ...), so identifier extraction
/// reads the same keys here as it does from state documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub kind: ServiceKind,
    pub native_id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl ResourceRecord {
    pub fn new(kind: ServiceKind, native_id: impl Into<String>) -> Self {
        Self {
            kind,
            native_id: native_id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add a string attribute; `None` values are left out
    pub fn with_attr<S: Into<String>>(mut self, key: &str, value: Option<S>) -> Self {
        if let Some(value) = value {
            self.attributes
                .insert(key.to_string(), Value::String(value.into()));
        }
        self
    }

    /// Add a raw JSON attribute; nulls are left out
    pub fn with_value(mut self, key: &str, value: Option<&Value>) -> Self {
        if let Some(value) = value
            && !value.is_null()
        {
            self.attributes.insert(key.to_string(), value.clone());
        }
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}
