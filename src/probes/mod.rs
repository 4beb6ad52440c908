//! Service probes.
//!
//! A probe knows how to list one kind of resource for one scan target and how
//! to normalize the provider's response into `ResourceRecord`s. Probes never
//! talk to the provider directly; they go through a `CloudApi`.

pub mod api;
pub mod catalog;
pub mod kind;
pub mod paginate;
pub mod record;
pub mod registry;

pub use api::{AwsCliApi, CloudApi};
pub use kind::{Category, ServiceKind};
pub use record::ResourceRecord;
pub use registry::ProbeRegistry;

use crate::error::ProbeError;
use crate::scan::target::ScanTarget;

/// Records returned by one probe invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutput {
    pub records: Vec<ResourceRecord>,
    /// False when pagination stopped early and `records` is a prefix
    pub complete: bool,
}

/// Discovery adapter for a single service kind
pub trait ServiceProbe: Send + Sync {
    fn kind(&self) -> ServiceKind;

    /// List every resource of this kind visible to the target's account/region
    fn probe(&self, api: &dyn CloudApi, target: &ScanTarget) -> Result<ProbeOutput, ProbeError>;
}
