use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;

use super::ServiceProbe;
use super::catalog::{ListProbe, builtin_specs};
use super::kind::ServiceKind;

/// Probes available to the scheduler, one per service kind
pub struct ProbeRegistry {
    probes: HashMap<ServiceKind, Arc<dyn ServiceProbe>>,
}

impl ProbeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            probes: HashMap::new(),
        }
    }

    /// Create a registry with the built-in probe for every kind
    pub fn with_defaults(max_pages: usize) -> Self {
        let mut registry = Self::new();
        for spec in builtin_specs() {
            registry.register(Arc::new(ListProbe::new(spec, max_pages)));
        }
        registry
    }

    /// Register a probe, replacing any probe for the same kind
    pub fn register(&mut self, probe: Arc<dyn ServiceProbe>) {
        self.probes.insert(probe.kind(), probe);
    }

    pub fn get(&self, kind: ServiceKind) -> Result<Arc<dyn ServiceProbe>> {
        self.probes
            .get(&kind)
            .cloned()
            .with_context(|| format!("No probe registered for {}", kind.plural()))
    }

    pub fn has(&self, kind: ServiceKind) -> bool {
        self.probes.contains_key(&kind)
    }

    /// Registered kinds in declaration order
    pub fn kinds(&self) -> Vec<ServiceKind> {
        ServiceKind::all()
            .iter()
            .copied()
            .filter(|k| self.has(*k))
            .collect()
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::with_defaults(crate::config::ProviderSettings::default().max_pages)
    }
}
