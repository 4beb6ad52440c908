//! The inventory document produced by a scan and consumed by reconciliation.

pub mod aggregator;
pub mod document;

pub use aggregator::build_document;
pub use document::{InventoryDocument, ProbeStats};
