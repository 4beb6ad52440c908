pub mod cache;
pub mod reconcile;
pub mod run;
pub mod scan;

pub use cache::CacheCommand;
pub use reconcile::{ReconcileCommand, ReconcileOptions};
pub use run::RunCommand;
pub use scan::{ScanCommand, ScanOverrides};
