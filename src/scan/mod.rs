pub mod scheduler;
pub mod target;

pub use scheduler::{Scheduler, TaskResult, TaskStatus};
pub use target::{ScanTarget, enumerate_targets};
