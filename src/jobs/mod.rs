//! Background work
//!
//! - `scheduler`: fixed-interval driver for the queue drain, sequence pass
//!   and campaign reconciliation
//! - `campaigns`: marks drained campaigns completed
//! - `job_store`: status of bulk scans submitted in the background

mod campaigns;
mod job_store;
mod scheduler;

pub use campaigns::reconcile_campaigns;
pub use job_store::{spawn_bulk_scan, JobStatus, ScanJob, ScanJobStore};
pub use scheduler::{PassSummary, Scheduler, SchedulerHandle};
