//! Master of a fault-tolerant MapReduce run.
//!
//! Workers register at any time through [`core::MasterService`]. The
//! [`scheduler::MasterScheduler`] hands out map jobs, waits for all of them,
//! hands out reduce jobs, then shuts every worker down. A failed job is
//! retried on another worker until one succeeds; the worker that failed is
//! not used again unless it registers anew.

pub mod availability;
pub mod barrier;
pub mod core;
pub mod dispatch;
pub mod job_queue;
pub mod jobs;
pub mod scheduler;
pub mod transport;
pub mod worker_info;
pub mod worker_registry;

pub use jobs::SchedulerConfig;
pub use scheduler::{MasterHandle, MasterScheduler, SchedulerState, ShutdownRecord};
pub use transport::{GrpcTransport, WorkerTransport};
