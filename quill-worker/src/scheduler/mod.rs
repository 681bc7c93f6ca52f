//! Scheduler layer for the worker
//!
//! This layer drives the poll/process/report cycle against the job server
//! and owns the worker's run/stop lifecycle.

pub mod shutdown;
pub mod worker_loop;

pub use shutdown::StopHandle;
pub use worker_loop::WorkerLoop;
