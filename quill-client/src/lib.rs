//! Quill job client
//!
//! A small, typed gRPC client for the job server a Quill worker polls.
//!
//! The client is split into three layers:
//! - [`rpc`]: the `worker.WorkerService` stub and the [`JobStub`] seam
//! - [`session`]: the single channel a worker owns ([`TransportSession`])
//! - [`jobs`]: request/complete operations with reconnect handling ([`JobClient`])
//!
//! # Example
//!
//! ```no_run
//! use quill_client::{ClientOptions, JobClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut client = JobClient::connect_grpc("localhost:50051", &ClientOptions::default())?;
//!
//!     if let Some(job) = client.request_job().await {
//!         if !job.id.is_empty() {
//!             client.complete_job(&job.id, job.payload.to_uppercase()).await;
//!         }
//!     }
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod jobs;
pub mod rpc;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use jobs::JobClient;
pub use rpc::{GrpcConnector, JobStub, WorkerServiceClient};
pub use session::{ConnectionState, Connector, TransportSession};

use std::time::Duration;

/// Delay between closing a broken channel and opening a new one
pub const DEFAULT_RECONNECT_COOLDOWN: Duration = Duration::from_secs(2);

/// Upper bound on establishing the TCP connection behind a channel
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning knobs for [`JobClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Passed to the gRPC endpoint
    pub connect_timeout: Duration,
    /// Per-call limit; an expired call fails with `DEADLINE_EXCEEDED`
    pub request_timeout: Option<Duration>,
    /// Wait before reopening a channel after a connectivity failure
    pub reconnect_cooldown: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            reconnect_cooldown: DEFAULT_RECONNECT_COOLDOWN,
        }
    }
}

impl ClientOptions {
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}
