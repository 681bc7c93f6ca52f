//! Job RPC client
//!
//! Issues `RequestJob` and `CompleteJob` over a [`TransportSession`].
//! Connectivity failures while requesting work close the session, wait out a
//! fixed cooldown and reopen it. Failures while reporting are surfaced to the
//! caller and never trigger a reconnect, so the two paths cannot race each
//! other into reconnecting twice.

use std::future::Future;
use std::time::Duration;

use quill_core::domain::job::JobResult;
use quill_core::dto::{Job, JobRequest};
use tonic::Status;
use tracing::{error, info, warn};

use crate::ClientOptions;
use crate::error::{ClientError, Result};
use crate::rpc::{GrpcConnector, JobStub};
use crate::session::{ConnectionState, Connector, TransportSession};

/// Client for the job server RPCs
pub struct JobClient<C: Connector> {
    session: TransportSession<C>,
    reconnect_cooldown: Duration,
    request_timeout: Option<Duration>,
}

impl JobClient<GrpcConnector> {
    /// Connects to a gRPC job server at `address`
    pub fn connect_grpc(address: impl Into<String>, options: &ClientOptions) -> Result<Self> {
        Self::connect(GrpcConnector::new(options.connect_timeout), address, options)
    }
}

impl<C: Connector> JobClient<C> {
    /// Creates a client and opens its session
    ///
    /// Fails only when the address is unusable; an unreachable server is
    /// reported by the first call.
    pub fn connect(
        connector: C,
        address: impl Into<String>,
        options: &ClientOptions,
    ) -> Result<Self> {
        let mut session = TransportSession::new(connector, address);
        session.connect()?;
        Ok(Self {
            session,
            reconnect_cooldown: options.reconnect_cooldown,
            request_timeout: options.request_timeout,
        })
    }

    pub fn address(&self) -> &str {
        self.session.address()
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Requests a job, recovering from connectivity failures
    ///
    /// Returns `None` when the call failed. A job with an empty id means the
    /// server had nothing to do; callers treat both the same way.
    pub async fn request_job(&mut self) -> Option<Job> {
        info!("Requesting job from server");
        match self.fetch_job().await {
            Ok(job) => Some(job),
            Err(e) => {
                error!(code = ?e.code(), "RPC error while requesting job: {}", e);
                if e.is_connectivity() {
                    self.reconnect().await;
                }
                None
            }
        }
    }

    /// Reports a job's output, returning the server's success flag
    ///
    /// Returns `false` when the call failed.
    pub async fn complete_job(&mut self, job_id: &str, payload: String) -> bool {
        info!(job_id, "Completing job");
        match self.submit_result(JobResult::new(job_id, payload)).await {
            Ok(success) => success,
            Err(e) => {
                error!(job_id, code = ?e.code(), "RPC error while completing job: {}", e);
                false
            }
        }
    }

    /// Issues a single `RequestJob` call
    pub async fn fetch_job(&mut self) -> Result<Job> {
        let timeout = self.request_timeout;
        let stub = self.session.stub_mut().ok_or(ClientError::NotConnected)?;
        let job = with_timeout(timeout, stub.request_job(JobRequest {})).await?;
        Ok(job)
    }

    /// Issues a single `CompleteJob` call
    pub async fn submit_result(&mut self, result: JobResult) -> Result<bool> {
        let timeout = self.request_timeout;
        let stub = self.session.stub_mut().ok_or(ClientError::NotConnected)?;
        let response = with_timeout(timeout, stub.complete_job(result.into())).await?;
        Ok(response.success)
    }

    /// Releases the channel; a no-op when already closed
    pub fn close(&mut self) -> bool {
        self.session.close()
    }

    async fn reconnect(&mut self) {
        info!("Reconnecting to server");
        self.session.close();
        tokio::time::sleep(self.reconnect_cooldown).await;
        if let Err(e) = self.session.connect() {
            warn!("Failed to reopen channel: {}", e);
        }
    }
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    call: impl Future<Output = std::result::Result<T, Status>>,
) -> std::result::Result<T, Status> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(Status::deadline_exceeded("request timed out"))),
        None => call.await,
    }
}
