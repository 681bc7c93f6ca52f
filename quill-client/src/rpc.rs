//! gRPC stub for the `worker.WorkerService` service
//!
//! [`WorkerServiceClient`] mirrors what `tonic-build` would generate for
//! `proto/worker.proto`, written against [`tonic::client::Grpc`] directly.
//! [`JobStub`] is the seam the rest of the client talks to, so that a session
//! can run over a real channel or an in-memory server.

use std::time::Duration;

use async_trait::async_trait;
use quill_core::dto::{CompleteJobResponse, Job, JobRequest, JobResult};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{IntoRequest, Response, Status};

use crate::error::{ClientError, Result};
use crate::session::Connector;

const REQUEST_JOB_PATH: &str = "/worker.WorkerService/RequestJob";
const COMPLETE_JOB_PATH: &str = "/worker.WorkerService/CompleteJob";

/// The two remote operations of the job server
#[async_trait]
pub trait JobStub: Send {
    /// Claims the next job; an empty id means there is nothing to do
    async fn request_job(&mut self, request: JobRequest) -> std::result::Result<Job, Status>;

    /// Reports the output of a job
    async fn complete_job(
        &mut self,
        result: JobResult,
    ) -> std::result::Result<CompleteJobResponse, Status>;
}

/// Typed client for `worker.WorkerService`
#[derive(Debug, Clone)]
pub struct WorkerServiceClient {
    inner: tonic::client::Grpc<Channel>,
}

impl WorkerServiceClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn request_job(
        &mut self,
        request: impl IntoRequest<JobRequest>,
    ) -> std::result::Result<Response<Job>, Status> {
        self.ready().await?;
        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(REQUEST_JOB_PATH);
        self.inner.unary(request.into_request(), path, codec).await
    }

    pub async fn complete_job(
        &mut self,
        request: impl IntoRequest<JobResult>,
    ) -> std::result::Result<Response<CompleteJobResponse>, Status> {
        self.ready().await?;
        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(COMPLETE_JOB_PATH);
        self.inner.unary(request.into_request(), path, codec).await
    }

    async fn ready(&mut self) -> std::result::Result<(), Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("Service was not ready: {}", e)))
    }
}

#[async_trait]
impl JobStub for WorkerServiceClient {
    async fn request_job(&mut self, request: JobRequest) -> std::result::Result<Job, Status> {
        WorkerServiceClient::request_job(self, request)
            .await
            .map(Response::into_inner)
    }

    async fn complete_job(
        &mut self,
        result: JobResult,
    ) -> std::result::Result<CompleteJobResponse, Status> {
        WorkerServiceClient::complete_job(self, result)
            .await
            .map(Response::into_inner)
    }
}

/// Opens lazy tonic channels to the job server
///
/// No network traffic happens in [`Connector::connect`]; the TCP connection
/// is made by the first call on the channel, so an unreachable server shows
/// up as an `Unavailable` status from that call.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    connect_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for GrpcConnector {
    type Stub = WorkerServiceClient;

    fn connect(&self, address: &str) -> Result<Self::Stub> {
        let endpoint = Endpoint::from_shared(endpoint_uri(address))
            .map_err(|e| ClientError::invalid_address(address, e))?
            .connect_timeout(self.connect_timeout);
        Ok(WorkerServiceClient::new(endpoint.connect_lazy()))
    }
}

/// Plain `host:port` addresses are dialed without TLS
fn endpoint_uri(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}
