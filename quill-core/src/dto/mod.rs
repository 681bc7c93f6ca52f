//! Data Transfer Objects for the job server RPCs
//!
//! Protobuf messages of the `worker.WorkerService` gRPC service, as described
//! in `proto/worker.proto`. The messages are declared by hand so that the
//! workspace builds without `protoc`.

/// Empty request sent to `RequestJob`.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct JobRequest {}

/// A job as delivered by `RequestJob`.
///
/// An empty `id` means the server has no work for this worker.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Job {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub payload: ::prost::alloc::string::String,
}

/// Output of a job, sent to `CompleteJob`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct JobResult {
    #[prost(string, tag = "1")]
    pub job_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub payload: ::prost::alloc::string::String,
}

/// Acknowledgement returned by `CompleteJob`.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct CompleteJobResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
}
