//! In-memory job server
//!
//! [`MockServer`] scripts the responses of `RequestJob` and `CompleteJob` and
//! records every connect, disconnect and call, stamped with the tokio clock so
//! tests running on paused time can assert on delays.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use quill_core::dto::{CompleteJobResponse, Job, JobRequest, JobResult};
use tokio::time::Instant;
use tonic::Status;

use crate::error::{ClientError, Result};
use crate::rpc::JobStub;
use crate::session::Connector;

/// Something that happened on the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Connect { address: String },
    Disconnect,
    RequestJob,
    CompleteJob { job_id: String, payload: String },
}

/// A [`MockEvent`] with the instant it happened at
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub at: Instant,
    pub event: MockEvent,
}

type DrainedHook = Box<dyn Fn() + Send>;

#[derive(Default)]
struct MockState {
    jobs: VecDeque<std::result::Result<Job, Status>>,
    completions: VecDeque<std::result::Result<bool, Status>>,
    events: Vec<RecordedEvent>,
    refuse_connections: bool,
    on_drained: Option<DrainedHook>,
}

impl MockState {
    fn record(&mut self, event: MockEvent) {
        self.events.push(RecordedEvent {
            at: Instant::now(),
            event,
        });
    }
}

/// Scripted job server shared by every stub it hands out
///
/// Once the job script is exhausted, `RequestJob` answers with an empty job
/// and runs the hook set by [`MockServer::on_drained`]. Unscripted
/// completions succeed.
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            server: self.clone(),
        }
    }

    /// Queues a job response
    pub fn push_job(&self, id: &str, payload: &str) -> &Self {
        self.lock().jobs.push_back(Ok(Job {
            id: id.to_string(),
            payload: payload.to_string(),
        }));
        self
    }

    /// Queues a "no work" response
    pub fn push_idle(&self) -> &Self {
        self.push_job("", "")
    }

    /// Queues a failed `RequestJob`
    pub fn push_request_error(&self, status: Status) -> &Self {
        self.lock().jobs.push_back(Err(status));
        self
    }

    /// Queues the success flag of the next `CompleteJob`
    pub fn push_completion(&self, success: bool) -> &Self {
        self.lock().completions.push_back(Ok(success));
        self
    }

    /// Queues a failed `CompleteJob`
    pub fn push_completion_error(&self, status: Status) -> &Self {
        self.lock().completions.push_back(Err(status));
        self
    }

    /// Makes the connector fail until switched back
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    /// Runs `hook` on every `RequestJob` made after the job script ran out
    pub fn on_drained(&self, hook: impl Fn() + Send + 'static) {
        self.lock().on_drained = Some(Box::new(hook));
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.lock().events.clone()
    }

    pub fn event_kinds(&self) -> Vec<MockEvent> {
        self.lock().events.iter().map(|e| e.event.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

/// [`Connector`] handing out stubs bound to a [`MockServer`]
#[derive(Clone)]
pub struct MockConnector {
    server: MockServer,
}

impl Connector for MockConnector {
    type Stub = MockStub;

    fn connect(&self, address: &str) -> Result<Self::Stub> {
        let mut state = self.server.lock();
        if state.refuse_connections {
            return Err(ClientError::invalid_address(address, "connection refused by mock"));
        }
        state.record(MockEvent::Connect {
            address: address.to_string(),
        });
        Ok(MockStub {
            server: self.server.clone(),
        })
    }
}

/// One open channel to a [`MockServer`]; dropping it records a disconnect
pub struct MockStub {
    server: MockServer,
}

#[async_trait]
impl JobStub for MockStub {
    async fn request_job(&mut self, _request: JobRequest) -> std::result::Result<Job, Status> {
        let mut state = self.server.lock();
        state.record(MockEvent::RequestJob);
        match state.jobs.pop_front() {
            Some(response) => response,
            None => {
                if let Some(hook) = &state.on_drained {
                    hook();
                }
                Ok(Job::default())
            }
        }
    }

    async fn complete_job(
        &mut self,
        result: JobResult,
    ) -> std::result::Result<CompleteJobResponse, Status> {
        let mut state = self.server.lock();
        state.record(MockEvent::CompleteJob {
            job_id: result.job_id,
            payload: result.payload,
        });
        state
            .completions
            .pop_front()
            .unwrap_or(Ok(true))
            .map(|success| CompleteJobResponse { success })
    }
}

impl Drop for MockStub {
    fn drop(&mut self) {
        self.server.lock().record(MockEvent::Disconnect);
    }
}
