//! Worker loop
//!
//! Polls the job server for work, runs each job through the task executor and
//! reports the result. One job at a time, strictly in order:
//!
//! ```text
//! Idle -> Requesting -> Processing -> Reporting -> Idle
//!              \______________________________/
//!                        (no job)
//! ```
//!
//! Idle and failed cycles are followed by the polling interval; a cycle that
//! got a job all the way to the report step loops again immediately.

use std::sync::Arc;

use quill_client::{Connector, JobClient};
use quill_core::domain::job::{Assignment, Job};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::config::WorkerConfig;
use crate::scheduler::StopHandle;
use crate::service::{TaskError, TaskExecutor};

/// Where the worker currently is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Requesting,
    Processing,
    Reporting,
    Stopped,
}

/// How a single cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    /// No job, or the request failed
    Idle,
    /// Job processed and acknowledged by the server
    Completed,
    /// Job processed but the server did not acknowledge it
    ReportFailed,
    /// Processing failed; the job was never reported
    Dropped,
}

impl CycleOutcome {
    fn should_wait(self) -> bool {
        matches!(self, CycleOutcome::Idle | CycleOutcome::Dropped)
    }
}

/// Drives the poll/process/report cycle of a single worker
pub struct WorkerLoop<C: Connector> {
    config: WorkerConfig,
    client: JobClient<C>,
    executor: Arc<dyn TaskExecutor>,
    stop: StopHandle,
    state: WorkerState,
    span: Span,
}

impl<C: Connector> WorkerLoop<C> {
    /// Creates a worker loop owning `client`
    pub fn new(
        config: WorkerConfig,
        client: JobClient<C>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        let span = info_span!(
            "worker",
            worker_id = %config.worker_id,
            server = %client.address()
        );
        Self {
            config,
            client,
            executor,
            stop: StopHandle::new(),
            state: WorkerState::Idle,
            span,
        }
    }

    /// Handle that stops this loop from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.stop.is_stopped()
    }

    /// Runs until a stop is requested, then releases the channel
    ///
    /// The flag is checked between cycles; an RPC or inference call in flight
    /// is allowed to finish. Polling waits end early on a stop request.
    pub async fn run(&mut self) {
        let span = self.span.clone();
        self.run_loop().instrument(span).await
    }

    /// Stops the loop and releases the channel
    ///
    /// Safe to call any number of times.
    pub fn stop(&mut self) {
        let span = self.span.clone();
        let _entered = span.enter();
        if self.stop.stop() {
            info!("Stopping worker");
        }
        if self.client.close() {
            debug!("Released job server channel");
        }
        self.transition(WorkerState::Stopped);
    }

    async fn run_loop(&mut self) {
        info!(
            polling_interval = ?self.config.polling_interval,
            "Starting worker loop"
        );

        while self.is_running() {
            let outcome = self.run_cycle().await;
            if outcome.should_wait() && self.is_running() {
                debug!("No job processed, waiting before polling again");
                self.wait().await;
            }
        }

        self.client.close();
        self.transition(WorkerState::Stopped);
        info!("Worker loop stopped");
    }

    async fn run_cycle(&mut self) -> CycleOutcome {
        self.transition(WorkerState::Requesting);
        let response = self.client.request_job().await;

        let outcome = match Assignment::from_response(response) {
            Assignment::Idle => CycleOutcome::Idle,
            Assignment::Job(job) => {
                let span = info_span!("job", job_id = %job.id);
                self.handle_job(&job).instrument(span).await
            }
        };

        self.transition(WorkerState::Idle);
        outcome
    }

    async fn handle_job(&mut self, job: &Job) -> CycleOutcome {
        info!("Received job {}", job.id);

        self.transition(WorkerState::Processing);
        debug!(payload = %job.payload, "Processing job");
        let result = match self.executor.execute(&job.payload).await {
            Ok(result) => result,
            Err(TaskError::Panicked(reason)) => {
                error!("Inference panicked on job {}, dropping it: {}", job.id, reason);
                return CycleOutcome::Dropped;
            }
            Err(e) => {
                // There is no RPC to hand a job back; the server has to
                // redeliver or expire it.
                error!("Failed to process job {}, dropping it: {}", job.id, e);
                return CycleOutcome::Dropped;
            }
        };
        info!("Job {} processed", job.id);

        self.transition(WorkerState::Reporting);
        if self.client.complete_job(&job.id, result).await {
            info!("Job {} completed successfully", job.id);
            CycleOutcome::Completed
        } else {
            warn!("Failed to report completion for job {}", job.id);
            CycleOutcome::ReportFailed
        }
    }

    async fn wait(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.polling_interval) => {}
            _ = self.stop.stopped() => {
                debug!("Stop requested while waiting");
            }
        }
    }

    fn transition(&mut self, next: WorkerState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Worker state changed");
            self.state = next;
        }
    }

    #[cfg(test)]
    fn state(&self) -> WorkerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CapturedLogs;
    use async_trait::async_trait;
    use quill_client::testing::{MockConnector, MockEvent, MockServer};
    use quill_client::{ClientOptions, ConnectionState};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;
    use tonic::Status;

    /// Executor returning a fixed answer, or failing when `answer` is `None`
    struct RecordingExecutor {
        answer: Option<String>,
        payloads: Mutex<Vec<String>>,
    }

    impl RecordingExecutor {
        fn answering(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Some(answer.to_string()),
                payloads: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: None,
                payloads: Mutex::new(Vec::new()),
            })
        }

        fn payloads(&self) -> Vec<String> {
            self.payloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskExecutor for RecordingExecutor {
        async fn execute(&self, payload: &str) -> Result<String, TaskError> {
            self.payloads.lock().unwrap().push(payload.to_string());
            self.answer
                .clone()
                .ok_or_else(|| TaskError::Inference(anyhow::anyhow!("model crashed")))
        }
    }

    fn worker(server: &MockServer, executor: Arc<RecordingExecutor>) -> WorkerLoop<MockConnector> {
        let client = JobClient::connect(server.connector(), "jobs:50051", &ClientOptions::default())
            .unwrap();
        let worker = WorkerLoop::new(WorkerConfig::new("jobs:50051"), client, executor);

        // Stop as soon as the scripted responses run out.
        let stop = worker.stop_handle();
        server.on_drained(move || {
            stop.stop();
        });
        worker
    }

    fn request_times(server: &MockServer) -> Vec<Instant> {
        server
            .events()
            .into_iter()
            .filter(|e| e.event == MockEvent::RequestJob)
            .map(|e| e.at)
            .collect()
    }

    fn connect_event() -> MockEvent {
        MockEvent::Connect {
            address: "jobs:50051".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_response_waits_polling_interval() {
        let server = MockServer::new();
        server.push_job("", "");
        let executor = RecordingExecutor::answering("world");
        let mut worker = worker(&server, executor.clone());

        worker.run().await;

        assert_eq!(
            server.event_kinds(),
            vec![
                connect_event(),
                MockEvent::RequestJob,
                MockEvent::RequestJob,
                MockEvent::Disconnect,
            ]
        );
        let requests = request_times(&server);
        assert_eq!(requests[1] - requests[0], Duration::from_secs(5));
        assert!(executor.payloads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_is_processed_and_completed_without_waiting() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());
        let server = MockServer::new();
        server.push_job("42", "hello").push_completion(true);
        let executor = RecordingExecutor::answering("world");
        let mut worker = worker(&server, executor.clone());

        worker.run().await;

        assert_eq!(executor.payloads(), vec!["hello".to_string()]);
        assert_eq!(
            server.event_kinds(),
            vec![
                connect_event(),
                MockEvent::RequestJob,
                MockEvent::CompleteJob {
                    job_id: "42".to_string(),
                    payload: "world".to_string(),
                },
                MockEvent::RequestJob,
                MockEvent::Disconnect,
            ]
        );
        let requests = request_times(&server);
        assert_eq!(requests[1], requests[0]);

        let logs = logs.contents();
        assert!(logs.contains("Job 42 completed successfully"), "logs: {}", logs);
        assert!(!logs.contains("Failed to report"), "logs: {}", logs);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_job_is_reported_before_the_next_request() {
        let server = MockServer::new();
        server
            .push_job("1", "a")
            .push_job("2", "b")
            .push_idle()
            .push_job("3", "c");
        let executor = RecordingExecutor::answering("done");
        let mut worker = worker(&server, executor.clone());

        worker.run().await;

        let calls: Vec<_> = server
            .event_kinds()
            .into_iter()
            .filter(|e| matches!(e, MockEvent::RequestJob | MockEvent::CompleteJob { .. }))
            .collect();
        let complete = |id: &str| MockEvent::CompleteJob {
            job_id: id.to_string(),
            payload: "done".to_string(),
        };
        assert_eq!(
            calls,
            vec![
                MockEvent::RequestJob,
                complete("1"),
                MockEvent::RequestJob,
                complete("2"),
                MockEvent::RequestJob,
                MockEvent::RequestJob,
                complete("3"),
                MockEvent::RequestJob,
            ]
        );
        assert_eq!(executor.payloads(), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_reconnects_before_next_request() {
        let server = MockServer::new();
        server.push_request_error(Status::unavailable("connection refused"));
        let executor = RecordingExecutor::answering("world");
        let mut worker = worker(&server, executor.clone());

        worker.run().await;

        let events = server.events();
        let kinds: Vec<_> = events.iter().map(|e| e.event.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                connect_event(),
                MockEvent::RequestJob,
                MockEvent::Disconnect,
                connect_event(),
                MockEvent::RequestJob,
                MockEvent::Disconnect,
            ]
        );
        // cooldown between close and reconnect, then the idle wait
        assert_eq!(events[3].at - events[2].at, Duration::from_secs(2));
        assert_eq!(events[4].at - events[3].at, Duration::from_secs(5));
        assert!(executor.payloads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_request_does_not_reconnect() {
        let server = MockServer::new();
        server.push_request_error(Status::invalid_argument("bad request"));
        let mut worker = worker(&server, RecordingExecutor::answering("world"));

        worker.run().await;

        assert_eq!(
            server.event_kinds(),
            vec![
                connect_event(),
                MockEvent::RequestJob,
                MockEvent::RequestJob,
                MockEvent::Disconnect,
            ]
        );
        let requests = request_times(&server);
        assert_eq!(requests[1] - requests[0], Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_report_is_not_retried() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());
        let server = MockServer::new();
        server.push_job("7", "hello").push_completion(false);
        let mut worker = worker(&server, RecordingExecutor::answering("world"));

        worker.run().await;

        let completions = server
            .event_kinds()
            .into_iter()
            .filter(|e| matches!(e, MockEvent::CompleteJob { .. }))
            .count();
        assert_eq!(completions, 1);
        let requests = request_times(&server);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], requests[0]);
        assert!(logs.contents().contains("Failed to report completion for job 7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_rpc_error_moves_on_without_reconnect() {
        let server = MockServer::new();
        server
            .push_job("7", "hello")
            .push_completion_error(Status::unavailable("down"));
        let mut worker = worker(&server, RecordingExecutor::answering("world"));

        worker.run().await;

        let kinds = server.event_kinds();
        let connects = kinds.iter().filter(|e| **e == connect_event()).count();
        assert_eq!(connects, 1);
        let requests = request_times(&server);
        assert_eq!(requests[1], requests[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_failure_drops_job_and_waits() {
        let server = MockServer::new();
        server.push_job("9", "hello");
        let executor = RecordingExecutor::failing();
        let mut worker = worker(&server, executor.clone());

        worker.run().await;

        assert_eq!(executor.payloads(), vec!["hello".to_string()]);
        assert!(
            !server
                .event_kinds()
                .iter()
                .any(|e| matches!(e, MockEvent::CompleteJob { .. }))
        );
        let requests = request_times(&server);
        assert_eq!(requests[1] - requests[0], Duration::from_secs(5));
    }

    struct PanickingExecutor;

    #[async_trait]
    impl TaskExecutor for PanickingExecutor {
        async fn execute(&self, _payload: &str) -> Result<String, TaskError> {
            Err(TaskError::Panicked("index out of bounds".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_inference_drops_job() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());
        let server = MockServer::new();
        server.push_job("9", "hello");
        let client = JobClient::connect(server.connector(), "jobs:50051", &ClientOptions::default())
            .unwrap();
        let mut worker = WorkerLoop::new(
            WorkerConfig::new("jobs:50051"),
            client,
            Arc::new(PanickingExecutor),
        );
        let stop = worker.stop_handle();
        server.on_drained(move || {
            stop.stop();
        });

        worker.run().await;

        assert!(
            !server
                .event_kinds()
                .iter()
                .any(|e| matches!(e, MockEvent::CompleteJob { .. }))
        );
        let requests = request_times(&server);
        assert_eq!(requests[1] - requests[0], Duration::from_secs(5));
        assert!(logs.contents().contains("Inference panicked on job 9"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_twice_closes_channel_once() {
        let server = MockServer::new();
        let mut worker = worker(&server, RecordingExecutor::answering("world"));

        worker.stop();
        worker.stop();

        assert!(!worker.is_running());
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(worker.client.state(), ConnectionState::Disconnected);
        assert_eq!(
            server.event_kinds(),
            vec![connect_event(), MockEvent::Disconnect]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_after_stop_issues_no_request() {
        let server = MockServer::new();
        let mut worker = worker(&server, RecordingExecutor::answering("world"));

        worker.stop();
        worker.run().await;
        worker.stop();

        assert!(!server.event_kinds().contains(&MockEvent::RequestJob));
        let disconnects = server
            .event_kinds()
            .into_iter()
            .filter(|e| *e == MockEvent::Disconnect)
            .count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_handle_interrupts_polling_wait() {
        let server = MockServer::new();
        let client = JobClient::connect(server.connector(), "jobs:50051", &ClientOptions::default())
            .unwrap();
        let mut worker = WorkerLoop::new(
            WorkerConfig::new("jobs:50051"),
            client,
            RecordingExecutor::answering("world"),
        );
        let stop = worker.stop_handle();

        let start = Instant::now();
        tokio::join!(worker.run(), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stop.stop();
        });

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(request_times(&server).len(), 1);
        assert_eq!(worker.client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_only_idle_and_dropped_cycles_wait() {
        assert!(CycleOutcome::Idle.should_wait());
        assert!(CycleOutcome::Dropped.should_wait());
        assert!(!CycleOutcome::Completed.should_wait());
        assert!(!CycleOutcome::ReportFailed.should_wait());
    }
}
