//! Worker configuration
//!
//! Defines all configurable parameters for the worker: where the job server
//! lives, how often to poll it when idle, and what the inference backend
//! should report.

use std::time::Duration;

use quill_client::ClientOptions;
use tracing::{info, warn};

use crate::service::GenerationParams;

pub const DEFAULT_SERVER_ADDRESS: &str = "localhost:50051";
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_MODEL: &str = "placeholder";

/// Worker configuration
///
/// Read once at startup and never changed afterwards.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identifier for this worker instance, used as log context
    pub worker_id: String,

    /// Job server address (e.g., "localhost:50051")
    pub server_address: String,

    /// How long to wait before polling again after an idle or failed cycle
    pub polling_interval: Duration,

    /// Per-call limit on job server RPCs
    pub request_timeout: Option<Duration>,

    /// Model name reported by the inference backend
    pub model: String,

    /// Output length limit handed to the inference backend
    pub max_output_tokens: Option<u32>,
}

impl WorkerConfig {
    /// Creates a new configuration with defaults
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            server_address: server_address.into(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            request_timeout: None,
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - GRPC_SERVER (optional, default: localhost:50051)
    /// - POLLING_INTERVAL_MS (optional, milliseconds, default: 5000)
    /// - WORKER_ID (optional, default: random UUID)
    /// - RPC_TIMEOUT_MS (optional, milliseconds, default: no timeout)
    /// - INFERENCE_MODEL (optional, default: placeholder)
    /// - MAX_OUTPUT_TOKENS (optional, default: unlimited)
    ///
    /// Unparseable values are reported and replaced by their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`WorkerConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = match var("GRPC_SERVER") {
            Some(address) => {
                info!("Using server address from environment: {}", address);
                Self::new(address)
            }
            None => {
                info!("Using default server address: {}", DEFAULT_SERVER_ADDRESS);
                Self::new(DEFAULT_SERVER_ADDRESS)
            }
        };

        if let Some(raw) = var("POLLING_INTERVAL_MS") {
            match parse_millis(&raw) {
                Some(interval) => config.polling_interval = interval,
                None => warn!(
                    "Invalid POLLING_INTERVAL_MS value '{}', using default {}ms",
                    raw,
                    DEFAULT_POLLING_INTERVAL.as_millis()
                ),
            }
        }

        if let Some(worker_id) = var("WORKER_ID") {
            config.worker_id = worker_id;
        }

        if let Some(raw) = var("RPC_TIMEOUT_MS") {
            config.request_timeout = parse_millis(&raw);
            if config.request_timeout.is_none() {
                warn!("Invalid RPC_TIMEOUT_MS value '{}', calls will not time out", raw);
            }
        }

        if let Some(model) = var("INFERENCE_MODEL") {
            config.model = model;
        }

        if let Some(raw) = var("MAX_OUTPUT_TOKENS") {
            config.max_output_tokens = raw.trim().parse::<u32>().ok().filter(|n| *n > 0);
            if config.max_output_tokens.is_none() {
                warn!("Invalid MAX_OUTPUT_TOKENS value '{}', output length is unlimited", raw);
            }
        }

        config
    }

    /// Options for the job server client
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::default().with_request_timeout(self.request_timeout)
    }

    /// Parameters handed to the inference backend for every job
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            max_output_tokens: self.max_output_tokens,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_address.trim().is_empty() {
            anyhow::bail!("server_address cannot be empty");
        }

        if self.polling_interval.is_zero() {
            anyhow::bail!("polling_interval must be greater than 0");
        }

        if self.worker_id.is_empty() {
            anyhow::bail!("worker_id cannot be empty");
        }

        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_ADDRESS)
    }
}

/// Parses a positive, finite number of milliseconds
///
/// Fractional values such as "0.5" are accepted. Values that round down to
/// zero nanoseconds are rejected.
pub fn parse_millis(raw: &str) -> Option<Duration> {
    let millis: f64 = raw.trim().parse().ok()?;
    if !millis.is_finite() || millis <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(millis / 1000.0)
        .ok()
        .filter(|d| !d.is_zero())
}
