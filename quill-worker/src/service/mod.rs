//! Service layer
//!
//! Services contain the job-processing logic of the worker: running the
//! inference backend on a payload and serializing what it produced.
//!
//! All services are trait-based to enable testing and dependency injection.

mod executor;
mod inference;

// Re-export traits
pub use executor::TaskExecutor;
pub use inference::InferenceBackend;

// Re-export implementations
pub use executor::{StandardTaskExecutor, TaskError};
pub use inference::{GenerationParams, PlaceholderBackend};
