//! Error types for the Quill job client

use thiserror::Error;
use tonic::Code;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the job server
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server address cannot be turned into a gRPC endpoint
    #[error("Invalid server address '{address}': {reason}")]
    InvalidAddress {
        /// Address as configured
        address: String,
        /// Why it was rejected
        reason: String,
    },

    /// No channel is open, so no call was issued
    #[error("Not connected to the job server")]
    NotConnected,

    /// The remote call failed with a gRPC status
    #[error("RPC failed ({:?}): {}", .0.code(), .0.message())]
    Rpc(#[from] tonic::Status),
}

impl ClientError {
    /// Create an invalid address error
    pub fn invalid_address(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// gRPC status code of a failed call, if a call was issued
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Rpc(status) => Some(status.code()),
            _ => None,
        }
    }

    /// Check if this error means the channel itself is unusable
    ///
    /// Unavailable and deadline-exceeded statuses, as well as calls attempted
    /// without a channel, are connectivity failures. Everything else is an
    /// application-level rejection.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::NotConnected => true,
            Self::Rpc(status) => {
                matches!(status.code(), Code::Unavailable | Code::DeadlineExceeded)
            }
            Self::InvalidAddress { .. } => false,
        }
    }
}
