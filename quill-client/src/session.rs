//! Transport session
//!
//! Owns the single channel a worker holds to the job server and knows how to
//! open and release it. The session is the only place that tracks whether a
//! channel exists.

use tracing::debug;

use crate::error::Result;
use crate::rpc::JobStub;

/// Whether a channel is currently open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Factory for channels to the job server
pub trait Connector: Send + Sync {
    type Stub: JobStub;

    /// Opens a channel to `address`
    ///
    /// Must not block on the network: reachability is discovered by the first
    /// call made through the returned stub.
    fn connect(&self, address: &str) -> Result<Self::Stub>;
}

/// A single logical connection to the job server
pub struct TransportSession<C: Connector> {
    connector: C,
    address: String,
    stub: Option<C::Stub>,
}

impl<C: Connector> TransportSession<C> {
    /// Creates a disconnected session for `address`
    pub fn new(connector: C, address: impl Into<String>) -> Self {
        Self {
            connector,
            address: address.into(),
            stub: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> ConnectionState {
        if self.stub.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Opens a channel, replacing the current one if any
    pub fn connect(&mut self) -> Result<()> {
        let stub = self.connector.connect(&self.address)?;
        if self.stub.replace(stub).is_some() {
            debug!(address = %self.address, "Replaced existing channel");
        } else {
            debug!(address = %self.address, "Channel opened");
        }
        Ok(())
    }

    /// Releases the channel
    ///
    /// Returns `false` when there was nothing to release.
    pub fn close(&mut self) -> bool {
        match self.stub.take() {
            Some(stub) => {
                drop(stub);
                debug!(address = %self.address, "Channel closed");
                true
            }
            None => false,
        }
    }

    pub(crate) fn stub_mut(&mut self) -> Option<&mut C::Stub> {
        self.stub.as_mut()
    }
}
