//! Core traits for the protocol session seam.
//!
//! The poller never talks to a transport directly. It drives two traits:
//!
//! ```text
//! SessionConnector   // opaque connection options -> open a session
//! └── DeviceSession  // register_nodes, read, close
//! ```
//!
//! The OPC UA implementation lives in `protocols::opcua`; tests use a
//! scripted in-memory implementation.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::data::Value;
use crate::core::error::Result;
use crate::core::quality::StatusCode;
use crate::gateway::address::NodeAddress;

/// Connection state of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,

    /// Opening a session and registering nodes.
    Connecting,

    /// Session open, nodes registered, read request built.
    Connected,
}

impl ConnectionState {
    /// Check if currently connected.
    #[inline]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        };
        write!(f, "{}", s)
    }
}

/// Which timestamps the device should attach to each value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampsToReturn {
    Source,
    Server,
    #[default]
    Both,
    Neither,
}

/// Batched read request built once per successful connection.
#[derive(Debug, Clone)]
pub struct BatchReadRequest<H> {
    /// Device-assigned handles, in resolved node order.
    pub handles: Vec<H>,

    /// Requested timestamps.
    pub timestamps: TimestampsToReturn,

    /// Maximum age of a cached value the device may return.
    pub max_age: Duration,
}

impl<H> BatchReadRequest<H> {
    /// Default maximum cache age accepted from the device.
    pub const DEFAULT_MAX_AGE: Duration = Duration::from_millis(2000);

    /// Build a request asking for both server and source timestamps.
    pub fn new(handles: Vec<H>) -> Self {
        Self {
            handles,
            timestamps: TimestampsToReturn::Both,
            max_age: Self::DEFAULT_MAX_AGE,
        }
    }

    /// Number of nodes covered.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if the request covers no nodes.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// One raw per-node result of a batched read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawReading {
    /// Value, if the device sent one.
    pub value: Option<Value>,

    /// Per-node status code (data, not an error).
    pub status: StatusCode,

    /// When the server produced the answer.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// When the source sampled the value.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl RawReading {
    /// A good reading with the given value and no timestamps.
    pub fn good(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Set the status code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set both timestamps.
    #[must_use]
    pub fn with_timestamps(
        mut self,
        server: Option<DateTime<Utc>>,
        source: Option<DateTime<Utc>>,
    ) -> Self {
        self.server_timestamp = server;
        self.source_timestamp = source;
        self
    }
}

/// A live session with a device.
pub trait DeviceSession: Send {
    /// Device-assigned node handle returned by registration.
    type Handle: Clone + Debug + Send + Sync;

    /// Register node addresses for repeated reads.
    ///
    /// Must return exactly one handle per address, in order.
    fn register_nodes(
        &mut self,
        addresses: &[NodeAddress],
    ) -> impl Future<Output = Result<Vec<Self::Handle>>> + Send;

    /// Execute a batched read.
    ///
    /// An `Err` means the request failed as a whole. Per-node problems are
    /// reported through `RawReading::status`.
    fn read(
        &mut self,
        request: &BatchReadRequest<Self::Handle>,
    ) -> impl Future<Output = Result<Vec<RawReading>>> + Send;

    /// Close the session.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens sessions from connection options the poller never inspects.
pub trait SessionConnector: Send + Sync {
    /// Session type produced.
    type Session: DeviceSession;

    /// Endpoint description, for logs and counters.
    fn endpoint(&self) -> &str;

    /// Open a new session. The caller bounds this with the connect timeout.
    fn open(&self) -> impl Future<Output = Result<Self::Session>> + Send;
}

/// Poller diagnostics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Endpoint URL.
    pub endpoint: String,

    /// Connection state.
    pub connection_state: ConnectionState,

    /// Number of configured nodes.
    pub node_count: usize,

    /// Successful read cycles for this endpoint.
    pub read_success: u64,

    /// Failed read cycles for this endpoint.
    pub read_error: u64,

    /// Last error message.
    pub last_error: Option<String>,
}
