//! # uapoll
//!
//! Polled OPC UA input for Rust: resolves configured tags into node ids,
//! keeps a session alive across poll cycles, reads every node in one
//! batched request and emits quality-annotated metrics.
//!
//! ## Features
//!
//! - **Deterministic node resolution**: root nodes then groups, with group
//!   defaults and duplicate detection
//! - **Explicit lifecycle**: `Disconnected -> Connecting -> Connected`, with
//!   reconnect on the next cycle after any failure
//! - **One round-trip per cycle**: nodes registered once, read in a batch
//! - **Transport agnostic core**: the OPC UA adapter sits behind two traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use uapoll::prelude::*;
//!
//! let config = InputConfig::from_file("uapoll.toml")?;
//! let mut poller = create_poller(&config, MemorySink::new())?;
//!
//! let emitted = poller.poll().await?;
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `opcua` | yes | `async-opcua` session adapter and `create_poller` |
//! | `cli` | yes | the `uapoll` binary |

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod core;
pub mod gateway;
pub mod poller;
pub mod protocols;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        data::*,
        error::{PollerError, Result},
        quality::*,
        traits::*,
    };
    #[cfg(feature = "opcua")]
    pub use crate::gateway::create_poller;
    pub use crate::gateway::{create_poller_with, InputConfig, NodeSettings, GroupSettings};
    pub use crate::poller::{DevicePoller, PolledNode, PolledRecord};
    pub use crate::store::{JsonLinesSink, MemorySink, Metric, MetricSink};
}

// Re-export core types at crate root for convenience
pub use crate::core::data::{Value, ValueType};
pub use crate::core::error::{PollerError, Result};
pub use crate::core::quality::{Quality, StatusCode};
pub use crate::core::traits::{ConnectionState, DeviceSession, SessionConnector};
pub use crate::gateway::{InputConfig, ResolvedNode};
pub use crate::poller::DevicePoller;

// Re-export store types
pub use crate::store::{MemorySink, Metric, MetricSink};
