//! Input configuration and node resolution.
//!
//! Turns a TOML input description into an ordered list of resolved nodes
//! and a ready-to-poll `DevicePoller`.

pub mod address;
pub mod config;
pub mod factory;
pub mod resolver;

pub use address::{build_node_id, parse_node_id, IdentifierType, NodeAddress, NodeIdentifier};
pub use config::{AuthMethod, GroupSettings, InputConfig, NodeSettings, SecurityMode, SecurityPolicy};
#[cfg(feature = "opcua")]
pub use factory::create_poller;
pub use factory::create_poller_with;
pub use resolver::{resolve_config, resolve_nodes, ResolvedNode};
