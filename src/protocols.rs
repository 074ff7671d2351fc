//! Protocol implementations.
//!
//! This module contains adapters that integrate protocol crates with the
//! poller's session traits.

#[cfg(feature = "opcua")]
#[cfg_attr(docsrs, doc(cfg(feature = "opcua")))]
pub mod opcua;
