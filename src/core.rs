//! Core abstractions for the poller.
//!
//! This module provides the foundational types and traits the poll pipeline
//! and protocol adapters share.

pub mod data;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod quality;
pub mod stats;
pub mod traits;

pub use data::*;
pub use error::{AddressError, PollerError, Result};
pub use quality::*;
pub use traits::*;
