//! Poll-cycle pipeline.
//!
//! ```text
//! ResolvedNode list
//!   -> ConnectionManager  (open session, register nodes, build request)
//!   -> ReadPipeline       (one batched read)
//!   -> map_reading        (raw reading -> PolledRecord)
//!   -> MetricSink
//! ```
//!
//! `DevicePoller` ties the stages together and is the only type most callers
//! need.

pub mod connection;
pub mod device;
pub mod mapper;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod mock;

pub use connection::ConnectionManager;
pub use device::{DevicePoller, PolledNode};
pub use mapper::{map_reading, PolledRecord};
pub use pipeline::ReadPipeline;
