//! Output sinks for polled records.
//!
//! This module provides the `MetricSink` trait the poller emits into:
//!
//! - `MemorySink`: In-memory storage using DashMap (tests, embedding)
//! - `JsonLinesSink`: One JSON object per line on any writer (CLI output)
//!
//! # Example
//!
//! ```rust,ignore
//! use uapoll::store::{MetricSink, MemorySink};
//!
//! let sink = MemorySink::new();
//! // Hand the sink to a DevicePoller...
//! ```

mod json_lines;
mod memory;
mod traits;

pub use json_lines::JsonLinesSink;
pub use memory::MemorySink;
pub use traits::{Metric, MetricSink};
