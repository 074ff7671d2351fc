//! Per-device poll cycle.
//!
//! `DevicePoller` owns everything one configured input needs: the resolved
//! nodes with their latest records, the connection manager, the read
//! pipeline, the output sink and the read counters.
//!
//! # Example
//!
//! ```rust,ignore
//! use uapoll::prelude::*;
//!
//! let config = InputConfig::from_file("uapoll.toml")?;
//! let mut poller = create_poller(&config, JsonLinesSink::stdout())?;
//!
//! let mut ticker = tokio::time::interval(Duration::from_secs(10));
//! loop {
//!     ticker.tick().await;
//!     if let Err(e) = poller.poll().await {
//!         tracing::warn!(error = %e, "Poll failed");
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::core::error::{PollerError, Result};
use crate::core::logging::{ErrorContext, LogContext, PollLogConfig, PollLogHandler};
use crate::core::stats::{self, ReadStats};
use crate::core::traits::{ConnectionState, Diagnostics, SessionConnector};
use crate::gateway::resolver::ResolvedNode;
use crate::store::{Metric, MetricSink};

use super::connection::{ConnectionManager, DEFAULT_REQUEST_TIMEOUT};
use super::mapper::{map_reading, PolledRecord};
use super::pipeline::ReadPipeline;

/// Field carrying the status text in every emitted metric.
pub const QUALITY_FIELD: &str = "quality";

/// Tag carrying the node id in every emitted metric.
pub const ID_TAG: &str = "id";

/// A resolved node and its latest record.
#[derive(Debug, Clone)]
pub struct PolledNode {
    /// The node.
    pub node: ResolvedNode,
    /// Latest record, empty until the first successful read.
    pub latest: PolledRecord,
}

impl PolledNode {
    fn new(node: ResolvedNode) -> Self {
        let latest = PolledRecord::empty(node.field_name());
        Self { node, latest }
    }

    /// Build the output metric from the latest record.
    ///
    /// The value field is omitted when the device sent no value; the
    /// quality field is always present.
    pub fn to_metric(&self, timestamp: DateTime<Utc>) -> Metric {
        let mut metric = Metric::new(&self.node.metric_name).with_tag(ID_TAG, &self.node.node_id);
        if let Some(value) = &self.latest.value {
            metric = metric.with_field(self.node.field_name(), value.clone());
        }
        metric = metric.with_field(QUALITY_FIELD, self.latest.status.to_string());
        metric.timestamp = timestamp;
        metric
    }
}

/// Poll-cycle orchestrator for one device.
pub struct DevicePoller<C: SessionConnector, S: MetricSink> {
    nodes: Vec<PolledNode>,
    connection: ConnectionManager<C>,
    pipeline: ReadPipeline,
    sink: S,
    stats: Arc<ReadStats>,
    log: LogContext,
    last_error: Option<String>,
}

impl<C: SessionConnector, S: MetricSink> DevicePoller<C, S> {
    /// Create a poller with default timeouts.
    ///
    /// Read counters are shared with every other poller of the same endpoint.
    pub fn new(name: impl Into<String>, connector: C, nodes: Vec<ResolvedNode>, sink: S) -> Self {
        let stats = stats::register(connector.endpoint());
        Self {
            nodes: nodes.into_iter().map(PolledNode::new).collect(),
            connection: ConnectionManager::new(connector),
            pipeline: ReadPipeline::new(DEFAULT_REQUEST_TIMEOUT),
            sink,
            stats,
            log: LogContext::new(name),
            last_error: None,
        }
    }

    /// Set connect and request timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connection = self.connection.with_timeouts(connect, request);
        self.pipeline = ReadPipeline::new(request);
        self
    }

    /// Use dedicated read counters.
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<ReadStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Set the log handler.
    #[must_use]
    pub fn with_log_handler(mut self, handler: Arc<dyn PollLogHandler>) -> Self {
        self.log.set_handler(handler);
        self
    }

    /// Set the log configuration.
    #[must_use]
    pub fn with_log_config(mut self, config: PollLogConfig) -> Self {
        self.log.set_config(config);
        self
    }

    /// Device name used in logs.
    pub fn name(&self) -> &str {
        self.log.device()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Nodes with their latest records, in resolved order.
    pub fn nodes(&self) -> &[PolledNode] {
        &self.nodes
    }

    /// Shared read counters.
    pub fn stats(&self) -> &Arc<ReadStats> {
        &self.stats
    }

    /// Diagnostics snapshot.
    pub fn diagnostics(&self) -> Diagnostics {
        let counters = self.stats.snapshot();
        Diagnostics {
            endpoint: self.connection.endpoint().to_string(),
            connection_state: self.connection.state(),
            node_count: self.nodes.len(),
            read_success: counters.read_success,
            read_error: counters.read_error,
            last_error: self.last_error.clone(),
        }
    }

    /// Run one poll cycle.
    ///
    /// Connects first when needed, then reads every node in one request and
    /// emits one metric per node. Returns the number of emitted metrics.
    ///
    /// A failed connect returns its error without reading. A failed read
    /// drops the session, counts one read error and emits nothing.
    pub async fn poll(&mut self) -> Result<usize> {
        if !self.connection.state().is_connected() {
            self.connect().await?;
        }

        let started = Instant::now();
        let readings = match self.pipeline.execute(&mut self.connection).await {
            Ok(readings) => readings,
            Err(e) => {
                self.stats.increment_read_error();
                self.handle_read_failure(&e).await;
                return Err(e);
            }
        };
        self.stats.increment_read_success();

        let timestamp = Utc::now();
        let mut degraded = 0;
        for (slot, reading) in self.nodes.iter_mut().zip(&readings) {
            slot.latest = map_reading(&slot.node, reading);
            if !slot.latest.status.is_good() {
                degraded += 1;
            }
            self.sink.emit(slot.to_metric(timestamp)).await;
        }

        let emitted = readings.len();
        self.log
            .log_read_completed(emitted, degraded, started.elapsed().as_millis() as u64)
            .await;
        Ok(emitted)
    }

    /// Close the session. The poller reconnects on the next poll.
    pub async fn close(&mut self) -> Result<()> {
        let old = self.connection.state();
        let result = self.connection.close().await;
        if old != ConnectionState::Disconnected {
            self.log
                .log_state_changed(old, ConnectionState::Disconnected)
                .await;
            self.log.log_disconnected(None).await;
        }
        result
    }

    async fn connect(&mut self) -> Result<()> {
        let old = self.connection.state();
        self.log
            .log_state_changed(old, ConnectionState::Connecting)
            .await;

        let started = Instant::now();
        let result = self
            .connection
            .connect(self.nodes.iter().map(|slot| &slot.node))
            .await;

        match result {
            Ok(registered) => {
                self.log
                    .log_state_changed(ConnectionState::Connecting, ConnectionState::Connected)
                    .await;
                self.log
                    .log_connected(
                        self.connection.endpoint(),
                        started.elapsed().as_millis() as u64,
                        registered,
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                let context = match &e {
                    PollerError::Registration(_)
                    | PollerError::Timeout {
                        operation: "register nodes",
                        ..
                    } => ErrorContext::Registration,
                    _ => ErrorContext::Connection,
                };
                self.log.log_error(e.to_string(), context).await;
                self.log
                    .log_state_changed(ConnectionState::Connecting, ConnectionState::Disconnected)
                    .await;
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn handle_read_failure(&mut self, error: &PollerError) {
        let message = error.to_string();
        self.log.log_error(message.clone(), ErrorContext::Read).await;

        let old = self.connection.state();
        if let Err(close_err) = self.connection.close().await {
            self.log
                .log_error(close_err.to_string(), ErrorContext::Close)
                .await;
        }
        self.log
            .log_state_changed(old, ConnectionState::Disconnected)
            .await;
        self.log.log_disconnected(Some(message.clone())).await;
        self.last_error = Some(message);
    }
}
