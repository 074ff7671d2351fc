//! Poller logging infrastructure.
//!
//! Lifecycle events of a poller (connect, disconnect, state changes, read
//! cycles, errors) are dispatched to a `PollLogHandler`. The default handler
//! forwards them to `tracing`.
//!
//! # Example
//!
//! ```ignore
//! use uapoll::core::logging::{PollLogConfig, PollLogHandler, PollLogEvent};
//!
//! struct MyLogHandler;
//!
//! #[async_trait]
//! impl PollLogHandler for MyLogHandler {
//!     async fn on_log(&self, device: &str, event: PollLogEvent) {
//!         println!("[{}] {:?}", device, event);
//!     }
//! }
//!
//! let poller = poller
//!     .with_log_handler(Arc::new(MyLogHandler))
//!     .with_log_config(PollLogConfig::all());
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::traits::ConnectionState;

// ============================================================================
// Error Context
// ============================================================================

/// Stage in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorContext {
    /// Opening the session.
    Connection,
    /// Registering nodes.
    Registration,
    /// Batched read.
    Read,
    /// Closing the session.
    Close,
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Registration => write!(f, "registration"),
            Self::Read => write!(f, "read"),
            Self::Close => write!(f, "close"),
        }
    }
}

// ============================================================================
// Poll Log Event
// ============================================================================

/// Poller log event.
#[derive(Debug, Clone)]
pub enum PollLogEvent {
    /// Session opened and nodes registered.
    Connected {
        /// Event timestamp.
        timestamp: SystemTime,
        /// Endpoint URL.
        endpoint: String,
        /// Connect duration in milliseconds.
        duration_ms: u64,
        /// Number of registered nodes.
        registered: usize,
    },

    /// Session closed.
    Disconnected {
        /// Event timestamp.
        timestamp: SystemTime,
        /// Disconnect reason (None = intentional close).
        reason: Option<String>,
    },

    /// Read cycle completed.
    ReadCompleted {
        /// Event timestamp.
        timestamp: SystemTime,
        /// Records emitted.
        records: usize,
        /// Records whose status was not good.
        degraded: usize,
        /// Cycle duration in milliseconds.
        duration_ms: u64,
    },

    /// Error occurred.
    Error {
        /// Event timestamp.
        timestamp: SystemTime,
        /// Error message.
        error: String,
        /// Error context.
        context: ErrorContext,
    },

    /// Connection state changed.
    StateChanged {
        /// Event timestamp.
        timestamp: SystemTime,
        /// Previous state.
        old_state: ConnectionState,
        /// New state.
        new_state: ConnectionState,
    },
}

impl PollLogEvent {
    /// Get the event timestamp.
    pub fn timestamp(&self) -> SystemTime {
        match self {
            Self::Connected { timestamp, .. }
            | Self::Disconnected { timestamp, .. }
            | Self::ReadCompleted { timestamp, .. }
            | Self::Error { timestamp, .. }
            | Self::StateChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type.
    pub fn event_type(&self) -> LogEventType {
        match self {
            Self::Connected { .. } => LogEventType::Connected,
            Self::Disconnected { .. } => LogEventType::Disconnected,
            Self::ReadCompleted { .. } => LogEventType::ReadCompleted,
            Self::Error { .. } => LogEventType::Error,
            Self::StateChanged { .. } => LogEventType::StateChanged,
        }
    }
}

// ============================================================================
// Log Event Type (for filtering)
// ============================================================================

/// Log event type for filtering configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    /// Connection events.
    Connected,
    /// Disconnection events.
    Disconnected,
    /// Read cycle events.
    ReadCompleted,
    /// Error events.
    Error,
    /// State change events.
    StateChanged,
}

impl LogEventType {
    /// Get all event types.
    pub fn all() -> HashSet<LogEventType> {
        use LogEventType::*;
        [Connected, Disconnected, ReadCompleted, Error, StateChanged]
            .into_iter()
            .collect()
    }

    /// Get default event types (excludes per-cycle events).
    pub fn default_set() -> HashSet<LogEventType> {
        use LogEventType::*;
        [Connected, Disconnected, Error, StateChanged]
            .into_iter()
            .collect()
    }
}

// ============================================================================
// Poll Log Config
// ============================================================================

/// Poller logging configuration.
#[derive(Debug, Clone)]
pub struct PollLogConfig {
    /// Enabled event types.
    enabled_events: HashSet<LogEventType>,
    /// Read cycle sample rate (1 = every cycle, 10 = every 10th, 0 = never).
    poll_cycle_sample_rate: u32,
}

impl Default for PollLogConfig {
    fn default() -> Self {
        Self {
            enabled_events: LogEventType::default_set(),
            poll_cycle_sample_rate: 1,
        }
    }
}

impl PollLogConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration that logs everything.
    pub fn all() -> Self {
        Self {
            enabled_events: LogEventType::all(),
            poll_cycle_sample_rate: 1,
        }
    }

    /// Create a disabled configuration.
    pub fn disabled() -> Self {
        Self {
            enabled_events: HashSet::new(),
            poll_cycle_sample_rate: 0,
        }
    }

    /// Enable a specific event type.
    #[must_use]
    pub fn enable_event(mut self, event_type: LogEventType) -> Self {
        self.enabled_events.insert(event_type);
        self
    }

    /// Disable a specific event type.
    #[must_use]
    pub fn disable_event(mut self, event_type: LogEventType) -> Self {
        self.enabled_events.remove(&event_type);
        self
    }

    /// Set read cycle sample rate.
    #[must_use]
    pub fn with_poll_sample_rate(mut self, rate: u32) -> Self {
        self.poll_cycle_sample_rate = rate;
        self
    }

    /// Check if an event type is enabled.
    pub fn is_enabled(&self, event_type: LogEventType) -> bool {
        self.enabled_events.contains(&event_type)
    }
}

// ============================================================================
// Poll Log Handler Trait
// ============================================================================

/// Receiver of poller log events.
#[async_trait]
pub trait PollLogHandler: Send + Sync {
    /// Handle a log event for the named device.
    async fn on_log(&self, device: &str, event: PollLogEvent);
}

// ============================================================================
// Built-in Log Handlers
// ============================================================================

/// No-op log handler that discards all events.
pub struct NoopLogHandler;

#[async_trait]
impl PollLogHandler for NoopLogHandler {
    async fn on_log(&self, _device: &str, _event: PollLogEvent) {}
}

/// Composite log handler that forwards events to multiple handlers.
#[derive(Default)]
pub struct CompositeLogHandler {
    handlers: Vec<Arc<dyn PollLogHandler>>,
}

impl CompositeLogHandler {
    /// Create a new composite handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler.
    #[must_use]
    pub fn add(mut self, handler: Arc<dyn PollLogHandler>) -> Self {
        self.handlers.push(handler);
        self
    }
}

#[async_trait]
impl PollLogHandler for CompositeLogHandler {
    async fn on_log(&self, device: &str, event: PollLogEvent) {
        for handler in &self.handlers {
            handler.on_log(device, event.clone()).await;
        }
    }
}

/// Log handler that forwards events to `tracing`.
pub struct TracingLogHandler;

#[async_trait]
impl PollLogHandler for TracingLogHandler {
    async fn on_log(&self, device: &str, event: PollLogEvent) {
        use tracing::{error, info, trace, warn};

        match event {
            PollLogEvent::Connected {
                endpoint,
                duration_ms,
                registered,
                ..
            } => {
                info!(
                    device = device,
                    endpoint = %endpoint,
                    registered = registered,
                    duration_ms = duration_ms,
                    "Connected"
                );
            }
            PollLogEvent::Disconnected { reason, .. } => {
                if let Some(reason) = reason {
                    warn!(device = device, reason = %reason, "Disconnected");
                } else {
                    info!(device = device, "Disconnected");
                }
            }
            PollLogEvent::ReadCompleted {
                records,
                degraded,
                duration_ms,
                ..
            } => {
                trace!(
                    device = device,
                    records = records,
                    degraded = degraded,
                    duration_ms = duration_ms,
                    "Read cycle completed"
                );
            }
            PollLogEvent::Error { error, context, .. } => {
                error!(device = device, error = %error, context = %context, "Poll error");
            }
            PollLogEvent::StateChanged {
                old_state,
                new_state,
                ..
            } => {
                info!(
                    device = device,
                    old_state = %old_state,
                    new_state = %new_state,
                    "Connection state changed"
                );
            }
        }
    }
}

// ============================================================================
// Log Context
// ============================================================================

/// Logging context owned by a poller.
pub struct LogContext {
    /// Device (metric) name.
    device: String,
    /// Log handler.
    handler: Arc<dyn PollLogHandler>,
    /// Log configuration.
    config: PollLogConfig,
    /// Read cycle counter for sampling.
    poll_counter: AtomicU64,
}

impl LogContext {
    /// Create a context logging to `tracing`.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            handler: Arc::new(TracingLogHandler),
            config: PollLogConfig::default(),
            poll_counter: AtomicU64::new(0),
        }
    }

    /// Set the log handler.
    pub fn set_handler(&mut self, handler: Arc<dyn PollLogHandler>) {
        self.handler = handler;
    }

    /// Set the log configuration.
    pub fn set_config(&mut self, config: PollLogConfig) {
        self.config = config;
    }

    /// Get the current configuration.
    pub fn config(&self) -> &PollLogConfig {
        &self.config
    }

    /// Get the device name.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Log an event if its type is enabled.
    pub async fn log(&self, event: PollLogEvent) {
        if self.config.is_enabled(event.event_type()) {
            self.handler.on_log(&self.device, event).await;
        }
    }

    /// Check if a read cycle should be logged (based on sample rate).
    pub fn should_log_poll_cycle(&self) -> bool {
        if !self.config.is_enabled(LogEventType::ReadCompleted) {
            return false;
        }
        match self.config.poll_cycle_sample_rate {
            0 => false,
            1 => true,
            rate => self.poll_counter.fetch_add(1, Ordering::Relaxed) % u64::from(rate) == 0,
        }
    }

    // === Convenience methods ===

    /// Log a connected event.
    pub async fn log_connected(&self, endpoint: &str, duration_ms: u64, registered: usize) {
        self.log(PollLogEvent::Connected {
            timestamp: SystemTime::now(),
            endpoint: endpoint.to_string(),
            duration_ms,
            registered,
        })
        .await;
    }

    /// Log a disconnected event.
    pub async fn log_disconnected(&self, reason: Option<String>) {
        self.log(PollLogEvent::Disconnected {
            timestamp: SystemTime::now(),
            reason,
        })
        .await;
    }

    /// Log an error event.
    pub async fn log_error(&self, error: impl Into<String>, context: ErrorContext) {
        self.log(PollLogEvent::Error {
            timestamp: SystemTime::now(),
            error: error.into(),
            context,
        })
        .await;
    }

    /// Log a state change event. Does nothing if the state did not change.
    pub async fn log_state_changed(&self, old_state: ConnectionState, new_state: ConnectionState) {
        if old_state == new_state {
            return;
        }
        self.log(PollLogEvent::StateChanged {
            timestamp: SystemTime::now(),
            old_state,
            new_state,
        })
        .await;
    }

    /// Log a completed read cycle, subject to sampling.
    pub async fn log_read_completed(&self, records: usize, degraded: usize, duration_ms: u64) {
        if self.should_log_poll_cycle() {
            self.log(PollLogEvent::ReadCompleted {
                timestamp: SystemTime::now(),
                records,
                degraded,
                duration_ms,
            })
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler {
        count: AtomicUsize,
    }

    #[async_trait]
    impl PollLogHandler for CountingHandler {
        async fn on_log(&self, _device: &str, _event: PollLogEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> Arc<CountingHandler> {
        Arc::new(CountingHandler {
            count: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_log_config() {
        let config = PollLogConfig::new();
        assert!(config.is_enabled(LogEventType::Connected));
        assert!(!config.is_enabled(LogEventType::ReadCompleted));

        let config = PollLogConfig::all();
        assert!(config.is_enabled(LogEventType::ReadCompleted));

        let config = PollLogConfig::disabled().enable_event(LogEventType::Error);
        assert!(config.is_enabled(LogEventType::Error));
        assert!(!config.is_enabled(LogEventType::Connected));
    }

    #[tokio::test]
    async fn test_log_context_filters_events() {
        let handler = counting();
        let mut ctx = LogContext::new("plc1");
        ctx.set_handler(handler.clone());

        ctx.log_connected("opc.tcp://localhost:4840", 12, 3).await;
        ctx.log_error("boom", ErrorContext::Read).await;
        // Not in the default set.
        ctx.log_read_completed(3, 0, 5).await;

        assert_eq!(handler.count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_state_change_skips_same_state() {
        let handler = counting();
        let mut ctx = LogContext::new("plc1");
        ctx.set_handler(handler.clone());

        ctx.log_state_changed(ConnectionState::Connected, ConnectionState::Connected)
            .await;
        ctx.log_state_changed(ConnectionState::Connecting, ConnectionState::Connected)
            .await;

        assert_eq!(handler.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_cycle_sampling() {
        let handler = counting();
        let mut ctx = LogContext::new("plc1");
        ctx.set_handler(handler.clone());
        ctx.set_config(PollLogConfig::all().with_poll_sample_rate(3));

        for _ in 0..6 {
            ctx.log_read_completed(1, 0, 1).await;
        }
        assert_eq!(handler.count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_composite_handler() {
        let a = counting();
        let b = counting();
        let composite = CompositeLogHandler::new().add(a.clone()).add(b.clone());

        composite
            .on_log(
                "plc1",
                PollLogEvent::Disconnected {
                    timestamp: SystemTime::now(),
                    reason: None,
                },
            )
            .await;

        assert_eq!(a.count.load(Ordering::SeqCst), 1);
        assert_eq!(b.count.load(Ordering::SeqCst), 1);
        NoopLogHandler
            .on_log(
                "plc1",
                PollLogEvent::Disconnected {
                    timestamp: SystemTime::now(),
                    reason: None,
                },
            )
            .await;
    }
}
