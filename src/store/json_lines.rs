//! JSON Lines sink.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;

use super::traits::{Metric, MetricSink};

/// Writes each record as one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    /// Sink writing to stdout.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl<W: Write + Send> MetricSink for JsonLinesSink<W> {
    async fn emit(&self, metric: Metric) {
        let line = match serde_json::to_string(&metric) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(metric = %metric.name, error = %e, "Failed to serialize metric");
                return;
            }
        };

        let mut writer = match self.writer.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::warn!(metric = %metric.name, error = %e, "Failed to write metric");
        }
    }
}
