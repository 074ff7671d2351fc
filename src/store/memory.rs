//! In-memory sink implementation using DashMap.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use super::traits::{Metric, MetricSink};

/// In-memory sink.
///
/// Keeps the latest record per `name:id` key for lookups and the full
/// emission history in order.
///
/// # Example
///
/// ```rust
/// use uapoll::store::MemorySink;
///
/// let sink = MemorySink::new();
/// ```
pub struct MemorySink {
    /// Latest record: "metric_name:node_id" -> Metric
    latest: DashMap<String, Metric>,

    /// Every emitted record, in order.
    history: RwLock<Vec<Metric>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self {
            latest: DashMap::new(),
            history: RwLock::new(Vec::new()),
        }
    }

    fn make_key(name: &str, id: &str) -> String {
        format!("{}:{}", name, id)
    }

    /// Latest record for a metric name and node id.
    pub fn latest(&self, name: &str, node_id: &str) -> Option<Metric> {
        self.latest
            .get(&Self::make_key(name, node_id))
            .map(|r| r.value().clone())
    }

    /// All records emitted so far.
    pub async fn history(&self) -> Vec<Metric> {
        self.history.read().await.clone()
    }

    /// Number of records emitted so far.
    pub async fn len(&self) -> usize {
        self.history.read().await.len()
    }

    /// Check if nothing was emitted.
    pub async fn is_empty(&self) -> bool {
        self.history.read().await.is_empty()
    }

    /// Drop everything.
    pub async fn clear(&self) {
        self.latest.clear();
        self.history.write().await.clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    async fn emit(&self, metric: Metric) {
        let key = Self::make_key(&metric.name, metric.tag("id").unwrap_or_default());
        self.latest.insert(key, metric.clone());
        self.history.write().await.push(metric);
    }
}
