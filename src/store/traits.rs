//! MetricSink trait definition.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::data::Value;

/// One emitted record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Metric (group) name.
    pub name: String,

    /// Field values: the node's field and its `quality`.
    pub fields: BTreeMap<String, Value>,

    /// Tags: `id` carries the node id.
    pub tags: BTreeMap<String, String>,

    /// When the poller emitted the record.
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    /// Create an empty metric stamped now.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
            tags: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add a field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Get a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Receiver of polled records.
///
/// The poller calls `emit` once per record, in resolved node order.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Accept one record.
    async fn emit(&self, metric: Metric);
}

#[async_trait]
impl<T: MetricSink + ?Sized> MetricSink for std::sync::Arc<T> {
    async fn emit(&self, metric: Metric) {
        (**self).emit(metric).await
    }
}
