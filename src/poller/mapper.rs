//! Raw reading to output record mapping.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::core::data::{Value, ValueType};
use crate::core::quality::{Quality, StatusCode};
use crate::core::traits::RawReading;
use crate::gateway::resolver::ResolvedNode;

/// Latest polled state of one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PolledRecord {
    /// Output field name.
    pub field_name: String,

    /// Value, absent when the device sent none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Type of `value`, set exactly when `value` is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,

    /// Device status code.
    pub status: StatusCode,

    /// Server timestamp, RFC 3339 with milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<String>,

    /// Source timestamp, RFC 3339 with milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<String>,
}

impl PolledRecord {
    /// An empty record for a field that was never read.
    pub fn empty(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            ..Self::default()
        }
    }

    /// Quality derived from the status code.
    #[inline]
    pub fn quality(&self) -> Quality {
        self.status.quality()
    }
}

/// Map one raw reading onto the record of its node.
pub fn map_reading(node: &ResolvedNode, reading: &RawReading) -> PolledRecord {
    PolledRecord {
        field_name: node.field_name().to_string(),
        value: reading.value.clone(),
        value_type: reading.value.as_ref().map(Value::value_type),
        status: reading.status,
        server_timestamp: reading.server_timestamp.as_ref().map(format_timestamp),
        source_timestamp: reading.source_timestamp.as_ref().map(format_timestamp),
    }
}

/// Stable text form of a timestamp: `2024-01-02T03:04:05.678Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::config::NodeSettings;
    use crate::gateway::resolver::resolve_nodes;
    use chrono::TimeZone;

    fn node() -> ResolvedNode {
        resolve_nodes("opcua", &[NodeSettings::new("temp", "2", "s", "T1")], &[])
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_map_good_reading() {
        let server = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(678);
        let source = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 4).unwrap();
        let reading = RawReading::good(Value::Int16(-7)).with_timestamps(Some(server), Some(source));

        let record = map_reading(&node(), &reading);
        assert_eq!(record.field_name, "temp");
        assert_eq!(record.value, Some(Value::Int16(-7)));
        assert_eq!(record.value_type, Some(ValueType::Int16));
        assert_eq!(record.quality(), Quality::Good);
        assert_eq!(record.server_timestamp.as_deref(), Some("2024-01-02T03:04:05.678Z"));
        assert_eq!(record.source_timestamp.as_deref(), Some("2024-01-02T03:04:04.000Z"));
    }

    #[test]
    fn test_map_absent_value() {
        let reading = RawReading::default().with_status(StatusCode::BAD_NODE_ID_UNKNOWN);
        let record = map_reading(&node(), &reading);

        assert_eq!(record.value, None);
        assert_eq!(record.value_type, None);
        assert_eq!(record.status, StatusCode::BAD_NODE_ID_UNKNOWN);
        assert_eq!(record.quality(), Quality::Bad);
        assert!(record.server_timestamp.is_none());
    }

    #[test]
    fn test_empty_record() {
        let record = PolledRecord::empty("x");
        assert_eq!(record.field_name, "x");
        assert!(record.value.is_none());
        assert_eq!(record.status, StatusCode::GOOD);
    }
}
