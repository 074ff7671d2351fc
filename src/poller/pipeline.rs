//! Batched read execution.

use std::time::Duration;

use tokio::time::timeout;

use crate::core::error::{PollerError, Result};
use crate::core::traits::{DeviceSession, RawReading, SessionConnector};

use super::connection::ConnectionManager;

/// Sends the batched read request of a connected manager.
#[derive(Debug, Clone, Copy)]
pub struct ReadPipeline {
    request_timeout: Duration,
}

impl ReadPipeline {
    /// Create a pipeline bounding each read by `request_timeout`.
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    /// Execute one batched read.
    ///
    /// Returns exactly one reading per registered node, in registration
    /// order. Per-node status codes are left in the readings.
    pub async fn execute<C: SessionConnector>(
        &self,
        connection: &mut ConnectionManager<C>,
    ) -> Result<Vec<RawReading>> {
        let (session, request) = connection.active_mut().ok_or(PollerError::NotConnected)?;
        let expected = request.len();

        let readings = timeout(self.request_timeout, session.read(request))
            .await
            .map_err(|_| PollerError::timeout("read", self.request_timeout))??;

        if readings.len() != expected {
            return Err(PollerError::Protocol(format!(
                "read returned {} results for {} nodes",
                readings.len(),
                expected
            )));
        }

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::Value;
    use crate::core::quality::StatusCode;
    use crate::gateway::config::NodeSettings;
    use crate::gateway::resolver::{resolve_nodes, ResolvedNode};
    use crate::poller::mock::{MockConnector, ReadOutcome};

    fn two_nodes() -> Vec<ResolvedNode> {
        resolve_nodes(
            "opcua",
            &[
                NodeSettings::new("a", "0", "i", "1"),
                NodeSettings::new("b", "0", "i", "2"),
            ],
            &[],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_execute_requires_connection() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());
        let pipeline = ReadPipeline::new(Duration::from_secs(1));

        let err = pipeline.execute(&mut manager).await.unwrap_err();
        assert!(matches!(err, PollerError::NotConnected));
        assert_eq!(connector.with(|s| s.read_calls), 0);
    }

    #[tokio::test]
    async fn test_execute_keeps_order_and_status() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());
        manager.connect(&two_nodes()).await.unwrap();

        connector.push_read(ReadOutcome::Readings(vec![
            RawReading::good(1.5f32),
            RawReading::default().with_status(StatusCode::BAD_NODE_ID_UNKNOWN),
        ]));

        let readings = ReadPipeline::new(Duration::from_secs(1))
            .execute(&mut manager)
            .await
            .unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].value, Some(Value::Float(1.5)));
        assert_eq!(readings[1].status, StatusCode::BAD_NODE_ID_UNKNOWN);
    }

    #[tokio::test]
    async fn test_result_count_mismatch() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());
        manager.connect(&two_nodes()).await.unwrap();
        connector.push_read(ReadOutcome::Readings(vec![RawReading::good(true)]));

        let err = ReadPipeline::new(Duration::from_secs(1))
            .execute(&mut manager)
            .await
            .unwrap_err();
        assert!(matches!(err, PollerError::Protocol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());
        manager.connect(&two_nodes()).await.unwrap();
        connector.push_read(ReadOutcome::Hang);

        let err = ReadPipeline::new(Duration::from_millis(500))
            .execute(&mut manager)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "read timed out after 500ms");
    }
}
