//! Poller factory.
//!
//! Creates `DevicePoller` instances from configuration.

use crate::core::error::Result;
use crate::core::traits::SessionConnector;
use crate::poller::DevicePoller;
use crate::store::MetricSink;

use super::config::InputConfig;
use super::resolver::resolve_config;

/// Create a poller over any connector.
///
/// Validates the configuration and resolves every node before returning.
/// No network activity happens here.
pub fn create_poller_with<C, S>(config: &InputConfig, connector: C, sink: S) -> Result<DevicePoller<C, S>>
where
    C: SessionConnector,
    S: MetricSink,
{
    config.validate()?;
    let nodes = resolve_config(config)?;

    tracing::debug!(
        device = %config.metric_name,
        endpoint = %config.endpoint,
        nodes = nodes.len(),
        "Poller created"
    );

    Ok(DevicePoller::new(config.metric_name.clone(), connector, nodes, sink)
        .with_timeouts(config.connect_timeout(), config.request_timeout()))
}

/// Create an OPC UA poller from configuration.
#[cfg(feature = "opcua")]
pub fn create_poller<S: MetricSink>(
    config: &InputConfig,
    sink: S,
) -> Result<DevicePoller<crate::protocols::opcua::OpcUaConnector, S>> {
    use crate::protocols::opcua::OpcUaConnector;

    let connector = OpcUaConnector::from_config(config)?;
    create_poller_with(config, connector, sink)
}
