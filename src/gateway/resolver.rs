//! Node resolution.
//!
//! Flattens root nodes and groups into one ordered list: root nodes first in
//! configured order, then each group's nodes in order. Group defaults only
//! fill values a node leaves empty.

use std::collections::HashSet;

use crate::core::error::{AddressError, PollerError, Result};

use super::address::{build_node_id, parse_node_id, IdentifierType, NodeAddress};
use super::config::{GroupSettings, InputConfig, NodeSettings};

/// A node ready for registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedNode {
    /// Node settings after group defaults were applied.
    pub settings: NodeSettings,

    /// Metric name the node's records are emitted under.
    pub metric_name: String,

    /// Canonical `ns=..;x=..` string, used as the `id` tag.
    pub node_id: String,

    /// Parsed address, or the reason it could not be parsed.
    pub address: std::result::Result<NodeAddress, AddressError>,
}

impl ResolvedNode {
    /// Output field name.
    #[inline]
    pub fn field_name(&self) -> &str {
        &self.settings.field_name
    }

    /// Parsed address, turning a deferred parse failure into an error.
    pub fn address(&self) -> Result<&NodeAddress> {
        self.address.as_ref().map_err(|e| PollerError::Address {
            field: self.settings.field_name.clone(),
            source: e.clone(),
        })
    }
}

/// Resolve all configured nodes of an input.
pub fn resolve_config(config: &InputConfig) -> Result<Vec<ResolvedNode>> {
    resolve_nodes(&config.metric_name, &config.nodes, &config.groups)
}

/// Resolve root nodes and groups into an ordered node list.
///
/// Fails on the first node with an empty field name, an invalid identifier
/// type or a duplicated field name. Address parse failures do not fail
/// resolution; they are kept on the node.
pub fn resolve_nodes(
    default_metric: &str,
    root_nodes: &[NodeSettings],
    groups: &[GroupSettings],
) -> Result<Vec<ResolvedNode>> {
    let capacity = root_nodes.len() + groups.iter().map(|g| g.nodes.len()).sum::<usize>();
    let mut merged: Vec<(NodeSettings, &str)> = Vec::with_capacity(capacity);

    for node in root_nodes {
        merged.push((node.clone(), default_metric));
    }

    for group in groups {
        let metric = if group.metric_name.is_empty() {
            default_metric
        } else {
            group.metric_name.as_str()
        };

        for node in &group.nodes {
            let mut node = node.clone();
            if node.namespace.is_empty() {
                node.namespace = group.namespace.clone();
            }
            if node.identifier_type.is_empty() {
                node.identifier_type = group.identifier_type.clone();
            }
            merged.push((node, metric));
        }
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(merged.len());
    for (node, _) in &merged {
        if node.field_name.is_empty() {
            return Err(PollerError::Config(format!(
                "empty field_name for node '{}'",
                build_node_id(&node.namespace, &node.identifier_type, &node.identifier)
            )));
        }
        if !seen.insert(node.field_name.as_str()) {
            return Err(PollerError::Config(format!(
                "field_name '{}' is duplicated",
                node.field_name
            )));
        }
        if node.identifier_type.parse::<IdentifierType>().is_err() {
            return Err(PollerError::Config(format!(
                "invalid identifier type '{}' in '{}'",
                node.identifier_type, node.field_name
            )));
        }
    }

    Ok(merged
        .into_iter()
        .map(|(settings, metric)| {
            let node_id = build_node_id(
                &settings.namespace,
                &settings.identifier_type,
                &settings.identifier,
            );
            let address = parse_node_id(&node_id);
            ResolvedNode {
                settings,
                metric_name: metric.to_string(),
                node_id,
                address,
            }
        })
        .collect())
}
