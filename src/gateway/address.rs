//! Node address building and parsing.
//!
//! A configured node becomes the canonical string
//! `ns=<namespace>;<identifier_type>=<identifier>` (for example
//! `ns=0;i=2262`), which is then parsed into a typed `NodeAddress`.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::AddressError;

/// Identifier type of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierType {
    /// `s` - string identifier.
    #[serde(rename = "s")]
    String,
    /// `i` - numeric identifier.
    #[serde(rename = "i")]
    Numeric,
    /// `g` - GUID identifier.
    #[serde(rename = "g")]
    Guid,
    /// `b` - opaque (base64 byte string) identifier.
    #[serde(rename = "b")]
    Opaque,
}

impl IdentifierType {
    /// Single-letter tag used in node id strings.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::String => "s",
            Self::Numeric => "i",
            Self::Guid => "g",
            Self::Opaque => "b",
        }
    }
}

impl FromStr for IdentifierType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(Self::String),
            "i" => Ok(Self::Numeric),
            "g" => Ok(Self::Guid),
            "b" => Ok(Self::Opaque),
            other => Err(format!("invalid identifier type '{}'", other)),
        }
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Typed node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIdentifier {
    Numeric(u32),
    String(String),
    Guid(Uuid),
    Opaque(Vec<u8>),
}

impl NodeIdentifier {
    /// Identifier type tag of this identifier.
    pub const fn identifier_type(&self) -> IdentifierType {
        match self {
            Self::Numeric(_) => IdentifierType::Numeric,
            Self::String(_) => IdentifierType::String,
            Self::Guid(_) => IdentifierType::Guid,
            Self::Opaque(_) => IdentifierType::Opaque,
        }
    }
}

/// A parsed protocol address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    /// Namespace index.
    pub namespace: u16,
    /// Identifier within the namespace.
    pub identifier: NodeIdentifier,
}

impl NodeAddress {
    /// Create an address.
    pub fn new(namespace: u16, identifier: NodeIdentifier) -> Self {
        Self {
            namespace,
            identifier,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};", self.namespace)?;
        match &self.identifier {
            NodeIdentifier::Numeric(n) => write!(f, "i={}", n),
            NodeIdentifier::String(s) => write!(f, "s={}", s),
            NodeIdentifier::Guid(g) => write!(f, "g={}", g.hyphenated()),
            NodeIdentifier::Opaque(b) => write!(f, "b={}", BASE64.encode(b)),
        }
    }
}

impl FromStr for NodeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_node_id(s)
    }
}

/// Build the canonical node id string.
///
/// The parts are concatenated verbatim; no validation happens here.
pub fn build_node_id(namespace: &str, identifier_type: &str, identifier: &str) -> String {
    format!("ns={};{}={}", namespace, identifier_type, identifier)
}

/// Parse `ns=N;x=ID` into a `NodeAddress`.
///
/// The namespace prefix is optional and defaults to 0.
pub fn parse_node_id(node_id: &str) -> Result<NodeAddress, AddressError> {
    let err = |reason: String| AddressError::new(node_id, reason);

    let (namespace, rest) = match node_id.strip_prefix("ns=") {
        Some(tail) => {
            let (ns_str, rest) = tail
                .split_once(';')
                .ok_or_else(|| err("expected 'ns=<namespace>;<type>=<identifier>'".into()))?;
            let ns = ns_str
                .parse::<u16>()
                .map_err(|_| err(format!("invalid namespace '{}'", ns_str)))?;
            (ns, rest)
        }
        None => (0u16, node_id),
    };

    let (type_str, id_str) = rest
        .split_once('=')
        .ok_or_else(|| err("missing identifier type".into()))?;
    let identifier_type = type_str.parse::<IdentifierType>().map_err(err)?;

    if id_str.is_empty() {
        return Err(err("empty identifier".into()));
    }

    let identifier = match identifier_type {
        IdentifierType::Numeric => id_str
            .parse::<u32>()
            .map(NodeIdentifier::Numeric)
            .map_err(|_| err(format!("invalid numeric identifier '{}'", id_str)))?,
        IdentifierType::String => NodeIdentifier::String(id_str.to_string()),
        IdentifierType::Guid => Uuid::parse_str(id_str)
            .map(NodeIdentifier::Guid)
            .map_err(|e| err(format!("invalid GUID '{}': {}", id_str, e)))?,
        IdentifierType::Opaque => BASE64
            .decode(id_str)
            .map(NodeIdentifier::Opaque)
            .map_err(|e| err(format!("invalid opaque identifier '{}': {}", id_str, e)))?,
    };

    Ok(NodeAddress::new(namespace, identifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_node_id() {
        assert_eq!(build_node_id("0", "i", "2262"), "ns=0;i=2262");
        assert_eq!(build_node_id("3", "s", "Line1.Temp"), "ns=3;s=Line1.Temp");
    }

    #[test]
    fn test_parse_numeric() {
        let addr = parse_node_id("ns=0;i=2262").unwrap();
        assert_eq!(addr.namespace, 0);
        assert_eq!(addr.identifier, NodeIdentifier::Numeric(2262));
        assert_eq!(addr.to_string(), "ns=0;i=2262");
    }

    #[test]
    fn test_parse_string_keeps_separators() {
        let addr = parse_node_id("ns=2;s=Plant;Line=1").unwrap();
        assert_eq!(addr.namespace, 2);
        assert_eq!(
            addr.identifier,
            NodeIdentifier::String("Plant;Line=1".to_string())
        );
    }

    #[test]
    fn test_parse_no_namespace() {
        let addr = parse_node_id("i=85").unwrap();
        assert_eq!(addr.namespace, 0);
        assert_eq!(addr.identifier.identifier_type(), IdentifierType::Numeric);
    }

    #[test]
    fn test_parse_guid_and_opaque() {
        let addr = parse_node_id("ns=1;g=09087e75-8e5e-499b-954f-f2a9603db28a").unwrap();
        assert!(matches!(addr.identifier, NodeIdentifier::Guid(_)));
        assert_eq!(addr.to_string(), "ns=1;g=09087e75-8e5e-499b-954f-f2a9603db28a");

        let addr = parse_node_id("ns=1;b=AQID").unwrap();
        assert_eq!(addr.identifier, NodeIdentifier::Opaque(vec![1, 2, 3]));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_node_id("ns=;i=1").is_err());
        assert!(parse_node_id("ns=70000;i=1").is_err());
        assert!(parse_node_id("ns=0;i=abc").is_err());
        assert!(parse_node_id("ns=0;i=").is_err());
        assert!(parse_node_id("ns=0;x=1").is_err());
        assert!(parse_node_id("ns=0;g=not-a-guid").is_err());
        assert!(parse_node_id("ns=0;b=***").is_err());

        let err = parse_node_id("ns=zero;i=1").unwrap_err();
        assert_eq!(err.node_id, "ns=zero;i=1");
        assert!(err.reason.contains("namespace"));
    }

    #[test]
    fn test_identifier_type_from_str() {
        assert_eq!("s".parse::<IdentifierType>(), Ok(IdentifierType::String));
        assert_eq!("b".parse::<IdentifierType>(), Ok(IdentifierType::Opaque));
        assert!("".parse::<IdentifierType>().is_err());
        assert!("I".parse::<IdentifierType>().is_err());
    }
}
