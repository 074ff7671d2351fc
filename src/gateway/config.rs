//! Input configuration.
//!
//! Deserialized from TOML. Unknown keys are rejected. Timeouts are read
//! from `connect_timeout_ms` / `request_timeout_ms` (milliseconds) or from
//! their duration-string spellings `connect_timeout` / `request_timeout`
//! (`"10s"`, `"500ms"`, `"1m30s"`); giving both spellings is an error.
//!
//! ```toml
//! metric_name = "opcua"
//! endpoint = "opc.tcp://localhost:4840"
//! security_policy = "auto"
//! security_mode = "auto"
//! auth_method = "Anonymous"
//! connect_timeout_ms = 10000
//! request_timeout_ms = 5000
//! nodes = [
//!   { field_name = "ProductUri", namespace = "0", identifier_type = "i", identifier = "2262" },
//! ]
//!
//! [[group]]
//! metric_name = "line1"
//! namespace = "3"
//! identifier_type = "s"
//! nodes = [{ field_name = "temp", identifier = "Line1.Temp" }]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::error::{PollerError, Result};

/// The only transport scheme the poller speaks.
pub const SUPPORTED_SCHEME: &str = "opc.tcp";

/// Security policy requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityPolicy {
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
    /// Pick the most secure policy the server offers.
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

/// Message security mode requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityMode {
    None,
    Sign,
    SignAndEncrypt,
    /// Pick the most secure mode the server offers.
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

/// User authentication method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthMethod {
    #[default]
    Anonymous,
    UserName,
    Certificate,
}

/// One configured node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSettings {
    /// Output field name.
    #[serde(default)]
    pub field_name: String,

    /// Namespace index as written in the config (may be empty inside a group).
    #[serde(default)]
    pub namespace: String,

    /// Identifier type `s`, `i`, `g` or `b` (may be empty inside a group).
    #[serde(default)]
    pub identifier_type: String,

    /// Identifier as shown in an OPC UA browser.
    #[serde(default)]
    pub identifier: String,
}

impl NodeSettings {
    /// Create node settings.
    pub fn new(
        field_name: impl Into<String>,
        namespace: impl Into<String>,
        identifier_type: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            namespace: namespace.into(),
            identifier_type: identifier_type.into(),
            identifier: identifier.into(),
        }
    }
}

/// A group of nodes sharing defaults and an output metric name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSettings {
    /// Overrides the top-level metric name when non-empty.
    #[serde(default)]
    pub metric_name: String,

    /// Default namespace for nodes that leave it empty.
    #[serde(default)]
    pub namespace: String,

    /// Default identifier type for nodes that leave it empty.
    #[serde(default)]
    pub identifier_type: String,

    /// Nodes in this group.
    #[serde(default)]
    pub nodes: Vec<NodeSettings>,
}

/// Complete input configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Default metric name for root nodes and unnamed groups.
    #[serde(default = "default_metric_name")]
    pub metric_name: String,

    /// Server endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Security policy.
    #[serde(default)]
    pub security_policy: SecurityPolicy,

    /// Message security mode.
    #[serde(default)]
    pub security_mode: SecurityMode,

    /// Client certificate (PEM/DER). Generated when absent and security is used.
    #[serde(default)]
    pub certificate: Option<PathBuf>,

    /// Client private key.
    #[serde(default)]
    pub private_key: Option<PathBuf>,

    /// Authentication method.
    #[serde(default)]
    pub auth_method: AuthMethod,

    /// Username for `UserName` auth.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for `UserName` auth.
    #[serde(default)]
    pub password: Option<String>,

    /// Maximum time to establish a session.
    #[serde(
        default = "default_connect_timeout_ms",
        alias = "connect_timeout",
        deserialize_with = "deserialize_timeout_ms"
    )]
    pub connect_timeout_ms: u64,

    /// Maximum time for one request over an established session.
    #[serde(
        default = "default_request_timeout_ms",
        alias = "request_timeout",
        deserialize_with = "deserialize_timeout_ms"
    )]
    pub request_timeout_ms: u64,

    /// Client application name.
    #[serde(default = "default_app_name")]
    pub application_name: String,

    /// Client application URI.
    #[serde(default = "default_app_uri")]
    pub application_uri: String,

    /// Auto-trust server certificates.
    #[serde(default = "default_trust_certs")]
    pub trust_server_certs: bool,

    /// PKI directory for certificate storage.
    #[serde(default)]
    pub pki_dir: Option<PathBuf>,

    /// Root nodes.
    #[serde(default)]
    pub nodes: Vec<NodeSettings>,

    /// Node groups.
    #[serde(default, rename = "group")]
    pub groups: Vec<GroupSettings>,
}

fn default_metric_name() -> String {
    "opcua".to_string()
}

fn default_endpoint() -> String {
    "opc.tcp://localhost:4840".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_app_name() -> String {
    "uapoll OPC UA Client".to_string()
}

fn default_app_uri() -> String {
    "urn:uapoll:opcua:client".to_string()
}

fn default_trust_certs() -> bool {
    true
}

/// Parse a duration string such as `"10s"`, `"500ms"`, `"1.5h"` or `"1m30s"`.
///
/// Units: `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`. Every number needs a unit.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty duration".into());
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut total = Duration::ZERO;
    let mut rest = trimmed;

    while !rest.is_empty() {
        let number_len = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let unit_len = rest.find(is_number).unwrap_or(rest.len());
        let unit_nanos: u64 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            "" => return Err(format!("missing unit in duration '{}'", trimmed)),
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, trimmed)),
        };
        rest = &rest[unit_len..];

        let invalid = || format!("invalid duration '{}'", trimmed);
        let part = if number.contains('.') {
            let value: f64 = number.parse().map_err(|_| invalid())?;
            Duration::try_from_secs_f64(value * unit_nanos as f64 / 1e9).map_err(|_| invalid())?
        } else {
            let value: u64 = number.parse().map_err(|_| invalid())?;
            value
                .checked_mul(unit_nanos)
                .map(Duration::from_nanos)
                .ok_or_else(invalid)?
        };
        total = total.checked_add(part).ok_or_else(invalid)?;
    }

    Ok(total)
}

/// Accepts milliseconds as an integer or a duration string.
fn deserialize_timeout_ms<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct TimeoutVisitor;

    impl<'de> Visitor<'de> for TimeoutVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("milliseconds or a duration string like \"10s\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("negative timeout {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u64, E> {
            let duration = parse_duration(v).map_err(E::custom)?;
            u64::try_from(duration.as_millis())
                .map_err(|_| E::custom(format!("timeout '{}' out of range", v)))
        }
    }

    deserializer.deserialize_any(TimeoutVisitor)
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            metric_name: default_metric_name(),
            endpoint: default_endpoint(),
            security_policy: SecurityPolicy::default(),
            security_mode: SecurityMode::default(),
            certificate: None,
            private_key: None,
            auth_method: AuthMethod::default(),
            username: None,
            password: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            application_name: default_app_name(),
            application_uri: default_app_uri(),
            trust_server_certs: default_trust_certs(),
            pki_dir: None,
            nodes: Vec::new(),
            groups: Vec::new(),
        }
    }
}

impl InputConfig {
    /// Parse from a TOML string. Does not validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load from a TOML file. Does not validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PollerError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Total configured nodes across root and groups.
    pub fn node_count(&self) -> usize {
        self.nodes.len() + self.groups.iter().map(|g| g.nodes.len()).sum::<usize>()
    }

    /// Validate device-level settings. Node settings are validated by the resolver.
    pub fn validate(&self) -> Result<()> {
        if self.metric_name.is_empty() {
            return Err(PollerError::Config("device name is empty".into()));
        }

        validate_endpoint(&self.endpoint)?;

        if self.connect_timeout_ms == 0 {
            return Err(PollerError::Config(format!(
                "connect_timeout_ms must be positive in '{}'",
                self.metric_name
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(PollerError::Config(format!(
                "request_timeout_ms must be positive in '{}'",
                self.metric_name
            )));
        }

        match self.auth_method {
            AuthMethod::Anonymous => {}
            AuthMethod::UserName => {
                if self.username.as_deref().map_or(true, str::is_empty) {
                    return Err(PollerError::Config(format!(
                        "auth_method 'UserName' requires a username in '{}'",
                        self.metric_name
                    )));
                }
            }
            AuthMethod::Certificate => {
                if self.certificate.is_none() || self.private_key.is_none() {
                    return Err(PollerError::Config(format!(
                        "auth_method 'Certificate' requires certificate and private_key in '{}'",
                        self.metric_name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Check that an endpoint is a parseable `opc.tcp` URL.
pub fn validate_endpoint(endpoint: &str) -> Result<Url> {
    if endpoint.is_empty() {
        return Err(PollerError::Config("endpoint url is empty".into()));
    }

    let url = Url::parse(endpoint)
        .map_err(|e| PollerError::Config(format!("endpoint url '{}' is invalid: {}", endpoint, e)))?;

    if url.scheme() != SUPPORTED_SCHEME {
        return Err(PollerError::Config(format!(
            "unsupported scheme '{}' in endpoint. Expected {}",
            url.scheme(),
            SUPPORTED_SCHEME
        )));
    }

    Ok(url)
}
