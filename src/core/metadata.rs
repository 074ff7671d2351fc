//! Input metadata.
//!
//! Self-describing parameter list for the OPC UA input, used by the CLI to
//! document the configuration.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameter type for configuration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
    Float,
    Object,
    Array,
}

/// Metadata for a single configuration parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterMetadata {
    /// Internal parameter name (used in config).
    pub name: &'static str,
    /// Human-readable display name.
    pub display_name: &'static str,
    /// Description of the parameter.
    pub description: &'static str,
    /// Whether this parameter is required.
    pub required: bool,
    /// Default value if not specified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Type of the parameter.
    pub param_type: ParameterType,
}

impl ParameterMetadata {
    /// Create a new optional parameter with a default value.
    pub fn optional(
        name: &'static str,
        display_name: &'static str,
        description: &'static str,
        param_type: ParameterType,
        default_value: Value,
    ) -> Self {
        Self {
            name,
            display_name,
            description,
            required: false,
            default_value: Some(default_value),
            param_type,
        }
    }
}

/// Metadata for the input.
#[derive(Debug, Clone, Serialize)]
pub struct InputMetadata {
    /// Internal input name.
    pub name: &'static str,
    /// Human-readable display name.
    pub display_name: &'static str,
    /// Description of the input.
    pub description: &'static str,
    /// Available configuration parameters.
    pub parameters: Vec<ParameterMetadata>,
}

impl InputMetadata {
    /// Get a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterMetadata> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// A complete, commented configuration.
pub const SAMPLE_CONFIG: &str = r#"## Retrieve data from OPC UA devices

## Metric name
# metric_name = "opcua"

## OPC UA Endpoint URL
# endpoint = "opc.tcp://localhost:4840"

## Maximum time allowed to establish a connect to the endpoint, in
## milliseconds. `connect_timeout = "10s"` is accepted as well.
# connect_timeout_ms = 10000

## Maximum time allowed for a request over the established connection, in
## milliseconds. `request_timeout = "5s"` is accepted as well.
# request_timeout_ms = 5000

## Security policy, one of "None", "Basic128Rsa15", "Basic256",
## "Basic256Sha256", or "auto"
# security_policy = "auto"

## Security mode, one of "None", "Sign", "SignAndEncrypt", or "auto"
# security_mode = "auto"

## Path to client certificate and private key. A sample keypair is
## generated when security is used and these are not set.
# certificate = "/etc/uapoll/cert.pem"
# private_key = "/etc/uapoll/key.pem"

## Authentication method, one of "Certificate", "UserName", or "Anonymous".
# auth_method = "Anonymous"
# username = ""
# password = ""

## Client application identity and PKI directory.
# application_name = "uapoll OPC UA Client"
# application_uri = "urn:uapoll:opcua:client"
# trust_server_certs = true
# pki_dir = "./pki"

## Node ID configuration
## field_name        - field name to use in the output
## namespace         - OPC UA namespace of the node (integer value 0 thru 3)
## identifier_type   - OPC UA ID type (s=string, i=numeric, g=guid, b=opaque)
## identifier        - OPC UA ID (tag as shown in opcua browser)
# nodes = [
#   { field_name = "ProductUri", namespace = "0", identifier_type = "i", identifier = "2262" },
#   { field_name = "ManufacturerName", namespace = "0", identifier_type = "i", identifier = "2263" },
# ]

## Node Group
## Sets defaults for namespace and identifier type. A node that sets its
## own namespace or identifier type keeps it.
# [[group]]
# metric_name = "line1"
# namespace = "3"
# identifier_type = "s"
# nodes = [
#   { field_name = "temp", identifier = "Line1.Temperature" },
#   { field_name = "count", identifier_type = "i", identifier = "1001" },
# ]
"#;

fn build_metadata() -> InputMetadata {
    use serde_json::json;

    InputMetadata {
        name: "opcua",
        display_name: "OPC UA",
        description: "Polls OPC UA server nodes with one batched read per cycle.",
        parameters: vec![
            ParameterMetadata::optional(
                "metric_name",
                "Metric Name",
                "Metric name for root nodes and groups without their own name",
                ParameterType::String,
                json!("opcua"),
            ),
            ParameterMetadata::optional(
                "endpoint",
                "Endpoint URL",
                "OPC UA server endpoint URL (opc.tcp://host:port)",
                ParameterType::String,
                json!("opc.tcp://localhost:4840"),
            ),
            ParameterMetadata::optional(
                "security_policy",
                "Security Policy",
                "None, Basic128Rsa15, Basic256, Basic256Sha256 or auto",
                ParameterType::String,
                json!("auto"),
            ),
            ParameterMetadata::optional(
                "security_mode",
                "Security Mode",
                "None, Sign, SignAndEncrypt or auto",
                ParameterType::String,
                json!("auto"),
            ),
            ParameterMetadata::optional(
                "certificate",
                "Certificate",
                "Client certificate path",
                ParameterType::String,
                Value::Null,
            ),
            ParameterMetadata::optional(
                "private_key",
                "Private Key",
                "Client private key path",
                ParameterType::String,
                Value::Null,
            ),
            ParameterMetadata::optional(
                "auth_method",
                "Auth Method",
                "Anonymous, UserName or Certificate",
                ParameterType::String,
                json!("Anonymous"),
            ),
            ParameterMetadata::optional(
                "username",
                "Username",
                "Username for UserName authentication",
                ParameterType::String,
                Value::Null,
            ),
            ParameterMetadata::optional(
                "password",
                "Password",
                "Password for UserName authentication",
                ParameterType::String,
                Value::Null,
            ),
            ParameterMetadata::optional(
                "connect_timeout_ms",
                "Connect Timeout (ms)",
                "Maximum time to establish a session (alias `connect_timeout` takes a duration string)",
                ParameterType::Integer,
                json!(10000),
            ),
            ParameterMetadata::optional(
                "request_timeout_ms",
                "Request Timeout (ms)",
                "Maximum time for one request over an established session (alias `request_timeout` takes a duration string)",
                ParameterType::Integer,
                json!(5000),
            ),
            ParameterMetadata::optional(
                "application_name",
                "Application Name",
                "Client application name for identification",
                ParameterType::String,
                json!("uapoll OPC UA Client"),
            ),
            ParameterMetadata::optional(
                "application_uri",
                "Application URI",
                "Client application URI",
                ParameterType::String,
                json!("urn:uapoll:opcua:client"),
            ),
            ParameterMetadata::optional(
                "trust_server_certs",
                "Trust Server Certs",
                "Auto-trust server certificates (for development)",
                ParameterType::Boolean,
                json!(true),
            ),
            ParameterMetadata::optional(
                "pki_dir",
                "PKI Directory",
                "Directory for client and trusted certificates",
                ParameterType::String,
                Value::Null,
            ),
            ParameterMetadata::optional(
                "nodes",
                "Nodes",
                "Root nodes: field_name, namespace, identifier_type, identifier",
                ParameterType::Array,
                json!([]),
            ),
            ParameterMetadata::optional(
                "group",
                "Groups",
                "Node groups with metric_name, namespace and identifier_type defaults",
                ParameterType::Array,
                json!([]),
            ),
        ],
    }
}

static INPUT_METADATA: Lazy<InputMetadata> = Lazy::new(build_metadata);

/// Get the input metadata.
pub fn input_metadata() -> &'static InputMetadata {
    &INPUT_METADATA
}
