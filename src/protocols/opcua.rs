//! OPC UA session adapter.
//!
//! This module provides `OpcUaConnector`, which opens `async-opcua` sessions
//! from an `InputConfig`, and `OpcUaSession`, which implements the
//! register/read/close primitives the poller drives.
//!
//! # Example
//!
//! ```rust,ignore
//! use uapoll::protocols::opcua::OpcUaConnector;
//!
//! let connector = OpcUaConnector::from_config(&config)?;
//! let poller = DevicePoller::new(&config.metric_name, connector, nodes, sink);
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use opcua::client::{ClientBuilder, IdentityToken, Session};
use opcua::crypto::SecurityPolicy as UaSecurityPolicy;
use opcua::types::{
    DataValue, EndpointDescription, MessageSecurityMode, NodeId, ReadValueId,
    StatusCode as UaStatusCode, TimestampsToReturn as UaTimestamps, UserTokenPolicy, Variant,
};
use tokio::task::JoinHandle;

use crate::core::data::Value;
use crate::core::error::{PollerError, Result};
use crate::core::quality::StatusCode;
use crate::core::traits::{
    BatchReadRequest, DeviceSession, RawReading, SessionConnector, TimestampsToReturn,
};
use crate::gateway::address::NodeAddress;
use crate::gateway::config::{AuthMethod, InputConfig, SecurityMode, SecurityPolicy};

impl SecurityPolicy {
    /// Policy URI, `None` for `auto`.
    fn to_uri(self) -> Option<&'static str> {
        match self {
            Self::None => Some(UaSecurityPolicy::None.to_uri()),
            Self::Basic128Rsa15 => Some(UaSecurityPolicy::Basic128Rsa15.to_uri()),
            Self::Basic256 => Some(UaSecurityPolicy::Basic256.to_uri()),
            Self::Basic256Sha256 => Some(UaSecurityPolicy::Basic256Sha256.to_uri()),
            Self::Auto => None,
        }
    }
}

impl SecurityMode {
    /// Message security mode, `None` for `auto`.
    fn to_message_security_mode(self) -> Option<MessageSecurityMode> {
        match self {
            Self::None => Some(MessageSecurityMode::None),
            Self::Sign => Some(MessageSecurityMode::Sign),
            Self::SignAndEncrypt => Some(MessageSecurityMode::SignAndEncrypt),
            Self::Auto => None,
        }
    }
}

/// User identity presented when activating the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpcUaIdentity {
    /// Anonymous.
    Anonymous,
    /// Username/password.
    UserName { username: String, password: String },
    /// X.509 certificate and private key.
    Certificate { cert: PathBuf, key: PathBuf },
}

impl OpcUaIdentity {
    fn from_config(config: &InputConfig) -> Result<Self> {
        match config.auth_method {
            AuthMethod::Anonymous => Ok(Self::Anonymous),
            AuthMethod::UserName => Ok(Self::UserName {
                username: config.username.clone().unwrap_or_default(),
                password: config.password.clone().unwrap_or_default(),
            }),
            AuthMethod::Certificate => match (&config.certificate, &config.private_key) {
                (Some(cert), Some(key)) => Ok(Self::Certificate {
                    cert: cert.clone(),
                    key: key.clone(),
                }),
                _ => Err(PollerError::Config(
                    "auth_method 'Certificate' requires certificate and private_key".into(),
                )),
            },
        }
    }

    fn to_identity_token(&self) -> IdentityToken {
        match self {
            Self::Anonymous => IdentityToken::Anonymous,
            Self::UserName { username, password } => {
                IdentityToken::UserName(username.clone(), password.clone())
            }
            Self::Certificate { cert, key } => IdentityToken::X509(cert.clone(), key.clone()),
        }
    }
}

/// Opens OPC UA sessions.
///
/// Holds everything needed to build a client and pick an endpoint. The
/// poller never looks inside.
#[derive(Debug, Clone)]
pub struct OpcUaConnector {
    endpoint: String,
    security_policy: SecurityPolicy,
    security_mode: SecurityMode,
    identity: OpcUaIdentity,
    certificate: Option<PathBuf>,
    private_key: Option<PathBuf>,
    application_name: String,
    application_uri: String,
    trust_server_certs: bool,
    pki_dir: Option<PathBuf>,
}

impl OpcUaConnector {
    /// Build a connector from an input configuration.
    pub fn from_config(config: &InputConfig) -> Result<Self> {
        Ok(Self {
            endpoint: config.endpoint.clone(),
            security_policy: config.security_policy,
            security_mode: config.security_mode,
            identity: OpcUaIdentity::from_config(config)?,
            certificate: config.certificate.clone(),
            private_key: config.private_key.clone(),
            application_name: config.application_name.clone(),
            application_uri: config.application_uri.clone(),
            trust_server_certs: config.trust_server_certs,
            pki_dir: config.pki_dir.clone(),
        })
    }

    /// Configured identity.
    pub fn identity(&self) -> &OpcUaIdentity {
        &self.identity
    }

    fn build_client(&self) -> Result<opcua::client::Client> {
        let has_keypair = self.certificate.is_some() && self.private_key.is_some();

        let mut builder = ClientBuilder::new()
            .application_name(&self.application_name)
            .application_uri(&self.application_uri)
            .session_retry_limit(0)
            .create_sample_keypair(!has_keypair)
            .trust_server_certs(self.trust_server_certs);

        if let (Some(cert), Some(key)) = (&self.certificate, &self.private_key) {
            builder = builder.certificate_path(cert).private_key_path(key);
        }

        if let Some(pki_dir) = &self.pki_dir {
            builder = builder.pki_dir(pki_dir);
        }

        builder
            .client()
            .map_err(|e| PollerError::Config(e.join(", ")))
    }

    /// Resolve `auto` policy and mode against the server's endpoints.
    async fn resolve_security(
        &self,
        client: &opcua::client::Client,
    ) -> Result<(String, MessageSecurityMode)> {
        let policy = self.security_policy.to_uri();
        let mode = self.security_mode.to_message_security_mode();

        if let (Some(policy), Some(mode)) = (policy, mode) {
            return Ok((policy.to_string(), mode));
        }

        let endpoints = client
            .get_server_endpoints_from_url(self.endpoint.as_str())
            .await
            .map_err(|s| PollerError::Connection(format!("endpoint discovery failed: {}", s)))?;

        let chosen = select_endpoint(&endpoints, policy, mode).ok_or_else(|| {
            PollerError::Connection(format!(
                "no endpoint on '{}' matches policy {:?} and mode {:?}",
                self.endpoint, self.security_policy, self.security_mode
            ))
        })?;

        let policy_uri = chosen.security_policy_uri.as_ref().to_string();
        tracing::debug!(
            endpoint = %self.endpoint,
            policy = %policy_uri,
            mode = ?chosen.security_mode,
            "Selected server endpoint"
        );
        Ok((policy_uri, chosen.security_mode))
    }
}

/// Pick the most secure endpoint matching the fixed constraints.
fn select_endpoint<'a>(
    endpoints: &'a [EndpointDescription],
    policy: Option<&str>,
    mode: Option<MessageSecurityMode>,
) -> Option<&'a EndpointDescription> {
    endpoints
        .iter()
        .filter(|e| policy.map_or(true, |p| e.security_policy_uri.as_ref() == p))
        .filter(|e| mode.map_or(true, |m| e.security_mode == m))
        .max_by_key(|e| e.security_level)
}

impl SessionConnector for OpcUaConnector {
    type Session = OpcUaSession;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn open(&self) -> Result<OpcUaSession> {
        let mut client = self.build_client()?;
        let (policy, mode) = self.resolve_security(&client).await?;

        let (session, event_loop) = client
            .connect_to_matching_endpoint(
                (
                    self.endpoint.as_str(),
                    policy.as_str(),
                    mode,
                    UserTokenPolicy::anonymous(),
                ),
                self.identity.to_identity_token(),
            )
            .await
            .map_err(|s| PollerError::Connection(s.to_string()))?;

        let mut opened = OpcUaSession {
            session,
            event_loop: Some(event_loop.spawn()),
        };

        if !opened.session.wait_for_connection().await {
            opened.abort_event_loop();
            return Err(PollerError::Connection(format!(
                "session to '{}' could not be established",
                self.endpoint
            )));
        }

        Ok(opened)
    }
}

/// A live OPC UA session and its event loop.
pub struct OpcUaSession {
    session: Arc<Session>,
    event_loop: Option<JoinHandle<UaStatusCode>>,
}

impl OpcUaSession {
    fn abort_event_loop(&mut self) {
        if let Some(handle) = self.event_loop.take() {
            handle.abort();
        }
    }
}

impl Drop for OpcUaSession {
    fn drop(&mut self) {
        self.abort_event_loop();
    }
}

impl DeviceSession for OpcUaSession {
    type Handle = NodeId;

    async fn register_nodes(&mut self, addresses: &[NodeAddress]) -> Result<Vec<NodeId>> {
        let node_ids = addresses
            .iter()
            .map(to_node_id)
            .collect::<Result<Vec<_>>>()?;

        self.session
            .register_nodes(&node_ids)
            .await
            .map_err(|s| PollerError::Registration(s.to_string()))
    }

    async fn read(&mut self, request: &BatchReadRequest<NodeId>) -> Result<Vec<RawReading>> {
        let nodes: Vec<ReadValueId> = request.handles.iter().cloned().map(Into::into).collect();
        let max_age = request.max_age.as_millis() as f64;

        let values = self
            .session
            .read(&nodes, to_ua_timestamps(request.timestamps), max_age)
            .await
            .map_err(|s| PollerError::Read(s.to_string()))?;

        Ok(values.iter().map(convert_data_value).collect())
    }

    async fn close(&mut self) -> Result<()> {
        let result = self
            .session
            .disconnect()
            .await
            .map_err(|s| PollerError::Connection(format!("disconnect failed: {}", s)));
        self.abort_event_loop();
        result
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn to_node_id(address: &NodeAddress) -> Result<NodeId> {
    let text = address.to_string();
    NodeId::from_str(&text)
        .map_err(|e| PollerError::Registration(format!("invalid node id '{}': {:?}", text, e)))
}

fn to_ua_timestamps(timestamps: TimestampsToReturn) -> UaTimestamps {
    match timestamps {
        TimestampsToReturn::Source => UaTimestamps::Source,
        TimestampsToReturn::Server => UaTimestamps::Server,
        TimestampsToReturn::Both => UaTimestamps::Both,
        TimestampsToReturn::Neither => UaTimestamps::Neither,
    }
}

/// Convert one OPC UA data value into a raw reading.
fn convert_data_value(dv: &DataValue) -> RawReading {
    RawReading {
        value: dv.value.as_ref().and_then(convert_variant),
        status: dv
            .status
            .map(|s| StatusCode::new(s.bits()))
            .unwrap_or(StatusCode::GOOD),
        server_timestamp: dv.server_timestamp.as_ref().map(|t| t.as_chrono()),
        source_timestamp: dv.source_timestamp.as_ref().map(|t| t.as_chrono()),
    }
}

/// Symbolic name of a status condition from the OPC UA code table.
///
/// Info bits are masked off. Codes the table does not know yield `None`.
pub(crate) fn condition_name(bits: u32) -> Option<String> {
    let condition = bits & 0xFFFF_0000;
    let name = UaStatusCode::from(condition).to_string();

    let severity = match condition >> 30 {
        0 => "Good",
        1 => "Uncertain",
        _ => "Bad",
    };
    let is_symbol = name.starts_with(severity) && name.chars().all(|c| c.is_ascii_alphanumeric());
    // A bare severity only names the plain code, not an unknown sub-code.
    let is_specific = name != severity || condition & 0x3FFF_0000 == 0;

    (is_symbol && is_specific).then_some(name)
}

/// Convert an OPC UA variant, keeping its width. `Empty` has no value.
fn convert_variant(variant: &Variant) -> Option<Value> {
    let value = match variant {
        Variant::Empty => return None,
        Variant::Boolean(v) => Value::Boolean(*v),
        Variant::SByte(v) => Value::SByte(*v),
        Variant::Byte(v) => Value::Byte(*v),
        Variant::Int16(v) => Value::Int16(*v),
        Variant::UInt16(v) => Value::UInt16(*v),
        Variant::Int32(v) => Value::Int32(*v),
        Variant::UInt32(v) => Value::UInt32(*v),
        Variant::Int64(v) => Value::Int64(*v),
        Variant::UInt64(v) => Value::UInt64(*v),
        Variant::Float(v) => Value::Float(*v),
        Variant::Double(v) => Value::Double(*v),
        Variant::String(v) => Value::String(v.as_ref().to_string()),
        Variant::DateTime(v) => Value::DateTime(v.as_chrono()),
        Variant::Guid(v) => Value::Guid(v.to_string()),
        Variant::ByteString(v) => Value::ByteString(v.value.clone().unwrap_or_default()),
        other => Value::Other(format!("{:?}", other)),
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::ValueType;
    use crate::core::quality::Quality;
    use crate::gateway::address::parse_node_id;

    #[test]
    fn test_connector_from_config() {
        let config = InputConfig {
            endpoint: "opc.tcp://plc:4840".into(),
            auth_method: AuthMethod::UserName,
            username: Some("operator".into()),
            password: Some("secret".into()),
            ..InputConfig::default()
        };
        let connector = OpcUaConnector::from_config(&config).unwrap();

        assert_eq!(connector.endpoint(), "opc.tcp://plc:4840");
        assert_eq!(
            connector.identity(),
            &OpcUaIdentity::UserName {
                username: "operator".into(),
                password: "secret".into()
            }
        );
    }

    #[test]
    fn test_certificate_identity_requires_paths() {
        let config = InputConfig {
            auth_method: AuthMethod::Certificate,
            ..InputConfig::default()
        };
        assert!(OpcUaConnector::from_config(&config).is_err());
    }

    #[test]
    fn test_fixed_security_mapping() {
        assert_eq!(
            SecurityPolicy::Basic256Sha256.to_uri(),
            Some(UaSecurityPolicy::Basic256Sha256.to_uri())
        );
        assert_eq!(SecurityPolicy::Auto.to_uri(), None);
        assert_eq!(
            SecurityMode::SignAndEncrypt.to_message_security_mode(),
            Some(MessageSecurityMode::SignAndEncrypt)
        );
        assert_eq!(SecurityMode::Auto.to_message_security_mode(), None);
    }

    fn endpoint(policy: UaSecurityPolicy, mode: MessageSecurityMode, level: u8) -> EndpointDescription {
        EndpointDescription {
            security_policy_uri: policy.to_uri().into(),
            security_mode: mode,
            security_level: level,
            ..EndpointDescription::default()
        }
    }

    #[test]
    fn test_select_endpoint_prefers_highest_level() {
        let endpoints = vec![
            endpoint(UaSecurityPolicy::None, MessageSecurityMode::None, 0),
            endpoint(UaSecurityPolicy::Basic256Sha256, MessageSecurityMode::Sign, 5),
            endpoint(
                UaSecurityPolicy::Basic256Sha256,
                MessageSecurityMode::SignAndEncrypt,
                10,
            ),
        ];

        let best = select_endpoint(&endpoints, None, None).unwrap();
        assert_eq!(best.security_level, 10);

        let sign_only = select_endpoint(&endpoints, None, Some(MessageSecurityMode::Sign)).unwrap();
        assert_eq!(sign_only.security_level, 5);

        let none_policy =
            select_endpoint(&endpoints, Some(UaSecurityPolicy::None.to_uri()), None).unwrap();
        assert_eq!(none_policy.security_mode, MessageSecurityMode::None);

        assert!(select_endpoint(
            &endpoints,
            Some(UaSecurityPolicy::Basic128Rsa15.to_uri()),
            None
        )
        .is_none());
    }

    #[test]
    fn test_node_id_conversion() {
        let address = parse_node_id("ns=2;s=Line1.Temp").unwrap();
        let node_id = to_node_id(&address).unwrap();
        assert_eq!(node_id.namespace, 2);

        let address = parse_node_id("ns=0;i=2262").unwrap();
        assert_eq!(to_node_id(&address).unwrap(), NodeId::new(0, 2262u32));
    }

    #[test]
    fn test_variant_conversion_keeps_width() {
        assert_eq!(convert_variant(&Variant::Int16(-3)), Some(Value::Int16(-3)));
        assert_eq!(convert_variant(&Variant::UInt64(7)), Some(Value::UInt64(7)));
        assert_eq!(convert_variant(&Variant::Float(1.5)), Some(Value::Float(1.5)));
        assert_eq!(
            convert_variant(&Variant::String("urn:demo".into())),
            Some(Value::String("urn:demo".into()))
        );
        assert_eq!(convert_variant(&Variant::Empty), None);

        let other = convert_variant(&Variant::from(vec![1i32, 2])).unwrap();
        assert_eq!(other.value_type(), ValueType::Other);
    }

    #[test]
    fn test_data_value_conversion() {
        let dv = DataValue {
            value: Some(Variant::Double(21.5)),
            status: Some(UaStatusCode::BadNodeIdUnknown),
            source_timestamp: Some(opcua::types::DateTime::now()),
            ..DataValue::default()
        };

        let reading = convert_data_value(&dv);
        assert_eq!(reading.value, Some(Value::Double(21.5)));
        assert_eq!(reading.status, StatusCode::BAD_NODE_ID_UNKNOWN);
        assert_eq!(reading.status.quality(), Quality::Bad);
        assert!(reading.source_timestamp.is_some());
        assert!(reading.server_timestamp.is_none());

        let empty = convert_data_value(&DataValue::default());
        assert_eq!(empty.value, None);
        assert_eq!(empty.status, StatusCode::GOOD);
    }

    #[test]
    fn test_status_text_uses_code_table() {
        for (code, name) in [
            (UaStatusCode::GoodClamped, "GoodClamped"),
            (UaStatusCode::BadNotSupported, "BadNotSupported"),
            (UaStatusCode::BadTooManyOperations, "BadTooManyOperations"),
            (UaStatusCode::BadSecureChannelClosed, "BadSecureChannelClosed"),
            (UaStatusCode::UncertainInitialValue, "UncertainInitialValue"),
        ] {
            let dv = DataValue {
                status: Some(code),
                ..DataValue::default()
            };
            let reading = convert_data_value(&dv);
            assert_eq!(condition_name(code.bits()).as_deref(), Some(name));
            assert_eq!(reading.status.to_string(), name);
        }

        assert_eq!(condition_name(0).as_deref(), Some("Good"));
        assert_eq!(condition_name(0x80FF_0000), None);
        assert_eq!(StatusCode::new(0x80FF_0000).to_string(), "Bad (0x80FF0000)");
    }
}
