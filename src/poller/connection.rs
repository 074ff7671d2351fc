//! Connection lifecycle.
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──open + register ok──> Connected
//!      ^                          │                                  │
//!      └──────── any failure ─────┘<──────── close() / read failure ──┘
//! ```
//!
//! Every `connect()` starts from `Connecting`, closes whatever session it
//! still holds and either ends `Connected` with a fresh read request or
//! `Disconnected` with nothing carried over.

use std::time::Duration;

use tokio::time::timeout;

use crate::core::error::{PollerError, Result};
use crate::core::traits::{BatchReadRequest, ConnectionState, DeviceSession, SessionConnector};
use crate::gateway::address::NodeAddress;
use crate::gateway::resolver::ResolvedNode;

/// Handle type produced by a connector's sessions.
pub type HandleOf<C> = <<C as SessionConnector>::Session as DeviceSession>::Handle;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the live session and the batched read request built for it.
pub struct ConnectionManager<C: SessionConnector> {
    connector: C,
    session: Option<C::Session>,
    request: Option<BatchReadRequest<HandleOf<C>>>,
    state: ConnectionState,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl<C: SessionConnector> ConnectionManager<C> {
    /// Create a disconnected manager.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            session: None,
            request: None,
            state: ConnectionState::Disconnected,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set connect and request timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Endpoint of the underlying connector.
    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }

    /// Request timeout, also used for registration.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// The read request built by the last successful connect.
    pub fn request(&self) -> Option<&BatchReadRequest<HandleOf<C>>> {
        self.request.as_ref()
    }

    /// Open a session and register all nodes.
    ///
    /// Returns the number of registered nodes. On error the manager is
    /// `Disconnected` and holds no session.
    pub async fn connect<'a, I>(&mut self, nodes: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a ResolvedNode>,
    {
        self.state = ConnectionState::Connecting;

        let addresses = nodes
            .into_iter()
            .map(|node| node.address().cloned())
            .collect::<Result<Vec<NodeAddress>>>();

        if let Some(previous) = self.session.take() {
            if let Err(e) = Self::close_session(previous, self.request_timeout).await {
                tracing::debug!(endpoint = %self.endpoint(), error = %e, "Closing previous session failed");
            }
        }
        self.request = None;

        let established = match addresses {
            Ok(addresses) => {
                Self::establish(
                    &self.connector,
                    self.connect_timeout,
                    self.request_timeout,
                    &addresses,
                )
                .await
            }
            Err(e) => Err(e),
        };

        match established {
            Ok((session, request)) => {
                let registered = request.len();
                self.session = Some(session);
                self.request = Some(request);
                self.state = ConnectionState::Connected;
                Ok(registered)
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    async fn establish(
        connector: &C,
        connect_timeout: Duration,
        request_timeout: Duration,
        addresses: &[NodeAddress],
    ) -> Result<(C::Session, BatchReadRequest<HandleOf<C>>)> {
        let mut session = timeout(connect_timeout, connector.open())
            .await
            .map_err(|_| PollerError::timeout("connect", connect_timeout))??;

        match Self::register(&mut session, request_timeout, addresses).await {
            Ok(handles) => Ok((session, BatchReadRequest::new(handles))),
            Err(e) => {
                if let Err(close_err) = Self::close_session(session, request_timeout).await {
                    tracing::debug!(error = %close_err, "Closing session after failed registration failed");
                }
                Err(e)
            }
        }
    }

    async fn register(
        session: &mut C::Session,
        request_timeout: Duration,
        addresses: &[NodeAddress],
    ) -> Result<Vec<HandleOf<C>>> {
        let handles = timeout(request_timeout, session.register_nodes(addresses))
            .await
            .map_err(|_| PollerError::timeout("register nodes", request_timeout))??;

        if handles.len() != addresses.len() {
            return Err(PollerError::Protocol(format!(
                "RegisterNodes returned {} handles for {} nodes",
                handles.len(),
                addresses.len()
            )));
        }

        Ok(handles)
    }

    /// Live session and its read request, when connected.
    pub(crate) fn active_mut(
        &mut self,
    ) -> Option<(&mut C::Session, &BatchReadRequest<HandleOf<C>>)> {
        if !self.state.is_connected() {
            return None;
        }
        match (self.session.as_mut(), self.request.as_ref()) {
            (Some(session), Some(request)) => Some((session, request)),
            _ => None,
        }
    }

    /// Drop the session. The state is `Disconnected` even if closing fails.
    ///
    /// Closing is bounded by the request timeout; a session that does not
    /// answer in time is dropped anyway.
    pub async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;
        self.request = None;
        match self.session.take() {
            Some(session) => Self::close_session(session, self.request_timeout).await,
            None => Ok(()),
        }
    }

    async fn close_session(mut session: C::Session, request_timeout: Duration) -> Result<()> {
        timeout(request_timeout, session.close())
            .await
            .map_err(|_| PollerError::timeout("close", request_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::config::NodeSettings;
    use crate::gateway::resolver::resolve_nodes;
    use crate::poller::mock::MockConnector;

    fn nodes(specs: &[(&str, &str, &str, &str)]) -> Vec<ResolvedNode> {
        let settings: Vec<NodeSettings> = specs
            .iter()
            .map(|(f, ns, t, id)| NodeSettings::new(*f, *ns, *t, *id))
            .collect();
        resolve_nodes("opcua", &settings, &[]).unwrap()
    }

    #[tokio::test]
    async fn test_connect_builds_request() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());
        let nodes = nodes(&[("a", "0", "i", "2262"), ("b", "2", "s", "Temp")]);

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        let registered = manager.connect(&nodes).await.unwrap();

        assert_eq!(registered, 2);
        assert_eq!(manager.state(), ConnectionState::Connected);
        let request = manager.request().unwrap();
        assert_eq!(request.handles, vec![100, 101]);
        assert_eq!(request.timestamps, crate::core::traits::TimestampsToReturn::Both);

        let registrations = connector.with(|s| s.registrations.clone());
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0][0].to_string(), "ns=0;i=2262");
        assert_eq!(registrations[0][1].to_string(), "ns=2;s=Temp");
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_session() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());
        let nodes = nodes(&[("a", "0", "i", "1")]);

        manager.connect(&nodes).await.unwrap();
        manager.connect(&nodes).await.unwrap();

        assert_eq!(connector.with(|s| (s.opened, s.closed)), (2, 1));
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_disconnected() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());
        let nodes = nodes(&[("a", "0", "i", "1")]);

        manager.connect(&nodes).await.unwrap();
        connector.with(|s| s.fail_open = Some("connection refused".into()));

        let err = manager.connect(&nodes).await.unwrap_err();
        assert!(matches!(err, PollerError::Connection(_)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.request().is_none());
        // The first session was closed before the failed attempt.
        assert_eq!(connector.with(|s| s.closed), 1);
    }

    #[tokio::test]
    async fn test_registration_failure_closes_session() {
        let connector = MockConnector::new();
        connector.with(|s| s.fail_register = Some("BadTooManyOperations".into()));
        let mut manager = ConnectionManager::new(connector.clone());

        let err = manager.connect(&nodes(&[("a", "0", "i", "1")])).await.unwrap_err();
        assert!(matches!(err, PollerError::Registration(_)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(connector.with(|s| (s.opened, s.closed)), (1, 1));
    }

    #[tokio::test]
    async fn test_handle_count_mismatch() {
        let connector = MockConnector::new();
        connector.with(|s| s.short_register = true);
        let mut manager = ConnectionManager::new(connector.clone());

        let err = manager
            .connect(&nodes(&[("a", "0", "i", "1"), ("b", "0", "i", "2")]))
            .await
            .unwrap_err();
        assert!(matches!(err, PollerError::Protocol(_)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.request().is_none());
    }

    #[tokio::test]
    async fn test_bad_address_fails_before_open() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());

        let err = manager
            .connect(&nodes(&[("ok", "0", "i", "1"), ("bad", "0", "i", "abc")]))
            .await
            .unwrap_err();
        assert!(matches!(err, PollerError::Address { ref field, .. } if field == "bad"));
        assert!(!err.is_recoverable());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(connector.with(|s| s.opened), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let connector = MockConnector::new();
        connector.with(|s| s.open_delay = Some(Duration::from_secs(60)));
        let mut manager = ConnectionManager::new(connector.clone())
            .with_timeouts(Duration::from_secs(2), Duration::from_secs(1));

        let err = manager.connect(&nodes(&[("a", "0", "i", "1")])).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "connect timed out after 2000ms");
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone());
        manager.connect(&nodes(&[("a", "0", "i", "1")])).await.unwrap();

        manager.close().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.active_mut().is_none());

        // Closing twice is harmless.
        manager.close().await.unwrap();
        assert_eq!(connector.with(|s| s.closed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_bounded_by_request_timeout() {
        let connector = MockConnector::new();
        connector.with(|s| s.close_delay = Some(Duration::from_secs(600)));
        let mut manager = ConnectionManager::new(connector.clone())
            .with_timeouts(Duration::from_secs(1), Duration::from_millis(200));
        manager.connect(&nodes(&[("a", "0", "i", "1")])).await.unwrap();

        let started = tokio::time::Instant::now();
        let err = manager.close().await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(err.to_string(), "close timed out after 200ms");
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.active_mut().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_does_not_wait_on_stuck_close() {
        let connector = MockConnector::new();
        let mut manager = ConnectionManager::new(connector.clone())
            .with_timeouts(Duration::from_secs(1), Duration::from_millis(200));
        let nodes = nodes(&[("a", "0", "i", "1")]);
        manager.connect(&nodes).await.unwrap();

        connector.with(|s| s.close_delay = Some(Duration::from_secs(600)));
        let started = tokio::time::Instant::now();
        manager.connect(&nodes).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(connector.with(|s| s.opened), 2);
    }
}
