//! Scripted in-memory session used by poller tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::data::Value;
use crate::core::error::{PollerError, Result};
use crate::core::traits::{BatchReadRequest, DeviceSession, RawReading, SessionConnector};
use crate::gateway::address::NodeAddress;

/// Scripted outcome of one read call.
#[derive(Debug, Clone)]
pub enum ReadOutcome {
    /// Return these readings as-is.
    Readings(Vec<RawReading>),
    /// Fail the request with a read error.
    Fail(String),
    /// Never answer.
    Hang,
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Error message for the next `open` calls.
    pub fail_open: Option<String>,
    /// Delay before `open` answers.
    pub open_delay: Option<Duration>,
    /// Error message for the next `register_nodes` calls.
    pub fail_register: Option<String>,
    /// Drop the last handle on registration.
    pub short_register: bool,
    /// Make `close` fail.
    pub fail_close: bool,
    /// Delay before `close` answers.
    pub close_delay: Option<Duration>,
    /// Outcomes for upcoming reads; default readings when empty.
    pub reads: VecDeque<ReadOutcome>,

    pub opened: usize,
    pub closed: usize,
    pub read_calls: usize,
    pub registrations: Vec<Vec<NodeAddress>>,
}

/// Connector handing out sessions that share one scripted state.
#[derive(Clone, Default)]
pub struct MockConnector {
    pub state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a closure against the shared state.
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn push_read(&self, outcome: ReadOutcome) {
        self.with(|s| s.reads.push_back(outcome));
    }
}

impl SessionConnector for MockConnector {
    type Session = MockSession;

    fn endpoint(&self) -> &str {
        "opc.tcp://mock:4840"
    }

    async fn open(&self) -> Result<MockSession> {
        let (delay, failure) = self.with(|s| (s.open_delay, s.fail_open.clone()));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = failure {
            return Err(PollerError::Connection(msg));
        }
        self.with(|s| s.opened += 1);
        Ok(MockSession {
            state: self.state.clone(),
            open: true,
        })
    }
}

pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    open: bool,
}

impl MockSession {
    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

impl DeviceSession for MockSession {
    type Handle = u32;

    async fn register_nodes(&mut self, addresses: &[NodeAddress]) -> Result<Vec<u32>> {
        self.with(|s| {
            if let Some(msg) = &s.fail_register {
                return Err(PollerError::Registration(msg.clone()));
            }
            s.registrations.push(addresses.to_vec());
            let mut handles: Vec<u32> = (0..addresses.len() as u32).map(|i| 100 + i).collect();
            if s.short_register {
                handles.pop();
            }
            Ok(handles)
        })
    }

    async fn read(&mut self, request: &BatchReadRequest<u32>) -> Result<Vec<RawReading>> {
        let outcome = self.with(|s| {
            s.read_calls += 1;
            s.reads.pop_front()
        });

        match outcome {
            None => Ok(request
                .handles
                .iter()
                .map(|h| RawReading::good(Value::UInt32(*h)))
                .collect()),
            Some(ReadOutcome::Readings(readings)) => Ok(readings),
            Some(ReadOutcome::Fail(msg)) => Err(PollerError::Read(msg)),
            Some(ReadOutcome::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PollerError::Read("hung read answered".into()))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let delay = self.with(|s| {
            s.closed += 1;
            s.close_delay
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            if s.fail_close {
                Err(PollerError::Connection("close failed".into()))
            } else {
                Ok(())
            }
        })
    }
}
