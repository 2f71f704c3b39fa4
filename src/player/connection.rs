use super::traits::{Connector, Transport};
use crate::error::{TransportError, TransportResult};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Owns the one logical connection to the daemon.
///
/// State is derived from whether a transport handle is held, so the two can
/// never disagree. `connect()` and `disconnect()` never fail: an unreachable
/// daemon just leaves the manager `Disconnected`.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    transport: Option<C::Transport>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            transport: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.transport.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Verifies a held connection with a liveness probe, or opens a fresh one.
    pub fn connect(&mut self) -> ConnectionState {
        if let Some(transport) = self.transport.as_mut() {
            match transport.ping() {
                Ok(()) => return ConnectionState::Connected,
                Err(e) => {
                    warn!("Liveness probe failed ({}), reconnecting to {}", e, self.connector.describe());
                    self.drop_transport();
                }
            }
        }

        info!("Connecting to music daemon at {}", self.connector.describe());
        match self.connector.connect() {
            Ok(transport) => {
                self.transport = Some(transport);
                info!("Connected to music daemon");
                ConnectionState::Connected
            }
            Err(e) => {
                error!("Could not connect to music daemon at {}: {}", self.connector.describe(), e);
                ConnectionState::Disconnected
            }
        }
    }

    /// Closes the connection. Always ends `Disconnected`.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                warn!("Error while closing daemon connection: {}", e);
            }
            info!("Disconnected from music daemon");
        }
    }

    /// Discards a handle known to be stale, without talking to the daemon.
    pub fn mark_disconnected(&mut self) {
        self.drop_transport();
    }

    fn drop_transport(&mut self) {
        self.transport = None;
    }

    /// Runs one protocol call on the held transport.
    pub fn invoke<T, F>(&mut self, op: &mut F) -> TransportResult<T>
    where
        F: FnMut(&mut C::Transport) -> TransportResult<T>,
    {
        match self.transport.as_mut() {
            Some(transport) => op(transport),
            None => Err(TransportError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeDaemon, FakeTransport};

    #[test]
    fn test_connect_unreachable_is_not_fatal() {
        let daemon = FakeDaemon::new();
        daemon.set_reachable(false);
        let mut manager = ConnectionManager::new(daemon.clone());

        assert_eq!(manager.connect(), ConnectionState::Disconnected);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        daemon.set_reachable(true);
        assert_eq!(manager.connect(), ConnectionState::Connected);
    }

    #[test]
    fn test_repeated_connect_converges_without_reconnecting() {
        let daemon = FakeDaemon::new();
        let mut manager = ConnectionManager::new(daemon.clone());

        for _ in 0..5 {
            assert_eq!(manager.connect(), ConnectionState::Connected);
        }
        assert_eq!(daemon.connects(), 1);
    }

    #[test]
    fn test_failed_probe_reconnects_once() {
        let daemon = FakeDaemon::new();
        let mut manager = ConnectionManager::new(daemon.clone());
        manager.connect();

        daemon.sever_connections();
        assert_eq!(manager.connect(), ConnectionState::Connected);
        assert_eq!(daemon.connects(), 2);
    }

    #[test]
    fn test_failed_probe_with_daemon_down_ends_disconnected() {
        let daemon = FakeDaemon::new();
        let mut manager = ConnectionManager::new(daemon.clone());
        manager.connect();

        daemon.sever_connections();
        daemon.set_reachable(false);
        assert_eq!(manager.connect(), ConnectionState::Disconnected);
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let daemon = FakeDaemon::new();
        let mut manager = ConnectionManager::new(daemon.clone());
        manager.connect();

        // Closing a severed socket errors, state still ends Disconnected.
        daemon.sever_connections();
        manager.disconnect();
        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_invoke_without_transport() {
        let mut manager = ConnectionManager::new(FakeDaemon::new());
        let err = manager.invoke(&mut |t: &mut FakeTransport| t.ping()).unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }
}
