use super::browser::DirectoryBrowser;
use super::connection::{ConnectionManager, ConnectionState};
use super::controls::Playback;
use super::mpd::MpdConnector;
use super::playlists::PlaylistStore;
use super::queue::QueueManager;
use super::traits::Connector;
use crate::error::{Error, Result, TransportResult};
use crate::library::MusicLibrary;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// How many reconnect-and-retry rounds a failed call gets.
///
/// Capped at [`RetryPolicy::MAX_RECONNECT_RETRIES`]: a call is never
/// attempted more than twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    reconnect_retries: u32,
}

impl RetryPolicy {
    pub const MAX_RECONNECT_RETRIES: u32 = 1;

    pub fn new(reconnect_retries: u32) -> Self {
        Self {
            reconnect_retries: reconnect_retries.min(Self::MAX_RECONNECT_RETRIES),
        }
    }

    pub fn reconnect_retries(&self) -> u32 {
        self.reconnect_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::MAX_RECONNECT_RETRIES)
    }
}

/// Exclusive use of the daemon connection for a multi-step operation.
///
/// Each [`Session::execute`] gets the same reconnect-and-retry treatment as
/// [`Daemon::execute_safe`], and no other caller can slip a command in
/// between them until the session ends.
pub struct Session<'a, C: Connector> {
    conn: MutexGuard<'a, ConnectionManager<C>>,
    policy: RetryPolicy,
}

impl<C: Connector> Session<'_, C> {
    /// Runs one protocol call with the reconnect-and-retry policy.
    pub fn execute<T, F>(&mut self, command: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&mut C::Transport) -> TransportResult<T>,
    {
        let conn = &mut self.conn;
        if !conn.is_connected() {
            conn.connect();
        }

        let mut retries_left = self.policy.reconnect_retries;
        loop {
            debug!(command, "executing");
            match conn.invoke(&mut op) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_connection() && retries_left > 0 => {
                    retries_left -= 1;
                    warn!(command, "Connection lost during command ({}), reconnecting", e);
                    conn.mark_disconnected();
                    conn.connect();
                }
                Err(e) => {
                    if e.is_connection() {
                        conn.mark_disconnected();
                    }
                    return Err(e.into());
                }
            }
        }
    }
}

/// Shared handle to the music daemon.
///
/// All protocol traffic goes through [`Daemon::execute_safe`] or
/// [`Daemon::transaction`]. Both hold the connection lock for the whole call
/// including any reconnect, so no caller ever sees a half-reconnected session.
pub struct Daemon<C: Connector = MpdConnector> {
    conn: Mutex<ConnectionManager<C>>,
    policy: RetryPolicy,
}

impl<C: Connector> Daemon<C> {
    pub fn new(connector: C) -> Self {
        Self::with_policy(connector, RetryPolicy::default())
    }

    pub fn with_policy(connector: C, policy: RetryPolicy) -> Self {
        Self {
            conn: Mutex::new(ConnectionManager::new(connector)),
            policy,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ConnectionManager<C>>> {
        self.conn.lock().map_err(|_| Error::Poisoned)
    }

    pub fn connect(&self) -> Result<ConnectionState> {
        Ok(self.lock()?.connect())
    }

    pub fn disconnect(&self) -> Result<()> {
        self.lock()?.disconnect();
        Ok(())
    }

    pub fn state(&self) -> Result<ConnectionState> {
        Ok(self.lock()?.state())
    }

    pub fn is_connected(&self) -> bool {
        self.state().map(|s| s == ConnectionState::Connected).unwrap_or(false)
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs `f` with the connection held for its whole duration.
    ///
    /// Use this for read-check-write sequences: nothing from another caller
    /// runs between the calls made inside. Calls on this `Daemon` from inside
    /// `f` would deadlock; go through the session instead.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session<'_, C>) -> Result<T>,
    {
        let mut session = Session {
            conn: self.lock()?,
            policy: self.policy,
        };
        f(&mut session)
    }

    /// Runs one protocol call with the reconnect-and-retry policy.
    ///
    /// Connects first when disconnected. A connection-class failure marks the
    /// connection dead, reconnects once and retries; anything else is
    /// returned as-is. An operation is attempted at most twice.
    pub fn execute_safe<T, F>(&self, command: &str, op: F) -> Result<T>
    where
        F: FnMut(&mut C::Transport) -> TransportResult<T>,
    {
        self.transaction(|session| session.execute(command, op))
    }

    pub fn playback(&self) -> Playback<'_, C> {
        Playback::new(self)
    }

    pub fn queue(&self) -> QueueManager<'_, C> {
        QueueManager::new(self)
    }

    pub fn playlists<'a>(&'a self, library: &'a MusicLibrary) -> PlaylistStore<'a, C> {
        PlaylistStore::new(self, library)
    }

    pub fn browser(&self) -> DirectoryBrowser<'_, C> {
        DirectoryBrowser::new(self)
    }
}
