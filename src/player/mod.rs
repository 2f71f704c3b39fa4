//! Everything that talks to the music daemon.
//!
//! [`Daemon`] owns the single connection; the component views
//! ([`Playback`], [`QueueManager`], [`PlaylistStore`], [`DirectoryBrowser`])
//! borrow it and route every call through [`Daemon::execute_safe`], or
//! through a [`Session`] when several calls must not interleave with other
//! callers.

pub mod browser;
pub mod connection;
pub mod controls;
pub mod executor;
pub mod mpd;
pub mod playlists;
pub mod queue;
pub mod traits;

pub use browser::DirectoryBrowser;
pub use connection::{ConnectionManager, ConnectionState};
pub use controls::{PlayModes, Playback};
pub use executor::{Daemon, RetryPolicy, Session};
pub use self::mpd::MpdConnector;
pub use playlists::{AddOutcome, PlaylistReport, PlaylistStore};
pub use queue::QueueManager;
pub use traits::{
    BrowseEntry, Connector, EntryKind, PlayMode, PlaybackState, PlayerStatus, QueueEntry, ReplayGainMode, SongId,
    Track, Transport,
};
