use crate::error::TransportResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Daemon-assigned queue entry id. Only valid while the entry stays queued.
pub type SongId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::Stopped
    }
}

/// A track as reported by the daemon. `file` is relative to the music root
/// (or a remote stream URL).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl Track {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }
}

/// One row of the live queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: SongId,
    pub position: u32,
    #[serde(flatten)]
    pub track: Track,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One item of a directory listing, daemon-side or local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    pub path: String,
}

impl BrowseEntry {
    /// Builds an entry from a full daemon-relative path; `name` is the last segment.
    pub fn from_path(kind: EntryKind, path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self { kind, name, path }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    Repeat,
    Random,
    Single,
    Consume,
}

impl PlayMode {
    pub const ALL: [PlayMode; 4] = [Self::Repeat, Self::Random, Self::Single, Self::Consume];

    /// Protocol verb toggling this mode.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Repeat => "repeat",
            Self::Random => "random",
            Self::Single => "single",
            Self::Consume => "consume",
        }
    }
}

/// Volume normalisation applied by the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayGainMode {
    #[default]
    Off,
    Track,
    Album,
    Auto,
}

impl ReplayGainMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Track => "track",
            Self::Album => "album",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for ReplayGainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplayGainMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown replay gain mode '{other}' (off, track, album, auto)")),
        }
    }
}

/// Snapshot of the daemon `status` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    /// Absent when the daemon has no mixer.
    pub volume: Option<u8>,
    pub repeat: bool,
    pub random: bool,
    pub single: bool,
    pub consume: bool,
    pub queue_length: u32,
    pub song_position: Option<u32>,
    pub song_id: Option<SongId>,
    pub elapsed_secs: Option<f64>,
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_gain: Option<ReplayGainMode>,
}

/// One method per protocol verb this crate uses.
///
/// Every call is a single request/response round-trip on one connection.
/// Implementations must report a severed socket as
/// [`TransportError::Connection`](crate::error::TransportError::Connection)
/// so the executor can reconnect.
pub trait Transport: Send {
    /// Liveness probe.
    fn ping(&mut self) -> TransportResult<()>;
    fn close(&mut self) -> TransportResult<()>;

    // Status & playback
    fn status(&mut self) -> TransportResult<PlayerStatus>;
    fn update(&mut self) -> TransportResult<u32>;
    fn play(&mut self) -> TransportResult<()>;
    fn play_id(&mut self, id: SongId) -> TransportResult<()>;
    fn toggle_pause(&mut self) -> TransportResult<()>;
    fn stop(&mut self) -> TransportResult<()>;
    fn next(&mut self) -> TransportResult<()>;
    fn previous(&mut self) -> TransportResult<()>;
    fn set_volume(&mut self, volume: u8) -> TransportResult<()>;
    fn seek_current(&mut self, seconds: f64) -> TransportResult<()>;
    /// Seeks within the queue entry at 0-based `position`.
    fn seek(&mut self, position: u32, seconds: f64) -> TransportResult<()>;
    fn seek_id(&mut self, id: SongId, seconds: f64) -> TransportResult<()>;
    fn set_mode(&mut self, mode: PlayMode, enabled: bool) -> TransportResult<()>;
    fn set_replay_gain(&mut self, mode: ReplayGainMode) -> TransportResult<()>;

    // Queue
    fn add(&mut self, uri: &str) -> TransportResult<()>;
    fn add_id(&mut self, uri: &str) -> TransportResult<SongId>;
    /// `addid` with an insert position; later entries shift down.
    fn add_id_at(&mut self, uri: &str, position: u32) -> TransportResult<SongId>;
    fn add_tag_id(&mut self, id: SongId, tag: &str, value: &str) -> TransportResult<()>;
    fn delete(&mut self, position: u32) -> TransportResult<()>;
    fn delete_id(&mut self, id: SongId) -> TransportResult<()>;
    fn current_song(&mut self) -> TransportResult<Option<QueueEntry>>;
    fn playlist_info(&mut self) -> TransportResult<Vec<QueueEntry>>;
    fn playlist_id(&mut self) -> TransportResult<Vec<QueueEntry>>;
    fn clear(&mut self) -> TransportResult<()>;

    // Stored playlists
    fn list_playlists(&mut self) -> TransportResult<Vec<String>>;
    fn list_playlist(&mut self, name: &str) -> TransportResult<Vec<String>>;
    fn list_playlist_info(&mut self, name: &str) -> TransportResult<Vec<Track>>;
    fn save(&mut self, name: &str) -> TransportResult<()>;
    fn load(&mut self, name: &str) -> TransportResult<()>;
    fn rename(&mut self, from: &str, to: &str) -> TransportResult<()>;
    fn remove(&mut self, name: &str) -> TransportResult<()>;
    fn playlist_add(&mut self, name: &str, uri: &str) -> TransportResult<()>;
    fn playlist_delete(&mut self, name: &str, position: u32) -> TransportResult<()>;
    fn playlist_clear(&mut self, name: &str) -> TransportResult<()>;

    // Database
    fn lsinfo(&mut self, path: &str) -> TransportResult<Vec<BrowseEntry>>;
}

/// Opens fresh transports. Held by the connection manager for reconnects.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    fn connect(&self) -> TransportResult<Self::Transport>;

    /// Human-readable target for logs.
    fn describe(&self) -> String;
}
