//! Test utilities: an in-memory music daemon.
//!
//! [`FakeDaemon`] is a [`Connector`] whose transports share one emulated
//! daemon: a live queue with daemon-assigned ids, stored playlists, a browse
//! tree, and the ACK codes a real MPD answers with. Faults can be injected:
//!
//! - `set_reachable(false)` refuses new connections
//! - `sever_connections()` kills every open transport
//! - `fail_next_calls(n)` makes the next `n` protocol calls fail with a
//!   connection error (each failure also severs the connection)
//!
//! # Example
//!
//! ```ignore
//! use mpd_gateway::player::Daemon;
//! use mpd_gateway::test_utils::FakeDaemon;
//!
//! let fake = FakeDaemon::new().with_playlist("Jazz", &["a.mp3"]);
//! let daemon = Daemon::new(fake.clone());
//! fake.fail_next_calls(1);
//! assert_eq!(daemon.queue().list().unwrap().len(), 0);
//! assert_eq!(fake.connects(), 2);
//! ```

use crate::error::{ack, TransportError, TransportResult};
use crate::player::traits::{
    BrowseEntry, Connector, EntryKind, PlayMode, PlaybackState, PlayerStatus, QueueEntry, ReplayGainMode, SongId,
    Track, Transport,
};
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct FakeState {
    reachable: bool,
    generation: u64,
    connects: u32,
    fail_next: u32,
    calls: Vec<String>,
    next_id: SongId,
    queue: Vec<(SongId, Track)>,
    current: Option<SongId>,
    playback: PlaybackState,
    elapsed: f64,
    volume: u8,
    replay_gain: ReplayGainMode,
    modes: BTreeMap<&'static str, bool>,
    db_updates: u32,
    playlists: BTreeMap<String, Vec<String>>,
    tree: BTreeMap<String, Vec<BrowseEntry>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            reachable: true,
            generation: 0,
            connects: 0,
            fail_next: 0,
            calls: Vec::new(),
            next_id: 1,
            queue: Vec::new(),
            current: None,
            playback: PlaybackState::Stopped,
            elapsed: 0.0,
            volume: 50,
            replay_gain: ReplayGainMode::Off,
            modes: BTreeMap::new(),
            db_updates: 0,
            playlists: BTreeMap::new(),
            tree: BTreeMap::new(),
        }
    }
}

fn no_such(what: &str) -> TransportError {
    TransportError::rejected(Some(ack::NO_EXIST), format!("No such {what}"))
}

fn bad_index() -> TransportError {
    TransportError::rejected(Some(ack::ARG), "Bad song index")
}

impl FakeState {
    fn push(&mut self, uri: &str) -> SongId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push((id, Track::new(uri)));
        id
    }

    fn insert(&mut self, uri: &str, position: usize) -> TransportResult<SongId> {
        if position > self.queue.len() {
            return Err(bad_index());
        }
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert(position, (id, Track::new(uri)));
        Ok(id)
    }

    fn start(&mut self, id: SongId, elapsed: f64) {
        self.current = Some(id);
        self.playback = PlaybackState::Playing;
        self.elapsed = elapsed;
    }

    fn position_of(&self, id: SongId) -> Option<usize> {
        self.queue.iter().position(|(qid, _)| *qid == id)
    }

    fn entries(&self) -> Vec<QueueEntry> {
        self.queue
            .iter()
            .enumerate()
            .map(|(pos, (id, track))| QueueEntry {
                id: *id,
                position: pos as u32,
                track: track.clone(),
            })
            .collect()
    }

    fn remove_at(&mut self, pos: usize) {
        let (id, _) = self.queue.remove(pos);
        if self.current == Some(id) {
            self.current = None;
            self.playback = PlaybackState::Stopped;
        }
    }

    fn step(&mut self, forward: bool) {
        let pos = self.current.and_then(|id| self.position_of(id));
        let target = match (pos, forward) {
            (Some(p), true) => Some(p + 1),
            (Some(p), false) => p.checked_sub(1),
            (None, _) => None,
        };
        self.elapsed = 0.0;
        match target.and_then(|t| self.queue.get(t)).map(|(id, _)| *id) {
            Some(id) => self.current = Some(id),
            None => {
                self.current = None;
                self.playback = PlaybackState::Stopped;
            }
        }
    }
}

/// In-memory daemon. Clones share state.
#[derive(Clone, Default)]
pub struct FakeDaemon {
    state: Arc<Mutex<FakeState>>,
    busy: Arc<AtomicBool>,
    overlap: Arc<AtomicBool>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_playlist(self, name: &str, uris: &[&str]) -> Self {
        self.state()
            .playlists
            .insert(name.to_string(), uris.iter().map(|u| u.to_string()).collect());
        self
    }

    /// Registers the daemon-side listing of `path` (`""` is the root).
    pub fn with_directory(self, path: &str, entries: &[(EntryKind, &str)]) -> Self {
        let listing = entries
            .iter()
            .map(|(kind, p)| BrowseEntry::from_path(*kind, *p))
            .collect();
        self.state().tree.insert(path.to_string(), listing);
        self
    }

    pub fn with_queue(self, uris: &[&str]) -> Self {
        {
            let mut s = self.state();
            for uri in uris {
                s.push(uri);
            }
        }
        self
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    /// Kills every open transport; the next call on any of them fails.
    pub fn sever_connections(&self) {
        self.state().generation += 1;
    }

    pub fn fail_next_calls(&self, n: u32) {
        self.state().fail_next = n;
    }

    /// Successful connects so far.
    pub fn connects(&self) -> u32 {
        self.state().connects
    }

    /// How many times `verb` reached the daemon, failed attempts included.
    pub fn invocations(&self, verb: &str) -> usize {
        self.state().calls.iter().filter(|c| c.as_str() == verb).count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    pub fn queue_uris(&self) -> Vec<String> {
        self.state().queue.iter().map(|(_, t)| t.file.clone()).collect()
    }

    pub fn queue_tracks(&self) -> Vec<Track> {
        self.state().queue.iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn playlist(&self, name: &str) -> Option<Vec<String>> {
        self.state().playlists.get(name).cloned()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.state().playback
    }

    pub fn mode(&self, mode: PlayMode) -> bool {
        self.state().modes.get(mode.verb()).copied().unwrap_or(false)
    }

    pub fn volume(&self) -> u8 {
        self.state().volume
    }

    /// True if two protocol calls were ever in flight at the same time.
    pub fn saw_overlap(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }
}

impl Connector for FakeDaemon {
    type Transport = FakeTransport;

    fn connect(&self) -> TransportResult<FakeTransport> {
        let mut s = self.state();
        if !s.reachable {
            return Err(TransportError::Connection(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        s.connects += 1;
        Ok(FakeTransport {
            daemon: self.clone(),
            generation: s.generation,
        })
    }

    fn describe(&self) -> String {
        "fake-daemon".to_string()
    }
}

pub struct FakeTransport {
    daemon: FakeDaemon,
    generation: u64,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FakeTransport {
    fn call<T>(&mut self, verb: &str, f: impl FnOnce(&mut FakeState) -> TransportResult<T>) -> TransportResult<T> {
        if self.daemon.busy.swap(true, Ordering::SeqCst) {
            self.daemon.overlap.store(true, Ordering::SeqCst);
        }
        let _busy = BusyGuard(&self.daemon.busy);
        std::thread::yield_now();

        let mut s = self.daemon.state();
        s.calls.push(verb.to_string());
        if s.generation != self.generation {
            return Err(TransportError::Connection(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            )));
        }
        if s.fail_next > 0 {
            s.fail_next -= 1;
            s.generation += 1;
            return Err(TransportError::Connection(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        f(&mut *s)
    }
}

impl Transport for FakeTransport {
    fn ping(&mut self) -> TransportResult<()> {
        self.call("ping", |_| Ok(()))
    }

    fn close(&mut self) -> TransportResult<()> {
        self.call("close", |_| Ok(()))
    }

    fn status(&mut self) -> TransportResult<PlayerStatus> {
        self.call("status", |s| {
            let position = s.current.and_then(|id| s.position_of(id));
            Ok(PlayerStatus {
                state: s.playback,
                volume: Some(s.volume),
                repeat: s.modes.get("repeat").copied().unwrap_or(false),
                random: s.modes.get("random").copied().unwrap_or(false),
                single: s.modes.get("single").copied().unwrap_or(false),
                consume: s.modes.get("consume").copied().unwrap_or(false),
                queue_length: s.queue.len() as u32,
                song_position: position.map(|p| p as u32),
                song_id: s.current,
                elapsed_secs: position.map(|_| s.elapsed),
                duration_secs: None,
                replay_gain: Some(s.replay_gain),
            })
        })
    }

    fn update(&mut self) -> TransportResult<u32> {
        self.call("update", |s| {
            s.db_updates += 1;
            Ok(s.db_updates)
        })
    }

    fn play(&mut self) -> TransportResult<()> {
        self.call("play", |s| {
            if s.current.is_none() {
                s.current = s.queue.first().map(|(id, _)| *id);
            }
            if let Some(id) = s.current {
                s.start(id, 0.0);
            }
            Ok(())
        })
    }

    fn play_id(&mut self, id: SongId) -> TransportResult<()> {
        self.call("playid", |s| {
            s.position_of(id).ok_or_else(|| no_such("song"))?;
            s.start(id, 0.0);
            Ok(())
        })
    }

    fn toggle_pause(&mut self) -> TransportResult<()> {
        self.call("pause", |s| {
            s.playback = match s.playback {
                PlaybackState::Playing => PlaybackState::Paused,
                PlaybackState::Paused => PlaybackState::Playing,
                PlaybackState::Stopped => PlaybackState::Stopped,
            };
            Ok(())
        })
    }

    fn stop(&mut self) -> TransportResult<()> {
        self.call("stop", |s| {
            s.playback = PlaybackState::Stopped;
            Ok(())
        })
    }

    fn next(&mut self) -> TransportResult<()> {
        self.call("next", |s| {
            s.step(true);
            Ok(())
        })
    }

    fn previous(&mut self) -> TransportResult<()> {
        self.call("previous", |s| {
            s.step(false);
            Ok(())
        })
    }

    fn set_volume(&mut self, volume: u8) -> TransportResult<()> {
        self.call("setvol", |s| {
            s.volume = volume;
            Ok(())
        })
    }

    fn seek_current(&mut self, seconds: f64) -> TransportResult<()> {
        self.call("seekcur", |s| {
            if s.playback == PlaybackState::Stopped {
                return Err(TransportError::rejected(Some(ack::PLAYER_SYNC), "Not playing"));
            }
            s.elapsed = seconds;
            Ok(())
        })
    }

    fn seek(&mut self, position: u32, seconds: f64) -> TransportResult<()> {
        self.call("seek", |s| {
            let id = s.queue.get(position as usize).map(|(id, _)| *id).ok_or_else(bad_index)?;
            s.start(id, seconds);
            Ok(())
        })
    }

    fn seek_id(&mut self, id: SongId, seconds: f64) -> TransportResult<()> {
        self.call("seekid", |s| {
            s.position_of(id).ok_or_else(|| no_such("song"))?;
            s.start(id, seconds);
            Ok(())
        })
    }

    fn set_mode(&mut self, mode: PlayMode, enabled: bool) -> TransportResult<()> {
        self.call(mode.verb(), |s| {
            s.modes.insert(mode.verb(), enabled);
            Ok(())
        })
    }

    fn set_replay_gain(&mut self, mode: ReplayGainMode) -> TransportResult<()> {
        self.call("replay_gain_mode", |s| {
            s.replay_gain = mode;
            Ok(())
        })
    }

    fn add(&mut self, uri: &str) -> TransportResult<()> {
        self.call("add", |s| {
            s.push(uri);
            Ok(())
        })
    }

    fn add_id(&mut self, uri: &str) -> TransportResult<SongId> {
        self.call("addid", |s| Ok(s.push(uri)))
    }

    fn add_id_at(&mut self, uri: &str, position: u32) -> TransportResult<SongId> {
        self.call("addid", |s| s.insert(uri, position as usize))
    }

    fn add_tag_id(&mut self, id: SongId, tag: &str, value: &str) -> TransportResult<()> {
        self.call("addtagid", |s| {
            let pos = s.position_of(id).ok_or_else(|| no_such("song"))?;
            let track = &mut s.queue[pos].1;
            match tag.to_lowercase().as_str() {
                "title" => track.title = Some(value.to_string()),
                "artist" => track.artist = Some(value.to_string()),
                _ => {}
            }
            Ok(())
        })
    }

    fn delete(&mut self, position: u32) -> TransportResult<()> {
        self.call("delete", |s| {
            let pos = position as usize;
            if pos >= s.queue.len() {
                return Err(bad_index());
            }
            s.remove_at(pos);
            Ok(())
        })
    }

    fn delete_id(&mut self, id: SongId) -> TransportResult<()> {
        self.call("deleteid", |s| {
            let pos = s.position_of(id).ok_or_else(|| no_such("song"))?;
            s.remove_at(pos);
            Ok(())
        })
    }

    fn current_song(&mut self) -> TransportResult<Option<QueueEntry>> {
        self.call("currentsong", |s| {
            if s.playback == PlaybackState::Stopped {
                return Ok(None);
            }
            let current = s.current;
            Ok(s.entries().into_iter().find(|e| Some(e.id) == current))
        })
    }

    fn playlist_info(&mut self) -> TransportResult<Vec<QueueEntry>> {
        self.call("playlistinfo", |s| Ok(s.entries()))
    }

    fn playlist_id(&mut self) -> TransportResult<Vec<QueueEntry>> {
        self.call("playlistid", |s| Ok(s.entries()))
    }

    fn clear(&mut self) -> TransportResult<()> {
        self.call("clear", |s| {
            s.queue.clear();
            s.current = None;
            s.playback = PlaybackState::Stopped;
            Ok(())
        })
    }

    fn list_playlists(&mut self) -> TransportResult<Vec<String>> {
        self.call("listplaylists", |s| Ok(s.playlists.keys().cloned().collect()))
    }

    fn list_playlist(&mut self, name: &str) -> TransportResult<Vec<String>> {
        self.call("listplaylist", |s| {
            s.playlists.get(name).cloned().ok_or_else(|| no_such("playlist"))
        })
    }

    fn list_playlist_info(&mut self, name: &str) -> TransportResult<Vec<Track>> {
        self.call("listplaylistinfo", |s| {
            let uris = s.playlists.get(name).ok_or_else(|| no_such("playlist"))?;
            Ok(uris.iter().map(|u| Track::new(u.as_str())).collect())
        })
    }

    fn save(&mut self, name: &str) -> TransportResult<()> {
        self.call("save", |s| {
            if s.playlists.contains_key(name) {
                return Err(TransportError::rejected(Some(ack::EXIST), "Playlist already exists"));
            }
            let uris = s.queue.iter().map(|(_, t)| t.file.clone()).collect();
            s.playlists.insert(name.to_string(), uris);
            Ok(())
        })
    }

    fn load(&mut self, name: &str) -> TransportResult<()> {
        self.call("load", |s| {
            let uris = s.playlists.get(name).cloned().ok_or_else(|| no_such("playlist"))?;
            for uri in &uris {
                s.push(uri);
            }
            Ok(())
        })
    }

    fn rename(&mut self, from: &str, to: &str) -> TransportResult<()> {
        self.call("rename", |s| {
            if s.playlists.contains_key(to) {
                return Err(TransportError::rejected(Some(ack::EXIST), "Playlist already exists"));
            }
            let uris = s.playlists.remove(from).ok_or_else(|| no_such("playlist"))?;
            s.playlists.insert(to.to_string(), uris);
            Ok(())
        })
    }

    fn remove(&mut self, name: &str) -> TransportResult<()> {
        self.call("rm", |s| {
            s.playlists.remove(name).map(|_| ()).ok_or_else(|| no_such("playlist"))
        })
    }

    fn playlist_add(&mut self, name: &str, uri: &str) -> TransportResult<()> {
        self.call("playlistadd", |s| {
            s.playlists.entry(name.to_string()).or_default().push(uri.to_string());
            Ok(())
        })
    }

    fn playlist_delete(&mut self, name: &str, position: u32) -> TransportResult<()> {
        self.call("playlistdelete", |s| {
            let uris = s.playlists.get_mut(name).ok_or_else(|| no_such("playlist"))?;
            let pos = position as usize;
            if pos >= uris.len() {
                return Err(bad_index());
            }
            uris.remove(pos);
            Ok(())
        })
    }

    fn playlist_clear(&mut self, name: &str) -> TransportResult<()> {
        self.call("playlistclear", |s| {
            let uris = s.playlists.get_mut(name).ok_or_else(|| no_such("playlist"))?;
            uris.clear();
            Ok(())
        })
    }

    fn lsinfo(&mut self, path: &str) -> TransportResult<Vec<BrowseEntry>> {
        self.call("lsinfo", |s| s.tree.get(path).cloned().ok_or_else(|| no_such("directory")))
    }
}
