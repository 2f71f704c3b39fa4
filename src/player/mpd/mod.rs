//! Production transport: one TCP session with a Music Player Daemon.
//!
//! Verbs go through `mpd::Client`. Two have no client method: `add` on a
//! directory and the bare-URI `listplaylist`. Those use [`raw::RawChannel`]
//! on a clone of the same socket, so both views share a single protocol
//! session.

pub mod raw;

use super::traits::{
    BrowseEntry, Connector, EntryKind, PlayMode, PlaybackState, PlayerStatus, QueueEntry, ReplayGainMode, SongId,
    Track, Transport,
};
use crate::error::TransportResult;
use mpd::{Client, Id, ReplayGain, Song, State, Status};
use raw::RawChannel;
use std::io::BufReader;
use std::net::TcpStream;
use std::time::Duration;
use tracing::debug;

/// Connects to MPD at `host:port`.
#[derive(Debug, Clone)]
pub struct MpdConnector {
    host: String,
    port: u16,
    timeout: Option<Duration>,
}

impl MpdConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: None,
        }
    }

    /// Socket read/write timeout. Without one a stuck daemon blocks forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for MpdConnector {
    fn default() -> Self {
        Self::new("localhost", 6600)
    }
}

impl Connector for MpdConnector {
    type Transport = MpdTransport;

    fn connect(&self) -> TransportResult<MpdTransport> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))?;
        stream.set_read_timeout(self.timeout)?;
        stream.set_write_timeout(self.timeout)?;
        stream.set_nodelay(true)?;

        let reader = BufReader::new(stream.try_clone()?);
        let writer = stream.try_clone()?;
        // Client::new consumes the greeting line.
        let client = Client::new(stream)?;
        Ok(MpdTransport {
            client,
            raw: RawChannel::new(reader, writer),
        })
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct MpdTransport {
    client: Client<TcpStream>,
    raw: RawChannel<BufReader<TcpStream>, TcpStream>,
}

impl MpdTransport {
    fn command(&mut self, verb: &str, args: &[&str]) -> TransportResult<raw::Pairs> {
        self.raw.command(verb, args)
    }
}

fn song_path(uri: &str) -> Song {
    Song {
        file: uri.to_string(),
        ..Default::default()
    }
}

fn track_from_song(song: &Song) -> Track {
    // `duration` carries sub-second precision, `Time` only whole seconds.
    let precise = song
        .tags
        .iter()
        .find(|(key, _)| key == "duration")
        .and_then(|(_, value)| value.parse().ok());
    Track {
        file: song.file.clone(),
        title: song.title.clone(),
        artist: song.artist.clone(),
        duration_secs: precise.or_else(|| song.duration.map(|d| d.as_secs_f64())),
    }
}

fn entry_from_song(song: &Song) -> Option<QueueEntry> {
    song.place.as_ref().map(|place| QueueEntry {
        id: place.id.0,
        position: place.pos,
        track: track_from_song(song),
    })
}

fn replay_gain_from(mode: ReplayGainMode) -> ReplayGain {
    match mode {
        ReplayGainMode::Off => ReplayGain::Off,
        ReplayGainMode::Track => ReplayGain::Track,
        ReplayGainMode::Album => ReplayGain::Album,
        ReplayGainMode::Auto => ReplayGain::Auto,
    }
}

fn status_from(status: Status) -> PlayerStatus {
    PlayerStatus {
        state: match status.state {
            State::Play => PlaybackState::Playing,
            State::Pause => PlaybackState::Paused,
            State::Stop => PlaybackState::Stopped,
        },
        // -1 means no mixer
        volume: u8::try_from(status.volume).ok(),
        repeat: status.repeat,
        random: status.random,
        single: status.single,
        consume: status.consume,
        queue_length: status.queue_len,
        song_position: status.song.map(|place| place.pos),
        song_id: status.song.map(|place| place.id.0),
        elapsed_secs: status.elapsed.map(|d| d.as_secs_f64()),
        duration_secs: status.duration.map(|d| d.as_secs_f64()),
        replay_gain: status.replaygain.map(|gain| match gain {
            ReplayGain::Off => ReplayGainMode::Off,
            ReplayGain::Track => ReplayGainMode::Track,
            ReplayGain::Album => ReplayGainMode::Album,
            ReplayGain::Auto => ReplayGainMode::Auto,
        }),
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

impl Transport for MpdTransport {
    fn ping(&mut self) -> TransportResult<()> {
        Ok(self.client.ping()?)
    }

    fn close(&mut self) -> TransportResult<()> {
        // The daemon hangs up instead of answering, so only an ACK is a failure.
        match self.client.close() {
            Err(err @ mpd::error::Error::Server(_)) => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn status(&mut self) -> TransportResult<PlayerStatus> {
        Ok(status_from(self.client.status()?))
    }

    fn update(&mut self) -> TransportResult<u32> {
        Ok(self.client.update()?)
    }

    fn play(&mut self) -> TransportResult<()> {
        Ok(self.client.play()?)
    }

    fn play_id(&mut self, id: SongId) -> TransportResult<()> {
        Ok(self.client.switch(Id(id))?)
    }

    fn toggle_pause(&mut self) -> TransportResult<()> {
        Ok(self.client.toggle_pause()?)
    }

    fn stop(&mut self) -> TransportResult<()> {
        Ok(self.client.stop()?)
    }

    fn next(&mut self) -> TransportResult<()> {
        Ok(self.client.next()?)
    }

    fn previous(&mut self) -> TransportResult<()> {
        Ok(self.client.prev()?)
    }

    fn set_volume(&mut self, volume: u8) -> TransportResult<()> {
        Ok(self.client.volume(volume.min(100) as i8)?)
    }

    fn seek_current(&mut self, seconds: f64) -> TransportResult<()> {
        Ok(self.client.rewind(seconds)?)
    }

    fn seek(&mut self, position: u32, seconds: f64) -> TransportResult<()> {
        Ok(self.client.seek(position, seconds)?)
    }

    fn seek_id(&mut self, id: SongId, seconds: f64) -> TransportResult<()> {
        Ok(self.client.seek(Id(id), seconds)?)
    }

    fn set_mode(&mut self, mode: PlayMode, enabled: bool) -> TransportResult<()> {
        match mode {
            PlayMode::Repeat => Ok(self.client.repeat(enabled)?),
            PlayMode::Random => Ok(self.client.random(enabled)?),
            PlayMode::Single => Ok(self.client.single(enabled)?),
            PlayMode::Consume => Ok(self.client.consume(enabled)?),
        }
    }

    fn set_replay_gain(&mut self, mode: ReplayGainMode) -> TransportResult<()> {
        Ok(self.client.replaygain(replay_gain_from(mode))?)
    }

    fn add(&mut self, uri: &str) -> TransportResult<()> {
        // `addid` refuses directories; plain `add` expands them server-side.
        self.command("add", &[uri]).map(|_| ())
    }

    fn add_id(&mut self, uri: &str) -> TransportResult<SongId> {
        let id = self.client.push(song_path(uri))?;
        Ok(id.0)
    }

    fn add_id_at(&mut self, uri: &str, position: u32) -> TransportResult<SongId> {
        let id = self.client.insert(song_path(uri), position as usize)?;
        Ok(id as SongId)
    }

    fn add_tag_id(&mut self, id: SongId, tag: &str, value: &str) -> TransportResult<()> {
        Ok(self.client.tag(Id(id), tag, value)?)
    }

    fn delete(&mut self, position: u32) -> TransportResult<()> {
        Ok(self.client.delete(position)?)
    }

    fn delete_id(&mut self, id: SongId) -> TransportResult<()> {
        Ok(self.client.delete(Id(id))?)
    }

    fn current_song(&mut self) -> TransportResult<Option<QueueEntry>> {
        let song = self.client.currentsong()?;
        Ok(song.as_ref().and_then(entry_from_song))
    }

    fn playlist_info(&mut self) -> TransportResult<Vec<QueueEntry>> {
        let songs = self.client.queue()?;
        Ok(songs.iter().filter_map(entry_from_song).collect())
    }

    fn playlist_id(&mut self) -> TransportResult<Vec<QueueEntry>> {
        // `playlistinfo` carries the same Id/Pos pairs as `playlistid`.
        self.playlist_info()
    }

    fn clear(&mut self) -> TransportResult<()> {
        Ok(self.client.clear()?)
    }

    fn list_playlists(&mut self) -> TransportResult<Vec<String>> {
        let playlists = self.client.playlists()?;
        Ok(playlists.into_iter().map(|p| p.name).collect())
    }

    fn list_playlist(&mut self, name: &str) -> TransportResult<Vec<String>> {
        Ok(raw::parse_uris(self.command("listplaylist", &[name])?))
    }

    fn list_playlist_info(&mut self, name: &str) -> TransportResult<Vec<Track>> {
        let songs = self.client.playlist(name)?;
        Ok(songs.iter().map(track_from_song).collect())
    }

    fn save(&mut self, name: &str) -> TransportResult<()> {
        Ok(self.client.save(name)?)
    }

    fn load(&mut self, name: &str) -> TransportResult<()> {
        Ok(self.client.load(name, ..)?)
    }

    fn rename(&mut self, from: &str, to: &str) -> TransportResult<()> {
        Ok(self.client.pl_rename(from, to)?)
    }

    fn remove(&mut self, name: &str) -> TransportResult<()> {
        Ok(self.client.pl_remove(name)?)
    }

    fn playlist_add(&mut self, name: &str, uri: &str) -> TransportResult<()> {
        Ok(self.client.pl_push(name, song_path(uri))?)
    }

    fn playlist_delete(&mut self, name: &str, position: u32) -> TransportResult<()> {
        Ok(self.client.pl_delete(name, position)?)
    }

    fn playlist_clear(&mut self, name: &str) -> TransportResult<()> {
        Ok(self.client.pl_clear(name)?)
    }

    /// Directories come from `listfiles`, files from `lsinfo`; directories first.
    fn lsinfo(&mut self, path: &str) -> TransportResult<Vec<BrowseEntry>> {
        debug!(path, "lsinfo");
        let mut entries: Vec<BrowseEntry> = self
            .client
            .listfiles(path)?
            .into_iter()
            .filter(|(kind, _)| kind == "directory")
            .map(|(_, name)| BrowseEntry::from_path(EntryKind::Directory, join_path(path, &name)))
            .collect();
        let songs = self.client.lsinfo(song_path(path))?;
        entries.extend(
            songs
                .into_iter()
                .filter(|song| !song.file.is_empty())
                .map(|song| BrowseEntry::from_path(EntryKind::File, song.file)),
        );
        Ok(entries)
    }
}
