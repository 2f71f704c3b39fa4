//! Multi-step daemon orchestrations run on behalf of collaborators.

use crate::error::{Error, Result};
use crate::library::MusicLibrary;
use crate::player::playlists::ensure_exists_in;
use crate::player::{ConnectionState, Connector, Daemon, SongId, Transport};
use serde::Serialize;
use tracing::{info, warn};

/// Default stored playlist for scheduled playback.
pub const SCHEDULED_PLAYLIST: &str = "定期播放";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStarted {
    pub url: String,
    pub id: Option<SongId>,
}

/// Replaces the queue with a single stream URL, tags it and plays it.
///
/// Streams usually carry no tags of their own, so `title` and `artist` are
/// attached to the queue entry. Tagging is skipped when the add returned no
/// id; playback is still attempted. The whole sequence holds the connection,
/// so no other caller can touch the queue in between.
pub fn play_stream<C: Connector>(
    daemon: &Daemon<C>,
    url: &str,
    title: Option<&str>,
    artist: Option<&str>,
) -> Result<StreamStarted> {
    let id = daemon.transaction(|session| {
        session.execute("clear", |t| t.clear())?;

        let id = match session.execute("addid", |t| t.add_id(url)) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Could not add '{}' to the queue: {}", url, e);
                None
            }
        };
        match id {
            Some(id) => {
                for (tag, value) in [("Title", title), ("Artist", artist)] {
                    if let Some(value) = value {
                        session.execute("addtagid", |t| t.add_tag_id(id, tag, value))?;
                    }
                }
            }
            None => warn!("No queue id for stream '{}', leaving it untagged", url),
        }

        session.execute("play", |t| t.play())?;
        Ok(id)
    })?;

    info!("Streaming {}", url);
    Ok(StreamStarted {
        url: url.to_string(),
        id,
    })
}

/// The job a host scheduler runs: make sure `playlist` exists, then replace
/// the queue with it and start playing.
///
/// Nothing is attempted unless the daemon is reachable. Seeding, loading and
/// playing run as one transaction.
pub fn scheduled_playback<C: Connector>(
    daemon: &Daemon<C>,
    library: &MusicLibrary,
    playlist: &str,
    seed_folder: &str,
) -> Result<()> {
    if daemon.connect()? != ConnectionState::Connected {
        return Err(Error::Unavailable(format!(
            "cannot start scheduled playback of '{playlist}'"
        )));
    }

    daemon.transaction(|session| {
        ensure_exists_in(session, library, playlist, seed_folder)?;
        session.execute("clear", |t| t.clear())?;
        session.execute("load", |t| t.load(playlist))?;
        session.execute("play", |t| t.play())
    })?;
    info!("Scheduled playback of '{}' started", playlist);
    Ok(())
}
