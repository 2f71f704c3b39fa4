use super::executor::Daemon;
use super::traits::{Connector, QueueEntry, SongId, Transport};
use crate::error::Result;
use tracing::{info, warn};

/// Operations on the live playback queue.
///
/// Queue ids are only meaningful until the next [`QueueManager::clear`].
pub struct QueueManager<'a, C: Connector> {
    daemon: &'a Daemon<C>,
}

impl<'a, C: Connector> QueueManager<'a, C> {
    pub fn new(daemon: &'a Daemon<C>) -> Self {
        Self { daemon }
    }

    pub fn add_track(&self, path: &str) -> Result<()> {
        self.daemon.execute_safe("add", |t| t.add(path))?;
        info!("Added '{}' to the queue", path);
        Ok(())
    }

    /// Adds a whole directory; the daemon expands it server-side.
    pub fn add_folder(&self, folder: &str) -> Result<()> {
        self.daemon.execute_safe("add", |t| t.add(folder))?;
        info!("Added all files from '{}' to the queue", folder);
        Ok(())
    }

    /// Adds `uri` and returns its queue id, or `None` when the add failed.
    pub fn add_track_returning_id(&self, uri: &str) -> Option<SongId> {
        match self.daemon.execute_safe("addid", |t| t.add_id(uri)) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Could not add '{}' to the queue: {}", uri, e);
                None
            }
        }
    }

    /// Like [`add_track_returning_id`](Self::add_track_returning_id), inserting
    /// at 0-based `position` instead of appending.
    pub fn add_track_returning_id_at(&self, uri: &str, position: u32) -> Option<SongId> {
        match self.daemon.execute_safe("addid", |t| t.add_id_at(uri, position)) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Could not insert '{}' at position {}: {}", uri, position, e);
                None
            }
        }
    }

    /// Replaces the queue with `urls`, in order. Returns how many were queued.
    ///
    /// Runs as one transaction, so a failure part-way never interleaves with
    /// another caller's queue edits.
    pub fn load_radio_streams<S: AsRef<str>>(&self, urls: &[S]) -> Result<usize> {
        self.daemon.transaction(|session| {
            session.execute("clear", |t| t.clear())?;
            for url in urls {
                session.execute("add", |t| t.add(url.as_ref()))?;
            }
            Ok(())
        })?;
        info!("Loaded {} radio streams", urls.len());
        Ok(urls.len())
    }

    /// Attaches a tag to a queued entry. Stored playlists are unaffected.
    pub fn set_tag(&self, id: SongId, tag: &str, value: &str) -> Result<()> {
        self.daemon.execute_safe("addtagid", |t| t.add_tag_id(id, tag, value))
    }

    pub fn clear(&self) -> Result<()> {
        self.daemon.execute_safe("clear", |t| t.clear())?;
        info!("Queue cleared");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<QueueEntry>> {
        self.daemon.execute_safe("playlistinfo", |t| t.playlist_info())
    }

    pub fn list_with_ids(&self) -> Result<Vec<QueueEntry>> {
        self.daemon.execute_safe("playlistid", |t| t.playlist_id())
    }

    /// `None` when nothing is queued or nothing is playing.
    pub fn current_song(&self) -> Result<Option<QueueEntry>> {
        self.daemon.execute_safe("currentsong", |t| t.current_song())
    }

    /// Removes the entry at 0-based `position`; later entries shift down.
    pub fn delete_by_position(&self, position: u32) -> Result<()> {
        self.daemon.execute_safe("delete", |t| t.delete(position))
    }

    pub fn delete_by_id(&self, id: SongId) -> Result<()> {
        self.daemon.execute_safe("deleteid", |t| t.delete_id(id))
    }

    /// Appends a stored playlist to the queue.
    pub fn load_playlist(&self, name: &str) -> Result<()> {
        self.daemon.execute_safe("load", |t| t.load(name))?;
        info!("Loaded playlist '{}' into the queue", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_utils::FakeDaemon;

    #[test]
    fn test_empty_queue_has_no_current_song() {
        let daemon = Daemon::new(FakeDaemon::new());
        assert!(daemon.queue().current_song().unwrap().is_none());
        assert!(daemon.queue().list().unwrap().is_empty());
        assert!(daemon.queue().list_with_ids().unwrap().is_empty());
    }

    #[test]
    fn test_delete_by_position_shifts() {
        let fake = FakeDaemon::new().with_queue(&["a.mp3", "b.mp3", "c.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let queue = daemon.queue();

        queue.delete_by_position(0).unwrap();
        let entries = queue.list().unwrap();
        assert_eq!(entries[0].track.file, "b.mp3");
        assert_eq!(entries[0].position, 0);
        assert_eq!(entries[1].position, 1);

        // One past the end is out of range.
        let err = queue.delete_by_position(2).unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_tagging_a_stream_entry() {
        let fake = FakeDaemon::new();
        let daemon = Daemon::new(fake.clone());
        let queue = daemon.queue();

        let id = queue.add_track_returning_id("http://radio.example/live").unwrap();
        queue.set_tag(id, "title", "Morning Show").unwrap();
        queue.set_tag(id, "artist", "Radio Example").unwrap();

        let entry = &queue.list_with_ids().unwrap()[0];
        assert_eq!(entry.id, id);
        assert_eq!(entry.track.title.as_deref(), Some("Morning Show"));
        assert_eq!(entry.track.artist.as_deref(), Some("Radio Example"));
    }

    #[test]
    fn test_add_returning_id_on_unavailable_daemon() {
        let fake = FakeDaemon::new();
        fake.set_reachable(false);
        let daemon = Daemon::new(fake);
        assert_eq!(daemon.queue().add_track_returning_id("a.mp3"), None);
    }

    #[test]
    fn test_clear_invalidates_ids() {
        let fake = FakeDaemon::new().with_queue(&["a.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let queue = daemon.queue();

        let id = queue.list_with_ids().unwrap()[0].id;
        queue.clear().unwrap();
        assert!(queue.list().unwrap().is_empty());
        assert!(matches!(queue.delete_by_id(id), Err(Error::CommandRejected { .. })));
    }

    #[test]
    fn test_current_song_while_playing() {
        let fake = FakeDaemon::new().with_queue(&["a.mp3", "b.mp3"]);
        let daemon = Daemon::new(fake.clone());

        daemon.playback().play().unwrap();
        daemon.playback().next().unwrap();
        let current = daemon.queue().current_song().unwrap().unwrap();
        assert_eq!(current.track.file, "b.mp3");
        assert_eq!(current.position, 1);
    }

    #[test]
    fn test_add_returning_id_at_position() {
        let fake = FakeDaemon::new().with_queue(&["a.mp3", "c.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let queue = daemon.queue();

        let id = queue.add_track_returning_id_at("b.mp3", 1).unwrap();
        assert_eq!(fake.queue_uris(), vec!["a.mp3", "b.mp3", "c.mp3"]);
        assert_eq!(queue.list_with_ids().unwrap()[1].id, id);

        // Past the end is refused and reported as no id.
        assert_eq!(queue.add_track_returning_id_at("z.mp3", 9), None);
        assert_eq!(fake.queue_uris().len(), 3);
    }

    #[test]
    fn test_load_radio_streams_replaces_queue() {
        let fake = FakeDaemon::new().with_queue(&["old.mp3"]);
        let daemon = Daemon::new(fake.clone());

        let streams = ["http://radio.example/one", "http://radio.example/two"];
        assert_eq!(daemon.queue().load_radio_streams(&streams).unwrap(), 2);
        assert_eq!(fake.queue_uris(), streams);
        assert_eq!(fake.invocations("clear"), 1);
    }

    #[test]
    fn test_load_radio_streams_retries_after_drop() {
        let fake = FakeDaemon::new();
        let daemon = Daemon::new(fake.clone());
        daemon.connect().unwrap();

        fake.fail_next_calls(1);
        let streams = vec!["http://radio.example/one".to_string()];
        daemon.queue().load_radio_streams(&streams).unwrap();
        assert_eq!(fake.queue_uris(), streams);
        assert_eq!(fake.connects(), 2);
    }
}
