use super::executor::{Daemon, Session};
use super::traits::{Connector, Track, Transport};
use crate::error::{ack, Error, Result};
use crate::library::{normalize_folder, MusicLibrary};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of a deduplicating add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AddOutcome {
    Added { message: String },
    AlreadyPresent { message: String },
}

impl AddOutcome {
    pub fn message(&self) -> &str {
        match self {
            Self::Added { message } | Self::AlreadyPresent { message } => message,
        }
    }
}

/// Summary of a bulk edit on a stored playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaylistReport {
    pub playlist: String,
    pub added: usize,
    pub message: String,
}

/// Daemon-side stored playlists.
///
/// This type holds no copy of any playlist; every read goes to the daemon.
pub struct PlaylistStore<'a, C: Connector> {
    daemon: &'a Daemon<C>,
    library: &'a MusicLibrary,
}

impl<'a, C: Connector> PlaylistStore<'a, C> {
    pub fn new(daemon: &'a Daemon<C>, library: &'a MusicLibrary) -> Self {
        Self { daemon, library }
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.daemon.execute_safe("listplaylists", |t| t.list_playlists())
    }

    /// Renames a playlist. A taken destination is rejected by the daemon.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.daemon.execute_safe("rename", |t| t.rename(from, to))?;
        info!("Renamed playlist '{}' to '{}'", from, to);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.daemon.execute_safe("rm", |t| t.remove(name))?;
        info!("Removed playlist '{}'", name);
        Ok(())
    }

    /// URIs of `name`, or an empty list if it cannot be read.
    pub fn tracks(&self, name: &str) -> Vec<String> {
        self.daemon
            .execute_safe("listplaylist", |t| t.list_playlist(name))
            .unwrap_or_else(|e| {
                warn!("Could not read playlist '{}': {}", name, e);
                Vec::new()
            })
    }

    pub fn tracks_with_info(&self, name: &str) -> Vec<Track> {
        self.daemon
            .execute_safe("listplaylistinfo", |t| t.list_playlist_info(name))
            .unwrap_or_else(|e| {
                warn!("Could not read playlist '{}': {}", name, e);
                Vec::new()
            })
    }

    /// Deletes the entry at 0-based `position`.
    pub fn delete_track_at(&self, name: &str, position: u32) -> Result<()> {
        self.daemon
            .execute_safe("playlistdelete", |t| t.playlist_delete(name, position))
    }

    /// Empties the playlist; the playlist itself remains.
    pub fn clear(&self, name: &str) -> Result<()> {
        self.daemon.execute_safe("playlistclear", |t| t.playlist_clear(name))
    }

    /// Adds `uri` unless the playlist already contains it.
    ///
    /// The membership check and the write happen under one lock, so
    /// concurrent adds of the same URI leave exactly one copy.
    pub fn add_uri(&self, name: &str, uri: &str) -> Result<AddOutcome> {
        self.daemon.transaction(|session| add_uri_in(session, name, uri))
    }

    /// Appends every audio file found under `folder`, in scan order.
    pub fn add_folder(&self, name: &str, folder: &str) -> Result<PlaylistReport> {
        let files = self.library.scan(folder);
        if !files.is_empty() {
            self.daemon.transaction(|session| append_all(session, name, &files))?;
            info!("Added {} files from '{}' to playlist '{}'", files.len(), folder, name);
        }
        Ok(folder_report(name, folder, files.len()))
    }

    pub fn save_queue_as(&self, name: &str) -> Result<()> {
        self.daemon.execute_safe("save", |t| t.save(name))?;
        info!("Saved queue as playlist '{}'", name);
        Ok(())
    }

    /// Replaces playlist `name` so it holds exactly `uris`, in order.
    ///
    /// Removal and refill run as one transaction: with concurrent callers
    /// the playlist ends up as exactly one caller's selection.
    pub fn save_selection_as(&self, name: &str, uris: &[String]) -> Result<PlaylistReport> {
        self.daemon.transaction(|session| {
            if playlist_exists(session, name)? {
                session.execute("rm", |t| t.remove(name))?;
            }
            append_all(session, name, uris)
        })?;
        info!("Saved {} songs to playlist '{}'", uris.len(), name);
        Ok(PlaylistReport {
            playlist: name.to_string(),
            added: uris.len(),
            message: format!("playlist '{name}' saved"),
        })
    }

    /// Creates `name` from `seed_folder` if it does not exist yet.
    pub fn ensure_exists(&self, name: &str, seed_folder: &str) -> Result<()> {
        self.daemon
            .transaction(|session| ensure_exists_in(session, self.library, name, seed_folder))?;
        Ok(())
    }
}

fn playlist_exists<C: Connector>(session: &mut Session<'_, C>, name: &str) -> Result<bool> {
    let names = session.execute("listplaylists", |t| t.list_playlists())?;
    Ok(names.iter().any(|p| p == name))
}

fn append_all<C: Connector>(session: &mut Session<'_, C>, name: &str, uris: &[String]) -> Result<()> {
    for uri in uris {
        session.execute("playlistadd", |t| t.playlist_add(name, uri))?;
    }
    Ok(())
}

fn add_uri_in<C: Connector>(session: &mut Session<'_, C>, name: &str, uri: &str) -> Result<AddOutcome> {
    let current = match session.execute("listplaylist", |t| t.list_playlist(name)) {
        Ok(uris) => uris,
        Err(Error::CommandRejected {
            code: Some(ack::NO_EXIST),
            ..
        }) => {
            debug!("Playlist '{}' does not exist yet, it will be created", name);
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    if current.iter().any(|existing| existing == uri) {
        return Ok(AddOutcome::AlreadyPresent {
            message: format!("'{uri}' is already in playlist '{name}'"),
        });
    }

    session.execute("playlistadd", |t| t.playlist_add(name, uri))?;
    info!("Added '{}' to playlist '{}'", uri, name);
    Ok(AddOutcome::Added {
        message: format!("'{uri}' added to playlist '{name}'"),
    })
}

fn folder_report(name: &str, folder: &str, added: usize) -> PlaylistReport {
    if added == 0 {
        info!("No music files found in '{}'", folder);
        return PlaylistReport {
            playlist: name.to_string(),
            added: 0,
            message: format!("no music files found in folder '{folder}'"),
        };
    }
    let shown = match normalize_folder(folder) {
        "" => "the music root",
        other => other,
    };
    PlaylistReport {
        playlist: name.to_string(),
        added,
        message: format!("added all files from {shown} to playlist '{name}'"),
    }
}

/// Seeds `name` from `seed_folder` unless it exists. Returns whether it seeded.
pub(crate) fn ensure_exists_in<C: Connector>(
    session: &mut Session<'_, C>,
    library: &MusicLibrary,
    name: &str,
    seed_folder: &str,
) -> Result<bool> {
    if playlist_exists(session, name)? {
        debug!("Playlist '{}' already exists", name);
        return Ok(false);
    }
    info!("Playlist '{}' not found, seeding it from '{}'", name, seed_folder);
    let files = library.scan(seed_folder);
    append_all(session, name, &files)?;
    info!("Seeded playlist '{}' with {} files", name, files.len());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{AudioExtensions, ALL_FILES};
    use crate::test_utils::FakeDaemon;
    use std::fs::{self, File};
    use std::sync::{Arc, Barrier};
    use tempfile::tempdir;

    fn no_library() -> MusicLibrary {
        MusicLibrary::new("/nonexistent/music", AudioExtensions::default())
    }

    #[test]
    fn test_add_uri_twice_keeps_one() {
        let fake = FakeDaemon::new();
        let daemon = Daemon::new(fake.clone());
        let library = no_library();
        let store = daemon.playlists(&library);

        assert!(matches!(store.add_uri("Jazz", "a.mp3").unwrap(), AddOutcome::Added { .. }));
        assert!(matches!(
            store.add_uri("Jazz", "a.mp3").unwrap(),
            AddOutcome::AlreadyPresent { .. }
        ));
        assert_eq!(store.tracks("Jazz"), vec!["a.mp3"]);
    }

    #[test]
    fn test_add_uri_present_makes_no_write() {
        let fake = FakeDaemon::new().with_playlist("P", &["a.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let library = no_library();

        let outcome = daemon.playlists(&library).add_uri("P", "a.mp3").unwrap();
        assert!(outcome.message().contains("already"));
        assert_eq!(fake.invocations("playlistadd"), 0);
        assert_eq!(fake.playlist("P").unwrap(), vec!["a.mp3"]);
    }

    #[test]
    fn test_save_selection_replaces_contents() {
        let fake = FakeDaemon::new().with_playlist("我的最愛", &["old.mp3", "b.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let library = no_library();
        let store = daemon.playlists(&library);

        let selection = vec!["b.mp3".to_string(), "a.mp3".to_string()];
        store.save_selection_as("我的最愛", &selection).unwrap();
        assert_eq!(store.tracks("我的最愛"), selection);

        // Running it again converges to the same contents.
        store.save_selection_as("我的最愛", &selection).unwrap();
        assert_eq!(store.tracks("我的最愛"), selection);

        store.save_selection_as("fresh", &selection).unwrap();
        assert_eq!(store.tracks("fresh"), selection);
    }

    #[test]
    fn test_delete_track_at_is_zero_based() {
        let fake = FakeDaemon::new().with_playlist("P", &["a.mp3", "b.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let library = no_library();
        let store = daemon.playlists(&library);

        store.delete_track_at("P", 0).unwrap();
        assert_eq!(store.tracks("P"), vec!["b.mp3"]);

        // Position == length is out of range.
        let err = store.delete_track_at("P", 1).unwrap_err();
        assert_eq!(err.http_status(), 400);
        assert_eq!(store.tracks("P"), vec!["b.mp3"]);
    }

    #[test]
    fn test_rename_onto_existing_fails_loudly() {
        let fake = FakeDaemon::new().with_playlist("A", &["a.mp3"]).with_playlist("B", &[]);
        let daemon = Daemon::new(fake.clone());
        let library = no_library();
        let store = daemon.playlists(&library);

        let err = store.rename("A", "B").unwrap_err();
        assert_eq!(err.http_status(), 409);
        assert_eq!(fake.playlist("A").unwrap(), vec!["a.mp3"]);

        store.rename("A", "C").unwrap();
        assert_eq!(store.list().unwrap(), vec!["B", "C"]);
    }

    #[test]
    fn test_reads_default_to_empty() {
        let daemon = Daemon::new(FakeDaemon::new());
        let library = no_library();
        let store = daemon.playlists(&library);

        assert!(store.tracks("missing").is_empty());
        assert!(store.tracks_with_info("missing").is_empty());
        assert_eq!(store.remove("missing").unwrap_err().http_status(), 404);
    }

    #[test]
    fn test_clear_keeps_playlist() {
        let fake = FakeDaemon::new().with_playlist("P", &["a.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let library = no_library();
        let store = daemon.playlists(&library);

        store.clear("P").unwrap();
        assert!(store.tracks("P").is_empty());
        assert_eq!(store.list().unwrap(), vec!["P"]);
    }

    #[test]
    fn test_add_folder_in_scan_order() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("rock")).unwrap();
        File::create(dir.path().join("rock/b.mp3")).unwrap();
        File::create(dir.path().join("rock/a.flac")).unwrap();
        File::create(dir.path().join("rock/cover.jpg")).unwrap();

        let fake = FakeDaemon::new();
        let daemon = Daemon::new(fake.clone());
        let library = MusicLibrary::new(dir.path(), AudioExtensions::default());
        let store = daemon.playlists(&library);

        let report = store.add_folder("Rock", "rock").unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(store.tracks("Rock"), vec!["rock/a.flac", "rock/b.mp3"]);

        let empty = store.add_folder("Rock", "missing").unwrap();
        assert_eq!(empty.added, 0);
        assert_eq!(fake.invocations("playlistadd"), 2);
    }

    #[test]
    fn test_ensure_exists_seeds_once() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("x.mp3")).unwrap();

        let fake = FakeDaemon::new();
        let daemon = Daemon::new(fake.clone());
        let library = MusicLibrary::new(dir.path(), AudioExtensions::default());
        let store = daemon.playlists(&library);

        store.ensure_exists("定期播放", ALL_FILES).unwrap();
        store.ensure_exists("定期播放", ALL_FILES).unwrap();
        assert_eq!(store.tracks("定期播放"), vec!["x.mp3"]);
    }

    #[test]
    fn test_save_queue_as_existing_is_rejected() {
        let fake = FakeDaemon::new().with_queue(&["a.mp3"]).with_playlist("P", &[]);
        let daemon = Daemon::new(fake.clone());
        let library = no_library();
        let store = daemon.playlists(&library);

        assert_eq!(store.save_queue_as("P").unwrap_err().http_status(), 409);
        store.save_queue_as("Q").unwrap();
        assert_eq!(store.tracks("Q"), vec!["a.mp3"]);
    }

    #[test]
    fn test_concurrent_add_uri_keeps_one() {
        let fake = FakeDaemon::new();
        let daemon = Arc::new(Daemon::new(fake.clone()));
        let library = Arc::new(no_library());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let daemon = Arc::clone(&daemon);
                let library = Arc::clone(&library);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    daemon.playlists(&library).add_uri("P", "a.mp3").unwrap()
                })
            })
            .collect();
        let outcomes: Vec<AddOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(fake.playlist("P").unwrap(), vec!["a.mp3"]);
        let added = outcomes.iter().filter(|o| matches!(o, AddOutcome::Added { .. })).count();
        assert_eq!(added, 1);
        assert_eq!(fake.invocations("playlistadd"), 1);
    }

    #[test]
    fn test_concurrent_save_selection_is_one_callers_list() {
        let fake = FakeDaemon::new().with_playlist("S", &["old.mp3"]);
        let daemon = Arc::new(Daemon::new(fake.clone()));
        let library = Arc::new(no_library());
        let barrier = Arc::new(Barrier::new(2));

        let selections = [
            vec!["a1.mp3".to_string(), "a2.mp3".to_string(), "a3.mp3".to_string()],
            vec!["b1.mp3".to_string(), "b2.mp3".to_string()],
        ];
        let handles: Vec<_> = selections
            .iter()
            .cloned()
            .map(|selection| {
                let daemon = Arc::clone(&daemon);
                let library = Arc::clone(&library);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    daemon.playlists(&library).save_selection_as("S", &selection).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let saved = fake.playlist("S").unwrap();
        assert!(selections.contains(&saved), "interleaved contents {saved:?}");
    }

    #[test]
    fn test_add_uri_survives_a_dropped_connection() {
        let fake = FakeDaemon::new().with_playlist("P", &["a.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let library = no_library();
        daemon.connect().unwrap();

        fake.fail_next_calls(1);
        let outcome = daemon.playlists(&library).add_uri("P", "b.mp3").unwrap();
        assert!(matches!(outcome, AddOutcome::Added { .. }));
        assert_eq!(fake.playlist("P").unwrap(), vec!["a.mp3", "b.mp3"]);
        assert_eq!(fake.invocations("listplaylist"), 2);
    }
}
