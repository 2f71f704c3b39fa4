pub mod cli;
pub mod config;
pub mod lock;

use anyhow::{bail, Context};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::jobs;
use crate::library::MusicLibrary;
use crate::player::{Connector, Daemon, PlayModes};
use cli::{Args, Command, LibraryCommand, PlaylistCommand, QueueCommand};
use config::{ScheduleSettings, UserConfig};
use lock::{default_lock_path, JobLock};

/// Applies command-line overrides on top of the loaded file.
pub fn apply_overrides(mut config: UserConfig, args: &Args) -> UserConfig {
    if let Some(host) = &args.mpd_host {
        config.mpd.host = host.clone();
    }
    if let Some(port) = args.mpd_port {
        config.mpd.port = port;
    }
    if let Some(dir) = &args.music_dir {
        config.music_directory = dir.to_string_lossy().to_string();
    }
    if let Some(dir) = &args.log_dir {
        config.log_directory = Some(dir.clone());
    }
    config
}

fn to_json<T: Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn done(message: impl Into<String>) -> anyhow::Result<Value> {
    Ok(json!({ "message": message.into() }))
}

/// Runs one command and returns its JSON result.
pub fn execute<C: Connector>(
    command: Command,
    daemon: &Daemon<C>,
    library: &MusicLibrary,
    schedule: &ScheduleSettings,
) -> anyhow::Result<Value> {
    let playback = daemon.playback();
    match command {
        Command::Status => {
            let status = playback.status()?;
            Ok(json!({ "connection": daemon.state()?, "status": status }))
        }
        Command::Update => Ok(json!({ "job": playback.update()? })),
        Command::Play { id } => {
            match id {
                Some(id) => playback.play_id(id)?,
                None => playback.play()?,
            }
            done("playing")
        }
        Command::Pause => {
            playback.toggle_pause()?;
            done("pause toggled")
        }
        Command::Stop => {
            playback.stop()?;
            done("stopped")
        }
        Command::Next => {
            playback.next()?;
            done("next")
        }
        Command::Prev => {
            playback.previous()?;
            done("previous")
        }
        Command::Volume { level } => {
            playback.set_volume(level)?;
            done(format!("volume set to {level}"))
        }
        Command::Seek { seconds, position, id } => {
            match (position, id) {
                (Some(position), _) => playback.seek(position, seconds)?,
                (None, Some(id)) => playback.seek_id(id, seconds)?,
                (None, None) => playback.seek_current(seconds)?,
            }
            done(format!("seeked to {seconds}s"))
        }
        Command::ReplayGain { mode } => {
            playback.set_replay_gain(mode)?;
            done(format!("replay gain mode set to {mode}"))
        }
        Command::Mode {
            repeat,
            random,
            single,
            consume,
        } => {
            playback.apply_modes(PlayModes {
                repeat,
                random,
                single,
                consume,
            })?;
            to_json(playback.status()?)
        }
        Command::Queue(cmd) => execute_queue(cmd, daemon),
        Command::Playlist(cmd) => execute_playlist(cmd, daemon, library, schedule),
        Command::Browse { path } => to_json(daemon.browser().browse(&path)?),
        Command::Library(cmd) => match cmd {
            LibraryCommand::Categories => to_json(library.categories()),
            LibraryCommand::Browse { path } => to_json(library.browse(&path)?),
            LibraryCommand::Scan { folder } => to_json(library.scan(&folder)),
        },
        Command::Stream { url, title, artist } => to_json(jobs::play_stream(
            daemon,
            &url,
            title.as_deref(),
            artist.as_deref(),
        )?),
        Command::ScheduledPlay {
            playlist,
            seed_folder,
            lock_file,
        } => {
            let lock_path = lock_file.unwrap_or_else(default_lock_path);
            let _lock = match JobLock::try_acquire(&lock_path)
                .with_context(|| format!("opening lock file {}", lock_path.display()))?
            {
                Some(lock) => lock,
                None => bail!("another scheduled run holds {}", lock_path.display()),
            };
            let playlist = playlist.unwrap_or_else(|| schedule.playlist.clone());
            let seed_folder = seed_folder.unwrap_or_else(|| schedule.seed_folder.clone());
            jobs::scheduled_playback(daemon, library, &playlist, &seed_folder)?;
            done(format!("playing '{playlist}'"))
        }
    }
}

fn execute_queue<C: Connector>(cmd: QueueCommand, daemon: &Daemon<C>) -> anyhow::Result<Value> {
    let queue = daemon.queue();
    match cmd {
        QueueCommand::List => to_json(queue.list()?),
        QueueCommand::Ids => to_json(queue.list_with_ids()?),
        QueueCommand::Current => to_json(queue.current_song()?),
        QueueCommand::Add { uri } => {
            queue.add_track(&uri)?;
            done(format!("'{uri}' added to the queue"))
        }
        QueueCommand::AddId { uri, position } => {
            let id = match position {
                Some(position) => queue.add_track_returning_id_at(&uri, position),
                None => queue.add_track_returning_id(&uri),
            };
            match id {
                Some(id) => Ok(json!({ "id": id })),
                None => bail!("could not add '{uri}' to the queue"),
            }
        }
        QueueCommand::LoadStreams { urls } => {
            let loaded = queue.load_radio_streams(&urls)?;
            done(format!("loaded {loaded} radio streams"))
        }
        QueueCommand::AddFolder { folder } => {
            queue.add_folder(&folder)?;
            done(format!("'{folder}' added to the queue"))
        }
        QueueCommand::Clear => {
            queue.clear()?;
            done("queue cleared")
        }
        QueueCommand::Delete { position } => {
            queue.delete_by_position(position)?;
            done(format!("deleted position {position}"))
        }
        QueueCommand::DeleteId { id } => {
            queue.delete_by_id(id)?;
            done(format!("deleted id {id}"))
        }
        QueueCommand::Load { name } => {
            queue.load_playlist(&name)?;
            done(format!("loaded '{name}'"))
        }
        QueueCommand::Tag { id, tag, value } => {
            queue.set_tag(id, &tag, &value)?;
            done(format!("tagged id {id}"))
        }
    }
}

fn execute_playlist<C: Connector>(
    cmd: PlaylistCommand,
    daemon: &Daemon<C>,
    library: &MusicLibrary,
    schedule: &ScheduleSettings,
) -> anyhow::Result<Value> {
    let store = daemon.playlists(library);
    match cmd {
        PlaylistCommand::List => to_json(store.list()?),
        PlaylistCommand::Tracks { name, info: false } => to_json(store.tracks(&name)),
        PlaylistCommand::Tracks { name, info: true } => to_json(store.tracks_with_info(&name)),
        PlaylistCommand::Add { name, uri } => to_json(store.add_uri(&name, &uri)?),
        PlaylistCommand::AddFolder { name, folder } => to_json(store.add_folder(&name, &folder)?),
        PlaylistCommand::DeleteTrack { name, position } => {
            store.delete_track_at(&name, position)?;
            done(format!("deleted position {position} from '{name}'"))
        }
        PlaylistCommand::Clear { name } => {
            store.clear(&name)?;
            done(format!("playlist '{name}' cleared"))
        }
        PlaylistCommand::Rename { from, to } => {
            store.rename(&from, &to)?;
            done(format!("playlist '{from}' renamed to '{to}'"))
        }
        PlaylistCommand::Remove { name } => {
            store.remove(&name)?;
            done(format!("playlist '{name}' removed"))
        }
        PlaylistCommand::SaveQueue { name } => {
            store.save_queue_as(&name)?;
            done(format!("queue saved as '{name}'"))
        }
        PlaylistCommand::SaveSelection { name, uris } => to_json(store.save_selection_as(&name, &uris)?),
        PlaylistCommand::Ensure { name, seed_folder } => {
            let seed = seed_folder.unwrap_or_else(|| schedule.seed_folder.clone());
            store.ensure_exists(&name, &seed)?;
            done(format!("playlist '{name}' ready"))
        }
    }
}

/// Entry point behind `main`: load config, connect lazily, run one command.
pub fn run(args: Args, config: UserConfig) -> anyhow::Result<Option<Value>> {
    if args.generate_config {
        print!("{}", toml::to_string_pretty(&UserConfig::default())?);
        return Ok(None);
    }
    let Some(command) = args.command else {
        bail!("no command given, see --help");
    };

    let daemon = config.daemon();
    let library = config.library();
    info!("Using music root {}", library.root().display());
    let result = execute(command, &daemon, &library, &config.schedule);
    daemon.disconnect()?;
    result.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::AudioExtensions;
    use crate::test_utils::FakeDaemon;
    use clap::Parser;

    fn run_with(fake: &FakeDaemon, argv: &[&str]) -> anyhow::Result<Value> {
        let args = Args::try_parse_from(argv).unwrap();
        let daemon = Daemon::new(fake.clone());
        let library = MusicLibrary::new("/nonexistent", AudioExtensions::default());
        execute(args.command.unwrap(), &daemon, &library, &ScheduleSettings::default())
    }

    #[test]
    fn test_playlist_add_reports_outcome() {
        let fake = FakeDaemon::new().with_playlist("P", &["a.mp3"]);
        let value = run_with(&fake, &["mpd-gateway", "playlist", "add", "P", "a.mp3"]).unwrap();
        assert_eq!(value["outcome"], "already_present");
    }

    #[test]
    fn test_current_song_on_empty_queue_is_null() {
        let fake = FakeDaemon::new();
        let value = run_with(&fake, &["mpd-gateway", "queue", "current"]).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_unavailable_daemon_surfaces_typed_error() {
        let fake = FakeDaemon::new();
        fake.set_reachable(false);
        let err = run_with(&fake, &["mpd-gateway", "stop"]).unwrap_err();
        let err = err.downcast_ref::<crate::Error>().unwrap();
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn test_seek_by_id_and_queue_insert() {
        let fake = FakeDaemon::new().with_queue(&["a.mp3", "c.mp3"]);
        let value = run_with(&fake, &["mpd-gateway", "queue", "add-id", "b.mp3", "--position", "1"]).unwrap();
        let id = value["id"].as_u64().unwrap();
        assert_eq!(fake.queue_uris(), vec!["a.mp3", "b.mp3", "c.mp3"]);

        run_with(&fake, &["mpd-gateway", "seek", "30", "--id", &id.to_string()]).unwrap();
        assert_eq!(fake.playback_state(), crate::player::PlaybackState::Playing);
        assert_eq!(fake.invocations("seekid"), 1);
    }

    #[test]
    fn test_overrides_win() {
        let args = Args::try_parse_from(["mpd-gateway", "--mpd-host", "pi.local", "--mpd-port", "6601", "status"]).unwrap();
        let config = apply_overrides(UserConfig::default(), &args);
        assert_eq!(config.mpd.host, "pi.local");
        assert_eq!(config.mpd.port, 6601);
    }
}
