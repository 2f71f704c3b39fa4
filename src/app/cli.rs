use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::player::ReplayGainMode;

/// mpd-gateway - resilient control of a Music Player Daemon
#[derive(Parser, Debug)]
#[command(name = "mpd-gateway", version, about)]
pub struct Args {
    /// Config file (default: <config dir>/mpd-gateway/config.toml)
    #[arg(long, env = "MPD_GATEWAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// MPD host, overrides the config file
    #[arg(long, env = "MPD_HOST", global = true)]
    pub mpd_host: Option<String>,

    /// MPD port, overrides the config file
    #[arg(long, env = "MPD_PORT", global = true)]
    pub mpd_port: Option<u16>,

    /// Local music root, overrides the config file
    #[arg(long, env = "MPD_GATEWAY_MUSIC_DIR", global = true)]
    pub music_dir: Option<PathBuf>,

    /// Write daily log files into this directory
    #[arg(long, env = "MPD_GATEWAY_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Debug logging for this crate
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Print the default config.toml to stdout and exit
    #[arg(long)]
    pub generate_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Player status
    Status,
    /// Rescan the daemon's music database
    Update,
    /// Start playback, optionally at a queue id
    Play {
        #[arg(long)]
        id: Option<u32>,
    },
    /// Toggle pause
    Pause,
    Stop,
    Next,
    Prev,
    /// Set volume (0-100)
    Volume { level: u32 },
    /// Seek within the current song, or within a queue entry
    Seek {
        seconds: f64,
        /// 0-based queue position to seek in
        #[arg(long, conflicts_with = "id")]
        position: Option<u32>,
        /// Queue id to seek in
        #[arg(long)]
        id: Option<u32>,
    },
    /// Replay gain mode: off, track, album or auto
    ReplayGain { mode: ReplayGainMode },
    /// Set playback modes (on/off)
    Mode {
        #[arg(long, value_parser = BoolishValueParser::new())]
        repeat: Option<bool>,
        #[arg(long, value_parser = BoolishValueParser::new())]
        random: Option<bool>,
        #[arg(long, value_parser = BoolishValueParser::new())]
        single: Option<bool>,
        #[arg(long, value_parser = BoolishValueParser::new())]
        consume: Option<bool>,
    },
    /// Live queue operations
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Stored playlist operations
    #[command(subcommand)]
    Playlist(PlaylistCommand),
    /// List one level of the daemon's database
    Browse {
        #[arg(default_value = "")]
        path: String,
    },
    /// Local music directory
    #[command(subcommand)]
    Library(LibraryCommand),
    /// Replace the queue with a stream and play it
    Stream {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
    },
    /// Seed (if needed), load and play the scheduled playlist
    ScheduledPlay {
        #[arg(long)]
        playlist: Option<String>,
        #[arg(long)]
        seed_folder: Option<String>,
        /// Lock file preventing overlapping runs
        #[arg(long)]
        lock_file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    List,
    /// List with queue ids
    Ids,
    Current,
    Add { uri: String },
    /// Add one song and print its queue id
    AddId {
        uri: String,
        /// Insert at this 0-based position instead of appending
        #[arg(long)]
        position: Option<u32>,
    },
    /// Replace the queue with these stream URLs
    LoadStreams {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Add a whole daemon directory
    AddFolder { folder: String },
    Clear,
    /// Delete by 0-based position
    Delete { position: u32 },
    DeleteId { id: u32 },
    /// Append a stored playlist
    Load { name: String },
    Tag { id: u32, tag: String, value: String },
}

#[derive(Subcommand, Debug)]
pub enum PlaylistCommand {
    List,
    Tracks {
        name: String,
        /// Include tags and durations
        #[arg(long)]
        info: bool,
    },
    /// Add a URI unless already present
    Add { name: String, uri: String },
    /// Add every audio file under a local folder
    AddFolder { name: String, folder: String },
    /// Delete by 0-based position
    DeleteTrack { name: String, position: u32 },
    Clear { name: String },
    Rename { from: String, to: String },
    Remove { name: String },
    SaveQueue { name: String },
    /// Replace a playlist with exactly these URIs
    SaveSelection { name: String, uris: Vec<String> },
    /// Create from a folder if missing
    Ensure { name: String, seed_folder: Option<String> },
}

#[derive(Subcommand, Debug)]
pub enum LibraryCommand {
    /// Top-level folders of the music root
    Categories,
    /// One level of the music root, confined to it
    Browse {
        #[arg(default_value = "")]
        path: String,
    },
    /// Audio files under a folder, recursively
    Scan {
        #[arg(default_value = "ALL_FILES")]
        folder: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_mode_flags_accept_on_off() {
        let args = Args::try_parse_from(["mpd-gateway", "mode", "--random", "on", "--repeat", "off"]).unwrap();
        match args.command {
            Some(Command::Mode {
                repeat,
                random,
                single,
                consume,
            }) => {
                assert_eq!(repeat, Some(false));
                assert_eq!(random, Some(true));
                assert_eq!(single, None);
                assert_eq!(consume, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_save_selection_keeps_order() {
        let args =
            Args::try_parse_from(["mpd-gateway", "playlist", "save-selection", "Fav", "b.mp3", "a.mp3"]).unwrap();
        match args.command {
            Some(Command::Playlist(PlaylistCommand::SaveSelection { name, uris })) => {
                assert_eq!(name, "Fav");
                assert_eq!(uris, vec!["b.mp3", "a.mp3"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_seek_targets_are_exclusive() {
        let args = Args::try_parse_from(["mpd-gateway", "seek", "12.5", "--position", "3"]).unwrap();
        match args.command {
            Some(Command::Seek { seconds, position, id }) => {
                assert_eq!(seconds, 12.5);
                assert_eq!(position, Some(3));
                assert_eq!(id, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Args::try_parse_from(["mpd-gateway", "seek", "1", "--position", "3", "--id", "7"]).is_err());
    }

    #[test]
    fn test_replay_gain_mode_argument() {
        let args = Args::try_parse_from(["mpd-gateway", "replay-gain", "album"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::ReplayGain {
                mode: ReplayGainMode::Album
            })
        ));
        assert!(Args::try_parse_from(["mpd-gateway", "replay-gain", "loud"]).is_err());
    }
}
