use crate::library::{AudioExtensions, ALL_FILES};
use crate::jobs::SCHEDULED_PLAYLIST;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User-editable configuration, stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub mpd: MpdSettings,
    #[serde(default = "default_music_dir")]
    pub music_directory: String,
    #[serde(default)]
    pub audio_extensions: AudioExtensions,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    /// Daily rotating log files are written here when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpdSettings {
    pub host: String,
    pub port: u16,
    /// Socket timeout; 0 disables it.
    pub timeout_secs: u64,
    /// Reconnect-and-retry rounds per command: 0 or 1. Larger values are capped at 1.
    pub reconnect_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub playlist: String,
    pub seed_folder: String,
}

fn default_music_dir() -> String {
    let home = dirs::home_dir()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string());
    format!("{}/Music", home)
}

impl Default for MpdSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6600,
            timeout_secs: 10,
            reconnect_retries: 1,
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            playlist: SCHEDULED_PLAYLIST.to_string(),
            seed_folder: ALL_FILES.to_string(),
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            mpd: MpdSettings::default(),
            music_directory: default_music_dir(),
            audio_extensions: AudioExtensions::default(),
            schedule: ScheduleSettings::default(),
            log_directory: None,
        }
    }
}
