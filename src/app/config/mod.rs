use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub mod user;

pub use user::{MpdSettings, ScheduleSettings, UserConfig};

use crate::library::MusicLibrary;
use crate::player::{Daemon, MpdConnector, RetryPolicy};

pub struct AppConfig;

impl AppConfig {
    pub fn get_config_dir() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mpd-gateway")
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file is created with the defaults. A file that exists but
    /// does not parse is an error rather than silently ignored.
    pub fn load(path: Option<&Path>) -> anyhow::Result<UserConfig> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::get_config_path);

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            return toml::from_str(&content)
                .with_context(|| format!("parsing {}", config_path.display()));
        }

        let config = UserConfig::default();
        if let Err(e) = Self::write_default(&config_path, &config) {
            warn!("Could not write default config to {}: {}", config_path.display(), e);
        }
        Ok(config)
    }

    fn write_default(path: &Path, config: &UserConfig) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, toml::to_string_pretty(config)?)?;
        Ok(())
    }
}

impl UserConfig {
    pub fn connector(&self) -> MpdConnector {
        let timeout = match self.mpd.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        MpdConnector::new(self.mpd.host.clone(), self.mpd.port).with_timeout(timeout)
    }

    /// Reconnect retries above [`RetryPolicy::MAX_RECONNECT_RETRIES`] are capped.
    pub fn daemon(&self) -> Daemon {
        let retries = self.mpd.reconnect_retries;
        if retries > RetryPolicy::MAX_RECONNECT_RETRIES {
            warn!(
                "reconnect_retries = {} is above the maximum of {}, using {}",
                retries,
                RetryPolicy::MAX_RECONNECT_RETRIES,
                RetryPolicy::MAX_RECONNECT_RETRIES
            );
        }
        Daemon::with_policy(self.connector(), RetryPolicy::new(retries))
    }

    pub fn library(&self) -> MusicLibrary {
        MusicLibrary::new(&self.music_directory, self.audio_extensions.clone())
    }
}
