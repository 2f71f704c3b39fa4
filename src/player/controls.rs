use super::executor::Daemon;
use super::traits::{Connector, PlayMode, PlayerStatus, ReplayGainMode, SongId, Transport};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Requested mode changes; `None` leaves a mode untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayModes {
    pub repeat: Option<bool>,
    pub random: Option<bool>,
    pub single: Option<bool>,
    pub consume: Option<bool>,
}

impl PlayModes {
    fn requested(&self) -> impl Iterator<Item = (PlayMode, bool)> {
        [
            (PlayMode::Repeat, self.repeat),
            (PlayMode::Random, self.random),
            (PlayMode::Single, self.single),
            (PlayMode::Consume, self.consume),
        ]
        .into_iter()
        .filter_map(|(mode, value)| value.map(|on| (mode, on)))
    }
}

/// Transport controls: status, play/pause/skip, volume, seek and modes.
pub struct Playback<'a, C: Connector> {
    daemon: &'a Daemon<C>,
}

impl<'a, C: Connector> Playback<'a, C> {
    pub fn new(daemon: &'a Daemon<C>) -> Self {
        Self { daemon }
    }

    pub fn status(&self) -> Result<PlayerStatus> {
        self.daemon.execute_safe("status", |t| t.status())
    }

    pub fn elapsed(&self) -> Result<Option<f64>> {
        Ok(self.status()?.elapsed_secs)
    }

    pub fn duration(&self) -> Result<Option<f64>> {
        Ok(self.status()?.duration_secs)
    }

    /// Starts a database rescan; returns the daemon's job id.
    pub fn update(&self) -> Result<u32> {
        let job = self.daemon.execute_safe("update", |t| t.update())?;
        info!("Database update started (job {})", job);
        Ok(job)
    }

    pub fn play(&self) -> Result<()> {
        self.daemon.execute_safe("play", |t| t.play())
    }

    pub fn play_id(&self, id: SongId) -> Result<()> {
        self.daemon.execute_safe("playid", |t| t.play_id(id))
    }

    pub fn toggle_pause(&self) -> Result<()> {
        self.daemon.execute_safe("pause", |t| t.toggle_pause())
    }

    pub fn stop(&self) -> Result<()> {
        self.daemon.execute_safe("stop", |t| t.stop())
    }

    pub fn next(&self) -> Result<()> {
        self.daemon.execute_safe("next", |t| t.next())
    }

    pub fn previous(&self) -> Result<()> {
        self.daemon.execute_safe("previous", |t| t.previous())
    }

    pub fn set_volume(&self, volume: u32) -> Result<()> {
        let volume = u8::try_from(volume)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or_else(|| Error::InvalidArgument(format!("volume must be between 0 and 100, got {volume}")))?;
        self.daemon.execute_safe("setvol", |t| t.set_volume(volume))?;
        info!("Volume set to {}", volume);
        Ok(())
    }

    pub fn seek_current(&self, seconds: f64) -> Result<()> {
        check_offset(seconds)?;
        self.daemon.execute_safe("seekcur", |t| t.seek_current(seconds))
    }

    /// Seeks within the queue entry at 0-based `position`, starting it if needed.
    pub fn seek(&self, position: u32, seconds: f64) -> Result<()> {
        check_offset(seconds)?;
        self.daemon.execute_safe("seek", |t| t.seek(position, seconds))
    }

    pub fn seek_id(&self, id: SongId, seconds: f64) -> Result<()> {
        check_offset(seconds)?;
        self.daemon.execute_safe("seekid", |t| t.seek_id(id, seconds))
    }

    pub fn set_replay_gain(&self, mode: ReplayGainMode) -> Result<()> {
        self.daemon
            .execute_safe("replay_gain_mode", |t| t.set_replay_gain(mode))?;
        info!("Set replay gain mode to {}", mode);
        Ok(())
    }

    pub fn set_mode(&self, mode: PlayMode, enabled: bool) -> Result<()> {
        self.daemon.execute_safe(mode.verb(), |t| t.set_mode(mode, enabled))?;
        info!("Set {} mode {}", mode.verb(), if enabled { "on" } else { "off" });
        Ok(())
    }

    pub fn apply_modes(&self, modes: PlayModes) -> Result<()> {
        for (mode, enabled) in modes.requested() {
            self.set_mode(mode, enabled)?;
        }
        Ok(())
    }
}

fn check_offset(seconds: f64) -> Result<()> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::InvalidArgument(format!("cannot seek to {seconds}s")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::traits::PlaybackState;
    use crate::test_utils::FakeDaemon;

    #[test]
    fn test_volume_range_checked_locally() {
        let fake = FakeDaemon::new();
        let daemon = Daemon::new(fake.clone());

        assert!(matches!(daemon.playback().set_volume(101), Err(Error::InvalidArgument(_))));
        assert_eq!(fake.invocations("setvol"), 0);

        daemon.playback().set_volume(100).unwrap();
        daemon.playback().set_volume(0).unwrap();
        assert_eq!(fake.volume(), 0);
    }

    #[test]
    fn test_apply_modes_only_touches_requested() {
        let fake = FakeDaemon::new();
        let daemon = Daemon::new(fake.clone());

        daemon
            .playback()
            .apply_modes(PlayModes {
                random: Some(true),
                consume: Some(false),
                ..Default::default()
            })
            .unwrap();

        assert!(fake.mode(PlayMode::Random));
        assert_eq!(fake.invocations("consume"), 1);
        assert_eq!(fake.invocations("repeat"), 0);
        assert_eq!(fake.invocations("single"), 0);
    }

    #[test]
    fn test_pause_toggles() {
        let fake = FakeDaemon::new().with_queue(&["a.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let playback = daemon.playback();

        playback.play().unwrap();
        playback.toggle_pause().unwrap();
        assert_eq!(fake.playback_state(), PlaybackState::Paused);
        playback.toggle_pause().unwrap();
        assert_eq!(playback.status().unwrap().state, PlaybackState::Playing);
    }

    #[test]
    fn test_seek_validation_and_rejection() {
        let daemon = Daemon::new(FakeDaemon::new());
        assert!(matches!(daemon.playback().seek_current(f64::NAN), Err(Error::InvalidArgument(_))));
        // Nothing playing: the daemon refuses.
        assert!(matches!(daemon.playback().seek_current(3.0), Err(Error::CommandRejected { .. })));
    }

    #[test]
    fn test_seek_by_position_and_id() {
        let fake = FakeDaemon::new().with_queue(&["a.mp3", "b.mp3"]);
        let daemon = Daemon::new(fake.clone());
        let playback = daemon.playback();

        playback.seek(1, 42.5).unwrap();
        let status = playback.status().unwrap();
        assert_eq!(status.state, PlaybackState::Playing);
        assert_eq!(status.song_position, Some(1));
        assert_eq!(status.elapsed_secs, Some(42.5));

        let first = daemon.queue().list_with_ids().unwrap()[0].id;
        playback.seek_id(first, 3.0).unwrap();
        assert_eq!(playback.status().unwrap().song_id, Some(first));

        assert_eq!(playback.seek(2, 0.0).unwrap_err().http_status(), 400);
        assert_eq!(playback.seek_id(999, 0.0).unwrap_err().http_status(), 404);
        assert!(matches!(playback.seek(0, -1.0), Err(Error::InvalidArgument(_))));
        assert_eq!(fake.invocations("seek"), 2);
    }

    #[test]
    fn test_replay_gain_mode() {
        let fake = FakeDaemon::new();
        let daemon = Daemon::new(fake.clone());

        daemon.playback().set_replay_gain(ReplayGainMode::Track).unwrap();
        assert_eq!(daemon.playback().status().unwrap().replay_gain, Some(ReplayGainMode::Track));
        assert_eq!(fake.invocations("replay_gain_mode"), 1);
    }
}
