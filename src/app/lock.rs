use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default lock guarding scheduled jobs against overlapping runs.
pub fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join("mpd-gateway-scheduled.lock")
}

/// Exclusive, process-wide job lock. Released on drop.
#[derive(Debug)]
pub struct JobLock {
    file: File,
    path: PathBuf,
}

impl JobLock {
    /// Try to take the lock without blocking.
    /// Returns `Ok(None)` if another process holds it.
    pub fn try_acquire(path: &Path) -> std::io::Result<Option<JobLock>> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Ok(None);
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        Ok(Some(JobLock {
            file,
            path: path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
