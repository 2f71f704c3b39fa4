use super::executor::Daemon;
use super::traits::{BrowseEntry, Connector, Transport};
use crate::error::Result;

/// One-level listing of the daemon's music database.
///
/// Subdirectories come first, then files, each in the daemon's order.
/// Nothing is cached.
pub struct DirectoryBrowser<'a, C: Connector> {
    daemon: &'a Daemon<C>,
}

impl<'a, C: Connector> DirectoryBrowser<'a, C> {
    pub fn new(daemon: &'a Daemon<C>) -> Self {
        Self { daemon }
    }

    /// `""` lists the top of the database.
    pub fn browse(&self, path: &str) -> Result<Vec<BrowseEntry>> {
        let path = path.trim_matches('/');
        self.daemon.execute_safe("lsinfo", |t| t.lsinfo(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::traits::EntryKind;
    use crate::test_utils::FakeDaemon;

    #[test]
    fn test_browse_keeps_daemon_order() {
        let fake = FakeDaemon::new().with_directory(
            "Jazz",
            &[
                (EntryKind::Directory, "Jazz/Live"),
                (EntryKind::File, "Jazz/z.mp3"),
                (EntryKind::File, "Jazz/a.mp3"),
            ],
        );
        let daemon = Daemon::new(fake);

        let entries = daemon.browser().browse("Jazz/").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Live", "z.mp3", "a.mp3"]);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[0].path, "Jazz/Live");
    }

    #[test]
    fn test_browse_unknown_directory() {
        let daemon = Daemon::new(FakeDaemon::new());
        assert_eq!(daemon.browser().browse("nope").unwrap_err().http_status(), 404);
    }
}
