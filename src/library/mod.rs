//! Local view of the music directory.
//!
//! [`scan`] collects audio files for playlist seeding and never fails: a
//! missing or unreadable directory is simply "nothing found". Interactive
//! browsing goes through [`MusicLibrary::browse`], which instead refuses any
//! path that resolves outside the music root.

use crate::error::{Error, Result};
use crate::player::traits::{BrowseEntry, EntryKind};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Folder token meaning "everything under the music root".
pub const ALL_FILES: &str = "ALL_FILES";

/// Maps the root tokens (`""`, `"."`, [`ALL_FILES`]) to an empty sub-path.
pub fn normalize_folder(folder: &str) -> &str {
    match folder.trim_end_matches('/') {
        "" | "." | ALL_FILES => "",
        other => other,
    }
}

/// Case-insensitive allow-list of audio file extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioExtensions(Vec<String>);

impl Default for AudioExtensions {
    fn default() -> Self {
        Self::new(["mp3", "flac", "wav", "ogg", "m4a", "aac"])
    }
}

impl AudioExtensions {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        )
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.0.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Forward-slash path of `path` relative to `root`.
fn relative_uri(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    parts.map(|p| p.join("/"))
}

/// Recursively lists audio files under `root/sub`, relative to `root`.
///
/// Results are sorted and deduplicated. Symbolic links are followed.
pub fn scan(root: &Path, sub: &str, extensions: &AudioExtensions) -> Vec<String> {
    let start = match confine(normalize_folder(sub)) {
        Ok(relative) => root.join(relative),
        Err(e) => {
            warn!("Not scanning {}", e);
            return Vec::new();
        }
    };
    if !start.is_dir() {
        debug!("Nothing to scan at {}", start.display());
        return Vec::new();
    }

    let mut files: Vec<String> = WalkDir::new(&start)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry while scanning: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && extensions.matches(entry.path()))
        .filter_map(|entry| relative_uri(root, entry.path()))
        .collect();

    files.sort();
    files.dedup();
    debug!("Scanned {} audio files under {}", files.len(), start.display());
    files
}

/// Lexically resolves `sub`, refusing absolute paths and `..` above the root.
fn confine(sub: &str) -> Result<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in Path::new(sub).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(Error::InvalidPath(sub.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath(sub.to_string()));
            }
        }
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct MusicLibrary {
    root: PathBuf,
    extensions: AudioExtensions,
}

impl MusicLibrary {
    pub fn new(root: impl Into<PathBuf>, extensions: AudioExtensions) -> Self {
        Self {
            root: root.into(),
            extensions,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extensions(&self) -> &AudioExtensions {
        &self.extensions
    }

    pub fn scan(&self, folder: &str) -> Vec<String> {
        scan(&self.root, folder, &self.extensions)
    }

    /// Names of the top-level folders of the music root, sorted.
    pub fn categories(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read music root {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    /// Lists one directory level under the root: folders and audio files.
    ///
    /// Fails with [`Error::InvalidPath`] if `sub` points outside the root,
    /// symlinks included, and [`Error::NotFound`] if it is not a directory.
    pub fn browse(&self, sub: &str) -> Result<Vec<BrowseEntry>> {
        let root = self
            .root
            .canonicalize()
            .map_err(|_| Error::NotFound(self.root.clone()))?;

        let relative = confine(normalize_folder(sub))?;
        let target = root.join(&relative);
        let target = target.canonicalize().map_err(|_| Error::NotFound(target.clone()))?;
        if !target.starts_with(&root) {
            warn!("Refusing to browse outside the music root: {}", sub);
            return Err(Error::InvalidPath(sub.to_string()));
        }
        if !target.is_dir() {
            return Err(Error::NotFound(target));
        }

        let mut items = Vec::new();
        let entries = std::fs::read_dir(&target).map_err(|_| Error::NotFound(target.clone()))?;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let kind = if path.is_dir() {
                EntryKind::Directory
            } else if self.extensions.matches(&path) {
                EntryKind::File
            } else {
                continue;
            };
            if let Some(uri) = relative_uri(&root, &target.join(entry.file_name())) {
                items.push(BrowseEntry::from_path(kind, &uri));
            }
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}
