// SPDX-FileCopyrightText: 2026 Keywarden Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backend abstraction: an ordered path→bytes store.
//!
//! The vault engine only ever sees opaque relative paths. Two
//! implementations: [`LocalBackend`] over a directory tree (files 0600,
//! directories 0700), and [`MemoryBackend`] for tests.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use keywarden_core::KeywardenError;

/// File mode for everything the vault writes.
const FILE_MODE: u32 = 0o600;
/// Directory mode for the storage root and its subdirectories.
const DIR_MODE: u32 = 0o700;

/// Name of the backup directory under the storage root.
pub const BACKUP_DIR: &str = ".bak";

/// Capability interface over opaque relative paths.
///
/// `read_file` signals a missing file as `Ok(None)` rather than an error;
/// the engine treats absence as a normal condition in several places.
pub trait Backend: Send + Sync {
    /// Idempotent preparation: create the root and the backup directory.
    fn init(&self) -> Result<(), KeywardenError>;

    /// All file (non-directory) entries directly under `prefix`, returned
    /// as relative paths including the prefix.
    fn list_files(&self, prefix: &str) -> Result<Vec<String>, KeywardenError>;

    /// Read a file's contents; `None` if it does not exist.
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, KeywardenError>;

    /// Write a file, creating missing parent directories and truncating
    /// prior content.
    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), KeywardenError>;

    /// Delete a file. Returns whether it existed. Refuses directories.
    fn delete_file(&self, path: &str) -> Result<bool, KeywardenError>;
}

/// Filesystem-backed storage rooted at a single directory.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `path`. The directory does not need to
    /// exist yet; [`Backend::init`] creates it.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, KeywardenError> {
        let root = std::path::absolute(path.as_ref()).map_err(KeywardenError::storage)?;
        Ok(Self { root })
    }

    /// Resolve a relative path under the root, lexically.
    ///
    /// Panics if the path tries to escape the root: escaping is always a
    /// programming error in the engine, never untrusted input.
    fn resolve(&self, path: &str) -> PathBuf {
        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                    if !resolved.starts_with(&self.root) {
                        panic!("path tried to escape storage root: {path}");
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    panic!("path tried to escape storage root: {path}");
                }
            }
        }

        assert!(
            resolved.starts_with(&self.root),
            "path tried to escape storage root: {path}"
        );
        resolved
    }
}

impl Backend for LocalBackend {
    fn init(&self) -> Result<(), KeywardenError> {
        create_dir_all_with_mode(&self.root)?;
        create_dir_all_with_mode(&self.root.join(BACKUP_DIR))?;
        Ok(())
    }

    fn list_files(&self, prefix: &str) -> Result<Vec<String>, KeywardenError> {
        let dir = self.resolve(prefix);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(KeywardenError::storage(e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(KeywardenError::storage)?;
            let file_type = entry.file_type().map_err(KeywardenError::storage)?;
            if file_type.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if prefix.is_empty() {
                files.push(name);
            } else {
                files.push(format!("{}/{name}", prefix.trim_end_matches('/')));
            }
        }

        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, KeywardenError> {
        match fs::read(self.resolve(path)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KeywardenError::storage(e)),
        }
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), KeywardenError> {
        let target = self.resolve(path);

        if let Some(parent) = target.parent() {
            create_dir_all_with_mode(parent)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }

        let mut file = options.open(&target).map_err(KeywardenError::storage)?;
        file.write_all(data).map_err(KeywardenError::storage)?;

        // An existing file keeps its old mode; tighten it unconditionally.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(FILE_MODE))
                .map_err(KeywardenError::storage)?;
        }

        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<bool, KeywardenError> {
        let target = self.resolve(path);

        let metadata = match fs::symlink_metadata(&target) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(KeywardenError::storage(e)),
        };

        if metadata.is_dir() {
            return Err(KeywardenError::storage(std::io::Error::other(format!(
                "cannot delete a directory: {path}"
            ))));
        }

        fs::remove_file(&target).map_err(KeywardenError::storage)?;
        Ok(true)
    }
}

fn create_dir_all_with_mode(dir: &Path) -> Result<(), KeywardenError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(dir)
            .map_err(KeywardenError::storage)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir).map_err(KeywardenError::storage)
    }
}

/// In-memory storage for tests: a mapping from path to owned bytes.
///
/// Listing semantics are intentionally loose, matching what the engine
/// needs: an empty prefix returns top-level keys (no `/`), a non-empty
/// prefix returns keys ending with it.
#[derive(Default)]
pub struct MemoryBackend {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn init(&self) -> Result<(), KeywardenError> {
        Ok(())
    }

    fn list_files(&self, prefix: &str) -> Result<Vec<String>, KeywardenError> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        let listing = files
            .keys()
            .filter(|key| {
                if prefix.is_empty() {
                    !key.contains('/')
                } else {
                    key.ends_with(prefix)
                }
            })
            .cloned()
            .collect();
        Ok(listing)
    }

    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, KeywardenError> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        Ok(files.get(path).cloned())
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<(), KeywardenError> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<bool, KeywardenError> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        Ok(files.remove(path).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn local_backend() -> (LocalBackend, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("store")).unwrap();
        backend.init().unwrap();
        (backend, dir)
    }

    #[test]
    fn init_creates_root_and_backup_dir() {
        let (_backend, dir) = local_backend();
        assert!(dir.path().join("store").is_dir());
        assert!(dir.path().join("store").join(BACKUP_DIR).is_dir());
    }

    #[test]
    fn init_is_idempotent() {
        let (backend, _dir) = local_backend();
        backend.init().unwrap();
        backend.init().unwrap();
    }

    #[test]
    fn write_read_round_trip() {
        let (backend, _dir) = local_backend();
        backend.write_file("a.json", b"payload").unwrap();
        assert_eq!(backend.read_file("a.json").unwrap().unwrap(), b"payload");
    }

    #[test]
    fn read_missing_file_is_none() {
        let (backend, _dir) = local_backend();
        assert!(backend.read_file("nope.age").unwrap().is_none());
    }

    #[test]
    fn write_truncates_prior_content() {
        let (backend, _dir) = local_backend();
        backend.write_file("a.json", b"longer first value").unwrap();
        backend.write_file("a.json", b"short").unwrap();
        assert_eq!(backend.read_file("a.json").unwrap().unwrap(), b"short");
    }

    #[test]
    fn write_creates_parent_directories() {
        let (backend, dir) = local_backend();
        backend.write_file(".bak/deep/b.age", b"x").unwrap();
        assert!(dir.path().join("store/.bak/deep/b.age").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn files_are_written_mode_0600() {
        use std::os::unix::fs::PermissionsExt;

        let (backend, dir) = local_backend();
        backend.write_file("a.json", b"x").unwrap();
        let mode = fs::metadata(dir.path().join("store/a.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn delete_file_reports_existence() {
        let (backend, _dir) = local_backend();
        backend.write_file("a.json", b"x").unwrap();
        assert!(backend.delete_file("a.json").unwrap());
        assert!(!backend.delete_file("a.json").unwrap());
    }

    #[test]
    fn delete_refuses_directories() {
        let (backend, _dir) = local_backend();
        assert!(backend.delete_file(BACKUP_DIR).is_err());
    }

    #[test]
    fn list_files_skips_directories() {
        let (backend, _dir) = local_backend();
        backend.write_file("a.json", b"1").unwrap();
        backend.write_file("a.age", b"2").unwrap();
        let listing = backend.list_files("").unwrap();
        assert_eq!(listing, vec!["a.age".to_string(), "a.json".to_string()]);
    }

    #[test]
    fn list_files_with_prefix_includes_prefix() {
        let (backend, _dir) = local_backend();
        backend.write_file(".bak/a.age", b"1").unwrap();
        let listing = backend.list_files(".bak").unwrap();
        assert_eq!(listing, vec![".bak/a.age".to_string()]);
    }

    #[test]
    fn list_missing_directory_is_empty() {
        let (backend, _dir) = local_backend();
        assert!(backend.list_files("missing").unwrap().is_empty());
    }

    #[test]
    #[should_panic(expected = "path tried to escape")]
    fn parent_traversal_panics() {
        let (backend, _dir) = local_backend();
        let _ = backend.read_file("../outside.txt");
    }

    #[test]
    #[should_panic(expected = "path tried to escape")]
    fn absolute_path_panics() {
        let (backend, _dir) = local_backend();
        let _ = backend.read_file("/etc/passwd");
    }

    #[test]
    fn interior_parent_components_stay_inside() {
        let (backend, _dir) = local_backend();
        backend.write_file("sub/../a.json", b"x").unwrap();
        assert!(backend.read_file("a.json").unwrap().is_some());
    }

    #[test]
    fn memory_backend_round_trip() {
        let backend = MemoryBackend::new();
        backend.init().unwrap();
        backend.write_file("a.json", b"data").unwrap();
        assert_eq!(backend.read_file("a.json").unwrap().unwrap(), b"data");
        assert!(backend.delete_file("a.json").unwrap());
        assert!(!backend.delete_file("a.json").unwrap());
    }

    #[test]
    fn memory_backend_empty_prefix_lists_top_level() {
        let backend = MemoryBackend::new();
        backend.init().unwrap();
        backend.write_file("a.json", b"1").unwrap();
        backend.write_file(".bak/b.age", b"2").unwrap();
        assert_eq!(backend.list_files("").unwrap(), vec!["a.json".to_string()]);
    }

    #[test]
    fn memory_backend_suffix_listing() {
        let backend = MemoryBackend::new();
        backend.init().unwrap();
        backend.write_file(".bak/b.age", b"2").unwrap();
        assert_eq!(
            backend.list_files("b.age").unwrap(),
            vec![".bak/b.age".to_string()]
        );
    }
}
