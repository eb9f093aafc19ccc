//! The staging index as a whole: load, binary-search lookup, mutate, save —
//! [MODULE E].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dircache_core::layout::Layout;
use dircache_core::Digest;
use thiserror::Error;

use crate::format::{self, CacheEntry, CacheTime, FormatError};

const INDEX_FILE_NAME: &str = "index";
const LOCK_FILE_NAME: &str = "index.lock";

/// Errors manipulating the staging index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The on-disk index did not decode.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// An I/O failure reading, writing, or renaming index files.
    #[error("{path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Another process already holds `index.lock`.
    #[error("{0}: lock file already exists")]
    Locked(PathBuf),
    /// The object-store root doesn't exist or can't be traversed — the
    /// execute-bit liveness check `read_cache` performs
    /// (`access(sha1_file_directory, X_OK)`) before it ever opens `index`.
    #[error("{0}: no access to SHA1 file directory")]
    NoObjectRootAccess(PathBuf),
    /// A path was rejected by [`verify_path`] — not fatal to the caller,
    /// who is expected to warn and continue with the next path, mirroring
    /// `update-cache`'s per-argument loop.
    #[error("{0:?}: not a valid repository path")]
    InvalidPath(Vec<u8>),
}

/// The staging index: an ordered, sorted set of [`CacheEntry`] records.
pub struct Index {
    entries: Vec<CacheEntry>,
}

impl Index {
    /// An empty index, as if no `.dircache/index` existed yet.
    #[must_use]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Load the index file under `layout.repo_dir`. Before touching the
    /// index file, checks that `layout.object_root` exists and is
    /// traversable — `read_cache`'s `access(sha1_file_directory, X_OK)`
    /// liveness check, performed unconditionally before the index is ever
    /// opened. A missing index file is not an error — it decodes the same
    /// as an empty one, matching `read_cache`'s `ENOENT` case.
    pub fn load(layout: &Layout) -> Result<Self, IndexError> {
        fs::read_dir(&layout.object_root)
            .map_err(|_| IndexError::NoObjectRootAccess(layout.object_root.clone()))?;

        let path = layout.repo_dir.join(INDEX_FILE_NAME);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(source) if source.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(IndexError::Io { path, source }),
        };
        let entries = format::decode_index(&bytes)?;
        Ok(Self { entries })
    }

    /// Entries in on-disk (sorted) order.
    #[must_use]
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Binary search by pathname, matching `cache_name_pos`'s ordering —
    /// byte-wise lexicographic with a length tiebreak (exactly what
    /// `&[u8]`'s `Ord` impl already does).
    fn position(&self, name: &[u8]) -> Result<usize, usize> {
        self.entries.binary_search_by(|entry| entry.name.as_slice().cmp(name))
    }

    /// Look up a staged entry by its exact pathname.
    #[must_use]
    pub fn lookup(&self, name: &[u8]) -> Option<&CacheEntry> {
        self.position(name).ok().map(|pos| &self.entries[pos])
    }

    /// Insert `entry`, replacing any existing entry with the same name —
    /// `add_cache_entry`'s "existing match? Just replace it" branch.
    pub fn add_entry(&mut self, entry: CacheEntry) {
        match self.position(&entry.name) {
            Ok(pos) => self.entries[pos] = entry,
            Err(pos) => self.entries.insert(pos, entry),
        }
    }

    /// Remove the entry named `name`, if staged. Returns whether anything
    /// was removed — `remove_file_from_cache`'s behavior when
    /// `add_file_to_cache` hits `ENOENT`.
    pub fn remove_entry(&mut self, name: &[u8]) -> bool {
        match self.position(name) {
            Ok(pos) => {
                self.entries.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Build a [`CacheEntry`] from filesystem metadata and a precomputed
    /// blob digest, validate the path, and stage it (insert-or-replace).
    ///
    /// `name` must already be the repository-relative path this file will
    /// be recorded under; the caller (normally `update-cache`) is
    /// responsible for resolving it relative to the repository root.
    pub fn stage_entry(&mut self, name: Vec<u8>, metadata: &fs::Metadata, digest: Digest) -> Result<(), IndexError> {
        if !verify_path(&name) {
            return Err(IndexError::InvalidPath(name));
        }
        let entry = CacheEntry {
            ctime: ctime_of(metadata),
            mtime: mtime_of(metadata),
            dev: stat_field(metadata, StatField::Dev),
            ino: stat_field(metadata, StatField::Ino),
            mode: stat_field(metadata, StatField::Mode),
            uid: stat_field(metadata, StatField::Uid),
            gid: stat_field(metadata, StatField::Gid),
            #[allow(clippy::cast_possible_truncation)]
            size: metadata.len() as u32,
            sha1: digest,
            name,
        };
        self.add_entry(entry);
        Ok(())
    }

    /// Serialize and atomically install the index: write `index.lock`
    /// (failing if it already exists, like `O_EXCL`), then rename it onto
    /// `index`.
    pub fn save(&self, repo_dir: &Path) -> Result<(), IndexError> {
        let lock_path = repo_dir.join(LOCK_FILE_NAME);
        let index_path = repo_dir.join(INDEX_FILE_NAME);

        let mut lock_file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|source| {
                if source.kind() == io::ErrorKind::AlreadyExists {
                    IndexError::Locked(lock_path.clone())
                } else {
                    IndexError::Io { path: lock_path.clone(), source }
                }
            })?;

        let bytes = format::encode_index(&self.entries);
        let write_result = {
            use std::io::Write;
            lock_file.write_all(&bytes)
        };
        if let Err(source) = write_result {
            let _ = fs::remove_file(&lock_path);
            return Err(IndexError::Io { path: lock_path, source });
        }
        drop(lock_file);

        if let Err(source) = fs::rename(&lock_path, &index_path) {
            let _ = fs::remove_file(&lock_path);
            return Err(IndexError::Io { path: index_path, source });
        }
        tracing::debug!(entries = self.entries.len(), "saved index");
        Ok(())
    }
}

/// Reject dot-files, empty path segments, and absolute/trailing slashes —
/// `verify_path`'s walk, re-expressed as: no component may be empty or
/// start with `.`.
///
/// Tracing the original automaton: it treats the start of the string, and
/// the character right after every `/`, as a boundary; at each boundary the
/// next character must not be `/`, `.`, or end-of-string. That is exactly
/// "every `/`-delimited component is non-empty and doesn't start with `.`".
#[must_use]
pub fn verify_path(path: &[u8]) -> bool {
    if path.is_empty() {
        return false;
    }
    path.split(|&b| b == b'/').all(|component| !component.is_empty() && component[0] != b'.')
}

fn ctime_of(metadata: &fs::Metadata) -> CacheTime {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        CacheTime { sec: metadata.ctime() as u32, nsec: metadata.ctime_nsec() as u32 }
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        CacheTime::default()
    }
}

fn mtime_of(metadata: &fs::Metadata) -> CacheTime {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        CacheTime { sec: metadata.mtime() as u32, nsec: metadata.mtime_nsec() as u32 }
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        CacheTime::default()
    }
}

enum StatField {
    Dev,
    Ino,
    Mode,
    Uid,
    Gid,
}

#[cfg(unix)]
fn stat_field(metadata: &fs::Metadata, field: StatField) -> u32 {
    use std::os::unix::fs::MetadataExt;
    #[allow(clippy::cast_possible_truncation)]
    match field {
        StatField::Dev => metadata.dev() as u32,
        StatField::Ino => metadata.ino() as u32,
        StatField::Mode => metadata.mode(),
        StatField::Uid => metadata.uid(),
        StatField::Gid => metadata.gid(),
    }
}

#[cfg(not(unix))]
fn stat_field(_metadata: &fs::Metadata, _field: StatField) -> u32 {
    0
}
