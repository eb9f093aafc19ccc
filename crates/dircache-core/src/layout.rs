//! Repository layout: where the staging index and the object store live,
//! and how to lay a fresh repository's directories down.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::digest::Digest;

/// Environment variable overriding the object-store root.
pub const ENV_OBJECT_ROOT: &str = "SHA1_FILE_DIRECTORY";

/// Name of the repository directory, relative to the working directory.
/// Unlike the object root, this has no environment override — it is
/// hardcoded, matching `init-db.c`'s unconditional `mkdir(".dircache", 0700)`.
pub const REPO_DIR_NAME: &str = ".dircache";

const FANOUT_DIRS: usize = 256;

/// Errors from repository-layout operations.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The repository directory already exists.
    #[error("unable to create {0}: already exists")]
    RepoExists(PathBuf),
    /// An I/O failure while creating a directory.
    #[error("{path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Resolved paths for a repository: the `.dircache` directory and the
/// (possibly environment-overridden) object-store root.
#[derive(Debug, Clone)]
pub struct Layout {
    /// The `<base>/.dircache` directory.
    pub repo_dir: PathBuf,
    /// The object-store root: `$SHA1_FILE_DIRECTORY` if set, else
    /// `<repo_dir>/objects`.
    pub object_root: PathBuf,
}

impl Layout {
    /// Resolve the layout relative to `base` (ordinarily the process's
    /// current working directory), honoring [`ENV_OBJECT_ROOT`] exactly
    /// as §4.B specifies: resolved once, a pure function of the override
    /// and the default.
    #[must_use]
    pub fn discover_in(base: &Path) -> Self {
        let repo_dir = base.join(REPO_DIR_NAME);
        let object_root = match std::env::var_os(ENV_OBJECT_ROOT) {
            Some(dir) => {
                let dir = PathBuf::from(dir);
                if dir.is_absolute() {
                    dir
                } else {
                    base.join(dir)
                }
            }
            None => repo_dir.join("objects"),
        };
        Self { repo_dir, object_root }
    }

    /// Compute the on-disk path for `digest`: `<object_root>/<xx>/<remaining-38>`.
    #[must_use]
    pub fn path_for(&self, digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        self.object_root.join(&hex[0..2]).join(&hex[2..40])
    }

    /// Create the repository directory and the object-store fan-out
    /// directories. Aborts if `repo_dir` already exists; pre-existing
    /// fan-out subdirectories (e.g. an already-populated
    /// `SHA1_FILE_DIRECTORY`) are ignored rather than treated as errors.
    pub fn init(&self) -> Result<(), LayoutError> {
        create_dir_0700(&self.repo_dir).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                LayoutError::RepoExists(self.repo_dir.clone())
            } else {
                LayoutError::Io { path: self.repo_dir.clone(), source }
            }
        })?;

        match create_dir_0700(&self.object_root) {
            Ok(()) => {}
            Err(_) if self.object_root.is_dir() => {}
            Err(source) => {
                return Err(LayoutError::Io { path: self.object_root.clone(), source })
            }
        }

        for i in 0u16..FANOUT_DIRS as u16 {
            let sub = self.object_root.join(format!("{i:02x}"));
            match create_dir_0700(&sub) {
                Ok(()) => {}
                Err(source) if source.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => return Err(LayoutError::Io { path: sub, source }),
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_dir_0700(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::create_dir(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn create_dir_0700(path: &Path) -> io::Result<()> {
    fs::create_dir(path)
}
