//! Working-tree vs. staged-entry comparison — [MODULE F] `match_stat`.

use std::fs;

use bitflags::bitflags;

use crate::format::CacheEntry;

bitflags! {
    /// Which stat fields differ between a staged entry and the working
    /// tree, using the same bit positions as the original `match_stat`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChangeMask: u32 {
        /// Modification time differs.
        const MTIME = 0x0001;
        /// inode-change time differs.
        const CTIME = 0x0002;
        /// uid or gid differs.
        const OWNER = 0x0004;
        /// Mode bits differ.
        const MODE = 0x0008;
        /// Device or inode number differs.
        const INODE = 0x0010;
        /// Size differs — a proxy for "content probably changed".
        const DATA = 0x0020;
    }
}

/// Compare a staged entry against the working tree's current metadata,
/// returning every field that disagrees.
#[must_use]
pub fn match_stat(entry: &CacheEntry, metadata: &fs::Metadata) -> ChangeMask {
    let mut changed = ChangeMask::empty();

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let (cur_mtime_sec, cur_mtime_nsec) = (metadata.mtime() as u32, metadata.mtime_nsec() as u32);
        if entry.mtime.sec != cur_mtime_sec || entry.mtime.nsec != cur_mtime_nsec {
            changed |= ChangeMask::MTIME;
        }

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let (cur_ctime_sec, cur_ctime_nsec) = (metadata.ctime() as u32, metadata.ctime_nsec() as u32);
        if entry.ctime.sec != cur_ctime_sec || entry.ctime.nsec != cur_ctime_nsec {
            changed |= ChangeMask::CTIME;
        }

        #[allow(clippy::cast_possible_truncation)]
        if entry.uid != metadata.uid() || entry.gid != metadata.gid() {
            changed |= ChangeMask::OWNER;
        }
        if entry.mode != metadata.mode() {
            changed |= ChangeMask::MODE;
        }

        #[allow(clippy::cast_possible_truncation)]
        if entry.dev != metadata.dev() as u32 || entry.ino != metadata.ino() as u32 {
            changed |= ChangeMask::INODE;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    if entry.size != metadata.len() as u32 {
        changed |= ChangeMask::DATA;
    }

    changed
}
