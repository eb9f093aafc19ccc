//! On-disk layout of the staging index ("DIRC") file — [MODULE E] encode/decode.
//!
//! Every multi-byte integer is written in host byte order, exactly as the
//! original `struct cache_header`/`struct cache_entry` are — this format
//! was never meant to be portable across machines, only fast to mmap back
//! in on the machine that wrote it. Moving an index between a big-endian
//! and little-endian host will not read back correctly; that limitation is
//! inherited deliberately; see `DESIGN.md`.

use dircache_core::Digest;
use sha1::{Digest as _, Sha1};
use thiserror::Error;

/// Literal signature bytes. The original source names this `CACHE_SIGNATURE`
/// and defines it as the 32-bit value `0x44495243`, which *spells* "DIRC" as
/// a little-endian int but — being written out via a raw struct dump — lands
/// on disk as the literal bytes `C R I D` on a little-endian host. We store
/// the 4 bytes `D I R C` directly instead, so the signature reads as "DIRC"
/// regardless of host endianness. A real `.dircache/index` from the
/// original tool will therefore not round-trip here; a deliberate
/// compatibility break, recorded as an Open Question resolution.
pub const SIGNATURE: [u8; 4] = *b"DIRC";

/// Only version this format understands.
pub const VERSION: u32 = 1;

/// `signature(4) + version(4) + entry_count(4) + checksum(20)`.
const HEADER_LEN: usize = 32;

/// Size of a [`CacheEntry`]'s fixed-width fields, before the variable-length
/// name: two [`CacheTime`]s (8 bytes each) + 6 `u32` stat fields + a 20-byte
/// digest + a `u16` name length.
const ENTRY_FIXED_LEN: usize = 8 + 8 + 4 * 6 + 20 + 2;

/// Errors decoding a staging-index byte buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The buffer is shorter than a header, or an entry was cut off mid-record.
    #[error("index file is truncated")]
    Truncated,
    /// The 4 signature bytes were not `DIRC`.
    #[error("bad signature")]
    BadSignature,
    /// The declared version was not [`VERSION`].
    #[error("unsupported index version {0}")]
    BadVersion(u32),
    /// The trailing SHA-1 did not match the header prefix + entry bytes.
    #[error("bad header sha1")]
    BadChecksum,
}

/// A 32-bit second/nanosecond timestamp, truncated the same way the
/// original only keeps the low 32 bits of `time_t` — equality-only use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheTime {
    /// Seconds.
    pub sec: u32,
    /// Nanoseconds.
    pub nsec: u32,
}

impl CacheTime {
    fn write(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.sec.to_ne_bytes());
        out.extend_from_slice(&self.nsec.to_ne_bytes());
    }

    fn read(buf: &[u8]) -> Self {
        Self {
            sec: u32::from_ne_bytes(buf[0..4].try_into().unwrap()),
            nsec: u32::from_ne_bytes(buf[4..8].try_into().unwrap()),
        }
    }
}

/// One staged file's metadata and content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// inode change time.
    pub ctime: CacheTime,
    /// Content modification time.
    pub mtime: CacheTime,
    /// Device number (low 32 bits).
    pub dev: u32,
    /// Inode number (low 32 bits).
    pub ino: u32,
    /// POSIX mode bits.
    pub mode: u32,
    /// Owning uid (low 32 bits).
    pub uid: u32,
    /// Owning gid (low 32 bits).
    pub gid: u32,
    /// File size (low 32 bits).
    pub size: u32,
    /// Digest of the blob this entry's content was written as.
    pub sha1: Digest,
    /// Repo-relative pathname, raw bytes.
    pub name: Vec<u8>,
}

/// Round a name length up to this entry's total on-disk size, matching the
/// original's `cache_entry_size` macro: `(fixed + len + 8) & ~7`. The `+ 8`
/// before truncating (rather than rounding `fixed + len` directly) reserves
/// at least one padding byte past the name even when `fixed + len` is
/// already 8-aligned.
#[must_use]
pub fn entry_size(namelen: usize) -> usize {
    (ENTRY_FIXED_LEN + namelen + 8) & !7
}

impl CacheEntry {
    /// Total on-disk size of this entry, including trailing padding.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        entry_size(self.name.len())
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let start = out.len();
        self.ctime.write(out);
        self.mtime.write(out);
        out.extend_from_slice(&self.dev.to_ne_bytes());
        out.extend_from_slice(&self.ino.to_ne_bytes());
        out.extend_from_slice(&self.mode.to_ne_bytes());
        out.extend_from_slice(&self.uid.to_ne_bytes());
        out.extend_from_slice(&self.gid.to_ne_bytes());
        out.extend_from_slice(&self.size.to_ne_bytes());
        out.extend_from_slice(&self.sha1.0);
        out.extend_from_slice(&(self.name.len() as u16).to_ne_bytes());
        out.extend_from_slice(&self.name);
        let written = out.len() - start;
        out.resize(start + self.encoded_len(), 0);
        debug_assert!(written <= self.encoded_len());
    }

    /// Decode one entry starting at `buf[0]`, returning it and the number
    /// of bytes (including padding) it occupied.
    fn decode(buf: &[u8]) -> Result<(Self, usize), FormatError> {
        if buf.len() < ENTRY_FIXED_LEN {
            return Err(FormatError::Truncated);
        }
        let ctime = CacheTime::read(&buf[0..8]);
        let mtime = CacheTime::read(&buf[8..16]);
        let dev = u32::from_ne_bytes(buf[16..20].try_into().unwrap());
        let ino = u32::from_ne_bytes(buf[20..24].try_into().unwrap());
        let mode = u32::from_ne_bytes(buf[24..28].try_into().unwrap());
        let uid = u32::from_ne_bytes(buf[28..32].try_into().unwrap());
        let gid = u32::from_ne_bytes(buf[32..36].try_into().unwrap());
        let size = u32::from_ne_bytes(buf[36..40].try_into().unwrap());
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&buf[40..60]);
        let sha1 = Digest(raw);
        let namelen = u16::from_ne_bytes(buf[60..62].try_into().unwrap()) as usize;

        let step = entry_size(namelen);
        if step > buf.len() {
            return Err(FormatError::Truncated);
        }
        let name = buf[ENTRY_FIXED_LEN..ENTRY_FIXED_LEN + namelen].to_vec();
        Ok((Self { ctime, mtime, dev, ino, mode, uid, gid, size, sha1, name }, step))
    }
}

/// Serialize the full index: header + every entry, in the given order
/// (callers are responsible for keeping entries sorted, per I3).
#[must_use]
pub fn encode_index(entries: &[CacheEntry]) -> Vec<u8> {
    let mut body = Vec::new();
    for entry in entries {
        entry.encode(&mut body);
    }

    let mut prefix = Vec::with_capacity(12);
    prefix.extend_from_slice(&SIGNATURE);
    prefix.extend_from_slice(&VERSION.to_ne_bytes());
    #[allow(clippy::cast_possible_truncation)]
    prefix.extend_from_slice(&(entries.len() as u32).to_ne_bytes());

    let mut hasher = Sha1::new();
    hasher.update(&prefix);
    hasher.update(&body);
    let checksum = hasher.finalize();

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&prefix);
    out.extend_from_slice(&checksum);
    out.extend_from_slice(&body);
    out
}

/// Parse and verify a full index buffer, returning its entries in on-disk
/// order. An empty buffer (no index file yet written) decodes to no entries
/// — callers map a missing file to an empty buffer before calling this.
pub fn decode_index(buf: &[u8]) -> Result<Vec<CacheEntry>, FormatError> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    if buf.len() < HEADER_LEN {
        return Err(FormatError::Truncated);
    }
    if buf[0..4] != SIGNATURE {
        return Err(FormatError::BadSignature);
    }
    let version = u32::from_ne_bytes(buf[4..8].try_into().unwrap());
    if version != VERSION {
        return Err(FormatError::BadVersion(version));
    }
    let entry_count = u32::from_ne_bytes(buf[8..12].try_into().unwrap()) as usize;
    let stored_checksum = &buf[12..32];

    let mut hasher = Sha1::new();
    hasher.update(&buf[0..12]);
    hasher.update(&buf[HEADER_LEN..]);
    let computed = hasher.finalize();
    if computed.as_slice() != stored_checksum {
        return Err(FormatError::BadChecksum);
    }

    let mut entries = Vec::with_capacity(entry_count);
    let mut offset = HEADER_LEN;
    for _ in 0..entry_count {
        let (entry, step) = CacheEntry::decode(&buf[offset..])?;
        offset += step;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> CacheEntry {
        CacheEntry {
            ctime: CacheTime { sec: 1, nsec: 2 },
            mtime: CacheTime { sec: 3, nsec: 4 },
            dev: 5,
            ino: 6,
            mode: 0o100_644,
            uid: 7,
            gid: 8,
            size: 9,
            sha1: Digest::of(name.as_bytes()),
            name: name.as_bytes().to_vec(),
        }
    }

    #[test]
    fn empty_index_roundtrips() {
        let bytes = encode_index(&[]);
        let decoded = decode_index(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn entries_roundtrip_in_order() {
        let entries = vec![entry("Makefile"), entry("README")];
        let bytes = encode_index(&entries);
        let decoded = decode_index(&bytes).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn entry_size_matches_original_formula() {
        assert_eq!(entry_size(8), 72);
        assert_eq!(entry_size(0), 64);
        assert_eq!(entry_size(2), 72);
    }

    #[test]
    fn missing_file_decodes_as_empty() {
        assert_eq!(decode_index(&[]).unwrap(), Vec::new());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = encode_index(&[entry("a")]);
        bytes[0] = b'X';
        assert_eq!(decode_index(&bytes), Err(FormatError::BadSignature));
    }

    #[test]
    fn rejects_tampered_checksum() {
        let mut bytes = encode_index(&[entry("a")]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        // Flipping the final name/padding byte changes the data the
        // checksum covers without touching the header fields we check
        // first, so this must surface as a checksum failure.
        assert_eq!(decode_index(&bytes), Err(FormatError::BadChecksum));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = encode_index(&[]);
        bytes[4..8].copy_from_slice(&99u32.to_ne_bytes());
        assert_eq!(decode_index(&bytes), Err(FormatError::BadVersion(99)));
    }
}
