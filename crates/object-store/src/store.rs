//! Compressed, content-addressed object storage — [MODULE C].

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use dircache_core::layout::Layout;
use dircache_core::Digest;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

/// Size of the scratch buffer used for the first inflate pass, which only
/// needs to hold the header (`"<type> <size>\0"`). 8 KiB comfortably bounds
/// any realistic header.
const HEADER_SCRATCH_SIZE: usize = 8192;

/// Longest accepted object-type token (`"blob"`, `"tree"`, `"commit"`).
const MAX_TYPE_LEN: usize = 10;

/// Errors from reading or writing objects.
#[derive(Debug, Error)]
pub enum Error {
    /// The object file does not exist.
    #[error("{0}: no such object")]
    NotFound(PathBuf),
    /// An I/O failure while reading, writing, or mapping an object file.
    #[error("{path}: {source}")]
    Io {
        /// Path of the object file involved.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The compressed stream did not inflate to a well-formed object.
    #[error("malformed object header: {0}")]
    MalformedHeader(String),
}

/// A decoded object: its declared type, declared size, and payload bytes.
#[derive(Debug, Clone)]
pub struct RawObject {
    /// `"blob"`, `"tree"`, or `"commit"`.
    pub kind: String,
    /// Declared payload size from the header.
    pub size: usize,
    /// Payload bytes (length equals `size`).
    pub payload: Vec<u8>,
}

/// A content-addressed object store rooted at a [`Layout`]'s object root.
pub struct ObjectStore {
    layout: Layout,
}

impl ObjectStore {
    /// Build a store over the given layout.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// The underlying layout (exposed so callers can compute paths, e.g.
    /// for `cat-file`'s temp-file dance).
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Deflate `framed_bytes` at best compression, hash the compressed
    /// bytes, and write them to their digest-named path. If the file
    /// already exists, that is success (§7 Benign case) — by I1 its
    /// content must already match.
    pub fn write(&self, framed_bytes: &[u8]) -> Result<Digest, Error> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(framed_bytes.len()), Compression::best());
        encoder.write_all(framed_bytes).map_err(|source| Error::Io { path: PathBuf::new(), source })?;
        let compressed = encoder.finish().map_err(|source| Error::Io { path: PathBuf::new(), source })?;

        let digest = Digest::of(&compressed);
        let path = self.layout.path_for(&digest);
        write_exclusive(&path, &compressed)?;
        tracing::debug!(digest = %digest, bytes = compressed.len(), "wrote object");
        Ok(digest)
    }

    /// Read and decode the object named by `digest`.
    ///
    /// Mmaps the object file, then inflates it in two passes: first into a
    /// bounded scratch buffer just large enough to find the header, then —
    /// once the declared payload size is known — directly into a
    /// right-sized buffer, avoiding a reallocation.
    pub fn read(&self, digest: &Digest) -> Result<RawObject, Error> {
        let path = self.layout.path_for(digest);
        let file = File::open(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                Error::NotFound(path.clone())
            } else {
                Error::Io { path: path.clone(), source }
            }
        })?;

        // Safety: the file is opened read-only above and not subsequently
        // written by this process; a concurrent writer can only ever
        // create this path once (I1, I5) and never truncate or rewrite it.
        #[allow(unsafe_code)]
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|source| Error::Io { path: path.clone(), source })?;

        let mut decoder = ZlibDecoder::new(Cursor::new(&mmap[..]));
        let mut scratch = vec![0u8; HEADER_SCRATCH_SIZE];
        let n = read_fill(&mut decoder, &mut scratch)
            .map_err(|source| Error::Io { path: path.clone(), source })?;
        scratch.truncate(n);

        let (kind, size, header_len) = parse_header(&scratch)?;

        let mut payload = vec![0u8; size];
        let prefix_len = (scratch.len() - header_len).min(size);
        payload[..prefix_len].copy_from_slice(&scratch[header_len..header_len + prefix_len]);
        if prefix_len < size {
            read_fill(&mut decoder, &mut payload[prefix_len..])
                .map_err(|source| Error::Io { path: path.clone(), source })?;
        }

        Ok(RawObject { kind, size, payload })
    }
}

/// Fill `buf` from `r` as far as the stream allows, returning the number
/// of bytes actually read (may be less than `buf.len()` at end of stream).
fn read_fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Parse `"<type> <decimal-size>\0"` out of the start of `scratch`,
/// returning the type token, the declared size, and the number of bytes
/// (including the trailing NUL) the header occupied.
fn parse_header(scratch: &[u8]) -> Result<(String, usize, usize), Error> {
    let space = scratch
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::MalformedHeader("no space separator".into()))?;
    if space == 0 || space > MAX_TYPE_LEN {
        return Err(Error::MalformedHeader(format!("type token length {space} out of range")));
    }
    let kind = std::str::from_utf8(&scratch[..space])
        .map_err(|_| Error::MalformedHeader("type token not ASCII".into()))?
        .to_string();

    let nul = scratch[space + 1..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::MalformedHeader("no NUL terminator".into()))?
        + space
        + 1;
    let size_str = std::str::from_utf8(&scratch[space + 1..nul])
        .map_err(|_| Error::MalformedHeader("size field not ASCII".into()))?;
    let size: usize = size_str
        .parse()
        .map_err(|_| Error::MalformedHeader(format!("bad size field {size_str:?}")))?;

    Ok((kind, size, nul + 1))
}

fn write_exclusive(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut f) => f.write_all(bytes).map_err(|source| Error::Io { path: path.to_path_buf(), source }),
        Err(source) if source.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(Error::Io { path: path.to_path_buf(), source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(tmp: &Path) -> ObjectStore {
        let layout = Layout::discover_in(tmp);
        layout.init().unwrap();
        ObjectStore::new(layout)
    }

    #[test]
    fn write_then_read_roundtrips() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let framed = b"blob 5\0hello";
        let digest = store.write(framed).unwrap();
        let obj = store.read(&digest).unwrap();
        assert_eq!(obj.kind, "blob");
        assert_eq!(obj.size, 5);
        assert_eq!(obj.payload, b"hello");
    }

    #[test]
    fn write_is_idempotent_on_identical_content() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let framed = b"blob 3\0abc";
        let d1 = store.write(framed).unwrap();
        let d2 = store.write(framed).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn read_missing_object_errors() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let bogus = Digest::of(b"never written");
        assert!(matches!(store.read(&bogus), Err(Error::NotFound(_))));
    }

    #[test]
    fn large_payload_spans_scratch_boundary() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let body = vec![b'x'; HEADER_SCRATCH_SIZE * 3];
        let header = format!("blob {}\0", body.len());
        let mut framed = header.into_bytes();
        framed.extend_from_slice(&body);
        let digest = store.write(&framed).unwrap();
        let obj = store.read(&digest).unwrap();
        assert_eq!(obj.payload, body);
    }
}
