//! Tree and commit object framing — [MODULE D].

use dircache_core::Digest;
use thiserror::Error;

use crate::store::{Error as StoreError, ObjectStore};

/// SHA-1 digest length in bytes; tree entries end with one of these.
const DIGEST_LEN: usize = 20;

/// Errors from encoding or decoding tree/commit payloads.
#[derive(Debug, Error)]
pub enum Error {
    /// Failure writing or reading the underlying object.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A tree payload did not parse as a sequence of
    /// `"<mode> <name>\0<20-byte digest>"` entries.
    #[error("malformed tree entry: {0}")]
    MalformedTree(String),
    /// `read-tree` (or any tree decode) was asked to decode a non-tree object.
    #[error("expected a 'tree' node, got {0:?}")]
    NotATree(String),
}

/// One decoded (or to-be-encoded) tree entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// POSIX file-mode bits, as they would render in octal (e.g. `0o100644`).
    pub mode: u32,
    /// Raw pathname bytes. No escaping; must not contain NUL (not checked
    /// here — callers validate paths before staging, per §4.E).
    pub name: Vec<u8>,
    /// Blob (or sub-tree) digest this entry points at.
    pub digest: Digest,
}

impl TreeEntry {
    /// Render as `read-tree`'s presentation line: `"<mode> <name> (<hex>)"`.
    #[must_use]
    pub fn display_line(&self) -> String {
        format!("{:o} {} ({})", self.mode, String::from_utf8_lossy(&self.name), self.digest)
    }
}

/// Inputs to [`encode_commit`]. Name/email/date fields are sanitized
/// (stripping `\n`, `<`, `>`) before being written, per §3.
#[derive(Debug, Clone)]
pub struct CommitInfo<'a> {
    /// The tree this commit snapshots.
    pub tree: Digest,
    /// Parent commits, in significant order (permuting changes the digest).
    pub parents: &'a [Digest],
    /// Author name.
    pub author_name: &'a str,
    /// Author email.
    pub author_email: &'a str,
    /// Author date, already formatted as the desired commit-line string.
    pub author_date: &'a str,
    /// Committer name.
    pub committer_name: &'a str,
    /// Committer email.
    pub committer_email: &'a str,
    /// Committer date, already formatted.
    pub committer_date: &'a str,
    /// Free-form commit message bytes.
    pub message: &'a [u8],
}

/// Frame `bytes` as `"blob <size>\0" || bytes` and write it.
pub fn encode_blob(store: &ObjectStore, bytes: &[u8]) -> Result<Digest, Error> {
    let mut framed = format!("blob {}\0", bytes.len()).into_bytes();
    framed.extend_from_slice(bytes);
    Ok(store.write(&framed)?)
}

/// Concatenate `entries` into a tree payload (in the given order — see I3),
/// frame it as `"tree <size>\0" || payload`, and write it.
pub fn encode_tree(store: &ObjectStore, entries: &[TreeEntry]) -> Result<Digest, Error> {
    let mut payload = Vec::new();
    for entry in entries {
        payload.extend_from_slice(format!("{:o} ", entry.mode).as_bytes());
        payload.extend_from_slice(&entry.name);
        payload.push(0);
        payload.extend_from_slice(&entry.digest.0);
    }
    let mut framed = format!("tree {}\0", payload.len()).into_bytes();
    framed.extend_from_slice(&payload);
    Ok(store.write(&framed)?)
}

/// Build the commit payload described in §3, frame it as
/// `"commit <size>\0" || payload`, and write it.
pub fn encode_commit(store: &ObjectStore, info: &CommitInfo<'_>) -> Result<Digest, Error> {
    let mut payload = String::new();
    payload.push_str(&format!("tree {}\n", info.tree.to_hex()));
    for parent in info.parents {
        payload.push_str(&format!("parent {}\n", parent.to_hex()));
    }
    payload.push_str(&format!(
        "author {} <{}> {}\n",
        sanitize(info.author_name),
        sanitize(info.author_email),
        sanitize(info.author_date)
    ));
    payload.push_str(&format!(
        "committer {} <{}> {}\n\n",
        sanitize(info.committer_name),
        sanitize(info.committer_email),
        sanitize(info.committer_date)
    ));

    let mut framed = Vec::with_capacity(payload.len() + info.message.len() + 32);
    let header_payload_len = payload.len() + info.message.len();
    framed.extend_from_slice(format!("commit {header_payload_len}\0").as_bytes());
    framed.extend_from_slice(payload.as_bytes());
    framed.extend_from_slice(info.message);
    Ok(store.write(&framed)?)
}

/// Strip `\n`, `<`, `>` from a commit identity/date field.
fn sanitize(s: &str) -> String {
    s.chars().filter(|&c| c != '\n' && c != '<' && c != '>').collect()
}

/// Walk a tree payload into its entries (§4.D decode tree).
pub fn decode_tree(payload: &[u8]) -> Result<Vec<TreeEntry>, Error> {
    let mut entries = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let space = payload[offset..]
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| Error::MalformedTree("missing mode/name separator".into()))?
            + offset;
        let mode_str = std::str::from_utf8(&payload[offset..space])
            .map_err(|_| Error::MalformedTree("mode is not ASCII".into()))?;
        let mode = u32::from_str_radix(mode_str, 8)
            .map_err(|_| Error::MalformedTree(format!("bad octal mode {mode_str:?}")))?;

        let nul = payload[space + 1..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::MalformedTree("missing name terminator".into()))?
            + space
            + 1;
        let name = payload[space + 1..nul].to_vec();

        let digest_start = nul + 1;
        let digest_end = digest_start + DIGEST_LEN;
        if digest_end > payload.len() {
            return Err(Error::MalformedTree("truncated digest".into()));
        }
        let mut raw = [0u8; DIGEST_LEN];
        raw.copy_from_slice(&payload[digest_start..digest_end]);
        entries.push(TreeEntry { mode, name, digest: Digest(raw) });
        offset = digest_end;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectStore;
    use dircache_core::layout::Layout;
    use tempfile::tempdir;

    fn store_in(tmp: &std::path::Path) -> ObjectStore {
        let layout = Layout::discover_in(tmp);
        layout.init().unwrap();
        ObjectStore::new(layout)
    }

    #[test]
    fn blob_roundtrips() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let digest = encode_blob(&store, b"CFLAGS=-g\n").unwrap();
        let obj = store.read(&digest).unwrap();
        assert_eq!(obj.kind, "blob");
        assert_eq!(obj.payload, b"CFLAGS=-g\n");
    }

    #[test]
    fn tree_entry_order_is_significant() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let d_m = encode_blob(&store, b"CFLAGS=-g\n").unwrap();
        let d_r = encode_blob(&store, b"read me\n").unwrap();
        let forward = vec![
            TreeEntry { mode: 0o100644, name: b"Makefile".to_vec(), digest: d_m },
            TreeEntry { mode: 0o100644, name: b"README".to_vec(), digest: d_r },
        ];
        let reverse = vec![forward[1].clone(), forward[0].clone()];

        let t1 = encode_tree(&store, &forward).unwrap();
        let t2 = encode_tree(&store, &reverse).unwrap();
        assert_ne!(t1, t2, "permuting entries must change the tree digest");

        let t1_again = encode_tree(&store, &forward).unwrap();
        assert_eq!(t1, t1_again, "same order must reproduce the same digest");
    }

    #[test]
    fn tree_roundtrips_through_decode() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let d_m = encode_blob(&store, b"CFLAGS=-g\n").unwrap();
        let d_r = encode_blob(&store, b"read me\n").unwrap();
        let entries = vec![
            TreeEntry { mode: 0o100644, name: b"Makefile".to_vec(), digest: d_m },
            TreeEntry { mode: 0o100644, name: b"README".to_vec(), digest: d_r },
        ];
        let tree_digest = encode_tree(&store, &entries).unwrap();
        let obj = store.read(&tree_digest).unwrap();
        assert_eq!(obj.kind, "tree");
        let decoded = decode_tree(&obj.payload).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn tree_payload_matches_literal_layout() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let d_m = Digest::of(b"blob 10\0CFLAGS=-g\n");
        let d_r = Digest::of(b"blob 8\0read me\n");
        let entries = vec![
            TreeEntry { mode: 0o100644, name: b"Makefile".to_vec(), digest: d_m },
            TreeEntry { mode: 0o100644, name: b"README".to_vec(), digest: d_r },
        ];
        let mut expected = Vec::new();
        expected.extend_from_slice(b"100644 Makefile\0");
        expected.extend_from_slice(&d_m.0);
        expected.extend_from_slice(b"100644 README\0");
        expected.extend_from_slice(&d_r.0);

        let tree_digest = encode_tree(&store, &entries).unwrap();
        let obj = store.read(&tree_digest).unwrap();
        assert_eq!(obj.payload, expected);
    }

    #[test]
    fn commit_parent_permutation_changes_digest() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let tree = Digest::of(b"tree");
        let p1 = Digest::of(b"parent-1");
        let p2 = Digest::of(b"parent-2");

        let c1 = encode_commit(
            &store,
            &CommitInfo {
                tree,
                parents: &[p1, p2],
                author_name: "A",
                author_email: "a@x",
                author_date: "d1",
                committer_name: "A",
                committer_email: "a@x",
                committer_date: "d1",
                message: b"m\n",
            },
        )
        .unwrap();
        let c2 = encode_commit(
            &store,
            &CommitInfo {
                tree,
                parents: &[p2, p1],
                author_name: "A",
                author_email: "a@x",
                author_date: "d1",
                committer_name: "A",
                committer_email: "a@x",
                committer_date: "d1",
                message: b"m\n",
            },
        )
        .unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn commit_sanitizes_identity_fields() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let tree = Digest::of(b"tree");
        let digest = encode_commit(
            &store,
            &CommitInfo {
                tree,
                parents: &[],
                author_name: "E<vil>\nName",
                author_email: "a@x",
                author_date: "d1",
                committer_name: "E<vil>\nName",
                committer_email: "a@x",
                committer_date: "d1",
                message: b"hi\n",
            },
        )
        .unwrap();
        let obj = store.read(&digest).unwrap();
        let text = String::from_utf8(obj.payload).unwrap();
        assert!(text.starts_with(&format!("tree {}\n", tree.to_hex())));
        assert!(text.contains("author EvilName <a@x> d1\n"));
        assert!(!text.contains('<') || text.matches('<').count() == 2); // only the email angle brackets
    }

    #[test]
    fn decode_tree_rejects_non_tree_type() {
        let tmp = tempdir().unwrap();
        let store = store_in(tmp.path());
        let digest = encode_blob(&store, b"hello").unwrap();
        let obj = store.read(&digest).unwrap();
        assert_eq!(obj.kind, "blob");
        // read-tree's contract: caller checks obj.kind before calling decode_tree.
        assert_ne!(obj.kind, "tree");
    }
}
