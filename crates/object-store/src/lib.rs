//! Content-addressed object storage: framing, compression, and the
//! blob/tree/commit codecs built on top of it.

#![deny(unsafe_code)]

pub mod codec;
pub mod store;

pub use codec::{encode_blob, encode_commit, encode_tree, decode_tree, CommitInfo, TreeEntry};
pub use store::{Error, ObjectStore, RawObject};
