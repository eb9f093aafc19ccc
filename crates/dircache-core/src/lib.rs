//! Shared primitives for the dircache object store and staging index.
//!
//! - [`digest`]: the 20-byte SHA-1 object identity and its hex codec.
//! - [`layout`]: object-root resolution and repository-directory creation.

#![deny(unsafe_code)]

pub mod digest;
pub mod layout;

pub use digest::Digest;
