//! Content hashing for strata.
//!
//! Every stored object and every serialized patch is identified by a
//! domain-separated BLAKE3 digest. All hashing wraps the `blake3` crate.

pub mod hasher;

pub use hasher::ContentHasher;
