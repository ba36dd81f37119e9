//! Portable text patches for strata change sets.
//!
//! A patch carries one change set together with every blob it writes, so it
//! can be applied to a snapshot in a store that has never seen the source.
//!
//! # Architecture
//!
//! - **[`Patch`]**: records plus embedded content, built from an apply plan
//! - **Encoding**: line-oriented text with zstd-compressed, hex-wrapped blobs
//!   and a BLAKE3 trailer over everything before it
//! - **Decoding**: strict; any malformed line fails with its line number
//!
//! Applying a decoded patch gives the same snapshot as applying the change
//! set directly against the source store.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;

pub use encoder::encode_changeset;
pub use error::{PatchError, PatchResult};
pub use format::{Patch, PatchSummary, Record, DEFAULT_COMPRESSION_LEVEL, HEADER, LINE_WIDTH};
