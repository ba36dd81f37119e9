//! Foundation types for strata.
//!
//! This crate provides the identity and path types shared by every other
//! strata crate.
//!
//! # Key Types
//!
//! - [`ObjectId`]: content-addressed identifier (BLAKE3 hash)
//! - [`path`]: slash-separated snapshot paths and their validation rules

pub mod error;
pub mod object;
pub mod path;

pub use error::{PathError, TypeError};
pub use object::ObjectId;
