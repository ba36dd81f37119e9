//! Content-addressed snapshot storage for strata.
//!
//! Every file and directory of a snapshot is stored as an immutable object
//! identified by its BLAKE3 hash (domain-separated by object kind). A
//! directory's id covers its children's ids, so two snapshots with an equal
//! subtree id are known to be identical below that point without reading it.
//!
//! # Object Types
//!
//! - [`Blob`] -- file contents or a symlink target
//! - [`Tree`] -- sorted directory listing of [`TreeEntry`] values
//!
//! # Layers
//!
//! - [`ObjectStore`] -- raw key-value backend (see [`InMemoryObjectStore`])
//! - [`SnapshotStore`] -- typed snapshot access, implemented for every backend
//! - [`TreeEditor`] -- copy-on-write edits producing new roots

pub mod editor;
pub mod error;
pub mod memory;
pub mod object;
pub mod snapshot;
pub mod traits;

pub use editor::TreeEditor;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{Blob, EntryMode, FileMeta, ObjectKind, StoredObject, Tree, TreeEntry};
pub use snapshot::{resolve, walk, SnapshotStore};
pub use traits::ObjectStore;
