//! Storage Layer
//!
//! The indexing engine reaches storage only through the [`Repository`]
//! trait. Two backends ship with the crate:
//!
//! - [`MemoryRepository`] - everything in process memory (tests, tooling)
//! - [`FsRepository`] - one directory per node, JSON records, lock files
//!
//! Directory layout, path discovery and content parsing are the backend's
//! business; the engine only sees node identifiers, records and named blobs.

mod error;
mod fs_store;
mod memory_store;
mod repository;

pub use error::{optional, StoreError};
pub use fs_store::FsRepository;
pub use memory_store::MemoryRepository;
pub use repository::{Repository, StoreResult};
