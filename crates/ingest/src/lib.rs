//! Codebase ingestion for ContextMesh.
//!
//! Walks a directory tree, prunes everything the exclusion rules reject
//! (before descending), drops binary files, and serializes the survivors
//! into one [`ContextDocument`] ready to hand to an LLM backend.
//!
//! ```no_run
//! use contextmesh_ingest::ContextBuilder;
//!
//! let document = ContextBuilder::new().build(".")?;
//! println!("{}", document.render());
//! # Ok::<(), contextmesh_core::IngestError>(())
//! ```

pub mod builder;
pub mod classify;
pub mod document;
pub mod exclusion;

pub use builder::{ContextBuilder, build_context};
pub use classify::{FileKind, PROBE_LEN, is_binary, looks_binary};
pub use document::{ContextDocument, FileEntry, IngestStats};
pub use exclusion::{DEFAULT_PATTERNS, ExclusionRule, ExclusionSpec, IGNORE_FILE, SNAPSHOT_FILE};
