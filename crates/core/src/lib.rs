//! # ContextMesh Core
//!
//! Domain types, traits, and error definitions shared by every ContextMesh
//! crate. Ingestion, the LLM backend binding, and the cache coordinator all
//! depend inward on this crate; it knows nothing about HTTP or the filesystem.
//!
//! ## Seams
//!
//! - [`Provider`] abstracts the LLM backend (cache creation + generation),
//!   so the coordinator can be tested against in-process fakes.
//! - [`CancellationToken`] lets callers abort a traversal or a backend call
//!   independently.

pub mod cancel;
pub mod error;
pub mod provider;

pub use cancel::CancellationToken;
pub use error::{IngestError, ProviderError};
pub use provider::{
    CacheHandle, CacheRequest, GenerateRequest, GenerateResponse, Provider, ResponseFormat,
};
