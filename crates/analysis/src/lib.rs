//! Analysis submission for ContextMesh.
//!
//! Takes a rendered context document plus a prompt and an instruction and
//! gets an answer out of the configured backend, parking the document in
//! a server-side cache the first time so later calls only send the prompt.
//!
//! - [`shaping`] decides the response format and frames inline requests.
//! - [`coordinator`] owns the cache slot and the submission protocol.
//! - [`persona`] holds the fixed instructions for each analysis agent.

pub mod coordinator;
pub mod persona;
pub mod shaping;

pub use coordinator::{AnalysisOutcome, CacheCoordinator, CacheState, SubmitOptions, Submission};
pub use persona::Persona;
pub use shaping::{STRUCTURED_MARKER, response_format};
