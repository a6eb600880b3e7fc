//! exdef core - execution definition normalization
//!
//! Turns a user-authored analytical query (an *execution definition*) into a
//! canonical form suitable for caching and backend dispatch, and translates
//! results computed for the canonical form back into the caller's vocabulary.
//!
//! # Architecture
//!
//! ```text
//! ExecutionDefinition → Normalizer → NormalizationState ──normalized──▶ backend
//!                                          │                              │
//!                                          ▼                              ▼
//!                   caller ◀── Denormalizer ◀──────── descriptors + headers
//!
//! Verifier    → diagnostics for a definition, before normalization
//! Fingerprint → SHA-256 of a definition, local ids disregarded
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: Same input always produces identical output
//! - **Idempotent**: Normalizing a normalized definition changes nothing
//! - **Reversible**: Every normalized local id maps back to exactly one original
//! - **Pure**: No input is ever mutated

pub mod backend;
pub mod denormalizer;
pub mod error;
pub mod fingerprint;
pub mod local_id;
pub mod model;
pub mod normalizer;
pub mod verifier;

mod rewire;

#[cfg(test)]
mod test_fixtures;

pub use backend::{ExecutionBackend, ExecutionResult, NormalizingBackend, RecordedBackend};
pub use denormalizer::Denormalizer;
pub use error::{Error, Result};
pub use fingerprint::def_fingerprint;
pub use local_id::LocalIdMap;
pub use model::*;
pub use normalizer::{normalize, NormalizationState, NormalizeOptions, Normalizer};
pub use verifier::{verify, VerificationResult};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
