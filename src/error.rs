//! Public error taxonomy surfaced to callers of a [`crate::Mind`].
//!
//! Per-pathway failures are contained by circuit breakers and health
//! counters; only the variants below (plus caller-initiated cancellation,
//! which is not part of this taxonomy) ever escape a dispatch call.

use thiserror::Error;

/// Errors a [`crate::Mind`] can return from `generate`/`stream`.
#[derive(Debug, Clone, Error)]
pub enum MindError {
    /// The pool is empty or every pathway's circuit breaker is open.
    #[error("no healthy pathways available")]
    NoHealthyPathways,

    /// Racing fanned out to every healthy pathway and none returned valid
    /// content.
    #[error("all pathways failed to produce a valid response")]
    AllPathwaysFailed,

    /// Sequential tried every pathway in the pool without an accepted
    /// response.
    #[error("all pathways exhausted without an accepted response")]
    AllPathwaysExhausted,

    /// Ensemble received zero valid candidates from its worker fan-out.
    #[error("no valid responses collected for election")]
    NoValidResponses,

    /// Decomposed mode could not select a pathway to perform decomposition.
    #[error("no pathway available to perform decomposition")]
    NoPathwayForDecomposition,
}

/// Convenience alias for fallible core operations.
pub type MindResult<T> = Result<T, MindError>;
