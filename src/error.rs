//! Crate-wide error type.
//!
//! The taxonomy distinguishes configuration errors (fatal to the current
//! operation), format errors (fatal at load time) and numerical accuracy
//! conditions. Accuracy degradations that are not fatal — dropped conjugate
//! eigenvalues, residual imaginary parts — are not errors at all: they are
//! reported through [`crate::train::TrainOutcome`] and [`crate::index::Score`]
//! so the caller can observe them.

use thiserror::Error;

/// Errors surfaced by training, scoring, caching and persistence.
#[derive(Debug, Error)]
pub enum SimError {
    /// Requested eigenvalue count does not fit the adjacency matrix.
    #[error("eigenvalue count k={k} must be smaller than node count n={n}")]
    InvalidK { k: usize, n: usize },

    /// Penalization factor outside the open unit interval.
    #[error("penalization factor mu={0} must lie strictly inside (0, 1)")]
    InvalidMu(f64),

    /// The resolvent denominator 1 - mu*lambda is numerically zero for a
    /// kept eigenvalue; the caller must pick mu < 1/max(lambda).
    #[error("resolvent denominator numerically zero for eigenvalue {re}{im:+}i at mu={mu}")]
    SingularRegularization { re: f64, im: f64, mu: f64 },

    /// Short-form folding requires Q to be positive definite.
    #[error("matrix Q is not positive definite (pivot {pivot} at row {row}); cannot fold short form")]
    NotPositiveDefinite { row: usize, pivot: f64 },

    /// External identifier never seen by the provider.
    #[error("unknown node identifier '{0}'")]
    UnknownNode(String),

    /// Raw node index outside the trained matrices.
    #[error("node index {node} out of range for index with {len} nodes")]
    NodeOutOfRange { node: usize, len: usize },

    /// Cholesky folding needs the real symmetric Q of undirected training.
    #[error("short-form folding is only defined for undirected training")]
    ShortFormUndirectedOnly,

    /// The precompute cache is only defined for the short storage form.
    #[error("precompute cache requires a short-form index")]
    PrecomputeUnsupported,

    /// Adjacency construction was asked for a graph with no nodes.
    #[error("graph has no nodes")]
    EmptyGraph,

    /// Node mapping and trained matrices disagree on size.
    #[error("node list length {nodes} does not match index size {len}")]
    MappingMismatch { nodes: usize, len: usize },

    /// The underlying eigensolver reported a failure.
    #[error("eigensolver failed: {0}")]
    Solver(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Archive missing required arrays, truncated payload, bad magic, etc.
    #[error("malformed index file '{path}': {reason}")]
    Format { path: String, reason: String },
}

impl SimError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SimError::Io { context: context.into(), source }
    }

    pub(crate) fn format(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::Format { path: path.into(), reason: reason.into() }
    }
}
