//! # simdex
//!
//! A compact similarity index over graph nodes, built from a regularized
//! spectral embedding of the adjacency matrix.
//!
//! ## Pipeline
//!
//! 1. **Provider**: external node identifiers are interned into dense
//!    indices and the sparse adjacency matrix is assembled (`provider`).
//! 2. **Training**: the adjacency is normalized, eigen-decomposed and
//!    regularized through the resolvent transform `λ' = 1/(1-μλ)`,
//!    producing the index matrices `Q` and `Z` (`train`).
//! 3. **Scoring**: pairwise squared embedding distance, symmetric with
//!    zero self-distance, in either the long (`Q`, `Z`) or the short
//!    (folded) storage form (`index`).
//! 4. **Caching**: four interchangeable strategies trade memory for
//!    repeated-query speed without changing outputs (`cache`).
//! 5. **Pruning**: bounded-depth reachability restricts ranking and
//!    evaluation to a relevant neighborhood (`heuristics`).
//! 6. **Ranking and evaluation**: top-k similar nodes (`rank`) and
//!    aggregate quality statistics against held-out edges and a random
//!    baseline (`evalf`).
//! 7. **Persistence**: tagged binary archives, plain or bound to the node
//!    mapping (`persist`).
//!
//! ## Usage
//!
//! ```ignore
//! use simdex::provider::{EdgeListProvider, Provider};
//! use simdex::train::Trainer;
//! use simdex::evalf::{evaluate, EvalConfig};
//!
//! let provider = EdgeListProvider::from_edges(edges);
//! let outcome = Trainer::new(0.5, 6).fit(provider.adjacency()?)?;
//! let score = outcome.index.score(0, 1)?;
//! let result = evaluate(&outcome.index, &held_out, None, &EvalConfig::default())?;
//! println!("diff_position = {}", result.diff_position);
//! ```
//!
//! The core is single-threaded and synchronous; trained matrices are
//! read-only, and cache state is the only mutable derived data. Every
//! accuracy trade-off — short-form folding, directed conjugate-pair
//! discarding, complex-tolerance clamping — is observable by the caller.

pub mod cache;
pub mod error;
pub mod evalf;
pub mod heuristics;
pub mod index;
pub mod persist;
pub mod provider;
pub mod rank;
pub mod train;

#[cfg(test)]
mod tests;

pub use cache::CacheStrategy;
pub use error::SimError;
pub use evalf::{evaluate, EvalConfig, EvalResult};
pub use heuristics::MaxDepth;
pub use index::{BoundIndex, Score, Scored, SimIndex};
pub use provider::{EdgeListProvider, OffsetProvider, Provider};
pub use rank::{top_similar, TopK};
pub use train::{TrainOutcome, TrainReport, Trainer};
