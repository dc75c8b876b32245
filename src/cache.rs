//! Cache strategies wrapping a [`SimIndex`] to accelerate repeated queries.
//!
//! Four interchangeable strategies, all observationally equivalent — the
//! score returned for a pair is bit-identical to the uncached index — and
//! differing only in the space/time trade-off:
//!
//! - [`CacheStrategy::None`]: pass-through.
//! - [`CacheStrategy::Score`]: memoizes composed scores per unordered pair.
//! - [`CacheStrategy::Dot`]: memoizes the bilinear form instead, so entries
//!   are reused across different score calls sharing a node.
//! - [`CacheStrategy::Precompute`]: one shot, O(N²) memory — the full
//!   dot-product matrix plus the full score matrix, O(1) per query after.
//!   Defined only for the short storage form.
//!
//! Cache state is derived data, owned by the wrapper and never persisted.
//! Pair keys are canonicalized with the larger index first to exploit score
//! symmetry.

use std::collections::HashMap;

use log::{debug, info, trace};
use rayon::prelude::*;
use smartcore::linalg::basic::arrays::{Array, Array2};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::SimError;
use crate::index::{Score, Scored, SimIndex};

/// Which caching strategy to wrap an index with. A pure query-time
/// configuration choice: outputs never change, only query cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheStrategy {
    #[default]
    None,
    Score,
    Dot,
    Precompute,
}

/// Wraps `index` with the selected strategy.
///
/// Fails with [`SimError::PrecomputeUnsupported`] when `Precompute` is asked
/// of a long-form index.
pub fn cached<'a>(
    index: &'a SimIndex,
    strategy: CacheStrategy,
) -> Result<Box<dyn Scored + 'a>, SimError> {
    debug!("Wrapping index ({} nodes) with {:?} cache", index.len(), strategy);
    Ok(match strategy {
        CacheStrategy::None => Box::new(index),
        CacheStrategy::Score => Box::new(ScoreCache::new(index)),
        CacheStrategy::Dot => Box::new(DotCache::new(index)),
        CacheStrategy::Precompute => Box::new(Precomputed::new(index)?),
    })
}

#[inline]
fn canonical(a: usize, b: usize) -> (usize, usize) {
    if a >= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Memoizes composed scores in a two-level map keyed by unordered pair.
pub struct ScoreCache<'a> {
    index: &'a SimIndex,
    cache: HashMap<usize, HashMap<usize, Score>>,
}

impl<'a> ScoreCache<'a> {
    pub fn new(index: &'a SimIndex) -> Self {
        Self { index, cache: HashMap::new() }
    }

    /// Number of memoized pairs.
    pub fn entries(&self) -> usize {
        self.cache.values().map(|inner| inner.len()).sum()
    }
}

impl Scored for ScoreCache<'_> {
    fn score(&mut self, a: usize, b: usize) -> Result<Score, SimError> {
        let (hi, lo) = canonical(a, b);
        if let Some(score) = self.cache.get(&hi).and_then(|inner| inner.get(&lo)) {
            trace!("score cache hit for ({}, {})", hi, lo);
            return Ok(*score);
        }
        let score = self.index.score(hi, lo)?;
        self.cache.entry(hi).or_default().insert(lo, score);
        Ok(score)
    }

    fn node_count(&self) -> usize {
        self.index.len()
    }
}

/// Memoizes the lower-level bilinear form `d(a, b)` and composes scores
/// from cached entries, so `d(a, a)` is shared by every score touching `a`.
pub struct DotCache<'a> {
    index: &'a SimIndex,
    cache: HashMap<usize, HashMap<usize, Score>>,
}

impl<'a> DotCache<'a> {
    pub fn new(index: &'a SimIndex) -> Self {
        Self { index, cache: HashMap::new() }
    }

    fn dot(&mut self, a: usize, b: usize) -> Result<Score, SimError> {
        let (hi, lo) = canonical(a, b);
        if let Some(dot) = self.cache.get(&hi).and_then(|inner| inner.get(&lo)) {
            trace!("dot cache hit for ({}, {})", hi, lo);
            return Ok(*dot);
        }
        let dot = self.index.dot(hi, lo)?;
        self.cache.entry(hi).or_default().insert(lo, dot);
        Ok(dot)
    }
}

impl Scored for DotCache<'_> {
    fn score(&mut self, a: usize, b: usize) -> Result<Score, SimError> {
        if a == b {
            // Same early-out as the uncached index: self-distance is exact zero.
            return self.index.score(a, b);
        }
        let daa = self.dot(a, a)?;
        let dbb = self.dot(b, b)?;
        let dab = self.dot(a, b)?;
        // Identical composition to SimIndex::score so the floats match.
        let value = daa.value + dbb.value - 2.0 * dab.value;
        let imag = daa.imag + dbb.imag + 2.0 * dab.imag;
        Ok(Score { value, imag, suspect: imag > self.index.imag_tol() })
    }

    fn node_count(&self) -> usize {
        self.index.len()
    }
}

/// Eagerly computes the full N×N dot-product and score matrices.
///
/// Construction is one parallel matrix product (`F·Fᵗ` on the folded short
/// form) plus a broadcast subtraction; queries are O(1) lookups afterwards.
pub struct Precomputed<'a> {
    index: &'a SimIndex,
    dots: DenseMatrix<f64>,
    scores: DenseMatrix<f64>,
}

impl<'a> Precomputed<'a> {
    /// Fails unless `index` is short-form: the folded matrix is the only
    /// representation whose dot products reduce to one matrix product.
    pub fn new(index: &'a SimIndex) -> Result<Self, SimError> {
        if !index.is_short() {
            return Err(SimError::PrecomputeUnsupported);
        }
        let n = index.len();
        let k = index.rank();
        let folded = index.q();
        info!("Precomputing {}x{} dot-product and score matrices", n, n);

        let dot_rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (0..n)
                    .map(|j| {
                        let mut acc = 0.0;
                        for m in 0..k {
                            acc += folded.get((i, m)) * folded.get((j, m));
                        }
                        acc
                    })
                    .collect()
            })
            .collect();
        let dots = DenseMatrix::from_iterator(dot_rows.iter().flatten().copied(), n, n, 0);

        let score_rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let gii = dot_rows[i][i];
                (0..n)
                    .map(|j| gii + dot_rows[j][j] - 2.0 * dot_rows[i][j])
                    .collect()
            })
            .collect();
        let scores = DenseMatrix::from_iterator(score_rows.iter().flatten().copied(), n, n, 0);

        debug!("Precompute complete for {} nodes", n);
        Ok(Self { index, dots, scores })
    }

    /// Cached bilinear form, O(1).
    pub fn dot(&self, a: usize, b: usize) -> Result<Score, SimError> {
        self.bounds(a)?;
        self.bounds(b)?;
        Ok(Score { value: *self.dots.get((a, b)), imag: 0.0, suspect: false })
    }

    fn bounds(&self, node: usize) -> Result<(), SimError> {
        if node >= self.index.len() {
            return Err(SimError::NodeOutOfRange { node, len: self.index.len() });
        }
        Ok(())
    }
}

impl Scored for Precomputed<'_> {
    fn score(&mut self, a: usize, b: usize) -> Result<Score, SimError> {
        self.bounds(a)?;
        self.bounds(b)?;
        if a == b {
            return Ok(Score { value: 0.0, imag: 0.0, suspect: false });
        }
        Ok(Score { value: *self.scores.get((a, b)), imag: 0.0, suspect: false })
    }

    fn node_count(&self) -> usize {
        self.index.len()
    }
}
