//! Similarity index: trained matrices and the pairwise scoring protocol.
//!
//! A [`SimIndex`] holds the matrices produced by the training engine and is
//! immutable afterwards. Two storage forms exist:
//!
//! - *long form*: `Q` (k×k) and `Z` (N×k); the bilinear form is
//!   `d(x, y) = z_x · Q · z_yᵗ`.
//! - *short form*: `Z` is absent and `Q` is the N×k folded matrix that
//!   already absorbs the Cholesky factor; `d(x, y) = q_x · q_y`.
//!
//! The score between two nodes is the squared embedding distance
//! `d(a,a) + d(b,b) - 2·d(a,b)`. The bilinear form is symmetrized over its
//! arguments so the score stays symmetric even for directed indices, where
//! `Q` is generally asymmetric.
//!
//! Directed training can leave complex components in the matrices. Scores
//! carry the residual imaginary magnitude as a tag: within `imag_tol` the
//! real part is authoritative, beyond it the score is flagged suspect rather
//! than silently coerced.
//!
//! Identifier translation is a wrapper, not a mutation of the index:
//! [`BoundIndex`] composes a `SimIndex` with an ordered node list.

use std::collections::HashMap;

use log::{debug, warn};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::SimError;
use crate::provider::Provider;

/// Default tolerance under which a residual imaginary part is considered
/// numerical noise.
pub const IMAG_TOL: f64 = 1e-9;

/// A pairwise score tagged with its residual imaginary magnitude.
///
/// `value` is the real part of the computed distance. `imag` is the absolute
/// imaginary residue left over from complex intermediates (always zero for
/// undirected indices). `suspect` is set when `imag` exceeds the index
/// tolerance, signalling an accuracy breakdown the caller should not ignore.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score {
    pub value: f64,
    pub imag: f64,
    pub suspect: bool,
}

impl Score {
    fn real(value: f64) -> Self {
        Self { value, imag: 0.0, suspect: false }
    }

    fn from_complex(re: f64, im: f64, tol: f64) -> Self {
        let imag = im.abs();
        Self { value: re, imag, suspect: imag > tol }
    }
}

/// The scoring capability. Implemented by the bare index and by every cache
/// strategy; all implementations must return identical values for identical
/// pairs, differing only in query cost.
pub trait Scored {
    fn score(&mut self, a: usize, b: usize) -> Result<Score, SimError>;

    /// Number of nodes covered by the underlying index.
    fn node_count(&self) -> usize;
}

#[inline]
fn cmul(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    (a.0 * b.0 - a.1 * b.1, a.0 * b.1 + a.1 * b.0)
}

/// Trained similarity index.
#[derive(Clone, Debug)]
pub struct SimIndex {
    q: DenseMatrix<f64>,
    q_im: Option<DenseMatrix<f64>>,
    z: Option<DenseMatrix<f64>>,
    z_im: Option<DenseMatrix<f64>>,
    imag_tol: f64,
}

impl SimIndex {
    /// Long-form index from real matrices: `q` is k×k, `z` is N×k.
    ///
    /// # Panics
    ///
    /// Panics if `q` is not square or its side differs from `z`'s width.
    pub fn long(q: DenseMatrix<f64>, z: DenseMatrix<f64>) -> Self {
        let (qr, qc) = q.shape();
        let (_, zc) = z.shape();
        assert_eq!(qr, qc, "Q must be square, got {}x{}", qr, qc);
        assert_eq!(qc, zc, "Z width {} must match Q side {}", zc, qc);
        Self { q, q_im: None, z: Some(z), z_im: None, imag_tol: IMAG_TOL }
    }

    /// Long-form index with complex components from directed training.
    pub(crate) fn long_complex(
        q: DenseMatrix<f64>,
        q_im: Option<DenseMatrix<f64>>,
        z: DenseMatrix<f64>,
        z_im: Option<DenseMatrix<f64>>,
    ) -> Self {
        Self { q, q_im, z: Some(z), z_im, imag_tol: IMAG_TOL }
    }

    /// Short-form index: `folded` is the N×k matrix `Z·L` with `Q = L·Lᵗ`.
    pub fn short(folded: DenseMatrix<f64>) -> Self {
        Self { q: folded, q_im: None, z: None, z_im: None, imag_tol: IMAG_TOL }
    }

    /// Override the imaginary-residue tolerance.
    pub fn with_imag_tol(mut self, tol: f64) -> Self {
        self.imag_tol = tol;
        self
    }

    /// Number of nodes (rows of `Z` in long form, of the folded matrix in
    /// short form).
    pub fn len(&self) -> usize {
        match &self.z {
            Some(z) => z.shape().0,
            None => self.q.shape().0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding width k.
    pub fn rank(&self) -> usize {
        self.q.shape().1
    }

    /// True when `Z` is absent and `Q` is the folded N×k matrix.
    pub fn is_short(&self) -> bool {
        self.z.is_none()
    }

    /// True when any imaginary component survived training.
    pub fn is_complex(&self) -> bool {
        self.q_im.is_some() || self.z_im.is_some()
    }

    pub fn imag_tol(&self) -> f64 {
        self.imag_tol
    }

    pub fn q(&self) -> &DenseMatrix<f64> {
        &self.q
    }

    pub fn q_im(&self) -> Option<&DenseMatrix<f64>> {
        self.q_im.as_ref()
    }

    pub fn z(&self) -> Option<&DenseMatrix<f64>> {
        self.z.as_ref()
    }

    pub fn z_im(&self) -> Option<&DenseMatrix<f64>> {
        self.z_im.as_ref()
    }

    fn check(&self, node: usize) -> Result<(), SimError> {
        if node >= self.len() {
            return Err(SimError::NodeOutOfRange { node, len: self.len() });
        }
        Ok(())
    }

    fn q_at(&self, r: usize, c: usize) -> (f64, f64) {
        let im = self.q_im.as_ref().map_or(0.0, |m| *m.get((r, c)));
        (*self.q.get((r, c)), im)
    }

    fn z_at(&self, z: &DenseMatrix<f64>, r: usize, c: usize) -> (f64, f64) {
        let im = self.z_im.as_ref().map_or(0.0, |m| *m.get((r, c)));
        (*z.get((r, c)), im)
    }

    /// One-sided bilinear form `z_x · Q · z_yᵗ` (complex).
    fn bilinear(&self, x: usize, y: usize) -> (f64, f64) {
        match &self.z {
            None => {
                // Short form: plain dot product of folded rows, always real.
                let k = self.q.shape().1;
                let mut acc = 0.0;
                for j in 0..k {
                    acc += self.q.get((x, j)) * self.q.get((y, j));
                }
                (acc, 0.0)
            }
            Some(z) => {
                let k = z.shape().1;
                let mut acc = (0.0, 0.0);
                for r in 0..k {
                    let zx = self.z_at(z, x, r);
                    for c in 0..k {
                        let term = cmul(cmul(zx, self.q_at(r, c)), self.z_at(z, y, c));
                        acc.0 += term.0;
                        acc.1 += term.1;
                    }
                }
                acc
            }
        }
    }

    /// Symmetrized bilinear form `d(x, y)`.
    ///
    /// For undirected indices `Q` is symmetric and this equals the one-sided
    /// form; for directed indices the symmetrization keeps `score(a, b) ==
    /// score(b, a)` by construction.
    pub fn dot(&self, x: usize, y: usize) -> Result<Score, SimError> {
        self.check(x)?;
        self.check(y)?;
        let (re, im) = if self.is_short() || x == y {
            self.bilinear(x, y)
        } else {
            let xy = self.bilinear(x, y);
            let yx = self.bilinear(y, x);
            ((xy.0 + yx.0) / 2.0, (xy.1 + yx.1) / 2.0)
        };
        Ok(Score::from_complex(re, im, self.imag_tol))
    }

    /// Squared embedding distance `d(a,a) + d(b,b) - 2·d(a,b)`.
    ///
    /// Symmetric in its arguments; zero for `a == b`.
    pub fn score(&self, a: usize, b: usize) -> Result<Score, SimError> {
        if a == b {
            self.check(a)?;
            return Ok(Score::real(0.0));
        }
        let daa = self.dot(a, a)?;
        let dbb = self.dot(b, b)?;
        let dab = self.dot(a, b)?;
        let re = daa.value + dbb.value - 2.0 * dab.value;
        let im = daa.imag + dbb.imag + 2.0 * dab.imag;
        let score = Score::from_complex(re, im, self.imag_tol);
        if score.suspect {
            warn!(
                "score({}, {}) carries imaginary residue {:.3e} beyond tolerance {:.1e}",
                a, b, score.imag, self.imag_tol
            );
        }
        Ok(score)
    }
}

impl Scored for SimIndex {
    fn score(&mut self, a: usize, b: usize) -> Result<Score, SimError> {
        SimIndex::score(self, a, b)
    }

    fn node_count(&self) -> usize {
        self.len()
    }
}

// Caches borrow the index immutably, so the trait is also available on
// shared references.
impl Scored for &SimIndex {
    fn score(&mut self, a: usize, b: usize) -> Result<Score, SimError> {
        SimIndex::score(self, a, b)
    }

    fn node_count(&self) -> usize {
        self.len()
    }
}

/// A similarity index composed with its node mapping.
///
/// Wraps rather than mutates: the inner index stays usable on raw indices,
/// the wrapper adds external-identifier translation on top.
pub struct BoundIndex {
    index: SimIndex,
    nodes: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl BoundIndex {
    /// Binds an index to an ordered identifier list; list position `i` is
    /// node `i` in the matrices.
    pub fn bind(index: SimIndex, nodes: Vec<String>) -> Result<Self, SimError> {
        if nodes.len() != index.len() {
            return Err(SimError::MappingMismatch { nodes: nodes.len(), len: index.len() });
        }
        let lookup = nodes
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        debug!("Bound index to {} node identifiers", nodes.len());
        Ok(Self { index, nodes, lookup })
    }

    /// Binds using a provider's node list.
    pub fn bind_provider<P: Provider>(index: SimIndex, provider: &P) -> Result<Self, SimError> {
        Self::bind(index, provider.node_list())
    }

    pub fn index_of(&self, id: &str) -> Result<usize, SimError> {
        self.lookup
            .get(id)
            .copied()
            .ok_or_else(|| SimError::UnknownNode(id.to_string()))
    }

    pub fn id_of(&self, index: usize) -> Option<&str> {
        self.nodes.get(index).map(|s| s.as_str())
    }

    pub fn node_list(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Score between two external identifiers.
    pub fn score(&self, a: &str, b: &str) -> Result<Score, SimError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        self.index.score(ia, ib)
    }

    pub fn inner(&self) -> &SimIndex {
        &self.index
    }

    pub fn into_inner(self) -> SimIndex {
        self.index
    }
}
