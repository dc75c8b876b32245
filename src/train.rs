//! Training engine: regularized spectral embedding of an adjacency matrix.
//!
//! ## Algorithm overview (undirected)
//!
//! 1. **Degree normalization**: `d = rowsum(A)`, `W = diag(1/d)`,
//!    `Â = sqrt(W) · A · sqrt(W)` — symmetric whenever `A` is.
//! 2. **Eigen-decomposition**: top-k eigenpairs of `Â` by magnitude via the
//!    symmetric solver (real eigenvalues).
//! 3. **Resolvent transform**: `λ' = 1 / (1 - μλ)`; diverges when `μλ = 1`,
//!    so `μ` must stay strictly below `1/max(λ)`.
//! 4. **Index matrices**: `Z = diag(sqrt(d)) · V · diag(λ')`,
//!    `Q = Vᵗ · W · V`.
//! 5. **Short form** (optional): Cholesky `Q = L·Lᵗ`, fold `L` into `Z` and
//!    drop `Q`, leaving a single N×k matrix scored by plain dot product.
//!
//! ## Directed variant
//!
//! Right (`eigs(A)`) and left (`eigs(Aᵗ)`) eigenpairs are computed with the
//! general solver, so eigenvalues may be complex. A complex eigenvalue is
//! kept only when its conjugate also lands in the same top-k window;
//! unpaired ones are dropped and reported in the training outcome. Kept
//! eigenvalues go through the same resolvent transform, and the index
//! matrices become `Z = V_R · diag(λ')`, `Q = V_Lᵗ · V_R`.
//!
//! The solver gives no ordering guarantee, so eigenpairs are re-sorted by
//! descending magnitude here before the window is cut; the pairing policy
//! stays a best-effort heuristic and its losses are always observable via
//! [`TrainReport`].

use log::{debug, info, trace, warn};
use smartcore::linalg::basic::arrays::{Array, Array2, MutArray};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linalg::traits::evd::EVDDecomposable;
use sprs::CsMat;

use crate::error::SimError;
use crate::index::{BoundIndex, SimIndex};
use crate::provider::Provider;

/// Denominator magnitude under which the resolvent is treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Imaginary magnitude under which a solver eigenvalue counts as real.
const REAL_EPS: f64 = 1e-12;

/// Training configuration, builder-style.
#[derive(Clone, Debug)]
pub struct Trainer {
    mu: f64,
    k: usize,
    directed: bool,
    short_form: bool,
    imag_tol: f64,
}

// Approximate equality on the float fields, exact elsewhere.
impl PartialEq for Trainer {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k
            && self.directed == other.directed
            && self.short_form == other.short_form
            && approx::relative_eq!(self.mu, other.mu)
            && approx::relative_eq!(self.imag_tol, other.imag_tol)
    }
}

impl Trainer {
    /// `mu` is the penalization factor in (0, 1); `k` the eigenvalue count.
    pub fn new(mu: f64, k: usize) -> Self {
        Self { mu, k, directed: false, short_form: false, imag_tol: crate::index::IMAG_TOL }
    }

    /// Treat the adjacency as directed: independent left/right eigenpairs.
    pub fn with_directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    /// Fold the Cholesky factor of `Q` into `Z` (undirected only).
    pub fn with_short_form(mut self, short_form: bool) -> Self {
        self.short_form = short_form;
        self
    }

    /// Tolerance the resulting index uses to flag suspect complex scores.
    pub fn with_imag_tol(mut self, tol: f64) -> Self {
        self.imag_tol = tol;
        self
    }

    fn validate(&self, n: usize) -> Result<(), SimError> {
        if self.k == 0 || self.k >= n {
            return Err(SimError::InvalidK { k: self.k, n });
        }
        if !(self.mu > 0.0 && self.mu < 1.0) {
            return Err(SimError::InvalidMu(self.mu));
        }
        if self.directed && self.short_form {
            return Err(SimError::ShortFormUndirectedOnly);
        }
        Ok(())
    }

    /// Trains an index from a sparse adjacency matrix.
    pub fn fit(&self, adj: &CsMat<f64>) -> Result<TrainOutcome, SimError> {
        let n = adj.rows();
        if n == 0 {
            return Err(SimError::EmptyGraph);
        }
        self.validate(n)?;
        info!(
            "Training similarity index: n={}, k={}, mu={}, directed={}, short_form={}",
            n, self.k, self.mu, self.directed, self.short_form
        );
        let outcome = if self.directed {
            self.fit_directed(adj)
        } else {
            self.fit_undirected(adj)
        }?;
        info!(
            "Training complete: {} eigenvalues kept, {} dropped",
            outcome.report.kept.len(),
            outcome.report.dropped.len()
        );
        Ok(outcome)
    }

    /// Trains from a provider and binds the resulting index to its node list.
    pub fn fit_provider<P: Provider>(&self, provider: &P) -> Result<BoundOutcome, SimError> {
        let outcome = self.fit(provider.adjacency()?)?;
        let index = BoundIndex::bind_provider(outcome.index, provider)?;
        Ok(BoundOutcome { index, report: outcome.report })
    }

    fn fit_undirected(&self, adj: &CsMat<f64>) -> Result<TrainOutcome, SimError> {
        let n = adj.rows();
        let degrees = row_sums(adj);
        let inv_sqrt: Vec<f64> = degrees
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                if d > 0.0 {
                    1.0 / d.sqrt()
                } else {
                    warn!("node {} has zero degree; it embeds at the origin", i);
                    0.0
                }
            })
            .collect();

        // Â = sqrt(W) A sqrt(W), dense for the eigensolver
        debug!("Building normalized matrix for {} nodes", n);
        let mut norm = DenseMatrix::zeros(n, n);
        for (i, row) in adj.outer_iterator().enumerate() {
            for (j, &w) in row.iter() {
                norm.set((i, j), w * inv_sqrt[i] * inv_sqrt[j]);
            }
        }

        trace!("Running symmetric eigen-decomposition");
        let evd = norm
            .evd(true)
            .map_err(|e| SimError::Solver(e.to_string()))?;

        // Top-k by eigenvalue magnitude; solver ordering is not relied upon.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            evd.d[b]
                .abs()
                .partial_cmp(&evd.d[a].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(self.k);

        let mut kept = Vec::with_capacity(self.k);
        let mut resolvent = Vec::with_capacity(self.k);
        for &idx in &order {
            let lambda = evd.d[idx];
            let denom = 1.0 - self.mu * lambda;
            if denom.abs() < SINGULAR_EPS {
                return Err(SimError::SingularRegularization {
                    re: lambda,
                    im: 0.0,
                    mu: self.mu,
                });
            }
            kept.push((lambda, 0.0));
            resolvent.push(1.0 / denom);
        }
        debug!(
            "Kept eigenvalues: {:?}",
            kept.iter().map(|&(re, _)| re).collect::<Vec<_>>()
        );

        // Z = diag(sqrt(d)) V diag(λ')
        let mut z = DenseMatrix::zeros(n, self.k);
        for row in 0..n {
            let scale = degrees[row].sqrt();
            for (j, &idx) in order.iter().enumerate() {
                z.set((row, j), scale * evd.V.get((row, idx)) * resolvent[j]);
            }
        }

        // Q = Vᵗ W V, W = diag(1/d)
        let inv_deg: Vec<f64> = degrees
            .iter()
            .map(|&d| if d > 0.0 { 1.0 / d } else { 0.0 })
            .collect();
        let mut q = DenseMatrix::zeros(self.k, self.k);
        for (i, &idx_i) in order.iter().enumerate() {
            for (j, &idx_j) in order.iter().enumerate() {
                let mut acc = 0.0;
                for row in 0..n {
                    acc += evd.V.get((row, idx_i)) * inv_deg[row] * evd.V.get((row, idx_j));
                }
                q.set((i, j), acc);
            }
        }

        let index = if self.short_form {
            trace!("Folding Cholesky factor of Q into Z");
            let l = cholesky_lower(&q)?;
            let mut folded = DenseMatrix::zeros(n, self.k);
            for row in 0..n {
                for j in 0..self.k {
                    // L is lower triangular: column j only reaches rows >= j
                    let mut acc = 0.0;
                    for m in j..self.k {
                        acc += z.get((row, m)) * l.get((m, j));
                    }
                    folded.set((row, j), acc);
                }
            }
            SimIndex::short(folded)
        } else {
            SimIndex::long(q, z)
        }
        .with_imag_tol(self.imag_tol);

        Ok(TrainOutcome { index, report: TrainReport { kept, dropped: Vec::new() } })
    }

    fn fit_directed(&self, adj: &CsMat<f64>) -> Result<TrainOutcome, SimError> {
        let n = adj.rows();
        let dense = to_dense(adj);
        let dense_t = dense.transpose();

        trace!("Running general eigen-decomposition on A and Aᵗ");
        let right = general_eigenpairs(&dense)?;
        let left = general_eigenpairs(&dense_t)?;

        let (mut kept_right, mut dropped) = keep_conjugate_paired(right, self.k);
        let (mut kept_left, dropped_left) = keep_conjugate_paired(left, self.k);
        dropped.extend(dropped_left);

        // Left and right windows must agree in width for Q = V_Lᵗ V_R.
        let m = kept_right.len().min(kept_left.len());
        if m == 0 {
            return Err(SimError::InvalidK { k: self.k, n });
        }
        if kept_right.len() != kept_left.len() {
            warn!(
                "left/right windows disagree ({} vs {}); truncating both to {}",
                kept_left.len(),
                kept_right.len(),
                m
            );
            for extra in kept_right.drain(m..) {
                dropped.push((extra.re, extra.im));
            }
            for extra in kept_left.drain(m..) {
                dropped.push((extra.re, extra.im));
            }
        }
        if !dropped.is_empty() {
            warn!(
                "directed training dropped {} unpaired eigenvalue(s): {:?}",
                dropped.len(),
                dropped
            );
        }

        let mut kept = Vec::with_capacity(m);
        let mut resolvent = Vec::with_capacity(m);
        for pair in &kept_right {
            // Complex resolvent 1 / (1 - mu*lambda)
            let dr = 1.0 - self.mu * pair.re;
            let di = -self.mu * pair.im;
            let mag2 = dr * dr + di * di;
            if mag2.sqrt() < SINGULAR_EPS {
                return Err(SimError::SingularRegularization {
                    re: pair.re,
                    im: pair.im,
                    mu: self.mu,
                });
            }
            kept.push((pair.re, pair.im));
            resolvent.push((dr / mag2, -di / mag2));
        }

        // Z = V_R diag(λ')
        let mut z_re = DenseMatrix::zeros(n, m);
        let mut z_im = DenseMatrix::zeros(n, m);
        let mut z_has_im = false;
        for (j, pair) in kept_right.iter().enumerate() {
            let (lr, li) = resolvent[j];
            for row in 0..n {
                let vr = pair.vec_re[row];
                let vi = pair.vec_im[row];
                let re = vr * lr - vi * li;
                let im = vr * li + vi * lr;
                z_re.set((row, j), re);
                z_im.set((row, j), im);
                z_has_im |= im.abs() > 0.0;
            }
        }

        // Q = V_Lᵗ V_R
        let mut q_re = DenseMatrix::zeros(m, m);
        let mut q_im = DenseMatrix::zeros(m, m);
        let mut q_has_im = false;
        for (i, lp) in kept_left.iter().enumerate() {
            for (j, rp) in kept_right.iter().enumerate() {
                let mut re = 0.0;
                let mut im = 0.0;
                for row in 0..n {
                    re += lp.vec_re[row] * rp.vec_re[row] - lp.vec_im[row] * rp.vec_im[row];
                    im += lp.vec_re[row] * rp.vec_im[row] + lp.vec_im[row] * rp.vec_re[row];
                }
                q_re.set((i, j), re);
                q_im.set((i, j), im);
                q_has_im |= im.abs() > 0.0;
            }
        }

        let index = SimIndex::long_complex(
            q_re,
            q_has_im.then_some(q_im),
            z_re,
            z_has_im.then_some(z_im),
        )
        .with_imag_tol(self.imag_tol);

        Ok(TrainOutcome { index, report: TrainReport { kept, dropped } })
    }
}

/// Training result: the index plus the accuracy report.
pub struct TrainOutcome {
    pub index: SimIndex,
    pub report: TrainReport,
}

/// Training result bound to the provider's node mapping.
pub struct BoundOutcome {
    pub index: BoundIndex,
    pub report: TrainReport,
}

/// Which eigenvalues survived the top-k window and which were discarded by
/// the directed conjugate-pair policy, as (re, im) pairs.
#[derive(Clone, Debug, Default)]
pub struct TrainReport {
    pub kept: Vec<(f64, f64)>,
    pub dropped: Vec<(f64, f64)>,
}

impl TrainReport {
    /// True when the directed pairing policy lost accuracy.
    pub fn lossy(&self) -> bool {
        !self.dropped.is_empty()
    }
}

fn row_sums(adj: &CsMat<f64>) -> Vec<f64> {
    let mut sums = vec![0.0; adj.rows()];
    for (i, row) in adj.outer_iterator().enumerate() {
        sums[i] = row.iter().map(|(_, &w)| w).sum();
    }
    sums
}

fn to_dense(adj: &CsMat<f64>) -> DenseMatrix<f64> {
    let n = adj.rows();
    let mut dense = DenseMatrix::zeros(n, n);
    for (i, row) in adj.outer_iterator().enumerate() {
        for (j, &w) in row.iter() {
            dense.set((i, j), w);
        }
    }
    dense
}

/// A complex eigenpair reconstructed from the solver's compacted real form.
struct Eigenpair {
    re: f64,
    im: f64,
    vec_re: Vec<f64>,
    vec_im: Vec<f64>,
}

impl Eigenpair {
    fn magnitude(&self) -> f64 {
        (self.re * self.re + self.im * self.im).sqrt()
    }
}

/// Expands the general EVD output into explicit complex eigenpairs.
///
/// The solver stores a conjugate pair in two consecutive columns holding the
/// real and imaginary parts of the eigenvector for the positive-imaginary
/// member; the conjugate's eigenvector is the elementwise conjugate.
fn general_eigenpairs(m: &DenseMatrix<f64>) -> Result<Vec<Eigenpair>, SimError> {
    let n = m.shape().0;
    let evd = m
        .evd(false)
        .map_err(|e| SimError::Solver(e.to_string()))?;

    let column = |j: usize| -> Vec<f64> { (0..n).map(|i| *evd.V.get((i, j))).collect() };

    let mut pairs = Vec::with_capacity(n);
    let mut j = 0;
    while j < n {
        if evd.e[j].abs() <= REAL_EPS {
            pairs.push(Eigenpair {
                re: evd.d[j],
                im: 0.0,
                vec_re: column(j),
                vec_im: vec![0.0; n],
            });
            j += 1;
        } else if j + 1 < n {
            let re_col = column(j);
            let im_col = column(j + 1);
            for offset in 0..2 {
                let sign = if evd.e[j + offset] >= 0.0 { 1.0 } else { -1.0 };
                pairs.push(Eigenpair {
                    re: evd.d[j + offset],
                    im: evd.e[j + offset],
                    vec_re: re_col.clone(),
                    vec_im: im_col.iter().map(|&v| sign * v).collect(),
                });
            }
            j += 2;
        } else {
            // A trailing complex eigenvalue with no partner column; treat as
            // real and let the pairing policy drop it downstream.
            warn!("unpartnered complex eigenvalue at trailing column {}", j);
            pairs.push(Eigenpair {
                re: evd.d[j],
                im: evd.e[j],
                vec_re: column(j),
                vec_im: vec![0.0; n],
            });
            j += 1;
        }
    }
    Ok(pairs)
}

/// Sorts by descending magnitude, cuts the top-k window, then discards any
/// complex eigenvalue whose conjugate did not land in the same window.
fn keep_conjugate_paired(
    mut pairs: Vec<Eigenpair>,
    k: usize,
) -> (Vec<Eigenpair>, Vec<(f64, f64)>) {
    pairs.sort_by(|a, b| {
        b.magnitude()
            .partial_cmp(&a.magnitude())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    pairs.truncate(k);

    // Membership is tested against the full window first, then the unpaired
    // members are removed.
    let window: Vec<(f64, f64)> = pairs.iter().map(|p| (p.re, p.im)).collect();
    let mut dropped = Vec::new();
    let mut kept = Vec::new();
    for pair in pairs {
        let tol = 1e-9 * (1.0 + pair.magnitude());
        let paired = pair.im.abs() <= REAL_EPS
            || window
                .iter()
                .any(|&(re, im)| (re - pair.re).abs() <= tol && (im + pair.im).abs() <= tol);
        if paired {
            kept.push(pair);
        } else {
            dropped.push((pair.re, pair.im));
        }
    }
    (kept, dropped)
}

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix.
fn cholesky_lower(q: &DenseMatrix<f64>) -> Result<DenseMatrix<f64>, SimError> {
    let k = q.shape().0;
    let mut l = DenseMatrix::zeros(k, k);
    for i in 0..k {
        for j in 0..=i {
            let mut s = *q.get((i, j));
            for m in 0..j {
                s -= l.get((i, m)) * l.get((j, m));
            }
            if i == j {
                if s <= 0.0 {
                    return Err(SimError::NotPositiveDefinite { row: i, pivot: s });
                }
                l.set((i, i), s.sqrt());
            } else {
                l.set((i, j), s / *l.get((j, j)));
            }
        }
    }
    Ok(l)
}
