//! Evaluation harness: ranking quality against held-out edges and a random
//! baseline.
//!
//! For every held-out edge `(a, target)` the harness ranks the true target
//! among `a`'s candidates, ranks one randomly drawn negative the same way,
//! and accumulates position, score and relative-score statistics for both.
//! The negative is drawn from the candidate pool with the true target
//! excluded, so a draw never degenerates into re-ranking the edge under
//! test; pools that contain only the target are skipped instead.
//! The primary quality signal is the differential (random − true): a well
//! trained index ranks true edges meaningfully better than chance, so the
//! differences come out positive.
//!
//! Positions count candidates with strictly smaller score (smaller = more
//! similar), so position 0 is best. Position totals are normalized by node
//! count times evaluated edges; the other statistics by evaluated edges.
//!
//! Sources whose candidate pool is empty after blacklist and heuristic
//! restriction are skipped and counted in [`EvalResult::skipped`], never
//! propagated as failures.

use std::collections::HashSet;

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::cache::{cached, CacheStrategy};
use crate::error::SimError;
use crate::heuristics::MaxDepth;
use crate::index::{BoundIndex, SimIndex};

/// A held-out edge asserting that `.1` should rank highly among `.0`'s
/// candidates.
pub type Edge = (usize, usize);

/// Evaluation configuration.
#[derive(Clone, Debug)]
pub struct EvalConfig {
    /// Cache strategy wrapped around the index for the run.
    pub cache: CacheStrategy,
    /// RNG seed for the negative draws; fixed seed, fixed outcome.
    pub seed: u64,
    /// A true edge counts as "well placed" when its position is below this.
    pub top_good: usize,
    /// Ordered pairs excluded from ranking, typically training edges and
    /// self-pairs.
    pub blacklist: HashSet<Edge>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            cache: CacheStrategy::Score,
            seed: 0,
            top_good: 5,
            blacklist: HashSet::new(),
        }
    }
}

/// Aggregate evaluation statistics. Immutable once produced.
///
/// `position`/`score`/`relative`/`good_position` describe the true targets;
/// the `rand_*` twins describe the random negatives; the `diff_*` fields are
/// elementwise (random − true). That direction also holds for
/// `diff_good_position`: `good_position` is a higher-is-better fraction,
/// so a well trained index drives that differential negative.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EvalResult {
    pub nodes: usize,
    pub edges: usize,
    pub skipped: usize,
    pub position: f64,
    pub rand_position: f64,
    pub score: f64,
    pub rand_score: f64,
    pub relative: f64,
    pub rand_relative: f64,
    pub good_position: f64,
    pub rand_good_position: f64,
    pub diff_position: f64,
    pub diff_score: f64,
    pub diff_relative: f64,
    pub diff_good_position: f64,
}

/// Per-edge observation passed to the evaluation observer.
#[derive(Clone, Copy, Debug)]
pub struct EdgeObservation {
    pub edge: Edge,
    pub position: usize,
    pub score: f64,
    pub relative: f64,
    pub ordinal: usize,
}

/// Evaluates `index` against held-out `edges`.
pub fn evaluate(
    index: &SimIndex,
    edges: &[Edge],
    heuristic: Option<&MaxDepth>,
    config: &EvalConfig,
) -> Result<EvalResult, SimError> {
    evaluate_with(index, edges, heuristic, config, |_| {})
}

/// Like [`evaluate`], invoking `observer` once per evaluated true edge.
pub fn evaluate_with<F>(
    index: &SimIndex,
    edges: &[Edge],
    heuristic: Option<&MaxDepth>,
    config: &EvalConfig,
    mut observer: F,
) -> Result<EvalResult, SimError>
where
    F: FnMut(EdgeObservation),
{
    let n_nodes = index.len();
    let mut scorer = cached(index, config.cache)?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    info!(
        "Evaluating {} held-out edges over {} nodes (cache={:?}, heuristic={})",
        edges.len(),
        n_nodes,
        config.cache,
        heuristic.map_or("none".to_string(), |h| format!("depth {}", h.depth()))
    );

    let all_nodes: Vec<usize> = (0..n_nodes).collect();

    let mut total_position = 0.0;
    let mut total_score = 0.0;
    let mut total_relative = 0.0;
    let mut total_good = 0.0;
    let mut rand_total_position = 0.0;
    let mut rand_total_score = 0.0;
    let mut rand_total_relative = 0.0;
    let mut rand_total_good = 0.0;
    let mut skipped = 0usize;

    for (ordinal, &(a, target)) in edges.iter().enumerate() {
        if a >= n_nodes || target >= n_nodes {
            return Err(SimError::NodeOutOfRange { node: a.max(target), len: n_nodes });
        }

        // Candidate pool: heuristic-restricted if available, minus self and
        // blacklisted pairs.
        let base: &[usize] = match heuristic {
            Some(h) => h.top_of(a).unwrap_or(&[]),
            None => &all_nodes,
        };
        let pool: Vec<usize> = base
            .iter()
            .copied()
            .filter(|&b| b != a && b < n_nodes && !config.blacklist.contains(&(a, b)))
            .collect();
        if pool.is_empty() {
            warn!("empty candidate pool for source {}; skipping edge {:?}", a, (a, target));
            skipped += 1;
            continue;
        }

        // Pool may collapse to the target alone, leaving no negative to draw.
        let negatives: Vec<usize> = pool.iter().copied().filter(|&b| b != target).collect();
        let negative = match negatives.choose(&mut rng) {
            Some(&b) => b,
            None => {
                warn!("no negative candidate for source {}; skipping edge {:?}", a, (a, target));
                skipped += 1;
                continue;
            }
        };

        let score = scorer.score(a, target)?.value;
        let rand_score = scorer.score(a, negative)?.value;
        let mut position = 0usize;
        let mut rand_position = 0usize;
        let mut best = score;

        for &b in &pool {
            let scr = scorer.score(a, b)?.value;
            if scr < score {
                position += 1;
            }
            if scr < rand_score {
                rand_position += 1;
            }
            if scr < best {
                best = scr;
            }
        }

        let relative = (score - best).powi(2);
        let rand_relative = (rand_score - best).powi(2);
        debug!(
            "edge {:?}: position={}, rand_position={}, score={:.6e}, rand_score={:.6e}",
            (a, target),
            position,
            rand_position,
            score,
            rand_score
        );

        total_position += position as f64;
        total_score += score;
        total_relative += relative;
        total_good += if position < config.top_good { 1.0 } else { 0.0 };
        rand_total_position += rand_position as f64;
        rand_total_score += rand_score;
        rand_total_relative += rand_relative;
        rand_total_good += if rand_position < config.top_good { 1.0 } else { 0.0 };

        observer(EdgeObservation { edge: (a, target), position, score, relative, ordinal });
    }

    let evaluated = edges.len() - skipped;
    if evaluated == 0 {
        warn!("no edge could be evaluated ({} skipped); returning zeroed result", skipped);
        return Ok(EvalResult {
            nodes: n_nodes,
            edges: 0,
            skipped,
            ..EvalResult::default()
        });
    }

    let edge_norm = evaluated as f64;
    let pos_norm = n_nodes as f64 * edge_norm;
    let position = total_position / pos_norm;
    let rand_position = rand_total_position / pos_norm;
    let score = total_score / edge_norm;
    let rand_score = rand_total_score / edge_norm;
    let relative = total_relative / edge_norm;
    let rand_relative = rand_total_relative / edge_norm;
    let good_position = total_good / edge_norm;
    let rand_good_position = rand_total_good / edge_norm;

    let result = EvalResult {
        nodes: n_nodes,
        edges: evaluated,
        skipped,
        position,
        rand_position,
        score,
        rand_score,
        relative,
        rand_relative,
        good_position,
        rand_good_position,
        diff_position: rand_position - position,
        diff_score: rand_score - score,
        diff_relative: rand_relative - relative,
        diff_good_position: rand_good_position - good_position,
    };
    info!(
        "Evaluation done: {} edges, {} skipped, diff_position={:.6}, diff_score={:.6e}",
        result.edges, result.skipped, result.diff_position, result.diff_score
    );
    Ok(result)
}

/// Evaluates a bound index against held-out edges given as external
/// identifiers, translating them through the node mapping first.
pub fn evaluate_bound(
    bound: &BoundIndex,
    edges: &[(String, String)],
    heuristic: Option<&MaxDepth>,
    config: &EvalConfig,
) -> Result<EvalResult, SimError> {
    let translated: Vec<Edge> = edges
        .iter()
        .map(|(a, b)| Ok((bound.index_of(a)?, bound.index_of(b)?)))
        .collect::<Result<_, SimError>>()?;
    evaluate(bound.inner(), &translated, heuristic, config)
}
