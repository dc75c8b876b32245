//! Top-k similarity ranking.
//!
//! Smaller score means closer in the embedding, so rankings are ascending.
//! [`TopK`] keeps only the best `limit` candidates during a scan instead of
//! sorting the full candidate list; inserting every candidate and reading
//! the result is guaranteed to match a full ascending sort truncated to
//! `limit`.

use log::debug;

use crate::error::SimError;
use crate::index::{Score, Scored};

/// Bounded ascending accumulator of `(node, score)` entries.
#[derive(Clone, Debug)]
pub struct TopK {
    limit: usize,
    entries: Vec<(usize, f64)>,
}

impl TopK {
    pub fn new(limit: usize) -> Self {
        Self { limit, entries: Vec::with_capacity(limit.saturating_add(1)) }
    }

    /// Inserts a candidate, keeping entries sorted by ascending score and
    /// dropping the worst one beyond the limit. Ties keep insertion order.
    pub fn insert(&mut self, node: usize, score: f64) {
        if self.limit == 0 {
            return;
        }
        let pos = self
            .entries
            .partition_point(|&(_, existing)| existing <= score);
        if pos >= self.limit {
            return;
        }
        self.entries.insert(pos, (node, score));
        self.entries.truncate(self.limit);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending score order.
    pub fn into_sorted(self) -> Vec<(usize, f64)> {
        self.entries
    }
}

/// Ranks `candidates` by ascending score against `source`.
///
/// The source itself is skipped. Returns at most `limit` `(node, score)`
/// pairs; scores keep their accuracy tags.
pub fn top_similar<S, I>(
    scorer: &mut S,
    source: usize,
    candidates: I,
    limit: usize,
) -> Result<Vec<(usize, Score)>, SimError>
where
    S: Scored + ?Sized,
    I: IntoIterator<Item = usize>,
{
    let mut top = TopK::new(limit);
    let mut scores: Vec<Option<Score>> = vec![None; scorer.node_count()];
    let mut considered = 0usize;
    for candidate in candidates {
        if candidate == source {
            continue;
        }
        let score = scorer.score(source, candidate)?;
        scores[candidate] = Some(score);
        top.insert(candidate, score.value);
        considered += 1;
    }
    debug!(
        "top_similar: source={}, {} candidates considered, returning {}",
        source,
        considered,
        top.len().min(limit)
    );
    Ok(top
        .into_sorted()
        .into_iter()
        .filter_map(|(node, _)| scores[node].map(|s| (node, s)))
        .collect())
}
