//! Node providers: external identifiers ↔ dense matrix indices.
//!
//! A provider owns the bijection between external node identifiers and the
//! zero-based indices used by the trained matrices, plus the sparse adjacency
//! matrix built from the edge list. Two implementations:
//!
//! - [`EdgeListProvider`]: arbitrary string identifiers, interned in
//!   insertion order so index assignment is deterministic given edge order.
//! - [`OffsetProvider`]: identifiers are integers shifted by a fixed offset;
//!   no mapping table is needed, the adjacency is built from raw pairs.
//!
//! The adjacency matrix is built lazily on first request and cached for the
//! provider's lifetime. Parallel edges accumulate weight (entry = edge count).

use std::cell::OnceCell;
use std::collections::HashMap;

use log::{debug, info, trace};
use sprs::{CsMat, TriMat};

use crate::error::SimError;

/// Identifier translation and adjacency construction.
///
/// `index_of` never creates nodes: an identifier unseen at construction time
/// is an error, so a trained index cannot silently grow.
pub trait Provider {
    /// Dense index for an external identifier.
    fn index_of(&self, id: &str) -> Result<usize, SimError>;

    /// Number of nodes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// External identifiers in index order (the inverted index).
    fn node_list(&self) -> Vec<String>;

    /// Sparse adjacency matrix; built once, cached afterwards.
    fn adjacency(&self) -> Result<&CsMat<f64>, SimError>;

    /// Edges as dense index pairs, in input order.
    fn edge_indices(&self) -> &[(usize, usize)];
}

fn build_adjacency(n: usize, edges: &[(usize, usize)]) -> Result<CsMat<f64>, SimError> {
    if n == 0 {
        return Err(SimError::EmptyGraph);
    }
    info!("Building {}x{} adjacency matrix from {} edges", n, n, edges.len());
    let mut triplets = TriMat::new((n, n));
    for &(from, to) in edges {
        triplets.add_triplet(from, to, 1.0);
    }
    // to_csr sums duplicate triplets, so parallel edges become weights
    let adj = triplets.to_csr();
    debug!("Adjacency built: {} non-zeros", adj.nnz());
    Ok(adj)
}

/// Interning provider over string identifiers.
///
/// Identifiers are assigned consecutive indices in first-seen order while
/// scanning the edge list, matching the determinism requirement on the node
/// mapping: the same edge list always yields the same assignment.
pub struct EdgeListProvider {
    ids: HashMap<String, usize>,
    ordered: Vec<String>,
    edges: Vec<(usize, usize)>,
    adj: OnceCell<CsMat<f64>>,
}

impl EdgeListProvider {
    /// Interns every endpoint of `edges` in order.
    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut ordered: Vec<String> = Vec::new();
        let mut index_edges: Vec<(usize, usize)> = Vec::new();

        let intern = |ids: &mut HashMap<String, usize>,
                      ordered: &mut Vec<String>,
                      id: &str| match ids.get(id) {
            Some(&i) => i,
            None => {
                let i = ordered.len();
                ids.insert(id.to_string(), i);
                ordered.push(id.to_string());
                trace!("Interned node '{}' as index {}", id, i);
                i
            }
        };

        for (a, b) in edges {
            let ia = intern(&mut ids, &mut ordered, a.as_ref());
            let ib = intern(&mut ids, &mut ordered, b.as_ref());
            index_edges.push((ia, ib));
        }

        info!(
            "EdgeListProvider: {} nodes interned from {} edges",
            ordered.len(),
            index_edges.len()
        );
        Self { ids, ordered, edges: index_edges, adj: OnceCell::new() }
    }

    /// Identifier for a dense index, if in range.
    pub fn id_of(&self, index: usize) -> Option<&str> {
        self.ordered.get(index).map(|s| s.as_str())
    }
}

impl Provider for EdgeListProvider {
    fn index_of(&self, id: &str) -> Result<usize, SimError> {
        self.ids
            .get(id)
            .copied()
            .ok_or_else(|| SimError::UnknownNode(id.to_string()))
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }

    fn node_list(&self) -> Vec<String> {
        self.ordered.clone()
    }

    fn adjacency(&self) -> Result<&CsMat<f64>, SimError> {
        if let Some(adj) = self.adj.get() {
            return Ok(adj);
        }
        let adj = build_adjacency(self.len(), &self.edges)?;
        Ok(self.adj.get_or_init(|| adj))
    }

    fn edge_indices(&self) -> &[(usize, usize)] {
        &self.edges
    }
}

/// Offset provider: identifiers are integers, index = id - offset.
///
/// Useful for inputs that are already densely numbered, e.g. Matlab-style
/// one-based node ids with `offset = 1`. Node count is derived from the
/// largest index seen, so gaps become isolated (zero-degree) nodes.
pub struct OffsetProvider {
    offset: i64,
    len: usize,
    edges: Vec<(usize, usize)>,
    adj: OnceCell<CsMat<f64>>,
}

impl OffsetProvider {
    pub fn from_edges(raw: &[(i64, i64)], offset: i64) -> Result<Self, SimError> {
        let mut edges = Vec::with_capacity(raw.len());
        let mut max_index: Option<usize> = None;
        for &(a, b) in raw {
            let ia = Self::to_index(a, offset)?;
            let ib = Self::to_index(b, offset)?;
            max_index = Some(max_index.map_or(ia.max(ib), |m| m.max(ia).max(ib)));
            edges.push((ia, ib));
        }
        let len = match max_index {
            Some(m) => m + 1,
            None => return Err(SimError::EmptyGraph),
        };
        info!("OffsetProvider: {} nodes (offset {}), {} edges", len, offset, edges.len());
        Ok(Self { offset, len, edges, adj: OnceCell::new() })
    }

    /// Reconstructs a provider of known size with no edges, e.g. when
    /// upgrading a legacy plain archive to the bound format.
    pub fn with_len(len: usize, offset: i64) -> Result<Self, SimError> {
        if len == 0 {
            return Err(SimError::EmptyGraph);
        }
        Ok(Self { offset, len, edges: Vec::new(), adj: OnceCell::new() })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    fn to_index(id: i64, offset: i64) -> Result<usize, SimError> {
        let shifted = id - offset;
        usize::try_from(shifted).map_err(|_| SimError::UnknownNode(id.to_string()))
    }
}

impl Provider for OffsetProvider {
    fn index_of(&self, id: &str) -> Result<usize, SimError> {
        let numeric: i64 = id
            .trim()
            .parse()
            .map_err(|_| SimError::UnknownNode(id.to_string()))?;
        let index = Self::to_index(numeric, self.offset)?;
        if index >= self.len {
            return Err(SimError::UnknownNode(id.to_string()));
        }
        Ok(index)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn node_list(&self) -> Vec<String> {
        (0..self.len)
            .map(|i| (i as i64 + self.offset).to_string())
            .collect()
    }

    fn adjacency(&self) -> Result<&CsMat<f64>, SimError> {
        if let Some(adj) = self.adj.get() {
            return Ok(adj);
        }
        let adj = build_adjacency(self.len, &self.edges)?;
        Ok(self.adj.get_or_init(|| adj))
    }

    fn edge_indices(&self) -> &[(usize, usize)] {
        &self.edges
    }
}
