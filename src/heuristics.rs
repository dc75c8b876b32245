//! Candidate-restriction heuristics.
//!
//! Heuristics are fully decoupled from the scoring algorithm: they only
//! decide which node pairs are worth scoring, so ranking and evaluation can
//! skip the O(N²) pair space on large graphs.
//!
//! [`MaxDepth`] is the bounded-depth heuristic: a node `t` is a candidate
//! for source `s` iff a directed path of at most `depth` hops leads from `s`
//! to `t` (BFS frontier, unweighted). The reachable sets for the whole graph
//! are computed once on first use and memoized for the pruner's lifetime.

use std::cell::OnceCell;
use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info};

/// Bounded-depth reachability pruner over a directed edge list.
pub struct MaxDepth {
    successors: HashMap<usize, Vec<usize>>,
    sources: Vec<usize>,
    depth: usize,
    reachable: OnceCell<HashMap<usize, Vec<usize>>>,
}

impl MaxDepth {
    /// Builds the reachability structure from index edges; nothing is
    /// traversed until the first query.
    pub fn new(edges: &[(usize, usize)], depth: usize) -> Self {
        let mut successors: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut seen: HashSet<usize> = HashSet::new();
        for &(from, to) in edges {
            successors.entry(from).or_default().push(to);
            seen.insert(from);
            seen.insert(to);
        }
        for nbrs in successors.values_mut() {
            nbrs.sort_unstable();
            nbrs.dedup();
        }
        let mut sources: Vec<usize> = seen.into_iter().collect();
        sources.sort_unstable();
        info!(
            "MaxDepth pruner: {} nodes, {} adjacency lists, depth {}",
            sources.len(),
            successors.len(),
            depth
        );
        Self { successors, sources, depth, reachable: OnceCell::new() }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Reachable sets for every node, computed once and memoized.
    ///
    /// Each set contains the source itself (path of length 0) and is sorted
    /// for deterministic iteration.
    pub fn top(&self) -> &HashMap<usize, Vec<usize>> {
        self.reachable.get_or_init(|| {
            debug!("Computing depth-{} reachable sets for {} nodes", self.depth, self.sources.len());
            self.sources
                .iter()
                .map(|&src| (src, self.bfs(src)))
                .collect()
        })
    }

    /// Reachable set for one node, or `None` if the node never appeared in
    /// the edge list.
    pub fn top_of(&self, node: usize) -> Option<&[usize]> {
        self.top().get(&node).map(|v| v.as_slice())
    }

    /// Lazy `(from, to)` pair generator over the reachable sets, restricted
    /// to the given sources (all nodes when `None`). Restartable per call;
    /// the underlying sets are computed only once.
    pub fn pairs<'a>(
        &'a self,
        nodes: Option<&'a [usize]>,
    ) -> impl Iterator<Item = (usize, usize)> + 'a {
        let reachable = self.top();
        let sources: Vec<usize> = match nodes {
            Some(ns) => ns.to_vec(),
            None => self.sources.clone(),
        };
        sources.into_iter().flat_map(move |from| {
            reachable
                .get(&from)
                .map(|tos| tos.as_slice())
                .unwrap_or(&[])
                .iter()
                .map(move |&to| (from, to))
        })
    }

    fn bfs(&self, source: usize) -> Vec<usize> {
        let mut visited: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        visited.insert(source, 0);
        queue.push_back(source);
        while let Some(node) = queue.pop_front() {
            let dist = visited[&node];
            if dist == self.depth {
                continue;
            }
            if let Some(nbrs) = self.successors.get(&node) {
                for &next in nbrs {
                    visited.entry(next).or_insert_with(|| {
                        queue.push_back(next);
                        dist + 1
                    });
                }
            }
        }
        let mut result: Vec<usize> = visited.into_keys().collect();
        result.sort_unstable();
        result
    }
}
