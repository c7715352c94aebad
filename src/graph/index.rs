//! In-memory adjacency index over one snapshot's edge list.
//!
//! Uses petgraph to store the directed multigraph and a side map from key
//! hashes to node indices for O(1) average single-hop lookup in either
//! direction. The index is derived state: built once per snapshot in O(E),
//! rebuilt wholesale on snapshot change, never mutated incrementally.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use super::types::{KeyHash, RelationKind};

/// Forward and reverse adjacency over entity key hashes.
#[derive(Debug)]
pub struct GraphIndex {
    graph: DiGraph<KeyHash, RelationKind>,
    nodes: HashMap<KeyHash, NodeIndex>,
}

impl GraphIndex {
    /// Build the index from the full node and edge sets of a snapshot.
    ///
    /// Edge endpoints must already be validated against the entity set.
    pub fn build(
        entities: impl Iterator<Item = KeyHash>,
        edges: impl Iterator<Item = (KeyHash, KeyHash, RelationKind)>,
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for hash in entities {
            let idx = graph.add_node(hash);
            nodes.insert(hash, idx);
        }
        for (source, target, relation) in edges {
            if let (Some(&s), Some(&t)) = (nodes.get(&source), nodes.get(&target)) {
                graph.add_edge(s, t, relation);
            }
        }

        Self { graph, nodes }
    }

    pub fn contains(&self, hash: KeyHash) -> bool {
        self.nodes.contains_key(&hash)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Forward neighbors: entities this one points at.
    pub fn neighbors_out(&self, hash: KeyHash) -> Vec<(KeyHash, RelationKind)> {
        self.neighbors(hash, Direction::Outgoing)
    }

    /// Reverse neighbors: entities pointing at this one.
    pub fn neighbors_in(&self, hash: KeyHash) -> Vec<(KeyHash, RelationKind)> {
        self.neighbors(hash, Direction::Incoming)
    }

    fn neighbors(&self, hash: KeyHash, direction: Direction) -> Vec<(KeyHash, RelationKind)> {
        let Some(&idx) = self.nodes.get(&hash) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (self.graph[other], *edge.weight())
            })
            .collect()
    }

    /// Inbound edge count, the "total coupling" used for hotspot ranking.
    pub fn in_degree(&self, hash: KeyHash) -> usize {
        self.nodes
            .get(&hash)
            .map(|&idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .unwrap_or(0)
    }

    /// Outbound edge count.
    pub fn out_degree(&self, hash: KeyHash) -> usize {
        self.nodes
            .get(&hash)
            .map(|&idx| self.graph.edges_directed(idx, Direction::Outgoing).count())
            .unwrap_or(0)
    }

    /// Whether the entity has an edge to itself.
    pub fn has_self_loop(&self, hash: KeyHash) -> bool {
        self.nodes
            .get(&hash)
            .map(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Outgoing)
                    .any(|e| e.target() == idx)
            })
            .unwrap_or(false)
    }

    /// Strongly-connected components over the whole graph, as key hashes.
    pub fn strongly_connected_components(&self) -> Vec<Vec<KeyHash>> {
        petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .map(|component| component.into_iter().map(|idx| self.graph[idx]).collect())
            .collect()
    }
}
