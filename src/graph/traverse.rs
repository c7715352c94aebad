//! Traversal queries over one snapshot.
//!
//! Single-hop caller/callee lookups, multi-hop blast-radius expansion, and
//! whole-snapshot cycle detection. Impact ("what breaks if X changes")
//! traverses reverse edges: the callers of X, transitively.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::types::{EntityKey, EntityKind, KeyHash, Language, RelationKind};
use crate::error::Result;
use crate::store::Snapshot;

/// Representative keys listed per hop in a blast-radius breakdown.
const MAX_HOP_SAMPLE: usize = 10;

/// One adjacent entity in a single-hop query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neighbor {
    pub key: String,
    pub name: String,
    pub kind: EntityKind,
    pub language: Language,
    pub relation: RelationKind,
    pub external: bool,
}

/// Entities that point at the given one (reverse single hop).
///
/// Fails with `NotFound` when the key is absent; an entity with no inbound
/// edges yields an empty list.
pub fn callers(snapshot: &Snapshot, key: &EntityKey) -> Result<Vec<Neighbor>> {
    let hash = snapshot.resolve(key)?;
    Ok(collect_neighbors(
        snapshot,
        snapshot.index().neighbors_in(hash),
    ))
}

/// Entities the given one points at (forward single hop).
pub fn callees(snapshot: &Snapshot, key: &EntityKey) -> Result<Vec<Neighbor>> {
    let hash = snapshot.resolve(key)?;
    Ok(collect_neighbors(
        snapshot,
        snapshot.index().neighbors_out(hash),
    ))
}

fn collect_neighbors(
    snapshot: &Snapshot,
    adjacent: Vec<(KeyHash, RelationKind)>,
) -> Vec<Neighbor> {
    let mut neighbors: Vec<Neighbor> = adjacent
        .into_iter()
        .filter_map(|(hash, relation)| {
            snapshot.entity_by_hash(hash).map(|entity| Neighbor {
                key: entity.key().to_string(),
                name: entity.name.clone(),
                kind: entity.kind,
                language: entity.language,
                relation,
                external: entity.is_external(),
            })
        })
        .collect();
    neighbors.sort_by(|a, b| a.key.cmp(&b.key).then(a.relation.cmp(&b.relation)));
    neighbors
}

/// Per-hop slice of a blast-radius expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopBreakdown {
    pub hop: usize,
    pub count: usize,
    /// Up to [`MAX_HOP_SAMPLE`] representative keys, lexically ordered.
    pub sample: Vec<String>,
}

/// Result of an N-hop impact query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlastReport {
    pub entity: String,
    pub hops_requested: usize,
    pub total_affected: usize,
    pub by_hop: Vec<HopBreakdown>,
}

/// Breadth-first reverse expansion from `key`, hop by hop.
///
/// Each hop strictly increases distance by one; an entity reached at an
/// earlier hop is never re-counted later. `hops == 0` yields the empty
/// report.
pub fn blast_radius(snapshot: &Snapshot, key: &EntityKey, hops: usize) -> Result<BlastReport> {
    let origin = snapshot.resolve(key)?;

    let mut visited: HashSet<_> = HashSet::new();
    visited.insert(origin);
    let mut frontier = vec![origin];
    let mut by_hop = Vec::new();
    let mut total_affected = 0;

    for hop in 1..=hops {
        let mut next = Vec::new();
        for &hash in &frontier {
            for (neighbor, _) in snapshot.index().neighbors_in(hash) {
                if visited.insert(neighbor) {
                    next.push(neighbor);
                }
            }
        }
        if next.is_empty() {
            break;
        }

        total_affected += next.len();
        let mut sample: Vec<String> = next
            .iter()
            .filter_map(|h| snapshot.entity_by_hash(*h))
            .map(|e| e.key().to_string())
            .collect();
        sample.sort();
        sample.truncate(MAX_HOP_SAMPLE);
        by_hop.push(HopBreakdown {
            hop,
            count: next.len(),
            sample,
        });
        frontier = next;
    }

    Ok(BlastReport {
        entity: key.to_string(),
        hops_requested: hops,
        total_affected,
        by_hop,
    })
}

/// Result of whole-snapshot cycle detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub has_cycles: bool,
    pub cycle_count: usize,
    /// Members of each cycle, lexically ordered within and across cycles.
    pub cycles: Vec<Vec<String>>,
}

/// Detect cycles over the full directed graph.
///
/// Any strongly-connected component of size > 1, or any self-loop, is a
/// cycle. Whole-snapshot operation: the graph may legally contain cycles;
/// they are reported, not rejected.
pub fn cycles(snapshot: &Snapshot) -> CycleReport {
    let index = snapshot.index();
    let mut cycles = Vec::new();

    for component in index.strongly_connected_components() {
        let is_cycle = component.len() > 1
            || (component.len() == 1 && index.has_self_loop(component[0]));
        if !is_cycle {
            continue;
        }
        let mut members: Vec<String> = component
            .iter()
            .filter_map(|h| snapshot.entity_by_hash(*h))
            .map(|e| e.key().to_string())
            .collect();
        members.sort();
        cycles.push(members);
    }
    cycles.sort();

    CycleReport {
        has_cycles: !cycles.is_empty(),
        cycle_count: cycles.len(),
        cycles,
    }
}
