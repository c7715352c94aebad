//! Token-budget-constrained context selection around a focus entity.
//!
//! Produces the most relevant related entities that fit a client's token
//! budget. Selection is greedy by score — documented, order-sensitive
//! behavior rather than an exact knapsack.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::types::{Entity, EntityKey, EntityKind, KeyHash, Language};
use crate::error::Result;
use crate::store::Snapshot;

/// Relevance score of a direct caller of the focus.
const DIRECT_CALLER_SCORE: f32 = 1.0;
/// Relevance score of a direct callee of the focus.
const DIRECT_CALLEE_SCORE: f32 = 0.95;
/// Transitive scores never drop below this.
const SCORE_FLOOR: f32 = 0.05;
/// Transitive expansion stops once the score floor is reached.
const MAX_TRANSITIVE_DEPTH: usize = 8;

/// How a context entity relates to the focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    DirectCaller,
    DirectCallee,
    Transitive,
}

/// One accepted context entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub key: String,
    pub name: String,
    pub kind: EntityKind,
    pub language: Language,
    pub relevance: Relevance,
    pub depth: usize,
    pub score: f32,
    pub estimated_tokens: u32,
}

/// Result of a smart-context query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReport {
    pub focus: String,
    pub budget: u32,
    pub tokens_used: u32,
    pub entities_included: usize,
    pub items: Vec<ContextItem>,
}

/// Estimated token cost of shipping one entity to a client,
/// at roughly four characters per token.
pub fn estimate_entity_tokens(entity: &Entity) -> u32 {
    let serialized = serde_json::to_string(entity).map(|s| s.len()).unwrap_or(0);
    (serialized / 4).max(1) as u32
}

fn transitive_score(depth: usize) -> f32 {
    (0.7 - 0.1 * (depth as f32 - 2.0)).max(SCORE_FLOOR)
}

struct Candidate {
    depth: usize,
    score: f32,
    relevance: Relevance,
}

/// Select related entities around `focus` within `budget` tokens.
///
/// Candidates are scored (callers 1.0, callees 0.95, transitive decaying
/// with depth) and accepted greedily in score order; a candidate that would
/// overflow the remaining budget is skipped, not aborting the scan.
pub fn smart_context(snapshot: &Snapshot, focus: &EntityKey, budget: u32) -> Result<ContextReport> {
    let origin = snapshot.resolve(focus)?;
    let index = snapshot.index();

    let mut candidates: HashMap<KeyHash, Candidate> = HashMap::new();
    for (hash, _) in index.neighbors_in(origin) {
        if hash != origin {
            candidates.insert(
                hash,
                Candidate {
                    depth: 1,
                    score: DIRECT_CALLER_SCORE,
                    relevance: Relevance::DirectCaller,
                },
            );
        }
    }
    for (hash, _) in index.neighbors_out(origin) {
        if hash != origin {
            // A direct caller that is also a callee keeps the higher score.
            candidates.entry(hash).or_insert(Candidate {
                depth: 1,
                score: DIRECT_CALLEE_SCORE,
                relevance: Relevance::DirectCallee,
            });
        }
    }

    // Transitive frontier, both directions, nearest depth wins.
    let mut visited: HashSet<KeyHash> = candidates.keys().copied().collect();
    visited.insert(origin);
    let mut frontier: Vec<KeyHash> = candidates.keys().copied().collect();
    for depth in 2..=MAX_TRANSITIVE_DEPTH {
        let mut next = Vec::new();
        for &hash in &frontier {
            let adjacent = index
                .neighbors_in(hash)
                .into_iter()
                .chain(index.neighbors_out(hash));
            for (neighbor, _) in adjacent {
                if neighbor != origin && visited.insert(neighbor) {
                    candidates.insert(
                        neighbor,
                        Candidate {
                            depth,
                            score: transitive_score(depth),
                            relevance: Relevance::Transitive,
                        },
                    );
                    next.push(neighbor);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    // Deterministic greedy order: score, then nearness, then key.
    let mut ordered: Vec<(Candidate, &Entity, String)> = candidates
        .into_iter()
        .filter_map(|(hash, candidate)| {
            let entity = snapshot.entity_by_hash(hash)?;
            let key = entity.key().to_string();
            Some((candidate, entity, key))
        })
        .collect();
    ordered.sort_by(|(a, _, ka), (b, _, kb)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.depth.cmp(&b.depth))
            .then_with(|| ka.cmp(kb))
    });

    let mut tokens_used = 0u32;
    let mut items = Vec::new();
    for (candidate, entity, key) in ordered {
        let cost = estimate_entity_tokens(entity);
        if tokens_used + cost > budget {
            continue;
        }
        tokens_used += cost;
        items.push(ContextItem {
            key,
            name: entity.name.clone(),
            kind: entity.kind,
            language: entity.language,
            relevance: candidate.relevance,
            depth: candidate.depth,
            score: candidate.score,
            estimated_tokens: cost,
        });
    }

    Ok(ContextReport {
        focus: focus.to_string(),
        budget,
        tokens_used,
        entities_included: items.len(),
        items,
    })
}
