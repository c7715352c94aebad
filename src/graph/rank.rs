//! Ranking and search over one snapshot.
//!
//! Connectivity-based hotspot ranking, fuzzy name search, deterministic
//! semantic clustering, and the shared-caller coupling query.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::types::{EntityKey, EntityKind, KeyHash, Language};
use crate::error::Result;
use crate::store::Snapshot;

/// Score bonus for an exact name match.
const EXACT_BONUS: i64 = 1_000;
/// Score bonus for a case-insensitive prefix match.
const PREFIX_BONUS: i64 = 500;

// ─── Hotspots ───────────────────────────────────────────────────

/// An entity ranked by inbound coupling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub key: String,
    pub name: String,
    pub kind: EntityKind,
    pub language: Language,
    /// Total inbound edge count.
    pub inbound: usize,
    /// Sentinel entities surface heavy reliance on an external symbol and
    /// must stay distinguishable from in-repository code.
    pub external: bool,
}

/// Rank entities by in-degree, ties broken by lexical key order.
pub fn hotspots(snapshot: &Snapshot, top: usize) -> Vec<Hotspot> {
    let mut ranked: Vec<Hotspot> = snapshot
        .entries()
        .map(|(hash, entity)| Hotspot {
            key: entity.key().to_string(),
            name: entity.name.clone(),
            kind: entity.kind,
            language: entity.language,
            inbound: snapshot.index().in_degree(hash),
            external: entity.is_external(),
        })
        .collect();
    ranked.sort_by(|a, b| b.inbound.cmp(&a.inbound).then_with(|| a.key.cmp(&b.key)));
    ranked.truncate(top);
    ranked
}

// ─── Fuzzy Search ───────────────────────────────────────────────

/// One fuzzy search match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    pub name: String,
    pub kind: EntityKind,
    pub language: Language,
    pub score: i64,
    pub external: bool,
}

/// Fuzzy search result; `total_matches` counts every match, independent of
/// the returned page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub query: String,
    pub total_matches: usize,
    pub results: Vec<SearchHit>,
}

/// Match entity names against `query`, best matches first.
///
/// Exact matches outrank prefix matches, which outrank plain subsequence
/// matches.
pub fn fuzzy_search(snapshot: &Snapshot, query: &str, page_size: usize) -> SearchReport {
    if query.is_empty() {
        return SearchReport {
            query: String::new(),
            total_matches: 0,
            results: Vec::new(),
        };
    }

    let matcher = SkimMatcherV2::default();
    let query_lower = query.to_lowercase();

    let mut hits: Vec<SearchHit> = snapshot
        .entities()
        .filter_map(|entity| {
            let base = matcher.fuzzy_match(&entity.name, query)?;
            let mut score = base;
            if entity.name == query {
                score += EXACT_BONUS;
            } else if entity.name.to_lowercase().starts_with(&query_lower) {
                score += PREFIX_BONUS;
            }
            Some(SearchHit {
                key: entity.key().to_string(),
                name: entity.name.clone(),
                kind: entity.kind,
                language: entity.language,
                score,
                external: entity.is_external(),
            })
        })
        .collect();

    hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.key.cmp(&b.key)));
    let total_matches = hits.len();
    hits.truncate(page_size);

    SearchReport {
        query: query.to_string(),
        total_matches,
        results: hits,
    }
}

// ─── Semantic Clusters ──────────────────────────────────────────

/// A group of entities bound by language/module proximity and edge density.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub label: String,
    pub size: usize,
    pub members: Vec<String>,
    pub internal_edges: usize,
    pub density: f32,
}

/// Cluster entities by (language, module directory), merging seed groups
/// whose mutual edge density reaches `density_threshold`.
///
/// Deterministic for a given snapshot and threshold. External entities
/// carry no location and are not cluster members.
pub fn clusters(snapshot: &Snapshot, density_threshold: f32) -> Vec<Cluster> {
    // Seed one group per (language, containing directory), sorted.
    let mut seeds: BTreeMap<(String, String), Vec<KeyHash>> = BTreeMap::new();
    for (hash, entity) in snapshot.entries() {
        let Some(path) = entity.file_path() else {
            continue;
        };
        let module = match path.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => ".".to_string(),
        };
        seeds
            .entry((entity.language.to_string(), module))
            .or_default()
            .push(hash);
    }

    let labels: Vec<String> = seeds
        .keys()
        .map(|(language, module)| format!("{}:{}", language, module))
        .collect();
    let sizes: Vec<usize> = seeds.values().map(Vec::len).collect();
    let mut seed_of: HashMap<KeyHash, usize> = HashMap::new();
    for (seed, members) in seeds.values().enumerate() {
        for &hash in members {
            seed_of.insert(hash, seed);
        }
    }

    // Count edges crossing seed boundaries (either direction).
    let mut cross: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for edge in snapshot.edges() {
        let (Some(&a), Some(&b)) = (
            seed_of.get(&edge.source.stable_hash()),
            seed_of.get(&edge.target.stable_hash()),
        ) else {
            continue;
        };
        if a != b {
            *cross.entry((a.min(b), a.max(b))).or_default() += 1;
        }
    }

    // Merge seed pairs whose mutual density clears the threshold.
    let mut parent: Vec<usize> = (0..seeds.len()).collect();
    for (&(a, b), &count) in &cross {
        let density = count as f32 / (sizes[a] * sizes[b]) as f32;
        if density >= density_threshold {
            let (ra, rb) = (find(&mut parent, a), find(&mut parent, b));
            if ra != rb {
                parent[ra.max(rb)] = ra.min(rb);
            }
        }
    }

    // Collect merged groups keyed by their root seed.
    let mut groups: BTreeMap<usize, Vec<KeyHash>> = BTreeMap::new();
    for (seed, members) in seeds.values().enumerate() {
        let root = find(&mut parent, seed);
        groups.entry(root).or_default().extend(members.iter().copied());
    }

    let mut clusters: Vec<Cluster> = groups
        .into_iter()
        .map(|(root, members)| {
            let member_set: HashSet<KeyHash> = members.iter().copied().collect();
            let internal_edges = snapshot
                .edges()
                .iter()
                .filter(|e| {
                    member_set.contains(&e.source.stable_hash())
                        && member_set.contains(&e.target.stable_hash())
                })
                .count();
            let n = members.len();
            let density = if n > 1 {
                internal_edges as f32 / (n * (n - 1)) as f32
            } else {
                0.0
            };
            let mut keys: Vec<String> = members
                .iter()
                .filter_map(|h| snapshot.entity_by_hash(*h))
                .map(|e| e.key().to_string())
                .collect();
            keys.sort();
            Cluster {
                id: 0,
                label: labels[root].clone(),
                size: n,
                members: keys,
                internal_edges,
                density,
            }
        })
        .collect();

    clusters.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.label.cmp(&b.label)));
    for (id, cluster) in clusters.iter_mut().enumerate() {
        cluster.id = id;
    }
    clusters
}

fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

// ─── Temporal Coupling ──────────────────────────────────────────

/// An entity that tends to be referenced by the same callers as the focus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoupledEntity {
    pub key: String,
    pub name: String,
    pub shared_callers: usize,
    /// Jaccard similarity of the two caller sets.
    pub score: f32,
}

/// Shared-caller coupling report for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouplingReport {
    pub entity: String,
    pub coupled: Vec<CoupledEntity>,
}

/// Rank entities by overlap between their caller set and the focus
/// entity's caller set, a static proxy for change coupling.
pub fn temporal_coupling(
    snapshot: &Snapshot,
    key: &EntityKey,
    limit: usize,
) -> Result<CouplingReport> {
    let origin = snapshot.resolve(key)?;

    let focus_callers: HashSet<KeyHash> = snapshot
        .index()
        .neighbors_in(origin)
        .into_iter()
        .map(|(h, _)| h)
        .collect();

    let mut shared: HashMap<KeyHash, usize> = HashMap::new();
    for &caller in &focus_callers {
        let targets: HashSet<KeyHash> = snapshot
            .index()
            .neighbors_out(caller)
            .into_iter()
            .map(|(h, _)| h)
            .collect();
        for target in targets {
            if target != origin {
                *shared.entry(target).or_default() += 1;
            }
        }
    }

    let mut coupled: Vec<CoupledEntity> = shared
        .into_iter()
        .filter_map(|(hash, count)| {
            let entity = snapshot.entity_by_hash(hash)?;
            let their_callers: HashSet<KeyHash> = snapshot
                .index()
                .neighbors_in(hash)
                .into_iter()
                .map(|(h, _)| h)
                .collect();
            let union = focus_callers.union(&their_callers).count();
            if union == 0 {
                return None;
            }
            Some(CoupledEntity {
                key: entity.key().to_string(),
                name: entity.name.clone(),
                shared_callers: count,
                score: count as f32 / union as f32,
            })
        })
        .collect();

    coupled.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.shared_callers.cmp(&a.shared_callers))
            .then_with(|| a.key.cmp(&b.key))
    });
    coupled.truncate(limit);

    Ok(CouplingReport {
        entity: key.to_string(),
        coupled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{Edge, Entity, LineRange, RelationKind};
    use crate::store::SnapshotBuilder;

    fn entity_at(name: &str, path: &str) -> Entity {
        Entity::source(
            Language::Rust,
            EntityKind::Function,
            name,
            path,
            LineRange::new(1, 10),
        )
    }

    fn snapshot_with(entities: Vec<Entity>, edges: Vec<(usize, usize)>) -> Snapshot {
        let keys: Vec<EntityKey> = entities.iter().map(Entity::key).collect();
        let mut builder = SnapshotBuilder::new();
        builder.put_entities(entities);
        builder.put_edges(
            edges
                .into_iter()
                .map(|(s, t)| Edge::new(keys[s].clone(), keys[t].clone(), RelationKind::Calls))
                .collect(),
        );
        builder.commit().unwrap()
    }

    #[test]
    fn test_hotspots_ranked_by_in_degree() {
        // hub gets two inbound, leaf gets one, roots get none.
        let snapshot = snapshot_with(
            vec![
                entity_at("hub", "src/hub.rs"),
                entity_at("leaf", "src/leaf.rs"),
                entity_at("r1", "src/r1.rs"),
                entity_at("r2", "src/r2.rs"),
            ],
            vec![(2, 0), (3, 0), (0, 1)],
        );
        let top = hotspots(&snapshot, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "hub");
        assert_eq!(top[0].inbound, 2);
        assert_eq!(top[1].name, "leaf");
    }

    #[test]
    fn test_hotspots_ties_broken_lexically_and_stable() {
        let snapshot = snapshot_with(
            vec![
                entity_at("bb", "src/bb.rs"),
                entity_at("aa", "src/aa.rs"),
                entity_at("root", "src/root.rs"),
            ],
            vec![(2, 0), (2, 1)],
        );
        let first = hotspots(&snapshot, 3);
        let second = hotspots(&snapshot, 3);
        assert_eq!(first[0].name, "aa");
        assert_eq!(first[1].name, "bb");
        let keys: Vec<_> = first.iter().map(|h| h.key.clone()).collect();
        let again: Vec<_> = second.iter().map(|h| h.key.clone()).collect();
        assert_eq!(keys, again);
    }

    #[test]
    fn test_hotspots_flag_external_entities() {
        let external = Entity::external(Language::Rust, EntityKind::Function, "read");
        let caller = entity_at("caller", "src/c.rs");
        let mut builder = SnapshotBuilder::new();
        builder.put_entities(vec![external.clone(), caller.clone()]);
        builder.put_edges(vec![Edge::new(
            caller.key(),
            external.key(),
            RelationKind::Calls,
        )]);
        let snapshot = builder.commit().unwrap();

        let top = hotspots(&snapshot, 1);
        assert_eq!(top[0].name, "read");
        assert!(top[0].external);
    }

    #[test]
    fn test_fuzzy_search_exact_outranks_fuzzy() {
        let snapshot = snapshot_with(
            vec![
                entity_at("login", "src/a.rs"),
                entity_at("user_login", "src/b.rs"),
                entity_at("logger_init", "src/c.rs"),
            ],
            vec![],
        );
        let report = fuzzy_search(&snapshot, "login", 10);
        assert_eq!(report.results[0].name, "login");
        assert!(report.total_matches >= 2);
    }

    #[test]
    fn test_fuzzy_search_total_independent_of_page() {
        let entities: Vec<Entity> = (0..6)
            .map(|i| entity_at(&format!("handler_{}", i), &format!("src/h{}.rs", i)))
            .collect();
        let snapshot = snapshot_with(entities, vec![]);
        let report = fuzzy_search(&snapshot, "handler", 2);
        assert_eq!(report.total_matches, 6);
        assert_eq!(report.results.len(), 2);
    }

    #[test]
    fn test_fuzzy_search_no_match_is_empty() {
        let snapshot = snapshot_with(vec![entity_at("alpha", "src/a.rs")], vec![]);
        let report = fuzzy_search(&snapshot, "zzzz", 10);
        assert_eq!(report.total_matches, 0);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_clusters_merge_dense_modules() {
        // auth and session exchange enough edges to merge; net stays apart.
        let snapshot = snapshot_with(
            vec![
                entity_at("a1", "auth/a1.rs"),
                entity_at("a2", "auth/a2.rs"),
                entity_at("s1", "session/s1.rs"),
                entity_at("s2", "session/s2.rs"),
                entity_at("n1", "net/n1.rs"),
            ],
            vec![(0, 2), (1, 3), (2, 1), (0, 1)],
        );
        let found = clusters(&snapshot, 0.5);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].size, 4);
        assert_eq!(found[1].size, 1);
        assert_eq!(found[1].label, "rust:net");
    }

    #[test]
    fn test_clusters_below_threshold_stay_apart() {
        let snapshot = snapshot_with(
            vec![
                entity_at("a1", "auth/a1.rs"),
                entity_at("a2", "auth/a2.rs"),
                entity_at("n1", "net/n1.rs"),
                entity_at("n2", "net/n2.rs"),
            ],
            vec![(0, 2)],
        );
        // One edge across 2x2 seeds: density 0.25 < 0.5.
        let found = clusters(&snapshot, 0.5);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_clusters_deterministic() {
        let build = || {
            snapshot_with(
                vec![
                    entity_at("a1", "auth/a1.rs"),
                    entity_at("a2", "auth/a2.rs"),
                    entity_at("n1", "net/n1.rs"),
                ],
                vec![(0, 1), (1, 2)],
            )
        };
        let a = clusters(&build(), 0.3);
        let b = clusters(&build(), 0.3);
        let labels_a: Vec<_> = a.iter().map(|c| (c.label.clone(), c.members.clone())).collect();
        let labels_b: Vec<_> = b.iter().map(|c| (c.label.clone(), c.members.clone())).collect();
        assert_eq!(labels_a, labels_b);
    }

    #[test]
    fn test_clusters_exclude_external_entities() {
        let external = Entity::external(Language::Rust, EntityKind::Function, "read");
        let local = entity_at("caller", "src/c.rs");
        let mut builder = SnapshotBuilder::new();
        builder.put_entities(vec![external.clone(), local.clone()]);
        builder.put_edges(vec![Edge::new(
            local.key(),
            external.key(),
            RelationKind::Calls,
        )]);
        let snapshot = builder.commit().unwrap();

        let found = clusters(&snapshot, 0.1);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].size, 1);
    }

    #[test]
    fn test_temporal_coupling_ranks_shared_callers() {
        // c1 and c2 both call focus and sibling; c3 calls only other.
        let snapshot = snapshot_with(
            vec![
                entity_at("focus", "src/f.rs"),
                entity_at("sibling", "src/s.rs"),
                entity_at("other", "src/o.rs"),
                entity_at("c1", "src/c1.rs"),
                entity_at("c2", "src/c2.rs"),
                entity_at("c3", "src/c3.rs"),
            ],
            vec![(3, 0), (3, 1), (4, 0), (4, 1), (5, 2)],
        );
        let report = temporal_coupling(&snapshot, &entity_at("focus", "src/f.rs").key(), 10)
            .unwrap();
        assert_eq!(report.coupled.len(), 1);
        assert_eq!(report.coupled[0].name, "sibling");
        assert_eq!(report.coupled[0].shared_callers, 2);
        assert!((report.coupled[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_temporal_coupling_missing_entity() {
        let snapshot = snapshot_with(vec![entity_at("a", "src/a.rs")], vec![]);
        let err =
            temporal_coupling(&snapshot, &entity_at("ghost", "src/g.rs").key(), 10).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
