//! Entity/edge store — snapshot building, validation, and read access.
//!
//! Indexing and querying are separate phases: a [`SnapshotBuilder`] collects
//! batched writes and commits them into one immutable [`Snapshot`] (whole
//! index or nothing), after which every operation is read-only. The derived
//! adjacency index is built once at commit and never persisted.

pub mod disk;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::graph::index::GraphIndex;
use crate::graph::types::{
    Edge, Entity, EntityKey, EntityKind, KeyHash, Language, LineRange, Origin,
    EXTERNAL_PATH_TOKEN,
};

// ─── Ingest Wire Records ────────────────────────────────────────

/// One entity as reported by the external extractor.
///
/// The kind is the extractor's raw construct name and is normalized on
/// ingest. A missing path (or the `unknown` sentinel with a 0-0 span)
/// marks an external reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub language: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub line_start: u32,
    #[serde(default)]
    pub line_end: u32,
}

impl EntityRecord {
    /// Convert a wire record into a model entity.
    pub fn into_entity(self) -> Result<Entity> {
        let language: Language = self.language.parse()?;
        let kind = EntityKind::normalize(language, &self.kind).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "unknown {} construct: {}",
                language, self.kind
            ))
        })?;

        let origin = match self.file_path {
            Some(path)
                if !path.is_empty()
                    && !(path == EXTERNAL_PATH_TOKEN
                        && self.line_start == 0
                        && self.line_end == 0) =>
            {
                Origin::Source {
                    file_path: normalize_rel_path(&path),
                    span: LineRange::new(self.line_start, self.line_end),
                }
            }
            _ => Origin::External,
        };

        Ok(Entity {
            language,
            kind,
            name: self.name,
            origin,
        })
    }
}

/// One edge as reported by the external extractor; endpoints are formatted
/// entity keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl EdgeRecord {
    pub fn into_edge(self) -> Result<Edge> {
        Ok(Edge {
            source: EntityKey::parse(&self.source)?,
            target: EntityKey::parse(&self.target)?,
            relation: self.relation.parse()?,
        })
    }
}

/// One batch of records from a single extractor run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionBatch {
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

/// Normalize extractor paths: forward slashes, no leading `./`.
fn normalize_rel_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}

// ─── Snapshot Builder ───────────────────────────────────────────

/// Accumulates batched writes for one indexing run.
///
/// Nothing is observable until [`SnapshotBuilder::commit`] succeeds; a
/// validation failure discards the whole run.
#[derive(Default)]
pub struct SnapshotBuilder {
    entities: HashMap<KeyHash, Entity>,
    edges: Vec<Edge>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a batch of entities. Re-putting a key replaces the entity.
    pub fn put_entities(&mut self, batch: Vec<Entity>) {
        let hashed: Vec<(KeyHash, Entity)> = batch
            .into_par_iter()
            .map(|entity| (entity.key().stable_hash(), entity))
            .collect();
        for (hash, entity) in hashed {
            self.entities.insert(hash, entity);
        }
    }

    /// Stage a batch of edges.
    pub fn put_edges(&mut self, batch: Vec<Edge>) {
        self.edges.extend(batch);
    }

    /// Stage one extractor batch, converting wire records into the model.
    pub fn ingest_batch(&mut self, batch: ExtractionBatch) -> Result<()> {
        let entities: Vec<Entity> = batch
            .entities
            .into_iter()
            .map(EntityRecord::into_entity)
            .collect::<Result<_>>()?;
        let edges: Vec<Edge> = batch
            .edges
            .into_iter()
            .map(EdgeRecord::into_edge)
            .collect::<Result<_>>()?;
        debug!(
            entities = entities.len(),
            edges = edges.len(),
            "staging extraction batch"
        );
        self.put_entities(entities);
        self.put_edges(edges);
        Ok(())
    }

    /// Validate and seal the staged data into an immutable snapshot.
    pub fn commit(self) -> Result<Snapshot> {
        let snapshot = Snapshot::assemble(Uuid::new_v4(), Utc::now(), self.entities, self.edges)?;
        info!(
            snapshot = %snapshot.id(),
            entities = snapshot.entity_count(),
            edges = snapshot.edge_count(),
            "snapshot committed"
        );
        Ok(snapshot)
    }
}

// ─── Snapshot ───────────────────────────────────────────────────

/// One immutable, versioned build of the entity/edge graph.
#[derive(Debug)]
pub struct Snapshot {
    id: Uuid,
    created_at: DateTime<Utc>,
    entities: HashMap<KeyHash, Entity>,
    edges: Vec<Edge>,
    index: GraphIndex,
}

impl Snapshot {
    /// An empty snapshot, used before any index run has committed.
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            entities: HashMap::new(),
            edges: Vec::new(),
            index: GraphIndex::build(std::iter::empty(), std::iter::empty()),
        }
    }

    /// Assemble a snapshot from parts, enforcing the edge-endpoint
    /// invariant and building the adjacency index.
    pub(crate) fn assemble(
        id: Uuid,
        created_at: DateTime<Utc>,
        entities: HashMap<KeyHash, Entity>,
        edges: Vec<Edge>,
    ) -> Result<Self> {
        for edge in &edges {
            for key in [&edge.source, &edge.target] {
                let hash = key.stable_hash();
                match entities.get(&hash) {
                    Some(entity) if &entity.key() == key => {}
                    _ => {
                        return Err(Error::Storage(format!(
                            "edge references entity missing from snapshot: {}",
                            key
                        )))
                    }
                }
            }
        }

        let index = GraphIndex::build(
            entities.keys().copied(),
            edges
                .iter()
                .map(|e| (e.source.stable_hash(), e.target.stable_hash(), e.relation)),
        );

        Ok(Self {
            id,
            created_at,
            entities,
            edges,
            index,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Look up an entity by key.
    pub fn entity(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities
            .get(&key.stable_hash())
            .filter(|entity| &entity.key() == key)
    }

    /// Look up an entity by key, failing with `NotFound` when absent.
    pub fn require(&self, key: &EntityKey) -> Result<&Entity> {
        self.entity(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// Resolve a key to its hash handle, failing with `NotFound`.
    pub fn resolve(&self, key: &EntityKey) -> Result<KeyHash> {
        let hash = key.stable_hash();
        match self.entities.get(&hash) {
            Some(entity) if &entity.key() == key => Ok(hash),
            _ => Err(Error::NotFound(key.to_string())),
        }
    }

    /// Internal lookup by pre-resolved hash.
    pub(crate) fn entity_by_hash(&self, hash: KeyHash) -> Option<&Entity> {
        self.entities.get(&hash)
    }

    /// Iterate all entities (unspecified order).
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Iterate (hash, entity) pairs (unspecified order).
    pub(crate) fn entries(&self) -> impl Iterator<Item = (KeyHash, &Entity)> {
        self.entities.iter().map(|(h, e)| (*h, e))
    }

    /// List entities matching the optional filters, in lexical key order.
    pub fn entities_filtered(
        &self,
        kind: Option<EntityKind>,
        language: Option<Language>,
    ) -> Vec<&Entity> {
        let mut matched: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .filter(|e| language.map_or(true, |l| e.language == l))
            .collect();
        matched.sort_by_key(|e| e.key().to_string());
        matched
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Whole-snapshot statistics for the overview operation.
    pub fn stats(&self) -> SnapshotStats {
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_language: BTreeMap<String, usize> = BTreeMap::new();
        let mut external_count = 0;

        for entity in self.entities.values() {
            *by_kind.entry(entity.kind.to_string()).or_default() += 1;
            *by_language.entry(entity.language.to_string()).or_default() += 1;
            if entity.is_external() {
                external_count += 1;
            }
        }

        SnapshotStats {
            snapshot_id: self.id.to_string(),
            created_at: self.created_at.to_rfc3339(),
            entity_count: self.entities.len(),
            edge_count: self.edges.len(),
            external_count,
            by_kind,
            by_language,
        }
    }
}

/// Statistics about one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub snapshot_id: String,
    pub created_at: String,
    pub entity_count: usize,
    pub edge_count: usize,
    pub external_count: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub by_language: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::RelationKind;

    fn entity(name: &str, file: &str, line: u32) -> Entity {
        Entity::source(
            Language::Rust,
            EntityKind::Function,
            name,
            file,
            LineRange::new(line, line + 5),
        )
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::empty();
        assert_eq!(snapshot.entity_count(), 0);
        assert_eq!(snapshot.edge_count(), 0);
        assert_eq!(snapshot.stats().external_count, 0);
    }

    #[test]
    fn test_commit_and_lookup() {
        let a = entity("alpha", "src/a.rs", 1);
        let b = entity("beta", "src/b.rs", 1);
        let mut builder = SnapshotBuilder::new();
        builder.put_entities(vec![a.clone(), b.clone()]);
        builder.put_edges(vec![Edge::new(a.key(), b.key(), RelationKind::Calls)]);
        let snapshot = builder.commit().unwrap();

        assert_eq!(snapshot.entity_count(), 2);
        assert_eq!(snapshot.edge_count(), 1);
        assert_eq!(snapshot.require(&a.key()).unwrap().name, "alpha");
        assert!(snapshot.entity(&entity("gone", "src/c.rs", 1).key()).is_none());
    }

    #[test]
    fn test_commit_rejects_dangling_edge() {
        let a = entity("alpha", "src/a.rs", 1);
        let ghost = entity("ghost", "src/g.rs", 1);
        let mut builder = SnapshotBuilder::new();
        builder.put_entities(vec![a.clone()]);
        builder.put_edges(vec![Edge::new(a.key(), ghost.key(), RelationKind::Calls)]);

        let err = builder.commit().unwrap_err();
        assert_eq!(err.kind(), "storage");
    }

    #[test]
    fn test_reput_same_key_replaces() {
        let mut builder = SnapshotBuilder::new();
        builder.put_entities(vec![entity("alpha", "src/a.rs", 1)]);
        builder.put_entities(vec![entity("alpha", "src/a.rs", 1)]);
        let snapshot = builder.commit().unwrap();
        assert_eq!(snapshot.entity_count(), 1);
    }

    #[test]
    fn test_filtered_listing_sorted() {
        let mut builder = SnapshotBuilder::new();
        builder.put_entities(vec![
            entity("zeta", "src/z.rs", 1),
            entity("alpha", "src/a.rs", 1),
            Entity::source(
                Language::Python,
                EntityKind::Class,
                "Service",
                "app/service.py",
                LineRange::new(1, 40),
            ),
        ]);
        let snapshot = builder.commit().unwrap();

        let functions = snapshot.entities_filtered(Some(EntityKind::Function), None);
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0].name, "alpha");

        let python = snapshot.entities_filtered(None, Some(Language::Python));
        assert_eq!(python.len(), 1);
        assert_eq!(python[0].name, "Service");

        let none = snapshot.entities_filtered(Some(EntityKind::Trait), None);
        assert!(none.is_empty());
    }

    #[test]
    fn test_ingest_batch_normalizes_records() {
        let batch = ExtractionBatch {
            entities: vec![
                EntityRecord {
                    language: "rust".into(),
                    kind: "fn".into(),
                    name: "main".into(),
                    file_path: Some("./src\\main.rs".into()),
                    line_start: 1,
                    line_end: 10,
                },
                EntityRecord {
                    language: "rust".into(),
                    kind: "function".into(),
                    name: "println".into(),
                    file_path: None,
                    line_start: 0,
                    line_end: 0,
                },
            ],
            edges: vec![EdgeRecord {
                source: "rust:function:main:src_main.rs:1-10".into(),
                target: "rust:function:println:unknown:0-0".into(),
                relation: "calls".into(),
            }],
        };

        let mut builder = SnapshotBuilder::new();
        builder.ingest_batch(batch).unwrap();
        let snapshot = builder.commit().unwrap();

        assert_eq!(snapshot.entity_count(), 2);
        let main = snapshot
            .entity(&EntityKey::parse("rust:function:main:src_main.rs:1-10").unwrap())
            .unwrap();
        assert_eq!(main.file_path(), Some("src/main.rs"));
        assert_eq!(snapshot.stats().external_count, 1);
    }

    #[test]
    fn test_ingest_rejects_unknown_language() {
        let batch = ExtractionBatch {
            entities: vec![EntityRecord {
                language: "cobol".into(),
                kind: "function".into(),
                name: "x".into(),
                file_path: None,
                line_start: 0,
                line_end: 0,
            }],
            edges: vec![],
        };
        let mut builder = SnapshotBuilder::new();
        assert!(builder.ingest_batch(batch).is_err());
    }

    #[test]
    fn test_stats_breakdowns() {
        let mut builder = SnapshotBuilder::new();
        builder.put_entities(vec![
            entity("a", "src/a.rs", 1),
            Entity::external(Language::Rust, EntityKind::Function, "read"),
            Entity::source(
                Language::Go,
                EntityKind::Struct,
                "Server",
                "pkg/server.go",
                LineRange::new(3, 30),
            ),
        ]);
        let stats = builder.commit().unwrap().stats();
        assert_eq!(stats.entity_count, 3);
        assert_eq!(stats.external_count, 1);
        assert_eq!(stats.by_kind.get("function"), Some(&2));
        assert_eq!(stats.by_language.get("go"), Some(&1));
    }
}
