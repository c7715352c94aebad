//! Durable snapshot persistence.
//!
//! One bincode file per data directory. Writes go to a temp file first and
//! are renamed over the live file, so a crashed or failed indexing run
//! leaves the last committed snapshot intact. The adjacency index is
//! derived state and is rebuilt on load, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::Snapshot;
use crate::error::Result;
use crate::graph::types::{Edge, Entity, KeyHash};

/// File name of the committed snapshot inside the data directory.
pub const SNAPSHOT_FILE: &str = "snapshot.bin";
const SNAPSHOT_TMP: &str = "snapshot.bin.tmp";

/// On-disk form of a snapshot: entities and edges only.
#[derive(Serialize, Deserialize)]
struct SnapshotRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    entities: Vec<Entity>,
    edges: Vec<Edge>,
}

/// Persist a snapshot atomically into `dir`.
pub fn save(snapshot: &Snapshot, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let record = SnapshotRecord {
        id: snapshot.id(),
        created_at: snapshot.created_at(),
        entities: snapshot.entities().cloned().collect(),
        edges: snapshot.edges().to_vec(),
    };
    let bytes = bincode::serialize(&record)?;

    let tmp = dir.join(SNAPSHOT_TMP);
    let live = dir.join(SNAPSHOT_FILE);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, &live)?;

    info!(
        path = %live.display(),
        entities = snapshot.entity_count(),
        edges = snapshot.edge_count(),
        "snapshot persisted"
    );
    Ok(live)
}

/// Load the committed snapshot from `dir`, if one exists.
pub fn load(dir: &Path) -> Result<Option<Snapshot>> {
    let path = dir.join(SNAPSHOT_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(&path)?;
    let record: SnapshotRecord = bincode::deserialize(&bytes)?;
    debug!(path = %path.display(), "snapshot file read");

    let entities: HashMap<KeyHash, Entity> = record
        .entities
        .into_iter()
        .map(|entity| (entity.key().stable_hash(), entity))
        .collect();
    let snapshot = Snapshot::assemble(record.id, record.created_at, entities, record.edges)?;
    Ok(Some(snapshot))
}
