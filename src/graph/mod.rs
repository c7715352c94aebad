//! Code graph module — the structural backbone of sextant.
//!
//! Provides the data model, the adjacency index, traversal queries,
//! ranking/search, and budget-constrained context selection.

pub mod context;
pub mod index;
pub mod rank;
pub mod traverse;
pub mod types;

pub use context::{smart_context, ContextItem, ContextReport, Relevance};
pub use index::GraphIndex;
pub use rank::{
    clusters, fuzzy_search, hotspots, temporal_coupling, Cluster, CoupledEntity, CouplingReport,
    Hotspot, SearchHit, SearchReport,
};
pub use traverse::{blast_radius, callees, callers, cycles, BlastReport, CycleReport, Neighbor};
pub use types::{
    Edge, Entity, EntityKey, EntityKind, KeyHash, Language, LineRange, Origin, RelationKind,
};
