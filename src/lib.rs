//! # Sextant
//!
//! Dependency-graph intelligence for codebases.
//!
//! Sextant ingests entity/edge records produced by an external extractor,
//! commits them into an immutable snapshot, and answers graph-algorithmic
//! queries over that snapshot: impact (blast radius), cycle detection,
//! coupling hotspots, fuzzy search, semantic clusters, and token-budgeted
//! context selection for AI clients.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sextant::{api, Config, GraphService, SnapshotBuilder};
//!
//! // Commit an indexing run into a snapshot.
//! let mut builder = SnapshotBuilder::new();
//! // builder.put_entities(...); builder.put_edges(...);
//! let snapshot = builder.commit().unwrap();
//!
//! // Serve queries against it.
//! let service = GraphService::new(snapshot);
//! let config = Config::default();
//! let response = api::dispatch(
//!     &service.snapshot(),
//!     &config,
//!     "overview",
//!     &serde_json::json!({}),
//! );
//! assert!(response.success);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod graph;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use graph::{
    Edge, Entity, EntityKey, EntityKind, GraphIndex, Language, LineRange, Origin, RelationKind,
};
pub use service::GraphService;
pub use store::{
    EdgeRecord, EntityRecord, ExtractionBatch, Snapshot, SnapshotBuilder, SnapshotStats,
};
