//! Endpoint dispatch — maps named operations onto the graph engine.
//!
//! Stateless with respect to the snapshot: same input, same output. Each
//! handler validates its parameters, runs the query, and the dispatcher
//! wraps the outcome in the response envelope.

use serde::Serialize;
use serde_json::{json, Value};

use super::types::{ApiResponse, EntityView};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::types::{EntityKey, EntityKind, Language};
use crate::graph::{context, rank, traverse};
use crate::store::Snapshot;

/// Route one request to its handler and wrap the result.
pub fn dispatch(snapshot: &Snapshot, config: &Config, endpoint: &str, params: &Value) -> ApiResponse {
    let result = match endpoint {
        "health" => health(),
        "overview" => overview(snapshot),
        "entities" => list_entities(snapshot, params),
        "entity" => entity_detail(snapshot, params),
        "search" => search(snapshot, config, params),
        "edges" => list_edges(snapshot),
        "callers" => callers(snapshot, params),
        "callees" => callees(snapshot, params),
        "blast_radius" => blast_radius(snapshot, params),
        "cycles" => cycles(snapshot),
        "hotspots" => hotspots(snapshot, params),
        "clusters" => clusters(snapshot, config),
        "smart_context" => smart_context(snapshot, params),
        "temporal_coupling" => temporal_coupling(snapshot, config, params),
        other => Err(Error::InvalidParameter(format!(
            "unknown endpoint: {}",
            other
        ))),
    };

    match result {
        Ok(data) => ApiResponse::ok(endpoint, data),
        Err(error) => ApiResponse::fail(endpoint, &error),
    }
}

// ─── Parameter Helpers ──────────────────────────────────────────

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str> {
    params.get(field).and_then(Value::as_str).ok_or_else(|| {
        Error::InvalidParameter(format!("missing required parameter: {}", field))
    })
}

fn require_positive(params: &Value, field: &str) -> Result<u64> {
    let value = params.get(field).ok_or_else(|| {
        Error::InvalidParameter(format!("missing required parameter: {}", field))
    })?;
    match value.as_u64() {
        Some(n) if n > 0 => Ok(n),
        _ => Err(Error::InvalidParameter(format!(
            "{} must be a positive integer",
            field
        ))),
    }
}

fn require_key(params: &Value, field: &str) -> Result<EntityKey> {
    EntityKey::parse(require_str(params, field)?)
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

// ─── Handlers ───────────────────────────────────────────────────

fn health() -> Result<Value> {
    Ok(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn overview(snapshot: &Snapshot) -> Result<Value> {
    Ok(to_value(&snapshot.stats()))
}

fn list_entities(snapshot: &Snapshot, params: &Value) -> Result<Value> {
    let kind = params
        .get("entity_type")
        .and_then(Value::as_str)
        .map(str::parse::<EntityKind>)
        .transpose()?;
    let language = params
        .get("language")
        .and_then(Value::as_str)
        .map(str::parse::<Language>)
        .transpose()?;

    let views: Vec<EntityView> = snapshot
        .entities_filtered(kind, language)
        .into_iter()
        .map(EntityView::from)
        .collect();
    Ok(json!({ "count": views.len(), "entities": views }))
}

fn entity_detail(snapshot: &Snapshot, params: &Value) -> Result<Value> {
    let key = require_key(params, "key")?;
    let entity = snapshot.require(&key)?;
    let hash = snapshot.resolve(&key)?;
    Ok(json!({
        "entity": EntityView::from(entity),
        "inbound": snapshot.index().in_degree(hash),
        "outbound": snapshot.index().out_degree(hash),
    }))
}

fn search(snapshot: &Snapshot, config: &Config, params: &Value) -> Result<Value> {
    let query = require_str(params, "q")?;
    Ok(to_value(&rank::fuzzy_search(
        snapshot,
        query,
        config.search_page_size,
    )))
}

fn list_edges(snapshot: &Snapshot) -> Result<Value> {
    let edges: Vec<Value> = snapshot
        .edges()
        .iter()
        .map(|edge| {
            json!({
                "source": edge.source.to_string(),
                "target": edge.target.to_string(),
                "relation": edge.relation,
            })
        })
        .collect();
    Ok(json!({ "count": edges.len(), "edges": edges }))
}

fn callers(snapshot: &Snapshot, params: &Value) -> Result<Value> {
    let key = require_key(params, "entity")?;
    let callers = traverse::callers(snapshot, &key)?;
    Ok(json!({
        "entity": key.to_string(),
        "count": callers.len(),
        "callers": callers,
    }))
}

fn callees(snapshot: &Snapshot, params: &Value) -> Result<Value> {
    let key = require_key(params, "entity")?;
    let callees = traverse::callees(snapshot, &key)?;
    Ok(json!({
        "entity": key.to_string(),
        "count": callees.len(),
        "callees": callees,
    }))
}

fn blast_radius(snapshot: &Snapshot, params: &Value) -> Result<Value> {
    let key = require_key(params, "entity")?;
    let hops = require_positive(params, "hops")? as usize;
    Ok(to_value(&traverse::blast_radius(snapshot, &key, hops)?))
}

fn cycles(snapshot: &Snapshot) -> Result<Value> {
    Ok(to_value(&traverse::cycles(snapshot)))
}

fn hotspots(snapshot: &Snapshot, params: &Value) -> Result<Value> {
    let top = require_positive(params, "top")? as usize;
    let hotspots = rank::hotspots(snapshot, top);
    Ok(json!({ "count": hotspots.len(), "hotspots": hotspots }))
}

fn clusters(snapshot: &Snapshot, config: &Config) -> Result<Value> {
    let clusters = rank::clusters(snapshot, config.cluster_density_threshold);
    Ok(json!({ "count": clusters.len(), "clusters": clusters }))
}

fn smart_context(snapshot: &Snapshot, params: &Value) -> Result<Value> {
    let key = require_key(params, "focus")?;
    let budget = require_positive(params, "tokens")?;
    let budget = u32::try_from(budget)
        .map_err(|_| Error::InvalidParameter("tokens is out of range".to_string()))?;
    Ok(to_value(&context::smart_context(snapshot, &key, budget)?))
}

fn temporal_coupling(snapshot: &Snapshot, config: &Config, params: &Value) -> Result<Value> {
    let key = require_key(params, "entity")?;
    Ok(to_value(&rank::temporal_coupling(
        snapshot,
        &key,
        config.max_coupled_results,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{Edge, Entity, LineRange, RelationKind};
    use crate::store::SnapshotBuilder;

    fn sample_snapshot() -> Snapshot {
        let main = Entity::source(
            Language::Rust,
            EntityKind::Function,
            "main",
            "src/main.rs",
            LineRange::new(1, 20),
        );
        let login = Entity::source(
            Language::Rust,
            EntityKind::Function,
            "login",
            "src/auth.rs",
            LineRange::new(5, 30),
        );
        let read = Entity::external(Language::Rust, EntityKind::Function, "read");

        let mut builder = SnapshotBuilder::new();
        builder.put_entities(vec![main.clone(), login.clone(), read.clone()]);
        builder.put_edges(vec![
            Edge::new(main.key(), login.key(), RelationKind::Calls),
            Edge::new(login.key(), read.key(), RelationKind::Calls),
        ]);
        builder.commit().unwrap()
    }

    fn call(endpoint: &str, params: Value) -> ApiResponse {
        dispatch(&sample_snapshot(), &Config::default(), endpoint, &params)
    }

    #[test]
    fn test_health_never_fails() {
        let response = call("health", json!({}));
        assert!(response.success);
        assert_eq!(response.data["status"], "ok");
        assert!(response.tokens > 0);
    }

    #[test]
    fn test_overview_reports_counts() {
        let response = call("overview", json!({}));
        assert!(response.success);
        assert_eq!(response.data["entity_count"], 3);
        assert_eq!(response.data["edge_count"], 2);
        assert_eq!(response.data["external_count"], 1);
    }

    #[test]
    fn test_entities_filters() {
        let response = call("entities", json!({"language": "rust"}));
        assert!(response.success);
        assert_eq!(response.data["count"], 3);

        let response = call("entities", json!({"entity_type": "trait"}));
        assert!(response.success);
        assert_eq!(response.data["count"], 0);
    }

    #[test]
    fn test_entities_unknown_filter_is_invalid() {
        let response = call("entities", json!({"language": "cobol"}));
        assert!(!response.success);
        assert_eq!(response.data["error"]["kind"], "invalid_parameter");
    }

    #[test]
    fn test_entity_detail_and_not_found() {
        let response = call("entity", json!({"key": "rust:function:login:src_auth.rs:5-30"}));
        assert!(response.success);
        assert_eq!(response.data["entity"]["name"], "login");
        assert_eq!(response.data["inbound"], 1);
        assert_eq!(response.data["outbound"], 1);

        let response = call("entity", json!({"key": "rust:function:gone:src_x.rs:1-2"}));
        assert!(!response.success);
        assert_eq!(response.data["error"]["kind"], "not_found");
    }

    #[test]
    fn test_entity_malformed_key_is_invalid() {
        let response = call("entity", json!({"key": "not-a-key"}));
        assert!(!response.success);
        assert_eq!(response.data["error"]["kind"], "invalid_parameter");
    }

    #[test]
    fn test_search_empty_result_is_success() {
        let response = call("search", json!({"q": "zzzz"}));
        assert!(response.success);
        assert_eq!(response.data["total_matches"], 0);
    }

    #[test]
    fn test_edges_listing() {
        let response = call("edges", json!({}));
        assert!(response.success);
        assert_eq!(response.data["count"], 2);
    }

    #[test]
    fn test_callers_callees() {
        let response = call("callers", json!({"entity": "rust:function:login:src_auth.rs:5-30"}));
        assert!(response.success);
        assert_eq!(response.data["count"], 1);

        let response = call("callees", json!({"entity": "rust:function:login:src_auth.rs:5-30"}));
        assert!(response.success);
        assert_eq!(response.data["callees"][0]["external"], true);
    }

    #[test]
    fn test_blast_radius_validates_hops() {
        let key = "rust:function:login:src_auth.rs:5-30";

        let response = call("blast_radius", json!({"entity": key, "hops": 2}));
        assert!(response.success);
        assert_eq!(response.data["total_affected"], 1);

        for bad in [json!(0), json!(-3), json!(1.5), json!("two")] {
            let response = call("blast_radius", json!({"entity": key, "hops": bad}));
            assert!(!response.success);
            assert_eq!(response.data["error"]["kind"], "invalid_parameter");
        }
    }

    #[test]
    fn test_hotspots_validates_top() {
        let response = call("hotspots", json!({"top": 2}));
        assert!(response.success);
        assert_eq!(response.data["count"], 2);

        let response = call("hotspots", json!({"top": 0}));
        assert!(!response.success);
        assert_eq!(response.data["error"]["kind"], "invalid_parameter");
    }

    #[test]
    fn test_cycles_and_clusters_run_parameterless() {
        let response = call("cycles", json!({}));
        assert!(response.success);
        assert_eq!(response.data["has_cycles"], false);

        let response = call("clusters", json!({}));
        assert!(response.success);
    }

    #[test]
    fn test_smart_context_envelope() {
        let response = call(
            "smart_context",
            json!({"focus": "rust:function:login:src_auth.rs:5-30", "tokens": 5000}),
        );
        assert!(response.success);
        assert_eq!(response.data["entities_included"], 2);

        let response = call(
            "smart_context",
            json!({"focus": "rust:function:login:src_auth.rs:5-30", "tokens": 0}),
        );
        assert!(!response.success);
    }

    #[test]
    fn test_temporal_coupling_endpoint() {
        let response = call(
            "temporal_coupling",
            json!({"entity": "rust:function:login:src_auth.rs:5-30"}),
        );
        assert!(response.success);

        let response = call("temporal_coupling", json!({"entity": "rust:function:x:unknown:0-0"}));
        assert!(!response.success);
        assert_eq!(response.data["error"]["kind"], "not_found");
    }

    #[test]
    fn test_unknown_endpoint_is_invalid() {
        let response = call("frobnicate", json!({}));
        assert!(!response.success);
        assert_eq!(response.data["error"]["kind"], "invalid_parameter");
    }
}
