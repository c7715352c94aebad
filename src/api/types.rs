//! Request/response envelope types for the query API.
//!
//! Every response carries `success`, the echoed `endpoint`, the
//! operation-specific `data` payload, and `tokens` — an estimated cost of
//! the payload for token-limited clients.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Error;
use crate::graph::types::{Entity, EntityKind, Language};

/// An incoming request: one JSON object per line.
#[derive(Debug, Deserialize)]
pub struct ApiRequest {
    pub endpoint: String,
    #[serde(default)]
    pub params: Value,
}

/// The uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub endpoint: String,
    pub data: Value,
    pub tokens: u64,
}

impl ApiResponse {
    pub fn ok(endpoint: &str, data: Value) -> Self {
        let tokens = estimate_value_tokens(&data);
        Self {
            success: true,
            endpoint: endpoint.to_string(),
            data,
            tokens,
        }
    }

    pub fn fail(endpoint: &str, error: &Error) -> Self {
        let data = json!({
            "error": {
                "kind": error.kind(),
                "message": error.to_string(),
            }
        });
        let tokens = estimate_value_tokens(&data);
        Self {
            success: false,
            endpoint: endpoint.to_string(),
            data,
            tokens,
        }
    }
}

/// Estimated token cost of a JSON payload, at roughly four characters per
/// token.
pub fn estimate_value_tokens(value: &Value) -> u64 {
    let serialized = serde_json::to_string(value).map(|s| s.len()).unwrap_or(0);
    (serialized / 4) as u64
}

/// Wire view of one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityView {
    pub key: String,
    pub name: String,
    pub kind: EntityKind,
    pub language: Language,
    pub file_path: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub external: bool,
}

impl From<&Entity> for EntityView {
    fn from(entity: &Entity) -> Self {
        let span = entity.span();
        Self {
            key: entity.key().to_string(),
            name: entity.name.clone(),
            kind: entity.kind,
            language: entity.language,
            file_path: entity.file_path().map(str::to_string),
            line_start: span.map(|s| s.start),
            line_end: span.map(|s| s.end),
            external: entity.is_external(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::LineRange;

    #[test]
    fn test_ok_envelope_counts_tokens() {
        let response = ApiResponse::ok("health", json!({"status": "ok"}));
        assert!(response.success);
        assert_eq!(response.endpoint, "health");
        assert!(response.tokens > 0);
    }

    #[test]
    fn test_fail_envelope_carries_taxonomy() {
        let response = ApiResponse::fail("entity", &Error::NotFound("k".into()));
        assert!(!response.success);
        assert_eq!(response.data["error"]["kind"], "not_found");
        assert!(response.tokens > 0);
    }

    #[test]
    fn test_entity_view_external_has_no_location() {
        let external = Entity::external(Language::Rust, EntityKind::Function, "read");
        let view = EntityView::from(&external);
        assert!(view.external);
        assert!(view.file_path.is_none());
        assert!(view.line_start.is_none());

        let local = Entity::source(
            Language::Rust,
            EntityKind::Function,
            "f",
            "src/lib.rs",
            LineRange::new(3, 9),
        );
        let view = EntityView::from(&local);
        assert!(!view.external);
        assert_eq!(view.file_path.as_deref(), Some("src/lib.rs"));
        assert_eq!(view.line_start, Some(3));
    }
}
