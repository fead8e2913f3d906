//! In-process bridge from MCP tool calls to the REST facade.
//!
//! A tool call becomes a `GET` on the REST router. The endpoint's own trace
//! comes back in `X-XRay-Trace` and is merged into the MCP request's
//! collector, so the MCP caller sees the cache activity of the nested call.

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;
use tracing::{debug, warn};

use crate::protocol::{McpErrorCode, McpErrorResponse, ToolResult};
use crate::rest::{ErrorResponse, TRACE_HEADER_NAME};
use crate::trace::SpanCollector;

/// Upper bound on a forwarded response body (16 MiB).
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Encode tool arguments as a query string. Lists are comma-joined,
/// nulls skipped; nested objects are rejected.
pub fn query_string(arguments: &Value) -> Result<String, String> {
    let Some(object) = arguments.as_object() else {
        return Err("arguments must be a JSON object".to_string());
    };

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in object {
        let encoded = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    _ => Err(format!("'{name}' may only list strings")),
                })
                .collect::<Result<Vec<_>, _>>()?
                .join(","),
            Value::Object(_) => return Err(format!("'{name}' must not be an object")),
        };
        query.append_pair(name, &encoded);
    }
    Ok(query.finish())
}

/// Serve one tool call through `api`, merging the endpoint's trace.
pub async fn forward(api: &Router, path: &str, arguments: &Value, trace: &SpanCollector) -> ToolResult {
    let query = match query_string(arguments) {
        Ok(q) => q,
        Err(e) => return McpErrorResponse::new(McpErrorCode::InvalidArguments, e).into(),
    };
    let uri = if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    };

    let request = match Request::builder().method("GET").uri(&uri).body(Body::empty()) {
        Ok(r) => r,
        Err(e) => {
            return McpErrorResponse::new(McpErrorCode::InternalError, format!("bad request URI: {e}"))
                .into()
        }
    };

    let response = match api.clone().oneshot(request).await {
        Ok(r) => r,
        Err(never) => match never {},
    };

    let merged = response
        .headers()
        .get(&TRACE_HEADER_NAME)
        .and_then(|h| h.to_str().ok())
        .map(|h| trace.merge_header(h))
        .unwrap_or(false);
    debug!(uri = %uri, status = %response.status(), merged, "forwarded tool call");

    let status = response.status();
    let bytes = match axum::body::to_bytes(response.into_body(), MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            warn!(uri = %uri, error = %e, "failed to read forwarded response");
            return McpErrorResponse::new(McpErrorCode::InternalError, e.to_string()).into();
        }
    };

    if status.is_success() {
        return ToolResult::text(String::from_utf8_lossy(&bytes));
    }

    match serde_json::from_slice::<ErrorResponse>(&bytes) {
        Ok(body) => McpErrorResponse::new(McpErrorCode::from_api_code(&body.code), body.error).into(),
        Err(_) => McpErrorResponse::new(
            McpErrorCode::InternalError,
            format!("{path} answered {status}"),
        )
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_become_query_pairs() {
        let q = query_string(&json!({
            "reference": "John 3:16",
            "organization": ["unfoldingWord", "Door43-Catalog"],
            "includeVerseNumbers": false,
            "language": null
        }))
        .unwrap();
        assert!(q.contains("reference=John+3%3A16"));
        assert!(q.contains("organization=unfoldingWord%2CDoor43-Catalog"));
        assert!(q.contains("includeVerseNumbers=false"));
        assert!(!q.contains("language"));
    }

    #[test]
    fn nested_arguments_are_rejected() {
        assert!(query_string(&json!({ "reference": { "book": "JHN" } })).is_err());
        assert!(query_string(&json!(["not", "an", "object"])).is_err());
    }
}
