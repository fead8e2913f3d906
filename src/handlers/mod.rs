//! MCP method dispatch.
//!
//! Tool calls other than `health` are served by the REST router in-process
//! (see [`forward`]), so both surfaces share one code path and one cache.

pub mod forward;
pub mod health;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::fetcher::UnifiedFetcher;
use crate::protocol::{
    InitializeParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpErrorCode,
    McpErrorResponse, ToolCallParams, ToolResult,
};
use crate::rest::{self, AppState};
use crate::schema;
use crate::trace::SpanCollector;

/// Everything a request handler needs: the fetcher and the REST router
/// tool calls are forwarded to.
#[derive(Clone)]
pub struct McpContext {
    state: AppState,
    api: Router,
    tool_timeout: Duration,
}

impl McpContext {
    pub fn new(fetcher: Arc<UnifiedFetcher>, tool_timeout: Duration) -> Self {
        let state = AppState::new(fetcher);
        let api = rest::build_router(state.clone());
        Self {
            state,
            api,
            tool_timeout,
        }
    }

    pub fn fetcher(&self) -> &Arc<UnifiedFetcher> {
        &self.state.fetcher
    }

    /// The REST router, for mounting next to the MCP endpoint.
    pub fn api(&self) -> Router {
        self.api.clone()
    }
}

/// Dispatch a JSON-RPC request to the appropriate handler.
///
/// Returns `None` for notifications (no response required). Cache activity
/// of tool calls is recorded in `trace`.
pub async fn dispatch(
    req: &JsonRpcRequest,
    ctx: &McpContext,
    trace: &SpanCollector,
) -> Option<JsonRpcResponse> {
    match req.method.as_str() {
        "initialize" => {
            let client = req
                .params
                .clone()
                .and_then(|v| serde_json::from_value::<InitializeParams>(v).ok())
                .and_then(|p| p.client_info);
            match client {
                Some(c) => info!(
                    client = c.name.as_deref().unwrap_or("unknown"),
                    version = c.version.as_deref().unwrap_or("unknown"),
                    "client initializing"
                ),
                None => info!("client initializing"),
            }

            let result = json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION")
                }
            });
            Some(JsonRpcResponse::success(req.id.clone(), result))
        }

        "notifications/initialized" => None,

        "ping" => Some(JsonRpcResponse::success(req.id.clone(), json!({}))),

        "tools/list" => Some(JsonRpcResponse::success(req.id.clone(), tools::list())),

        "tools/call" => {
            let params: ToolCallParams = match &req.params {
                Some(v) => match serde_json::from_value(v.clone()) {
                    Ok(p) => p,
                    Err(e) => {
                        return Some(JsonRpcResponse::error(
                            req.id.clone(),
                            JsonRpcError::invalid_params(format!(
                                "Invalid tools/call params: {e}"
                            )),
                        ));
                    }
                },
                None => {
                    return Some(JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_params("Missing params for tools/call"),
                    ));
                }
            };

            let tool_result = dispatch_tool_call(&params, ctx, trace).await;
            match serde_json::to_value(&tool_result) {
                Ok(result) => Some(JsonRpcResponse::success(req.id.clone(), result)),
                Err(e) => {
                    warn!(tool = %params.name, error = %e, "tool result did not serialize");
                    Some(JsonRpcResponse::error(
                        req.id.clone(),
                        McpErrorResponse::new(McpErrorCode::InternalError, e.to_string()).into(),
                    ))
                }
            }
        }

        _ => Some(JsonRpcResponse::error(
            req.id.clone(),
            JsonRpcError::method_not_found(&req.method),
        )),
    }
}

async fn dispatch_tool_call(
    params: &ToolCallParams,
    ctx: &McpContext,
    trace: &SpanCollector,
) -> ToolResult {
    let Some(tool) = tools::find(&params.name) else {
        return ToolResult::error(format!("Unknown tool: {}", params.name));
    };

    let arguments = params.arguments.clone().unwrap_or_else(|| json!({}));
    if let Err(e) = schema::validate_value(&tool.input_schema(), &arguments) {
        return McpErrorResponse::new(
            McpErrorCode::InvalidArguments,
            format!("Invalid arguments for {}: {e}", tool.name),
        )
        .into();
    }

    let Some(path) = tool.path else {
        return health::handle(ctx.fetcher(), ctx.state.started.elapsed());
    };

    debug!(tool = tool.name, path, "calling tool");
    let result = match tokio::time::timeout(
        ctx.tool_timeout,
        forward::forward(&ctx.api, path, &arguments, trace),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            warn!(tool = tool.name, timeout = ?ctx.tool_timeout, "tool call timed out");
            McpErrorResponse::new(
                McpErrorCode::Timeout,
                format!("{} timed out after {}s", tool.name, ctx.tool_timeout.as_secs()),
            )
            .into()
        }
    };

    let stats = trace.cache_stats();
    result.with_meta(json!({
        "cacheStats": stats,
        "cacheStatus": stats.status().as_str(),
    }))
}
