use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::handlers::{self, McpContext};
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::rest;
use crate::trace::SpanCollector;

/// Maximum bytes per JSON-RPC message (1 MiB).
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// MCP server that communicates over stdio using newline-delimited JSON-RPC 2.0.
pub struct McpServer {
    context: McpContext,
    initialized: bool,
}

impl McpServer {
    pub fn new(context: McpContext) -> Self {
        Self {
            context,
            initialized: false,
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut raw = Vec::new();

        info!("serving MCP over stdio");
        loop {
            raw.clear();
            let n = reader.read_until(b'\n', &mut raw).await?;
            if n == 0 {
                break;
            }

            if n > MAX_MESSAGE_BYTES {
                warn!(bytes = n, limit = MAX_MESSAGE_BYTES, "message too large");
                write_response(
                    &mut stdout,
                    &JsonRpcResponse::error(None, JsonRpcError::parse_error()),
                )
                .await?;
                continue;
            }

            let trimmed = match std::str::from_utf8(&raw) {
                Ok(s) => s.trim(),
                Err(_) => {
                    write_response(
                        &mut stdout,
                        &JsonRpcResponse::error(None, JsonRpcError::parse_error()),
                    )
                    .await?;
                    continue;
                }
            };

            if trimmed.is_empty() {
                continue;
            }

            let req: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "parse error");
                    write_response(
                        &mut stdout,
                        &JsonRpcResponse::error(None, JsonRpcError::parse_error()),
                    )
                    .await?;
                    continue;
                }
            };

            if req.jsonrpc != "2.0" {
                write_response(
                    &mut stdout,
                    &JsonRpcResponse::error(req.id.clone(), JsonRpcError::invalid_request()),
                )
                .await?;
                continue;
            }

            // Only `initialize` is allowed before the handshake completes
            if !self.initialized && req.method != "initialize" {
                if req.id.is_none() {
                    continue;
                }
                write_response(
                    &mut stdout,
                    &JsonRpcResponse::error(
                        req.id.clone(),
                        JsonRpcError::invalid_request_with("Server not initialized"),
                    ),
                )
                .await?;
                continue;
            }

            let trace = SpanCollector::new();
            if let Some(resp) = handlers::dispatch(&req, &self.context, &trace).await {
                write_response(&mut stdout, &resp).await?;
            }
            debug!(method = %req.method, cache = trace.status().as_str(), "request done");

            if req.method == "initialize" {
                self.initialized = true;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    resp: &JsonRpcResponse,
) -> Result<(), Box<dyn std::error::Error>> {
    let out = serde_json::to_string(resp)?;
    stdout.write_all(out.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// The HTTP application: the REST facade plus `POST /api/mcp`.
pub fn build_app(context: McpContext) -> Router {
    let mcp = Router::new()
        .route("/api/mcp", post(mcp_endpoint))
        .with_state(context.clone());
    context.api().merge(mcp)
}

/// One JSON-RPC message per request body. The response carries the
/// request's trace headers like the REST endpoints do.
async fn mcp_endpoint(State(context): State<McpContext>, body: Bytes) -> Response {
    let trace = SpanCollector::new();

    let reply = if body.len() > MAX_MESSAGE_BYTES {
        Some(JsonRpcResponse::error(None, JsonRpcError::parse_error()))
    } else {
        match serde_json::from_slice::<JsonRpcRequest>(&body) {
            Err(e) => {
                debug!(error = %e, "parse error");
                Some(JsonRpcResponse::error(None, JsonRpcError::parse_error()))
            }
            Ok(req) if req.jsonrpc != "2.0" => Some(JsonRpcResponse::error(
                req.id.clone(),
                JsonRpcError::invalid_request(),
            )),
            Ok(req) => handlers::dispatch(&req, &context, &trace).await,
        }
    };

    let mut response = match reply {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    rest::attach_trace(response.headers_mut(), &trace);
    response
}

/// Serve the HTTP application until the process is stopped.
pub async fn serve_http(context: McpContext, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving REST and MCP over HTTP");
    axum::serve(listener, build_app(context)).await
}
