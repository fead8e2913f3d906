use std::time::Duration;

use serde_json::{json, Value};

use crate::fetcher::UnifiedFetcher;
use crate::protocol::ToolResult;

/// Server status and archive cache usage.
pub fn report(fetcher: &UnifiedFetcher, uptime: Duration) -> Value {
    let archives = fetcher.archives();
    json!({
        "status": "ok",
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": uptime.as_secs(),
        "cache": {
            "archives": archives.entry_count(),
            "weightedBytes": archives.weighted_size(),
        }
    })
}

pub fn handle(fetcher: &UnifiedFetcher, uptime: Duration) -> ToolResult {
    ToolResult::text(report(fetcher, uptime).to_string())
}
