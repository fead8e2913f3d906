use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 ID, a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    Str(String),
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<RpcId>,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

/// MCP `initialize` params.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(rename = "clientInfo")]
    pub client_info: Option<ClientInfo>,
}

/// Client information sent during `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Option<serde_json::Value>,
}

fn default_language() -> String {
    "en".to_string()
}

// ---------------------------------------------------------------------------
// Tool / endpoint parameters
//
// Shared by the REST query strings and MCP tool arguments. List-valued
// parameters (`organization`, `resource`) travel as comma-separated strings.
// ---------------------------------------------------------------------------

/// Parameters for `fetch_scripture` and `GET /api/fetch-scripture`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptureParams {
    pub reference: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub organization: Option<String>,
    /// Comma-separated variants, e.g. `ult,ust`.
    pub resource: Option<String>,
    pub include_verse_numbers: Option<bool>,
}

/// Parameters for the annotation tables (notes, questions, word links).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationParams {
    pub reference: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub organization: Option<String>,
    pub include_intro: Option<bool>,
}

/// Parameters for `fetch_translation_word`.
///
/// `rcLink` or `path` wins over `term`, which wins over `reference`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordParams {
    pub term: Option<String>,
    pub category: Option<String>,
    pub path: Option<String>,
    pub rc_link: Option<String>,
    pub reference: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    pub organization: Option<String>,
}

/// Parameters for `fetch_translation_academy`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademyParams {
    pub module_id: Option<String>,
    pub path: Option<String>,
    pub rc_link: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    pub organization: Option<String>,
}

/// Parameters for `list_languages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguagesParams {
    pub organization: Option<String>,
}
