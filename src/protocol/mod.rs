pub mod request;
pub mod response;

pub use request::{
    AcademyParams, AnnotationParams, InitializeParams, JsonRpcRequest, LanguagesParams, RpcId,
    ScriptureParams, ToolCallParams, WordParams,
};
pub use response::{
    JsonRpcError, JsonRpcResponse, McpError, McpErrorCode, McpErrorResponse, ToolResult,
    ToolResultContent,
};
