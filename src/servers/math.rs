//! 数学工具服务器：add / multiply

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BinaryArgs {
    /// 첫 번째 수
    pub a: f64,
    /// 두 번째 수
    pub b: f64,
}

#[derive(Clone)]
pub struct MathServer {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MathServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Add two numbers")]
    async fn add(&self, Parameters(BinaryArgs { a, b }): Parameters<BinaryArgs>) -> Result<CallToolResult, McpError> {
        tracing::info!(a, b, "add");
        Ok(CallToolResult::success(vec![Content::text((a + b).to_string())]))
    }

    #[tool(description = "Multiply two numbers")]
    async fn multiply(&self, Parameters(BinaryArgs { a, b }): Parameters<BinaryArgs>) -> Result<CallToolResult, McpError> {
        tracing::info!(a, b, "multiply");
        Ok(CallToolResult::success(vec![Content::text((a * b).to_string())]))
    }
}

impl Default for MathServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for MathServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("Arithmetic tools: add and multiply.".to_string()),
            ..Default::default()
        }
    }
}
