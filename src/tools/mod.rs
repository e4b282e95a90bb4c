//! 工具层：Tool trait 与注册表、带超时/审计的执行器、MCP 远端工具适配

pub mod executor;
pub mod mcp;
pub mod registry;
pub mod schema;

pub use executor::ToolExecutor;
pub use mcp::{build_tool_arguments, format_tool_result, McpTool};
pub use registry::{Tool, ToolRegistry};
pub use schema::tool_call_schema_json;
