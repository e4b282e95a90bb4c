//! MCP 客户端连接：启动服务器子进程，完成 initialize 握手并发现工具
//!
//! 服务器的 stderr 按行转发到 tracing（target = "mcp_server"），不会干扰终端界面。

use std::process::Stdio;

use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceExt;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStderr;

use crate::core::SessionError;
use crate::mcp::ServerLaunch;

/// 正在运行的 MCP 客户端会话（传输 + 会话）
pub type McpService = RunningService<RoleClient, ()>;

/// tools/list 返回的一项
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// 从 tools/list 结果中的单个工具 JSON 解析；缺少 name 时返回 None
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let input_schema = value
            .get("inputSchema")
            .or_else(|| value.get("input_schema"))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));
        Some(Self {
            name,
            description,
            input_schema,
        })
    }
}

/// 启动服务器并完成握手与工具发现
///
/// 发现失败时先关闭已建立的会话再返回错误，不留下子进程。
pub async fn open_connection(launch: &ServerLaunch) -> Result<(McpService, Vec<ToolDescriptor>), SessionError> {
    let label = launch.label();
    let (transport, stderr) = TokioChildProcess::builder(launch.command())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| SessionError::Connection(format!("failed to spawn MCP server '{}': {}", label, e)))?;
    if let Some(stderr) = stderr {
        tokio::spawn(forward_stderr(stderr, label.clone()));
    }

    let service = ().serve(transport).await.map_err(|e| {
        SessionError::Connection(format!("MCP handshake with '{}' failed: {}", label, e))
    })?;

    match discover_tools(&service).await {
        Ok(tools) => {
            tracing::info!(server = %label, tools = tools.len(), "MCP server connected");
            Ok((service, tools))
        }
        Err(e) => {
            if let Err(cancel_err) = service.cancel().await {
                tracing::warn!(server = %label, error = %cancel_err, "failed to close MCP session");
            }
            Err(e)
        }
    }
}

async fn discover_tools(service: &McpService) -> Result<Vec<ToolDescriptor>, SessionError> {
    let tools_result = service
        .list_tools(Default::default())
        .await
        .map_err(|e| SessionError::Connection(format!("failed to list tools: {}", e)))?;
    let tool_values = serde_json::to_value(&tools_result)
        .ok()
        .and_then(|value| value.get("tools").cloned())
        .and_then(|value| value.as_array().cloned())
        .unwrap_or_default();
    Ok(tool_values.iter().filter_map(ToolDescriptor::from_value).collect())
}

async fn forward_stderr(stderr: ChildStderr, label: String) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::debug!(target: "mcp_server", server = %label, "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: "mcp_server", server = %label, error = %e, "stderr closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_from_tools_list_entry() {
        let value = json!({
            "name": "add",
            "description": "Add two numbers",
            "inputSchema": {"type": "object", "properties": {"a": {"type": "number"}}}
        });
        let d = ToolDescriptor::from_value(&value).unwrap();
        assert_eq!(d.name, "add");
        assert_eq!(d.description, "Add two numbers");
        assert_eq!(d.input_schema["properties"]["a"]["type"], "number");
    }

    #[test]
    fn test_descriptor_defaults_and_missing_name() {
        let d = ToolDescriptor::from_value(&json!({"name": "ping"})).unwrap();
        assert_eq!(d.description, "");
        assert_eq!(d.input_schema["type"], "object");
        assert!(ToolDescriptor::from_value(&json!({"description": "nameless"})).is_none());
    }
}
