//! MCP 远端工具适配：把服务器 tools/list 给出的每个工具包装成本地 Tool
//!
//! 调用通过共享的 Peer 发送 tools/call；结果中的 text 内容按行拼接，isError 时加 "Tool error: " 前缀。

use async_trait::async_trait;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{Peer, RoleClient};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::mcp::ToolDescriptor;
use crate::tools::Tool;

pub struct McpTool {
    descriptor: ToolDescriptor,
    peer: Peer<RoleClient>,
}

impl McpTool {
    pub fn new(descriptor: ToolDescriptor, peer: Peer<RoleClient>) -> Self {
        Self { descriptor, peer }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    fn parameters_schema(&self) -> Value {
        self.descriptor.input_schema.clone()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let params = CallToolRequestParams {
            name: self.descriptor.name.clone().into(),
            arguments: build_tool_arguments(&args),
            meta: None,
            task: None,
        };
        let result = self
            .peer
            .call_tool(params)
            .await
            .map_err(|e| format!("tools/call '{}' failed: {}", self.descriptor.name, e))?;
        Ok(format_tool_result(&result))
    }
}

/// 把 LLM 给出的 args 规整为 MCP arguments：对象原样，null 省略，其它包成 {"input": ...}
pub fn build_tool_arguments(args: &Value) -> Option<Map<String, Value>> {
    match args {
        Value::Object(map) => Some(map.clone()),
        Value::Null => None,
        _ => {
            let mut map = Map::new();
            map.insert("input".to_string(), args.clone());
            Some(map)
        }
    }
}

/// CallToolResult -> 文本
pub fn format_tool_result(result: &impl Serialize) -> String {
    let value = serde_json::to_value(result).unwrap_or(Value::Null);
    let mut parts = Vec::new();
    if let Some(content) = value.get("content").and_then(Value::as_array) {
        for item in content {
            let is_text = item.get("type").and_then(Value::as_str) == Some("text");
            match item.get("text").and_then(Value::as_str) {
                Some(text) if is_text && !text.trim().is_empty() => parts.push(text.to_string()),
                _ => parts.push(item.to_string()),
            }
        }
    }

    if parts.is_empty() {
        return serde_json::to_string_pretty(&value).unwrap_or_default();
    }

    let output = parts.join("\n");
    let is_error = value
        .get("is_error")
        .or_else(|| value.get("isError"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if is_error {
        format!("Tool error: {}", output)
    } else {
        output
    }
}
