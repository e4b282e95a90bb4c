//! Planner：意图规划与 Tool Call 解析
//!
//! 调用 LLM 得到回复或 JSON Tool Call；parse_llm_output 从文本中提取 JSON 并解析为 ToolCall 或直接回复。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;

/// LLM 返回的 Tool Call（{"tool": "add", "args": {"a": 1, "b": 2}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Planner 输出
#[derive(Debug, Clone)]
pub enum PlannerOutput {
    /// 直接回复用户
    Response(String),
    /// 需要执行工具
    ToolCall(ToolCall),
}

/// 解析 LLM 输出：含 "tool" 键的 JSON 为 ToolCall，否则为 Response
///
/// 文本里出现 `"tool"` 但 JSON 无法解析时返回 JsonParseError，由恢复引擎决定是否重试。
pub fn parse_llm_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();
    if !trimmed.contains("\"tool\"") {
        return Ok(PlannerOutput::Response(trimmed.to_string()));
    }

    // 提取 JSON 块（```json ... ``` 或首个 { 到末个 }）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else {
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => trimmed,
        }
    };

    let parsed: ToolCall = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{}: {}", e, json_str)))?;

    if parsed.tool.trim().is_empty() {
        Ok(PlannerOutput::Response(trimmed.to_string()))
    } else {
        Ok(PlannerOutput::ToolCall(parsed))
    }
}

/// Planner：持有 LLM 与 system prompt，plan 时拼 system + messages 后调用 LLM
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn plan(&self, messages: &[Message]) -> Result<String, AgentError> {
        let mut full_messages = Vec::with_capacity(messages.len() + 1);
        full_messages.push(Message::system(self.system_prompt.clone()));
        full_messages.extend_from_slice(messages);
        self.llm
            .complete(&full_messages)
            .await
            .map_err(AgentError::LlmError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_response() {
        match parse_llm_output("  3 + 5 × 12 = 63 입니다.  ").unwrap() {
            PlannerOutput::Response(text) => assert_eq!(text, "3 + 5 × 12 = 63 입니다."),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_braces_without_tool_key_are_response() {
        assert!(matches!(
            parse_llm_output("집합 {1, 2, 3} 의 합은 6").unwrap(),
            PlannerOutput::Response(_)
        ));
    }

    #[test]
    fn test_tool_call_in_code_fence() {
        let out = "계산할게요\n```json\n{\"tool\": \"multiply\", \"args\": {\"a\": 5, \"b\": 12}}\n```";
        match parse_llm_output(out).unwrap() {
            PlannerOutput::ToolCall(tc) => {
                assert_eq!(tc.tool, "multiply");
                assert_eq!(tc.args["b"], 12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_broken_tool_json_is_parse_error() {
        let err = parse_llm_output("{\"tool\": \"add\", \"args\": {\"a\": 1,}").unwrap_err();
        assert!(matches!(err, AgentError::JsonParseError(_)));
    }
}
