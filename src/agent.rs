//! 工具调用 Agent
//!
//! create_tool_agent 把 LLM 与一组工具组装成 ToolAgent（Planner / ToolExecutor / RecoveryEngine），
//! invoke 对单条用户输入跑 ReAct 并返回最终回复。会话控制器在连接成功后用 MCP 工具构建它。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, RecoveryEngine};
use crate::llm::LlmClient;
use crate::react::{react_loop, Planner};
use crate::tools::{tool_call_schema_json, ToolExecutor, ToolRegistry};

/// Agent 运行参数
#[derive(Debug, Clone, Copy)]
pub struct AgentOptions {
    pub max_steps: usize,
    pub tool_timeout: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_steps: 10,
            tool_timeout: Duration::from_secs(30),
        }
    }
}

/// 预构建的 Agent：Planner、ToolExecutor、Recovery
pub struct ToolAgent {
    planner: Planner,
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    max_steps: usize,
}

impl ToolAgent {
    /// 单轮运行：只看当前这条输入，返回最后一条助手消息的文本
    pub async fn invoke(&self, input: &str, cancel_token: CancellationToken) -> Result<String, AgentError> {
        tracing::debug!(prompt_len = self.planner.system_prompt().len(), "agent run starting");
        let result = react_loop(
            &self.planner,
            &self.executor,
            &self.recovery,
            input,
            self.max_steps,
            cancel_token,
        )
        .await?;
        let tool_calls = result
            .messages
            .iter()
            .filter(|m| m.content.starts_with("Tool call:"))
            .count();
        tracing::info!(
            steps = result.steps,
            tool_calls,
            messages = result.messages.len(),
            "agent finished"
        );
        Ok(result.response)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }
}

/// 组装 system prompt：可用工具列表 + tool call 的 JSON 格式
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    format!(
        "You are a helpful assistant that can call tools to answer the user.\n\n\
        Available tools:\n{}\n\n\
        To call a tool, reply with exactly one JSON object and nothing else, matching this schema:\n{}\n\
        Example: {{\"tool\": \"add\", \"args\": {{\"a\": 1, \"b\": 2}}}}\n\n\
        After each call you will receive an observation. Call tools one at a time, \
        and when you have the final answer reply in plain text (no JSON), \
        in the same language the user wrote in.",
        tools.to_schema_json(),
        tool_call_schema_json()
    )
}

/// 用给定 LLM 与工具创建 Agent
pub fn create_tool_agent(llm: Arc<dyn LlmClient>, tools: ToolRegistry, options: AgentOptions) -> ToolAgent {
    let system_prompt = build_system_prompt(&tools);
    ToolAgent {
        planner: Planner::new(llm, system_prompt),
        executor: ToolExecutor::new(tools, options.tool_timeout),
        recovery: RecoveryEngine::new(),
        max_steps: options.max_steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::tools::registry::tests::AddTool;

    #[tokio::test]
    async fn test_agent_answers_with_tool() {
        let mut tools = ToolRegistry::new();
        tools.register(AddTool);
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "add", "args": {"a": 7, "b": 6}}"#,
            "13",
        ]));
        let agent = create_tool_agent(llm.clone(), tools, AgentOptions::default());
        assert_eq!(agent.tool_names(), vec!["add".to_string()]);

        let answer = agent.invoke("7 더하기 6", CancellationToken::new()).await.unwrap();
        assert_eq!(answer, "13");

        let system = &llm.calls()[0][0].content;
        assert_eq!(system, agent.planner.system_prompt());
        assert!(system.contains("\"add\""));
        assert!(system.contains("Add two numbers"));
    }
}
