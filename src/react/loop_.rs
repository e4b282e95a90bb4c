//! ReAct 主循环
//!
//! Plan -> Act (Tool) -> Observe -> 下一轮 Plan；支持一次 RetryWithPrompt、取消与最大步数限制。
//! 每次运行只看到当前这条用户输入（单轮），不携带会话历史。

use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::Message;
use crate::react::{parse_llm_output, Planner, PlannerOutput};
use crate::tools::ToolExecutor;

/// Observation 写入日志时的预览字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// ReAct 循环执行结果：最终回复与本次运行的消息序列（不含 system）
#[derive(Debug)]
pub struct ReactResult {
    pub response: String,
    pub messages: Vec<Message>,
    pub steps: usize,
}

/// 执行 ReAct 循环
///
/// 用户输入 -> plan -> 解析输出 -> 若 ToolCall 则执行并写回 Observation -> 若 Response 则返回。
/// 工具失败以 "Error: ..." 作为 Observation 交给模型；调用不存在的工具直接终止。
pub async fn react_loop(
    planner: &Planner,
    executor: &ToolExecutor,
    recovery: &RecoveryEngine,
    user_input: &str,
    max_steps: usize,
    cancel_token: CancellationToken,
) -> Result<ReactResult, AgentError> {
    let mut messages = vec![Message::user(user_input.to_string())];
    let mut retried = false;

    for step in 1..=max_steps {
        if cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        tracing::debug!(step, max_steps, "react step");

        let output = tokio::select! {
            _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
            out = planner.plan(&messages) => out?,
        };

        match parse_llm_output(&output) {
            Ok(PlannerOutput::Response(text)) => {
                messages.push(Message::assistant(text.clone()));
                return Ok(ReactResult {
                    response: text,
                    messages,
                    steps: step,
                });
            }
            Ok(PlannerOutput::ToolCall(tc)) => {
                let result = tokio::select! {
                    _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
                    r = executor.execute(&tc.tool, tc.args.clone()) => r,
                };
                let observation = match result {
                    Ok(r) => r,
                    Err(e @ AgentError::HallucinatedTool(_)) => {
                        tracing::warn!(tool = %tc.tool, available = ?executor.tool_names(), "model called unknown tool");
                        return Err(e);
                    }
                    Err(e) => format!("Error: {}", e),
                };
                let preview: String = observation.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
                tracing::debug!(tool = %tc.tool, observation = %preview, "observation");

                // 将工具调用与结果写回对话，供下一轮 Plan 使用
                messages.push(Message::assistant(format!(
                    "Tool call: {} | Result: {}",
                    tc.tool, observation
                )));
                messages.push(Message::user(format!(
                    "Observation from {}: {}",
                    tc.tool, observation
                )));
            }
            Err(e) => match recovery.handle(&e) {
                RecoveryAction::RetryWithPrompt(prompt) if !retried => {
                    tracing::warn!(error = %e, "unparseable tool call, retrying with hint");
                    retried = true;
                    messages.push(Message::assistant(output));
                    messages.push(Message::user(prompt));
                }
                _ => return Err(e),
            },
        }
    }

    Err(AgentError::MaxStepsExceeded(max_steps))
}
