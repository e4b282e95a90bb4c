//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 ReAct 循环决定是带提示重试还是终止。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：JSON 格式错误给模型一次纠正提示，其余错误直接终止本轮
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous output was not valid JSON: {raw}. \
                When calling a tool you must output exactly one JSON object and nothing else, \
                in the form {{\"tool\": \"<name>\", \"args\": {{...}}}}. \
                If you already know the answer, reply with plain text only."
            )),
            _ => RecoveryAction::Abort,
        }
    }
}
