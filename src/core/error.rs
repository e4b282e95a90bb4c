//! 错误类型
//!
//! - AgentError：工具 Agent（ReAct 循环）内部的错误，供 RecoveryEngine 决定重试或终止
//! - SessionError：执行宿主 / 会话控制器边界上的错误分类，由 façade 最终转成带前缀的提示文字

use std::time::Duration;

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（LLM、解析、工具、取消等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Max steps exceeded ({0})")]
    MaxStepsExceeded(usize),

    #[error("Cancelled")]
    Cancelled,
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让 LLM 重试（如 JSON 格式错误）
    RetryWithPrompt(String),
    /// 终止当前任务
    Abort,
}

/// 会话边界错误：连接失败 / 未连接 / 等待超时 / 运行失败 / 宿主不可用
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("not connected")]
    NotConnected,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("execution host unavailable: {0}")]
    Host(String),
}

impl From<AgentError> for SessionError {
    fn from(e: AgentError) -> Self {
        SessionError::Operation(e.to_string())
    }
}
