//! RAG 聊天的同步 façade：与工具聊天相同的调用形状，经执行宿主运行问答链

use std::sync::Arc;
use std::time::Duration;

use crate::core::{HostRegistry, SessionError};
use crate::memory::{append_exchange, ChatTurn};
use crate::rag::RagChain;

pub struct RagFacade<'h> {
    host: &'h HostRegistry,
    chain: Arc<RagChain>,
    timeout: Duration,
}

impl<'h> RagFacade<'h> {
    pub fn new(host: &'h HostRegistry, chain: Arc<RagChain>, timeout: Duration) -> Self {
        Self { host, chain, timeout }
    }

    /// 返回（新的聊天记录，清空后的输入框内容）；空白消息原样返回记录
    pub fn answer_sync(&self, message: &str, history: &[ChatTurn]) -> (Vec<ChatTurn>, String) {
        if message.trim().is_empty() {
            return (history.to_vec(), String::new());
        }
        let chain = self.chain.clone();
        let question = message.to_string();
        let prior = history.to_vec();
        let result = self.host.submit(
            move |cancel| async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(SessionError::Operation("cancelled".to_string())),
                    r = chain.answer(&question, &prior) => r.map_err(|e| SessionError::Operation(e.to_string())),
                }
            },
            self.timeout,
        );
        let reply = match result {
            Ok(answer) => answer,
            Err(SessionError::Timeout(_)) => "⏱️ 응답 시간이 초과되었습니다. 다시 시도해주세요.".to_string(),
            Err(e) => format!("❌ 오류: {}", e),
        };
        (append_exchange(history, message, reply), String::new())
    }
}
