//! 同步 façade：界面线程调用的阻塞接口
//!
//! 每个调用把会话操作投递到执行宿主并等待（带超时），再把结果、超时与错误转成界面上显示的文字。
//! 所有函数都不返回错误：⏱️ 超时，❌ 连接/运行失败，🔌 已断开，✅ 成功。

use std::sync::Arc;
use std::time::Duration;

use crate::config::McpSection;
use crate::core::{HostRegistry, SessionError};
use crate::memory::{append_exchange, ChatTurn};
use crate::session::{ConnectSummary, ConnectionState, SessionController};

const MSG_PATH_REQUIRED: &str = "❌ 서버 경로를 입력해주세요.";
const MSG_NOT_CONNECTED: &str = "❌ 먼저 MCP 서버에 연결해주세요.";
const MSG_CONNECT_TIMEOUT: &str = "⏱️ 연결 시간이 초과되었습니다. 서버가 실행 중인지 확인해주세요.";
const MSG_SEND_TIMEOUT: &str = "⏱️ 응답 시간이 초과되었습니다. 다시 시도해주세요.";
const MSG_DISCONNECT_TIMEOUT: &str = "⏱️ 연결 해제 시간이 초과되었습니다.";
const MSG_DISCONNECTED: &str = "🔌 서버 연결이 해제되었습니다.";
const MSG_EMPTY_REPLY: &str = "응답을 받지 못했습니다. 다시 시도해주세요.";

#[derive(Debug, Clone, Copy)]
pub struct FacadeTimeouts {
    pub connect: Duration,
    pub send: Duration,
    pub disconnect: Duration,
}

impl FacadeTimeouts {
    pub fn from_config(mcp: &McpSection) -> Self {
        Self {
            connect: mcp.connect_timeout(),
            send: mcp.send_timeout(),
            disconnect: mcp.disconnect_timeout(),
        }
    }
}

impl Default for FacadeTimeouts {
    fn default() -> Self {
        Self::from_config(&McpSection::default())
    }
}

pub struct ToolChatFacade<'h> {
    host: &'h HostRegistry,
    controller: Arc<SessionController>,
    timeouts: FacadeTimeouts,
}

impl<'h> ToolChatFacade<'h> {
    pub fn new(host: &'h HostRegistry, controller: Arc<SessionController>, timeouts: FacadeTimeouts) -> Self {
        Self {
            host,
            controller,
            timeouts,
        }
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    pub fn connect_sync(&self, server_path: &str) -> String {
        let path = server_path.trim().to_string();
        if path.is_empty() {
            return MSG_PATH_REQUIRED.to_string();
        }
        let controller = self.controller.clone();
        let result = self.host.submit(
            move |cancel| async move { controller.connect(&path, cancel).await },
            self.timeouts.connect,
        );
        match result {
            Ok(summary) => connected_message(&summary),
            Err(SessionError::Timeout(_)) => MSG_CONNECT_TIMEOUT.to_string(),
            Err(SessionError::Connection(msg)) => {
                format!("❌ 연결 실패: {}\n서버 파일 경로와 권한을 확인해주세요.", msg)
            }
            Err(e) => format!("❌ 연결 오류: {}", e),
        }
    }

    /// 返回（新的聊天记录，清空后的输入框内容）；空白消息原样返回记录
    pub fn send_sync(&self, message: &str, history: &[ChatTurn]) -> (Vec<ChatTurn>, String) {
        if message.trim().is_empty() {
            return (history.to_vec(), String::new());
        }
        let controller = self.controller.clone();
        let text = message.to_string();
        let result = self.host.submit(
            move |cancel| async move { controller.send_message(&text, cancel).await },
            self.timeouts.send,
        );
        let reply = match result {
            Ok(reply) if reply.trim().is_empty() => MSG_EMPTY_REPLY.to_string(),
            Ok(reply) => reply,
            Err(SessionError::NotConnected) => MSG_NOT_CONNECTED.to_string(),
            Err(SessionError::Timeout(_)) => MSG_SEND_TIMEOUT.to_string(),
            Err(SessionError::Operation(msg)) => format!("❌ 오류가 발생했습니다: {}", msg),
            Err(e) => format!("❌ 오류: {}", e),
        };
        (append_exchange(history, message, reply), String::new())
    }

    pub fn disconnect_sync(&self) -> String {
        let controller = self.controller.clone();
        let result = self.host.submit(
            move |_| async move { controller.disconnect().await },
            self.timeouts.disconnect,
        );
        match result {
            Ok(()) => MSG_DISCONNECTED.to_string(),
            Err(SessionError::Timeout(_)) => MSG_DISCONNECT_TIMEOUT.to_string(),
            Err(e) => format!("❌ 연결 해제 중 오류: {}", e),
        }
    }

    pub fn clear(&self) -> Vec<ChatTurn> {
        Vec::new()
    }

    pub fn status_line(&self) -> String {
        match self.controller.state() {
            ConnectionState::Disconnected => "🔴 서버에 연결되지 않음".to_string(),
            ConnectionState::Connecting => "🟡 연결 중...".to_string(),
            ConnectionState::Connected => {
                let names: Vec<String> = self.controller.tools().into_iter().map(|t| t.name).collect();
                format!("🟢 연결됨 · 도구 {}개: {}", names.len(), names.join(", "))
            }
        }
    }
}

fn connected_message(summary: &ConnectSummary) -> String {
    format!(
        "✅ MCP 서버에 성공적으로 연결되었습니다.\n사용 가능한 도구 ({}개): {}",
        summary.count(),
        summary.tool_names.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::memory::ChatRole;
    use crate::session::SessionOptions;

    fn facade(host: &HostRegistry) -> ToolChatFacade<'_> {
        let controller = Arc::new(SessionController::new(
            Arc::new(MockLlmClient),
            SessionOptions::default(),
        ));
        ToolChatFacade::new(host, controller, FacadeTimeouts::default())
    }

    #[test]
    fn test_send_while_disconnected_appends_fixed_message() {
        let host = HostRegistry::new();
        let f = facade(&host);
        let (history, input) = f.send_sync("7과 6을 곱한 값은?", &[]);
        assert_eq!(input, "");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatTurn::user("7과 6을 곱한 값은?"));
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert_eq!(history[1].content, MSG_NOT_CONNECTED);
    }

    #[test]
    fn test_whitespace_message_leaves_history_unchanged() {
        let host = HostRegistry::new();
        let f = facade(&host);
        let before = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        let (after, input) = f.send_sync("   \n", &before);
        assert_eq!(after, before);
        assert_eq!(input, "");
        // 空白消息不会创建执行宿主
        assert!(host.current().is_none());
    }

    #[test]
    fn test_empty_path_and_disconnect_messages() {
        let host = HostRegistry::new();
        let f = facade(&host);
        assert_eq!(f.connect_sync("  "), MSG_PATH_REQUIRED);
        assert_eq!(f.disconnect_sync(), MSG_DISCONNECTED);
        assert_eq!(f.disconnect_sync(), MSG_DISCONNECTED);
        assert_eq!(f.status_line(), "🔴 서버에 연결되지 않음");
        assert!(f.clear().is_empty());
    }

    #[test]
    fn test_connect_failure_is_prefixed() {
        let host = HostRegistry::new();
        let f = facade(&host);
        let msg = f.connect_sync("/no/such/server.py");
        assert!(msg.starts_with("❌ 연결 실패"), "{}", msg);
        assert_eq!(f.controller().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connected_message_lists_tools() {
        let summary = ConnectSummary {
            tool_names: vec!["add".to_string(), "multiply".to_string()],
        };
        assert_eq!(
            connected_message(&summary),
            "✅ MCP 서버에 성공적으로 연결되었습니다.\n사용 가능한 도구 (2개): add, multiply"
        );
    }
}
