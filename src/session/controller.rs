//! 会话控制器：管理与一个 MCP 工具服务器的连接生命周期
//!
//! Disconnected -> connect -> Connecting -> {Connected, Disconnected}；disconnect 幂等地回到 Disconnected。
//! 所有方法都是 async，运行在执行宿主上；state()/tools() 可从任意线程同步读取。
//! 操作之间由 tokio Mutex 串行化，send_message 在加锁前先检查状态。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::agent::{create_tool_agent, AgentOptions, ToolAgent};
use crate::config::McpSection;
use crate::core::SessionError;
use crate::llm::LlmClient;
use crate::mcp::{open_connection, McpService, ServerLaunch, ToolDescriptor};
use crate::tools::{McpTool, ToolRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// 连接成功后的摘要：工具名按字母序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSummary {
    pub tool_names: Vec<String>,
}

impl ConnectSummary {
    pub fn count(&self) -> usize {
        self.tool_names.len()
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// 启动 .py 服务器的解释器
    pub python: String,
    pub agent: AgentOptions,
}

impl SessionOptions {
    pub fn from_config(mcp: &McpSection) -> Self {
        Self {
            python: mcp.python.clone(),
            agent: AgentOptions {
                max_steps: mcp.max_agent_steps,
                tool_timeout: std::time::Duration::from_secs(mcp.tool_timeout_secs),
            },
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&McpSection::default())
    }
}

#[derive(Debug, Clone)]
struct Status {
    state: ConnectionState,
    tools: Vec<ToolDescriptor>,
}

struct ActiveSession {
    label: String,
    // 先于 service 释放：agent 里的工具持有 service 的 peer
    agent: ToolAgent,
    service: McpService,
}

pub struct SessionController {
    llm: Arc<dyn LlmClient>,
    options: SessionOptions,
    status: watch::Sender<Status>,
    inner: tokio::sync::Mutex<Option<ActiveSession>>,
    /// 进行中的 connect（含排队等锁的）的取消令牌，按尝试编号登记，供 disconnect 打断
    pending_connects: Mutex<Vec<(u64, CancellationToken)>>,
    next_attempt: AtomicU64,
}

impl SessionController {
    pub fn new(llm: Arc<dyn LlmClient>, options: SessionOptions) -> Self {
        let (status, _) = watch::channel(Status {
            state: ConnectionState::Disconnected,
            tools: Vec::new(),
        });
        Self {
            llm,
            options,
            status,
            inner: tokio::sync::Mutex::new(None),
            pending_connects: Mutex::new(Vec::new()),
            next_attempt: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.status.borrow().tools.clone()
    }

    fn set_status(&self, state: ConnectionState, tools: Vec<ToolDescriptor>) {
        self.status.send_replace(Status { state, tools });
    }

    /// 连接服务器；已有连接会先断开
    ///
    /// 任何失败（路径、启动、握手、工具发现、取消）都会释放本次尝试已打开的资源并回到 Disconnected。
    pub async fn connect(&self, server_path: &str, cancel: CancellationToken) -> Result<ConnectSummary, SessionError> {
        let attempt_token = cancel.child_token();
        let attempt_id = self.next_attempt.fetch_add(1, Ordering::Relaxed);
        self.pending().push((attempt_id, attempt_token.clone()));

        let mut guard = self.inner.lock().await;
        self.teardown(&mut guard).await;
        self.set_status(ConnectionState::Connecting, Vec::new());

        let attempt = async {
            let launch = ServerLaunch::resolve(server_path, &self.options.python)?;
            let (service, tools) = open_connection(&launch).await?;
            Ok::<_, SessionError>((launch.label(), service, tools))
        };
        // 取消时 attempt 被丢弃，其中已启动的会话与子进程随之释放
        let outcome = tokio::select! {
            biased;
            _ = attempt_token.cancelled() => Err(SessionError::Connection("connect cancelled".to_string())),
            r = attempt => r,
        };
        self.pending().retain(|(id, _)| *id != attempt_id);

        match outcome {
            Ok((label, service, tools)) => {
                let mut registry = ToolRegistry::new();
                for descriptor in &tools {
                    registry.register(McpTool::new(descriptor.clone(), service.peer().clone()));
                }
                let agent = create_tool_agent(self.llm.clone(), registry, self.options.agent);
                let summary = ConnectSummary {
                    tool_names: agent.tool_names(),
                };
                self.set_status(ConnectionState::Connected, tools);
                *guard = Some(ActiveSession { label, agent, service });
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(path = %server_path, error = %e, "connect failed");
                self.set_status(ConnectionState::Disconnected, Vec::new());
                Err(e)
            }
        }
    }

    /// 单轮运行 Agent，返回最终回复文本；未连接时立即返回 NotConnected，不做任何 I/O
    pub async fn send_message(&self, text: &str, cancel: CancellationToken) -> Result<String, SessionError> {
        if self.state() != ConnectionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let guard = self.inner.lock().await;
        let session = guard.as_ref().ok_or(SessionError::NotConnected)?;
        tracing::info!(server = %session.label, "running agent");
        Ok(session.agent.invoke(text, cancel).await?)
    }

    /// 断开连接（幂等）；会打断进行中的 connect
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        for (_, token) in self.pending().drain(..) {
            token.cancel();
        }
        let mut guard = self.inner.lock().await;
        self.teardown(&mut guard).await;
        self.set_status(ConnectionState::Disconnected, Vec::new());
        Ok(())
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Vec<(u64, CancellationToken)>> {
        self.pending_connects.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 释放顺序：先会话侧（agent 与其工具），再关闭传输
    async fn teardown(&self, slot: &mut Option<ActiveSession>) {
        let Some(ActiveSession { label, agent, service }) = slot.take() else {
            return;
        };
        drop(agent);
        match service.cancel().await {
            Ok(reason) => tracing::info!(server = %label, ?reason, "MCP session closed"),
            Err(e) => tracing::warn!(server = %label, error = %e, "MCP session close failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn controller() -> SessionController {
        SessionController::new(Arc::new(MockLlmClient), SessionOptions::default())
    }

    #[tokio::test]
    async fn test_send_before_connect_is_not_connected() {
        let c = controller();
        let err = c.send_message("3 + 5", CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, SessionError::NotConnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let c = controller();
        assert!(c.disconnect().await.is_ok());
        assert!(c.disconnect().await.is_ok());
        assert_eq!(c.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_to_missing_file_ends_disconnected() {
        let c = controller();
        let err = c
            .connect("/no/such/dir/math_server.py", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Connection(_)));
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert!(c.tools().is_empty());
        assert!(c.inner.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_to_unknown_command_ends_disconnected() {
        let c = controller();
        let err = c
            .connect("nomu-no-such-server-binary", CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Connection(msg) if msg.contains("spawn")));
        assert_eq!(c.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_cancelled_connect_ends_disconnected() {
        let c = controller();
        let token = CancellationToken::new();
        token.cancel();
        let err = c.connect("nomu-no-such-server-binary", token).await.unwrap_err();
        assert!(matches!(err, SessionError::Connection(_)));
        assert_eq!(c.state(), ConnectionState::Disconnected);
    }

    #[cfg(unix)]
    fn silent_server(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("silent_server");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_disconnect_interrupts_overlapping_connects() {
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().unwrap();
        let script = silent_server(dir.path());
        let c = Arc::new(controller());

        let spawn_connect = |c: Arc<SessionController>, path: String| {
            tokio::spawn(async move { c.connect(&path, CancellationToken::new()).await })
        };
        let first = spawn_connect(c.clone(), script.clone());
        let second = spawn_connect(c.clone(), script.clone());

        // 两次尝试都已登记：一个在握手，一个在等锁
        let deadline = Instant::now() + Duration::from_secs(5);
        while c.pending().len() < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(c.pending().len(), 2);
        assert_eq!(c.state(), ConnectionState::Connecting);

        let start = Instant::now();
        tokio::time::timeout(Duration::from_secs(5), c.disconnect())
            .await
            .expect("disconnect blocked behind a pending connect")
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));

        for attempt in [first, second] {
            let err = attempt.await.unwrap().unwrap_err();
            assert!(matches!(err, SessionError::Connection(msg) if msg.contains("cancelled")));
        }
        assert_eq!(c.state(), ConnectionState::Disconnected);
        assert!(c.pending().is_empty());
        assert!(c.inner.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_finished_connect_keeps_other_attempts_registered() {
        let c = controller();
        let other = CancellationToken::new();
        c.pending().push((u64::MAX, other.clone()));

        let _ = c.connect("/no/such/dir/math_server.py", CancellationToken::new()).await;
        // 失败的尝试只移除自己的登记
        assert_eq!(c.pending().len(), 1);

        c.disconnect().await.unwrap();
        assert!(other.is_cancelled());
        assert!(c.pending().is_empty());
    }
}
