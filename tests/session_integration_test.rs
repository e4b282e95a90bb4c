//! 会话集成测试：通过 façade 连接真实的 nomu-math 子进程

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use nomu::core::HostRegistry;
use nomu::llm::{LlmClient, MockLlmClient, ScriptedLlmClient};
use nomu::memory::ChatRole;
use nomu::session::{ConnectionState, FacadeTimeouts, SessionController, SessionOptions, ToolChatFacade};

const MATH_SERVER: &str = env!("CARGO_BIN_EXE_nomu-math");

fn facade_with(host: &HostRegistry, llm: Arc<dyn LlmClient>, timeouts: FacadeTimeouts) -> ToolChatFacade<'_> {
    let controller = Arc::new(SessionController::new(llm, SessionOptions::default()));
    ToolChatFacade::new(host, controller, timeouts)
}

#[test]
fn test_connect_lists_math_tools() {
    let host = HostRegistry::new();
    let facade = facade_with(&host, Arc::new(MockLlmClient), FacadeTimeouts::default());

    let msg = facade.connect_sync(MATH_SERVER);
    assert!(msg.starts_with("✅"), "unexpected: {}", msg);
    assert!(msg.contains("(2개): add, multiply"), "unexpected: {}", msg);
    assert_eq!(facade.controller().state(), ConnectionState::Connected);
    assert!(facade.status_line().starts_with("🟢"));

    assert_eq!(facade.disconnect_sync(), "🔌 서버 연결이 해제되었습니다.");
    assert_eq!(facade.controller().state(), ConnectionState::Disconnected);
    host.shutdown();
}

#[test]
fn test_scripted_agent_computes_with_mcp_tools() {
    let host = HostRegistry::new();
    let llm = Arc::new(ScriptedLlmClient::new([
        r#"{"tool": "multiply", "args": {"a": 5, "b": 12}}"#,
        r#"{"tool": "add", "args": {"a": 3, "b": 60}}"#,
        "3 + 5 × 12 = 63 입니다.",
    ]));
    let facade = facade_with(&host, llm.clone(), FacadeTimeouts::default());
    assert!(facade.connect_sync(MATH_SERVER).starts_with("✅"));

    let (history, input) = facade.send_sync("3 + 5 × 12", &[]);
    assert_eq!(input, "");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, ChatRole::User);
    assert_eq!(history[0].content, "3 + 5 × 12");
    assert_eq!(history[1].role, ChatRole::Assistant);
    assert!(history[1].content.contains("63"), "unexpected: {}", history[1].content);
    assert_eq!(llm.remaining(), 0);

    facade.disconnect_sync();
    host.shutdown();
}

#[test]
fn test_invalid_path_ends_disconnected() {
    let host = HostRegistry::new();
    let facade = facade_with(&host, Arc::new(MockLlmClient), FacadeTimeouts::default());

    let msg = facade.connect_sync("/definitely/not/here/math_server.py");
    assert!(msg.starts_with("❌ 연결 실패"), "unexpected: {}", msg);
    assert_eq!(facade.controller().state(), ConnectionState::Disconnected);
    assert!(facade.status_line().starts_with("🔴"));

    assert_eq!(facade.connect_sync("   "), "❌ 서버 경로를 입력해주세요.");
}

#[test]
fn test_disconnect_twice_and_send_while_disconnected() {
    let host = HostRegistry::new();
    let facade = facade_with(&host, Arc::new(MockLlmClient), FacadeTimeouts::default());

    assert_eq!(facade.disconnect_sync(), "🔌 서버 연결이 해제되었습니다.");
    assert_eq!(facade.disconnect_sync(), "🔌 서버 연결이 해제되었습니다.");

    let (history, _) = facade.send_sync("3 더하기 4", &[]);
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "❌ 먼저 MCP 서버에 연결해주세요.");

    let (unchanged, input) = facade.send_sync(" \t\n", &history);
    assert_eq!(unchanged, history);
    assert_eq!(input, "");
}

/// 不响应握手的服务器：启动后只是 sleep
#[cfg(unix)]
fn silent_server(dir: &std::path::Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("silent_server");
    std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

#[cfg(unix)]
#[test]
fn test_slow_server_connect_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let script = silent_server(dir.path());

    let host = HostRegistry::new();
    let timeouts = FacadeTimeouts {
        connect: Duration::from_millis(500),
        ..FacadeTimeouts::default()
    };
    let facade = facade_with(&host, Arc::new(MockLlmClient), timeouts);

    let start = Instant::now();
    let msg = facade.connect_sync(script.to_str().unwrap());
    assert!(start.elapsed() < Duration::from_secs(3), "took {:?}", start.elapsed());
    assert!(msg.starts_with("⏱️"), "unexpected: {}", msg);

    // 超时取消后，未完成的连接被拆除
    let deadline = Instant::now() + Duration::from_secs(5);
    while facade.controller().state() != ConnectionState::Disconnected && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(facade.controller().state(), ConnectionState::Disconnected);
    host.shutdown();
}

#[cfg(unix)]
#[test]
fn test_disconnect_while_connecting_cancels_connect() {
    let dir = tempfile::tempdir().unwrap();
    let script = silent_server(dir.path());
    let host = HostRegistry::new();
    let facade = facade_with(&host, Arc::new(MockLlmClient), FacadeTimeouts::default());

    thread::scope(|s| {
        let connecting = s.spawn(|| {
            let start = Instant::now();
            (facade.connect_sync(script.to_str().unwrap()), start.elapsed())
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        while facade.controller().state() != ConnectionState::Connecting && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(facade.controller().state(), ConnectionState::Connecting);

        let disconnected = s.spawn(|| facade.disconnect_sync()).join().unwrap();
        assert_eq!(disconnected, "🔌 서버 연결이 해제되었습니다.");

        let (msg, elapsed) = connecting.join().unwrap();
        assert!(msg.starts_with("❌ 연결 실패"), "unexpected: {}", msg);
        assert!(msg.contains("cancelled"), "unexpected: {}", msg);
        assert!(elapsed < Duration::from_secs(10), "took {:?}", elapsed);
    });

    assert_eq!(facade.controller().state(), ConnectionState::Disconnected);
    host.shutdown();
}

#[test]
fn test_concurrent_callers_share_one_host() {
    let host = Arc::new(HostRegistry::new());
    let barrier = Arc::new(Barrier::new(10));
    let ids: Vec<u64> = (0..10)
        .map(|_| {
            let host = host.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                host.ensure_running().unwrap().id()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    host.shutdown();
}
