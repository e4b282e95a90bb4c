//! nomu - MCP 도구 채팅 TUI
//!
//! 入口：加载配置、初始化文件日志、在进程级执行宿主上创建会话控制器，运行 TUI；退出时断开 MCP 连接并停止宿主。

use std::sync::Arc;

use anyhow::Context;
use nomu::config::load_config_or_default;
use nomu::core::HostRegistry;
use nomu::llm::create_llm_from_config;
use nomu::observability;
use nomu::session::{FacadeTimeouts, SessionController, SessionOptions, ToolChatFacade};
use nomu::ui::{run_app, App, ChatMode};

fn main() -> anyhow::Result<()> {
    let cfg = load_config_or_default();
    observability::init_file(&cfg.app.log_dir, "nomu.log");

    let host = HostRegistry::global();
    let controller = Arc::new(SessionController::new(
        create_llm_from_config(&cfg),
        SessionOptions::from_config(&cfg.mcp),
    ));
    let facade = Arc::new(ToolChatFacade::new(
        host,
        controller,
        FacadeTimeouts::from_config(&cfg.mcp),
    ));

    let mut app = App::new(ChatMode::ToolChat(facade.clone()), cfg.mcp.server_path.clone());
    let result = run_app(&mut app).context("App run failed");

    let farewell = facade.disconnect_sync();
    tracing::info!("{}", farewell);
    host.shutdown();
    result
}
