//! 可观测性：按进程类型初始化 tracing
//!
//! - stdout：HTTP 服务器
//! - stderr：stdio MCP 服务器（stdout 承载协议）
//! - 按天滚动的文件：终端界面程序（终端被界面占用）
//!
//! 过滤级别取 RUST_LOG，未设置时为 info。

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init_stdout() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer())
        .try_init();
}

pub fn init_stderr() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .try_init();
}

/// 写入 `<log_dir>/<file_prefix>.YYYY-MM-DD`；目录不存在时创建
pub fn init_file(log_dir: &Path, file_prefix: &str) {
    let _ = std::fs::create_dir_all(log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init();
}
