//! MCP 客户端：服务器启动方式解析、子进程连接与工具发现

pub mod client;
pub mod launch;

pub use client::{open_connection, McpService, ToolDescriptor};
pub use launch::ServerLaunch;
