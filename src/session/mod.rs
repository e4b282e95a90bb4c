//! MCP 工具聊天会话：异步会话控制器与供界面线程调用的同步 façade

pub mod controller;
pub mod facade;

pub use controller::{ConnectSummary, ConnectionState, SessionController, SessionOptions};
pub use facade::{FacadeTimeouts, ToolChatFacade};
