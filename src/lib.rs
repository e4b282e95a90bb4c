//! nomu - 근로기준법 RAG 챗봇 · MCP 도구 채팅 클라이언트
//!
//! 模块划分：
//! - **core**: 后台执行宿主、错误类型、恢复策略
//! - **session**: MCP 会话控制器与同步 façade
//! - **mcp**: 服务器启动方式解析与 rmcp 客户端连接
//! - **agent** / **react** / **tools**: 使用 MCP 工具的 ReAct Agent
//! - **rag**: 检索（Chroma / 本地索引 + MMR）与问答链
//! - **llm**: 对话与向量模型客户端（OpenAI 兼容 / Mock）
//! - **market** / **servers**: 新闻·股票与计算器 MCP 服务器
//! - **memory**: 消息与聊天记录
//! - **config** / **observability**: 配置加载与日志
//! - **ui**: Ratatui TUI；**web**（feature `web`）: axum HTTP 服务

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod market;
pub mod mcp;
pub mod memory;
pub mod observability;
pub mod rag;
pub mod react;
pub mod servers;
pub mod session;
pub mod tools;
pub mod ui;
#[cfg(feature = "web")]
pub mod web;
