//! TUI 层：Ratatui + crossterm，主循环（app）、事件（event）、渲染（render）

pub mod app;
pub mod event;
pub mod render;

pub use app::{run_app, App, ChatMode, ModeInfo, RAG_INFO, TOOL_CHAT_INFO};
pub use event::{AppEvent, EventHandler, UiCommand};
pub use render::draw;
