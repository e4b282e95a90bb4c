//! 对话数据：LLM 消息（Message / Role）与界面聊天记录（ChatTurn）

pub mod conversation;

pub use conversation::{append_exchange, ChatRole, ChatTurn, Message, Role};
