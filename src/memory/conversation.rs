//! 对话消息
//!
//! - Message / Role：发给 LLM 的消息（含 System）
//! - ChatTurn：界面上的聊天记录，只有 User / Assistant 两种角色；façade 只追加、不修改

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 聊天记录中的角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// 聊天记录中的一轮发言（序列化为 {"role": "user", "content": "..."}）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ChatTurn> for Message {
    fn from(turn: &ChatTurn) -> Self {
        match turn.role {
            ChatRole::User => Message::user(turn.content.clone()),
            ChatRole::Assistant => Message::assistant(turn.content.clone()),
        }
    }
}

/// 返回追加了 (user, assistant) 一问一答的新记录；原记录不变
pub fn append_exchange(history: &[ChatTurn], user: &str, assistant: impl Into<String>) -> Vec<ChatTurn> {
    let mut next = history.to_vec();
    next.push(ChatTurn::user(user));
    next.push(ChatTurn::assistant(assistant));
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_exchange_keeps_original() {
        let history = vec![ChatTurn::user("안녕"), ChatTurn::assistant("안녕하세요")];
        let next = append_exchange(&history, "2+2?", "4");
        assert_eq!(history.len(), 2);
        assert_eq!(next.len(), 4);
        assert_eq!(next[2], ChatTurn::user("2+2?"));
        assert_eq!(next[3], ChatTurn::assistant("4"));
    }

    #[test]
    fn test_chat_turn_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatTurn::assistant("ok")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "ok");
    }

    #[test]
    fn test_chat_turn_to_message() {
        let m: Message = (&ChatTurn::user("q")).into();
        assert_eq!(m.role, Role::User);
        assert_eq!(m.content, "q");
    }
}
