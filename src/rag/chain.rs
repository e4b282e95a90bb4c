//! 근로기준법 问答链：检索 -> 拼 prompt -> LLM
//!
//! - 聊天界面：指令 + 历史 + 上下文 + 问题，多条消息（`answer`）
//! - HTTP：单一模板，[컨텍스트] / [질문] / [답변 형식] / [답변] 依次排列（`ask`）

use std::sync::Arc;

use crate::llm::LlmClient;
use crate::memory::{ChatTurn, Message};
use crate::rag::{Passage, RagError, Retriever};

/// 上下文中找不到答案时模型应给出的固定句子
pub const FALLBACK_ANSWER: &str = "주어진 정보만으로는 답변하기 어렵습니다.";

fn instructions() -> String {
    format!(
        "주어진 컨텍스트를 기반으로 질문에 답변하시오.\n\n\
        [지침]\n\
        - 컨텍스트에 있는 정보만을 사용하여 답변할 것\n\
        - 외부 지식이나 정보를 사용하지 말 것\n\
        - 컨텍스트에서 답을 찾을 수 없는 경우 \"{}\"라고 응답할 것\n\
        - 불확실한 경우 명확히 그 불확실성을 표현할 것\n\
        - 답변은 논리적이고 구조화된 형태로 제공할 것\n\
        - 답변은 한국어를 사용할 것",
        FALLBACK_ANSWER
    )
}

const ANSWER_FORMAT: &str = "[답변 형식]\n\
    1. 핵심 답변: (질문에 대한 직접적인 답변)\n\
    2. 근거: (컨텍스트에서 발견된 관련 정보)\n\
    3. 추가 설명: (필요한 경우 부연 설명 제공)";

fn context_block(context: &str) -> String {
    format!(
        "[컨텍스트]\n{}\n\n\
        이전 대화 내용을 참고하여 질문에 대해서 친절하게 답변합니다.\n\n{}",
        context, ANSWER_FORMAT
    )
}

/// 无历史的单一模板
pub fn build_single_prompt(question: &str, context: &str) -> String {
    format!(
        "{}\n\n[컨텍스트]\n{}\n\n[질문]\n{}\n\n{}\n\n[답변]\n",
        instructions(),
        context,
        question,
        ANSWER_FORMAT
    )
}

/// 段落正文以空行连接
pub fn format_docs(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 组装发给 LLM 的消息序列
pub fn build_messages(question: &str, history: &[ChatTurn], context: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(Message::system(instructions()));
    messages.extend(history.iter().map(Message::from));
    messages.push(Message::system(context_block(context)));
    messages.push(Message::user(question.to_string()));
    messages
}

pub struct RagChain {
    llm: Arc<dyn LlmClient>,
    retriever: Arc<dyn Retriever>,
}

impl RagChain {
    pub fn new(llm: Arc<dyn LlmClient>, retriever: Arc<dyn Retriever>) -> Self {
        Self { llm, retriever }
    }

    /// 用问题检索上下文并作答；history 为空即无历史的单问单答
    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<String, RagError> {
        let passages = self.retriever.retrieve(question).await?;
        tracing::debug!(passages = passages.len(), "retrieved context");
        let messages = build_messages(question, history, &format_docs(&passages));
        self.llm.complete(&messages).await.map_err(RagError::Llm)
    }

    /// 单问单答：整段模板作为一条用户消息
    pub async fn ask(&self, question: &str) -> Result<String, RagError> {
        let passages = self.retriever.retrieve(question).await?;
        tracing::debug!(passages = passages.len(), "retrieved context");
        let prompt = build_single_prompt(question, &format_docs(&passages));
        self.llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(RagError::Llm)
    }
}
