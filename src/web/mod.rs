//! HTTP 接口（axum）
//!
//! - `/openai/invoke`、`/openai/batch`：直接调用 LLM，input 为字符串或 {role, content} 消息数组
//! - `/rag/invoke`、`/rag/batch`：근로기준법 问答链（无历史的单一模板），input 为问题字符串
//! - `/health`
//!
//! 请求体 `{"input": ...}` / `{"inputs": [...]}`，响应 `{"output": ...}`；错误返回 `{"error": ...}`。

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmClient;
use crate::memory::Message;
use crate::rag::RagChain;

/// 路由共享状态
pub struct AppState {
    pub llm: Arc<dyn LlmClient>,
    /// 检索后端初始化失败时为 None，/rag/* 返回 503
    pub rag: Option<Arc<RagChain>>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct InvokeRequest<T> {
    pub input: T,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest<T> {
    pub inputs: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct InvokeResponse<T> {
    pub output: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputMessage {
    pub role: String,
    pub content: String,
}

/// /openai 的输入：单个字符串视为一条用户消息
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChatInput {
    Text(String),
    Messages(Vec<InputMessage>),
}

impl ChatInput {
    pub fn into_messages(self) -> Result<Vec<Message>, ApiError> {
        match self {
            ChatInput::Text(text) => Ok(vec![Message::user(text)]),
            ChatInput::Messages(list) => {
                if list.is_empty() {
                    return Err(ApiError::BadRequest("input must not be empty".to_string()));
                }
                list.into_iter()
                    .map(|m| match m.role.as_str() {
                        "system" => Ok(Message::system(m.content)),
                        "user" | "human" => Ok(Message::user(m.content)),
                        "assistant" | "ai" => Ok(Message::assistant(m.content)),
                        other => Err(ApiError::BadRequest(format!("unknown role: {}", other))),
                    })
                    .collect()
            }
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/openai/invoke", post(openai_invoke))
        .route("/openai/batch", post(openai_batch))
        .route("/rag/invoke", post(rag_invoke))
        .route("/rag/batch", post(rag_batch))
        .with_state(state)
}

async fn complete(llm: &dyn LlmClient, input: ChatInput) -> Result<String, ApiError> {
    let messages = input.into_messages()?;
    llm.complete(&messages).await.map_err(ApiError::Internal)
}

async fn openai_invoke(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvokeRequest<ChatInput>>,
) -> Result<Json<InvokeResponse<String>>, ApiError> {
    let output = complete(state.llm.as_ref(), req.input).await?;
    Ok(Json(InvokeResponse { output }))
}

async fn openai_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest<ChatInput>>,
) -> Result<Json<InvokeResponse<Vec<String>>>, ApiError> {
    let output = try_join_all(req.inputs.into_iter().map(|input| complete(state.llm.as_ref(), input))).await?;
    Ok(Json(InvokeResponse { output }))
}

fn rag_chain(state: &AppState) -> Result<&RagChain, ApiError> {
    state
        .rag
        .as_deref()
        .ok_or_else(|| ApiError::Unavailable("retriever is not available".to_string()))
}

async fn rag_invoke(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvokeRequest<String>>,
) -> Result<Json<InvokeResponse<String>>, ApiError> {
    let chain = rag_chain(&state)?;
    let output = chain
        .ask(&req.input)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(InvokeResponse { output }))
}

async fn rag_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchRequest<String>>,
) -> Result<Json<InvokeResponse<Vec<String>>>, ApiError> {
    let chain = rag_chain(&state)?;
    let output = try_join_all(req.inputs.iter().map(|q| chain.ask(q)))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(InvokeResponse { output }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::llm::{MockLlmClient, ScriptedLlmClient};

    async fn call(app: Router, path: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn state(llm: Arc<dyn LlmClient>) -> Arc<AppState> {
        Arc::new(AppState { llm, rag: None })
    }

    #[tokio::test]
    async fn test_openai_invoke_with_string_and_messages() {
        let app = router(state(Arc::new(MockLlmClient)));
        let (status, body) = call(app.clone(), "/openai/invoke", json!({"input": "안녕"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "(mock) 안녕");

        let (_, body) = call(
            app,
            "/openai/invoke",
            json!({"input": [{"role": "system", "content": "s"}, {"role": "human", "content": "질문"}]}),
        )
        .await;
        assert_eq!(body["output"], "(mock) 질문");
    }

    #[tokio::test]
    async fn test_openai_batch() {
        let app = router(state(Arc::new(MockLlmClient)));
        let (status, body) = call(app, "/openai/batch", json!({"inputs": ["a", "b"]})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], json!(["(mock) a", "(mock) b"]));
    }

    #[tokio::test]
    async fn test_llm_failure_is_500_json() {
        let app = router(state(Arc::new(ScriptedLlmClient::new(Vec::<String>::new()))));
        let (status, body) = call(app, "/openai/invoke", json!({"input": "x"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("exhausted"));
    }

    #[tokio::test]
    async fn test_unknown_role_is_400_and_missing_rag_is_503() {
        let app = router(state(Arc::new(MockLlmClient)));
        let (status, _) = call(
            app.clone(),
            "/openai/invoke",
            json!({"input": [{"role": "tool", "content": "x"}]}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(app, "/rag/invoke", json!({"input": "연차휴가는?"})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_rag_invoke_uses_single_template() {
        use async_trait::async_trait;

        use crate::rag::{Passage, RagError, Retriever};

        struct OneArticle;

        #[async_trait]
        impl Retriever for OneArticle {
            async fn retrieve(&self, _query: &str) -> Result<Vec<Passage>, RagError> {
                Ok(vec![Passage {
                    content: "제50조 1주 40시간".to_string(),
                    source: None,
                }])
            }
        }

        let llm = Arc::new(ScriptedLlmClient::new(["1. 핵심 답변: 40시간"]));
        let rag = Arc::new(RagChain::new(llm.clone(), Arc::new(OneArticle)));
        let app = router(Arc::new(AppState {
            llm: llm.clone(),
            rag: Some(rag),
        }));

        let (status, body) = call(app, "/rag/invoke", json!({"input": "주당 근로시간은?"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["output"], "1. 핵심 답변: 40시간");

        let sent = &llm.calls()[0];
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.contains("[질문]\n주당 근로시간은?"));
        assert!(sent[0].content.ends_with("[답변]\n"));
    }
}
