//! nomu HTTP 服务
//!
//! 启动: cargo run --bin nomu-server --features web
//! 接口：POST /openai/invoke、/openai/batch、/rag/invoke、/rag/batch；GET /health

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use nomu::config::load_config_or_default;
use nomu::llm::create_llm_from_config;
use nomu::observability;
use nomu::rag::{build_retriever, RagChain};
use nomu::web::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_stdout();
    let cfg = load_config_or_default();

    let llm = create_llm_from_config(&cfg);
    let http_timeout = Duration::from_secs(cfg.llm.request_timeout_secs);
    // 检索后端不可用时仍启动，/rag/* 返回 503
    let rag = match build_retriever(&cfg.retriever, &cfg.embedding, http_timeout).await {
        Ok(retriever) => Some(Arc::new(RagChain::new(llm.clone(), retriever))),
        Err(e) => {
            tracing::error!(error = %e, "retriever initialisation failed, /rag disabled");
            None
        }
    };

    let app = router(Arc::new(AppState { llm, rag }));
    let addr = format!("{}:{}", cfg.web.host, cfg.web.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("nomu-server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
