//! 근로기준법 RAG 챗봇 TUI
//!
//! 检索后端在执行宿主上构建（Chroma 或本地文档索引），之后每个问题经 RagFacade 在宿主上回答。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use nomu::config::load_config_or_default;
use nomu::core::{HostRegistry, SessionError};
use nomu::llm::create_llm_from_config;
use nomu::observability;
use nomu::rag::{build_retriever, RagChain, RagFacade};
use nomu::ui::{run_app, App, ChatMode};

/// 本地索引要为每个文档块请求嵌入，启动时间比一次问答长
const STARTUP_TIMEOUT: Duration = Duration::from_secs(300);

fn main() -> anyhow::Result<()> {
    let cfg = load_config_or_default();
    observability::init_file(&cfg.app.log_dir, "nomu-rag.log");

    let host = HostRegistry::global();
    let retriever_cfg = cfg.retriever.clone();
    let embedding_cfg = cfg.embedding.clone();
    let http_timeout = Duration::from_secs(cfg.llm.request_timeout_secs);
    let retriever = host
        .submit(
            move |_| async move {
                build_retriever(&retriever_cfg, &embedding_cfg, http_timeout)
                    .await
                    .map_err(|e| SessionError::Operation(e.to_string()))
            },
            STARTUP_TIMEOUT,
        )
        .context("Failed to initialise retriever")?;

    let chain = Arc::new(RagChain::new(create_llm_from_config(&cfg), retriever));
    let facade = Arc::new(RagFacade::new(host, chain, cfg.retriever.answer_timeout()));

    let mut app = App::new(ChatMode::Rag(facade), "");
    let result = run_app(&mut app).context("App run failed");
    host.shutdown();
    result
}
