//! 检索器：Retriever trait、本地目录索引实现与按配置选择后端
//!
//! 两种实现都先取 fetch_k 个候选再用 MMR 重排到 k 个。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::config::{EmbeddingSection, RetrieverSection};
use crate::llm::{create_embedder_from_config, EmbeddingProvider, HashingEmbedder};
use crate::rag::{maximal_marginal_relevance, ChromaRetriever, Chunker, RagError, VectorStore};

/// 检索到的一段文本
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub content: String,
    pub source: Option<String>,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RagError>;
}

/// MMR 参数
#[derive(Debug, Clone, Copy)]
pub struct MmrParams {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda_mult: f32,
}

impl MmrParams {
    pub fn from_config(cfg: &RetrieverSection) -> Self {
        Self {
            k: cfg.k,
            fetch_k: cfg.fetch_k.max(cfg.k),
            lambda_mult: cfg.lambda_mult,
        }
    }
}

impl Default for MmrParams {
    fn default() -> Self {
        Self::from_config(&RetrieverSection::default())
    }
}

/// 本地检索：索引目录下的 .txt / .md 文件到内存向量库
pub struct LocalRetriever {
    store: VectorStore,
    params: MmrParams,
}

impl LocalRetriever {
    pub fn new(store: VectorStore, params: MmrParams) -> Self {
        Self { store, params }
    }

    /// 递归读取 dir 下的文本文件，分块后编码入库
    pub async fn from_dir(
        dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        params: MmrParams,
    ) -> Result<Self, RagError> {
        let chunker = Chunker::default();
        let mut store = VectorStore::new(embedder);
        let mut files = 0usize;

        for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("txt") || e.eq_ignore_ascii_case("md"))
                .unwrap_or(false);
            if !entry.file_type().is_file() || !is_text {
                continue;
            }
            let text = std::fs::read_to_string(path)?;
            let doc_id = path
                .strip_prefix(dir)
                .unwrap_or(path)
                .to_string_lossy()
                .into_owned();
            store.add_chunks(chunker.chunk(&doc_id, &text)).await?;
            files += 1;
        }

        tracing::info!(dir = %dir.display(), files, chunks = store.len(), "local index built");
        Ok(Self::new(store, params))
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[async_trait]
impl Retriever for LocalRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RagError> {
        let query_embedding = self
            .store
            .embedder()
            .embed(query)
            .await
            .map_err(RagError::Embedding)?;
        if query_embedding.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = self.store.candidates(&query_embedding, self.params.fetch_k);
        let embeddings: Vec<&[f32]> = candidates.iter().map(|(_, emb, _)| *emb).collect();
        let picked = maximal_marginal_relevance(
            &query_embedding,
            &embeddings,
            self.params.k,
            self.params.lambda_mult,
        );
        Ok(picked
            .into_iter()
            .map(|i| {
                let chunk = candidates[i].0;
                Passage {
                    content: chunk.text.clone(),
                    source: Some(chunk.source_id.clone()),
                }
            })
            .collect())
    }
}

/// 按配置构建检索器：配置了 chroma_url 用 Chroma，否则索引本地 docs_dir
///
/// 没有 OPENAI_API_KEY 时本地索引退回离线哈希嵌入；Chroma 集合必须用同一嵌入模型，因此要求 API Key。
pub async fn build_retriever(
    retriever: &RetrieverSection,
    embedding: &EmbeddingSection,
    http_timeout: std::time::Duration,
) -> Result<Arc<dyn Retriever>, RagError> {
    let params = MmrParams::from_config(retriever);
    let embedder = create_embedder_from_config(embedding);

    if let Some(url) = retriever.chroma_url.as_deref().filter(|u| !u.trim().is_empty()) {
        let embedder = embedder.ok_or_else(|| {
            RagError::Embedding("OPENAI_API_KEY is required to query Chroma".to_string())
        })?;
        let chroma = ChromaRetriever::connect(url, retriever, embedder, params, http_timeout).await?;
        match chroma.count().await {
            Ok(n) => tracing::info!(collection = %retriever.collection, documents = n, "Chroma DB loaded"),
            Err(e) => tracing::warn!(error = %e, "Chroma count failed"),
        }
        return Ok(Arc::new(chroma));
    }

    let embedder = embedder.unwrap_or_else(|| {
        tracing::warn!("OPENAI_API_KEY not set, local index uses hashing embedder");
        Arc::new(HashingEmbedder::default())
    });
    let local = LocalRetriever::from_dir(&retriever.docs_dir, embedder, params).await?;
    if local.is_empty() {
        tracing::warn!(dir = %retriever.docs_dir.display(), "no documents indexed");
    }
    Ok(Arc::new(local))
}
