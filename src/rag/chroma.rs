//! Chroma 向量库检索（HTTP API v2）
//!
//! 启动时按名称解析集合 id；查询时用查询向量取 fetch_k 个候选（含向量），再 MMR 重排到 k 个。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::RetrieverSection;
use crate::llm::EmbeddingProvider;
use crate::rag::{maximal_marginal_relevance, MmrParams, Passage, RagError, Retriever};

#[derive(Debug, Deserialize)]
struct Collection {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<Vec<f32>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
}

pub struct ChromaRetriever {
    http: reqwest::Client,
    /// .../api/v2/tenants/{tenant}/databases/{database}/collections/{id}
    collection_url: String,
    embedder: Arc<dyn EmbeddingProvider>,
    params: MmrParams,
}

impl ChromaRetriever {
    pub async fn connect(
        base_url: &str,
        cfg: &RetrieverSection,
        embedder: Arc<dyn EmbeddingProvider>,
        params: MmrParams,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let collections_url = format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            base_url.trim_end_matches('/'),
            cfg.tenant,
            cfg.database
        );
        let collection: Collection = http
            .get(format!("{}/{}", collections_url, cfg.collection))
            .send()
            .await?
            .error_for_status()
            .map_err(|e| RagError::VectorStore(format!("collection '{}' not available: {}", cfg.collection, e)))?
            .json()
            .await?;

        Ok(Self {
            http,
            collection_url: format!("{}/{}", collections_url, collection.id),
            embedder,
            params,
        })
    }

    /// 集合中的文档数
    pub async fn count(&self) -> Result<u64, RagError> {
        let n = self
            .http
            .get(format!("{}/count", self.collection_url))
            .send()
            .await?
            .error_for_status()?
            .json::<u64>()
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl Retriever for ChromaRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RagError> {
        let query_embedding = self.embedder.embed(query).await.map_err(RagError::Embedding)?;
        if query_embedding.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "query_embeddings": [query_embedding],
            "n_results": self.params.fetch_k,
            "include": ["documents", "metadatas", "embeddings"],
        });
        let response: QueryResponse = self
            .http
            .post(format!("{}/query", self.collection_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let candidates = candidates_from_response(response);
        let embeddings: Vec<&[f32]> = candidates.iter().map(|(_, e)| e.as_slice()).collect();
        let picked = maximal_marginal_relevance(
            &query_embedding,
            &embeddings,
            self.params.k,
            self.params.lambda_mult,
        );
        Ok(picked.into_iter().map(|i| candidates[i].0.clone()).collect())
    }
}

/// 取第一个查询的结果；没有文本的条目丢弃
fn candidates_from_response(response: QueryResponse) -> Vec<(Passage, Vec<f32>)> {
    let documents = response.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
    let mut embeddings = response
        .embeddings
        .and_then(|e| e.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = response
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default()
        .into_iter();

    documents
        .into_iter()
        .filter_map(|doc| {
            let embedding = embeddings.next().unwrap_or_default();
            let source = metadatas
                .next()
                .flatten()
                .and_then(|m| m.get("source").and_then(Value::as_str).map(String::from));
            doc.map(|content| (Passage { content, source }, embedding))
        })
        .collect()
}
