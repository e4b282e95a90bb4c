//! 文档分块与内存向量库
//!
//! Chunker 按分隔符优先级把长文本切成带重叠的块（UTF-8 安全）；
//! VectorStore 保存块及其向量，按余弦相似度取候选（含向量，供 MMR 重排）。

use std::sync::Arc;

use crate::llm::EmbeddingProvider;
use crate::rag::RagError;

/// 文档块
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    /// 来源文档（文件相对路径）
    pub source_id: String,
    /// 在原文档中的字节偏移
    pub offset: usize,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_id: source_id.into(),
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// 分块策略
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// 目标块大小（字符数）
    pub chunk_size: usize,
    /// 块之间的重叠（字符数）
    pub chunk_overlap: usize,
    /// 分隔符优先级（从高到低）
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            separators: ["\n\n", "\n", "다. ", ". ", "? ", "! ", " "]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// 文档分块器
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut current_idx = 0;

        while current_idx < total_chars {
            let target_end = (current_idx + self.config.chunk_size).min(total_chars);
            let mut actual_end = target_end;

            // 不是文末时，尽量在优先级最高的分隔符处断开
            if target_end < total_chars {
                let slice: String = chars[current_idx..target_end].iter().collect();
                for sep in &self.config.separators {
                    if let Some(pos) = slice.rfind(sep.as_str()) {
                        let chars_to_sep = slice[..pos].chars().count() + sep.chars().count();
                        if chars_to_sep > self.config.chunk_overlap {
                            actual_end = current_idx + chars_to_sep;
                            break;
                        }
                    }
                }
            }

            let chunk_text: String = chars[current_idx..actual_end].iter().collect();
            let trimmed = chunk_text.trim();
            if !trimmed.is_empty() {
                let byte_offset: usize = chars[..current_idx].iter().map(|c| c.len_utf8()).sum();
                chunks.push(
                    Chunk::new(format!("{}_{}", doc_id, chunks.len()), trimmed, doc_id)
                        .with_offset(byte_offset),
                );
            }

            if actual_end >= total_chars {
                break;
            }
            let overlap = self.config.chunk_overlap.min(actual_end - current_idx);
            let next_start = actual_end - overlap;
            current_idx = if next_start > current_idx { next_start } else { actual_end };
        }

        chunks
    }
}

/// 内存向量库
pub struct VectorStore {
    entries: Vec<(Chunk, Vec<f32>)>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            entries: Vec::new(),
            embedder,
        }
    }

    /// 批量编码并加入；空向量的块被跳过，返回实际加入数
    pub async fn add_chunks(&mut self, chunks: Vec<Chunk>) -> Result<usize, RagError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(RagError::Embedding)?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        let before = self.entries.len();
        self.entries.extend(
            chunks
                .into_iter()
                .zip(embeddings)
                .filter(|(_, emb)| !emb.is_empty()),
        );
        Ok(self.entries.len() - before)
    }

    /// 与查询向量最相似的 fetch_k 个候选（按相似度降序）
    pub fn candidates(&self, query_embedding: &[f32], fetch_k: usize) -> Vec<(&Chunk, &[f32], f32)> {
        let mut scored: Vec<(&Chunk, &[f32], f32)> = self
            .entries
            .iter()
            .map(|(chunk, emb)| (chunk, emb.as_slice(), cosine_similarity(query_embedding, emb)))
            .collect();
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(fetch_k);
        scored
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 余弦相似度；维度不同或零向量时为 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
