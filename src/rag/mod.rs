//! RAG（检索增强生成）：文档分块与内存向量库、MMR 重排、Chroma 检索、问答链与同步 façade

pub mod chain;
pub mod chroma;
pub mod facade;
pub mod mmr;
pub mod retriever;
pub mod store;

use thiserror::Error;

pub use chain::{format_docs, RagChain, FALLBACK_ANSWER};
pub use chroma::ChromaRetriever;
pub use facade::RagFacade;
pub use mmr::maximal_marginal_relevance;
pub use retriever::{build_retriever, LocalRetriever, MmrParams, Passage, Retriever};
pub use store::{Chunk, Chunker, ChunkingConfig, VectorStore};

#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to read documents: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(String),
}
