//! Knowledge 모듈 - 말뭉치 벡터 인덱스
//!
//! - Chunker: 법령 조문 인식 텍스트 분할
//! - LanceDB: 벡터 검색 (ANN)
//! - Retriever: 질의 임베딩 → TOP_K 청크 검색

mod chunker;
mod lance;
mod retriever;
mod vector;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use chunker::{default_chunker, ChunkConfig, Chunker, StatuteChunker};
pub use lance::LanceVectorStore;
pub use retriever::{Retriever, TOP_K};
pub use vector::{ChunkEntry, RetrievedChunk, VectorStore, EMBEDDING_DIMENSION};
