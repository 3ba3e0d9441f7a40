//! Retriever - 벡터 인덱스 기반 청크 검색
//!
//! 질문을 임베딩하여 벡터 인덱스에서 가장 유사한 청크 K개를 가져옵니다.
//! 유사도 계산·순위 결정은 전적으로 벡터 저장소에 위임합니다.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::embedding::{EmbeddingProvider, OpenAiEmbedding};

use super::chunker::{default_chunker, Chunker};
use super::lance::LanceVectorStore;
use super::vector::{ChunkEntry, RetrievedChunk, VectorStore};

/// 검색 결과 청크 수 (고정)
pub const TOP_K: usize = 4;

// ============================================================================
// Retriever
// ============================================================================

/// 벡터 검색기
///
/// 임베딩 프로바이더와 벡터 저장소를 묶어 질의 → 청크 검색을 제공합니다.
/// 인덱스 구축(ingest) 경로인 `index_document`도 여기서 담당합니다.
pub struct Retriever {
    embedder: Box<dyn EmbeddingProvider>,
    store: Box<dyn VectorStore>,
    chunker: Box<dyn Chunker>,
}

impl Retriever {
    /// 구성 요소를 직접 지정하여 생성
    pub fn new(
        embedder: Box<dyn EmbeddingProvider>,
        store: Box<dyn VectorStore>,
        chunker: Box<dyn Chunker>,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker,
        }
    }

    /// 설정 기반 생성 (OpenAI 임베딩 + LanceDB)
    ///
    /// 데이터 디렉토리가 없으면 생성합니다.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let data_dir: &Path = &config.data_dir;
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        }

        let lance_path = data_dir.join("vectors.lance");
        let store = LanceVectorStore::open(&lance_path, &config.index_name)
            .await
            .context("Failed to open vector store")?;

        let embedder = OpenAiEmbedding::from_env(config).context("Failed to create embedder")?;

        Ok(Self::new(
            Box::new(embedder),
            Box::new(store),
            default_chunker(),
        ))
    }

    /// 질의와 가장 유사한 청크 TOP_K개 검색
    ///
    /// 연결 실패·인덱스 없음 등의 에러는 그대로 전파합니다.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let results = self
            .store
            .search(&query_embedding, TOP_K)
            .await
            .context("Vector search failed")?;

        tracing::debug!(query = %query, chunks = results.len(), "Retrieved context");

        Ok(results)
    }

    /// 문서를 청킹·임베딩하여 인덱스에 추가
    ///
    /// # Returns
    /// 삽입된 청크 수
    pub async fn index_document(&self, source: &str, text: &str) -> Result<usize> {
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            tracing::warn!("No chunks generated for document: {}", source);
            return Ok(0);
        }

        tracing::debug!(
            chunker = self.chunker.name(),
            chunks = chunks.len(),
            "Chunked document"
        );

        let embeddings = self
            .embedder
            .embed_batch(&chunks)
            .await
            .context("Failed to embed chunks")?;

        let entries: Vec<ChunkEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| ChunkEntry {
                source: source.to_string(),
                chunk_index: i as i32,
                text,
                embedding,
            })
            .collect();

        let inserted = self
            .store
            .insert_batch(&entries)
            .await
            .context("Failed to insert vectors")?;

        tracing::info!("Indexed document: {} ({} chunks)", source, inserted);

        Ok(inserted)
    }

    /// 출처가 이미 인덱스에 있는지 확인
    pub async fn has_document(&self, source: &str) -> Result<bool> {
        self.store.has_source(source).await
    }

    /// 출처 기준 삭제
    pub async fn delete_document(&self, source: &str) -> Result<usize> {
        self.store.delete_by_source(source).await
    }

    /// 인덱스에 저장된 청크 수
    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.count().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::testing::{StubEmbedding, StubVectorStore};
    use tempfile::TempDir;

    fn test_retriever_with_lance(lance: LanceVectorStore) -> Retriever {
        Retriever::new(
            Box::new(StubEmbedding::new()),
            Box::new(lance),
            default_chunker(),
        )
    }

    #[tokio::test]
    async fn test_index_and_retrieve_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("retriever.lance");
        let lance = LanceVectorStore::open(&lance_path, "tax-index").await.unwrap();
        let retriever = test_retriever_with_lance(lance);

        let inserted = retriever
            .index_document("소득세법.txt", "제15조(세율)\n소득세율은 15%이다")
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let results = retriever.retrieve("소득세율이 얼마인가요?").await.unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= TOP_K);
        assert!(results[0].text.contains("소득세율은 15%이다"));
    }

    #[tokio::test]
    async fn test_index_empty_document() {
        let retriever = Retriever::new(
            Box::new(StubEmbedding::new()),
            Box::new(StubVectorStore::default()),
            default_chunker(),
        );

        let inserted = retriever.index_document("empty.txt", "   ").await.unwrap();
        assert_eq!(inserted, 0);
    }

    #[tokio::test]
    async fn test_has_document_after_indexing() {
        let retriever = Retriever::new(
            Box::new(StubEmbedding::new()),
            Box::new(StubVectorStore::default()),
            default_chunker(),
        );

        assert!(!retriever.has_document("소득세법.txt").await.unwrap());

        retriever
            .index_document("소득세법.txt", "제1조(목적) 이 법은 소득세의 과세 요건을 정한다.")
            .await
            .unwrap();

        assert!(retriever.has_document("소득세법.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_retrieve_limit_is_top_k() {
        let store = StubVectorStore::with_chunks(
            (0..10)
                .map(|i| format!("청크 {}", i))
                .collect::<Vec<_>>(),
        );
        let retriever = Retriever::new(
            Box::new(StubEmbedding::new()),
            Box::new(store),
            default_chunker(),
        );

        let results = retriever.retrieve("질문").await.unwrap();
        assert_eq!(results.len(), TOP_K);
    }
}
