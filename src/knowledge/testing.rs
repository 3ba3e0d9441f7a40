//! 테스트용 스텁 구현체
//!
//! 외부 서비스 없이 검색 파이프라인을 검증하기 위한 결정적 스텁입니다.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;

use super::vector::{ChunkEntry, RetrievedChunk, VectorStore, EMBEDDING_DIMENSION};

/// 결정적 스텁 임베딩 (API 호출 없음)
pub(crate) struct StubEmbedding {
    dimension: usize,
}

impl StubEmbedding {
    pub(crate) fn new() -> Self {
        Self {
            dimension: EMBEDDING_DIMENSION as usize,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // 바이트 값 기반 결정적 벡터
        let mut vector = vec![0.0f32; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dimension] += byte as f32 / 255.0;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "stub-embedding"
    }
}

/// 인메모리 스텁 벡터 저장소
///
/// 삽입 순서대로 저장하고, 검색 시 앞에서부터 limit개를 반환합니다.
#[derive(Default)]
pub(crate) struct StubVectorStore {
    entries: Mutex<Vec<ChunkEntry>>,
}

impl StubVectorStore {
    pub(crate) fn with_chunks(texts: Vec<String>) -> Self {
        let entries = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| ChunkEntry {
                source: "stub".to_string(),
                chunk_index: i as i32,
                text,
                embedding: Vec::new(),
            })
            .collect();

        Self {
            entries: Mutex::new(entries),
        }
    }
}

#[async_trait]
impl VectorStore for StubVectorStore {
    async fn insert_batch(&self, entries: &[ChunkEntry]) -> Result<usize> {
        let mut stored = self.entries.lock().unwrap();
        stored.extend_from_slice(entries);
        Ok(entries.len())
    }

    async fn search(&self, _query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        let stored = self.entries.lock().unwrap();
        Ok(stored
            .iter()
            .take(limit)
            .enumerate()
            .map(|(rank, entry)| RetrievedChunk {
                source: entry.source.clone(),
                chunk_index: entry.chunk_index,
                text: entry.text.clone(),
                similarity: 1.0 - rank as f32 * 0.01,
            })
            .collect())
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        let mut stored = self.entries.lock().unwrap();
        let before = stored.len();
        stored.retain(|e| e.source != source);
        Ok(before - stored.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.lock().unwrap().len())
    }

    async fn has_source(&self, source: &str) -> Result<bool> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.source == source))
    }
}
