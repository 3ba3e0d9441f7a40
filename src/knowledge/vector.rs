//! Vector Store - 벡터 검색 트레이트 및 타입
//!
//! 말뭉치 청크와 임베딩을 저장하고 유사도 검색을 제공하는 인터페이스입니다.
//! 유사도 계산과 순위 결정은 저장소 구현체(LanceDB)의 책임입니다.

use anyhow::Result;
use async_trait::async_trait;

/// 벡터 임베딩 차원 (text-embedding-3-large)
pub const EMBEDDING_DIMENSION: i32 = 3072;

// ============================================================================
// Types
// ============================================================================

/// 벡터 인덱스에 저장되는 문서 청크
///
/// 원본 문서의 연속된 텍스트 범위와 출처 메타데이터를 담습니다.
/// 생성 후 변경되지 않습니다.
#[derive(Debug, Clone)]
pub struct ChunkEntry {
    /// 출처 (파일 경로 또는 문서 라벨)
    pub source: String,
    /// 청크 인덱스 (0-based, 문서 내 위치)
    pub chunk_index: i32,
    /// 청크 텍스트
    pub text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색된 청크
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// 출처
    pub source: String,
    /// 청크 인덱스
    pub chunk_index: i32,
    /// 청크 텍스트
    pub text: String,
    /// 유사도 스코어 (높을수록 유사)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 청크 배치 삽입
    async fn insert_batch(&self, entries: &[ChunkEntry]) -> Result<usize>;

    /// 유사도 검색 (최대 limit개, 유사도 순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>>;

    /// 출처 기준 삭제
    async fn delete_by_source(&self, source: &str) -> Result<usize>;

    /// 저장된 청크 수
    async fn count(&self) -> Result<usize>;

    /// 특정 출처의 청크 존재 여부
    async fn has_source(&self, source: &str) -> Result<bool>;
}
