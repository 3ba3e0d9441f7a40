//! LanceDB Vector Store - 벡터 인덱스 구현체
//!
//! ANN (Approximate Nearest Neighbor) 검색으로 말뭉치 청크를 검색합니다.
//! 인덱스는 설정된 이름의 테이블 하나에 저장됩니다 (기본값: tax-index).
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{ChunkEntry, RetrievedChunk, VectorStore, EMBEDDING_DIMENSION};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// Apache Arrow 기반 columnar 포맷으로 청크와 임베딩을 저장합니다.
pub struct LanceVectorStore {
    db: Connection,
    index_name: String,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `index_name` - 벡터 인덱스(테이블) 이름
    pub async fn open(path: &Path, index_name: &str) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            db,
            index_name: index_name.to_string(),
        })
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema() -> Schema {
        Schema::new(vec![
            Field::new("source", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("chunk_text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIMENSION,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(entries: &[ChunkEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        let sources: Vec<&str> = entries.iter().map(|e| e.source.as_str()).collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk_index).collect();
        let chunk_texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema()),
            vec![
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(chunk_texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&self.index_name))
            .unwrap_or(false)
    }

    /// 문자열 필터값 이스케이프 (작은따옴표 중복)
    fn escape_filter_value(value: &str) -> String {
        value.replace('\'', "''")
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[ChunkEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = Self::entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            // 기존 테이블에 추가
            let table = self
                .db
                .open_table(&self.index_name)
                .execute()
                .await
                .context("Failed to open table")?;

            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            // 새 테이블 생성
            self.db
                .create_table(&self.index_name, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        if !self.table_exists().await {
            anyhow::bail!("Vector index '{}' not found", self.index_name);
        }

        let table = self
            .db
            .open_table(&self.index_name)
            .execute()
            .await
            .context("Failed to open table for search")?;

        // 벡터 검색
        let results = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let mut retrieved = Vec::new();

        // RecordBatch 스트림에서 결과 추출
        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        for batch in batches {
            let sources = batch
                .column_by_name("source")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing source column"))?;

            let chunk_indices = batch
                .column_by_name("chunk_index")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

            let chunk_texts = batch
                .column_by_name("chunk_text")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing chunk_text column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                let distance = distances.value(i);
                // 거리를 유사도로 변환 (L2 거리 -> 코사인 유사도 근사)
                let similarity = 1.0 / (1.0 + distance);

                retrieved.push(RetrievedChunk {
                    source: sources.value(i).to_string(),
                    chunk_index: chunk_indices.value(i),
                    text: chunk_texts.value(i).to_string(),
                    similarity,
                });
            }
        }

        Ok(retrieved)
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(&self.index_name)
            .execute()
            .await
            .context("Failed to open table for delete")?;

        // 삭제 전 개수 확인
        let before_count = self.count().await?;

        let filter = format!("source = '{}'", Self::escape_filter_value(source));
        table
            .delete(&filter)
            .await
            .context("Failed to delete vectors")?;

        let after_count = self.count().await?;
        Ok(before_count.saturating_sub(after_count))
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(&self.index_name)
            .execute()
            .await
            .context("Failed to open table for count")?;

        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn has_source(&self, source: &str) -> Result<bool> {
        if !self.table_exists().await {
            return Ok(false);
        }

        let table = self
            .db
            .open_table(&self.index_name)
            .execute()
            .await
            .context("Failed to open table")?;

        let filter = format!("source = '{}'", Self::escape_filter_value(source));
        let count = table
            .count_rows(Some(filter))
            .await
            .context("Failed to count rows for source")?;

        Ok(count > 0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_entry(source: &str, chunk_index: i32) -> ChunkEntry {
        ChunkEntry {
            source: source.to_string(),
            chunk_index,
            text: format!("{} 청크 {}", source, chunk_index),
            embedding: vec![0.1; EMBEDDING_DIMENSION as usize],
        }
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("test.lance");

        let store = LanceVectorStore::open(&lance_path, "tax-index").await.unwrap();

        // 초기 상태
        assert_eq!(store.count().await.unwrap(), 0);

        // 삽입
        let entries = vec![
            create_test_entry("소득세법.txt", 0),
            create_test_entry("소득세법.txt", 1),
        ];
        let inserted = store.insert_batch(&entries).await.unwrap();
        assert_eq!(inserted, 2);

        // 개수 확인
        assert_eq!(store.count().await.unwrap(), 2);

        // 출처 존재 확인
        assert!(store.has_source("소득세법.txt").await.unwrap());
        assert!(!store.has_source("없는문서.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_lance_search() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("search_test.lance");

        let store = LanceVectorStore::open(&lance_path, "tax-index").await.unwrap();

        // 테스트 데이터 삽입
        let entries = vec![
            create_test_entry("a.txt", 0),
            create_test_entry("b.txt", 0),
            create_test_entry("c.txt", 0),
        ];
        store.insert_batch(&entries).await.unwrap();

        // 검색
        let query = vec![0.1; EMBEDDING_DIMENSION as usize];
        let results = store.search(&query, 2).await.unwrap();

        assert!(!results.is_empty());
        assert!(results.len() <= 2);
    }

    #[tokio::test]
    async fn test_lance_search_missing_index_fails() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("empty.lance");

        let store = LanceVectorStore::open(&lance_path, "tax-index").await.unwrap();

        // 인덱스가 없으면 에러 전파 (폴백 없음)
        let query = vec![0.1; EMBEDDING_DIMENSION as usize];
        let result = store.search(&query, 4).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_lance_delete_by_source() {
        let temp_dir = TempDir::new().unwrap();
        let lance_path = temp_dir.path().join("delete_test.lance");

        let store = LanceVectorStore::open(&lance_path, "tax-index").await.unwrap();

        // 삽입
        let entries = vec![
            create_test_entry("a.txt", 0),
            create_test_entry("a.txt", 1),
            create_test_entry("b.txt", 0),
        ];
        store.insert_batch(&entries).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        // 삭제
        let deleted = store.delete_by_source("a.txt").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_escape_filter_value() {
        assert_eq!(
            LanceVectorStore::escape_filter_value("o'clock"),
            "o''clock"
        );
        assert_eq!(LanceVectorStore::escape_filter_value("plain"), "plain");
    }
}
