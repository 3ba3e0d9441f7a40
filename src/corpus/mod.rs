//! 말뭉치 수집 모듈 - 인덱스 구축용 문서 수집·추출
//!
//! 벡터 인덱스는 이 모듈을 통해 별도 배치 작업(ingest)으로 구축됩니다.
//! 텍스트/마크다운/PDF 파일을 수집하고 (.gitignore 패턴 존중),
//! 텍스트를 추출하여 청킹·임베딩 파이프라인에 넘깁니다.

pub mod pdf;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 말뭉치 파일 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 텍스트 파일 (txt, md)
    Text,
    /// PDF 파일
    Pdf,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" | "txt" => Some(FileType::Text),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Collection
// ============================================================================

/// 수집된 말뭉치 파일
#[derive(Debug, Clone)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub file_type: FileType,
}

/// 단일 파일 수집 (지원하지 않는 타입이면 None)
pub fn collect_file(path: &Path) -> Result<Option<CorpusFile>> {
    if !path.is_file() {
        anyhow::bail!("Not a file: {:?}", path);
    }

    Ok(FileType::from_path(path).map(|file_type| CorpusFile {
        path: path.to_path_buf(),
        file_type,
    }))
}

/// 폴더 재귀 수집 (.gitignore 패턴 존중)
pub fn collect_directory(dir: &Path) -> Result<Vec<CorpusFile>> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {:?}", dir);
    }

    let mut files = Vec::new();

    for entry in WalkBuilder::new(dir).hidden(true).build() {
        let entry = entry.context("Failed to walk directory")?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(file_type) = FileType::from_path(path) {
            files.push(CorpusFile {
                path: path.to_path_buf(),
                file_type,
            });
        }
    }

    // 결정적 순서로 정렬
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

// ============================================================================
// Extraction
// ============================================================================

/// 추출된 문서 (출처 라벨 + 본문)
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    /// 출처 라벨 (파일명, PDF는 페이지 포함)
    pub source: String,
    /// 추출된 텍스트
    pub text: String,
}

/// 파일에서 텍스트 추출
///
/// PDF는 페이지별로 문서 하나씩 반환합니다.
pub async fn extract(file: &CorpusFile) -> Result<Vec<ExtractedDocument>> {
    let file_name = file
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    match file.file_type {
        FileType::Text => {
            let text = tokio::fs::read_to_string(&file.path)
                .await
                .with_context(|| format!("Failed to read text file: {:?}", file.path))?;

            Ok(vec![ExtractedDocument {
                source: file_name,
                text,
            }])
        }
        FileType::Pdf => {
            // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
            let path = file.path.clone();
            let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
                .await
                .context("PDF extraction task failed")??;

            Ok(pages
                .into_iter()
                .map(|(page_num, text)| ExtractedDocument {
                    source: format!("{} (p.{})", file_name, page_num),
                    text,
                })
                .collect())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
