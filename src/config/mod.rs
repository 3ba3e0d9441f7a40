//! 설정 모듈 - 배포 구성 및 API 키 관리
//!
//! 챗 모델, 임베딩 모델, 벡터 인덱스 이름 등 배포에 사용되는
//! 설정값을 관리합니다. 환경변수로 덮어쓸 수 있습니다.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

/// 기본 챗 모델
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";

/// 기본 임베딩 모델 (3072 차원)
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// 기본 벡터 인덱스 이름
pub const DEFAULT_INDEX_NAME: &str = "tax-index";

/// 기본 API 베이스 URL (OpenAI 호환)
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// 세션 유휴 타임아웃 기본값 (1시간)
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

// ============================================================================
// AppConfig
// ============================================================================

/// 애플리케이션 설정
///
/// K(검색 결과 수)는 설정이 아닌 고정값입니다 (`knowledge::retriever::TOP_K`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 챗 모델 이름
    pub chat_model: String,
    /// 임베딩 모델 이름
    pub embedding_model: String,
    /// 벡터 인덱스(테이블) 이름
    pub index_name: String,
    /// API 베이스 URL
    pub api_base: String,
    /// 데이터 디렉토리 (~/.sotax-rag/)
    pub data_dir: PathBuf,
    /// 세션 유휴 타임아웃
    pub session_idle: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            index_name: DEFAULT_INDEX_NAME.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            data_dir: default_data_dir(),
            session_idle: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

impl AppConfig {
    /// 환경변수를 반영한 설정 로드
    ///
    /// 우선순위: 환경변수 > 기본값
    /// - `SOTAX_CHAT_MODEL`
    /// - `SOTAX_EMBEDDING_MODEL`
    /// - `SOTAX_INDEX`
    /// - `SOTAX_DATA_DIR`
    /// - `OPENAI_API_BASE`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("SOTAX_CHAT_MODEL") {
            if !model.is_empty() {
                config.chat_model = model;
            }
        }
        if let Ok(model) = std::env::var("SOTAX_EMBEDDING_MODEL") {
            if !model.is_empty() {
                config.embedding_model = model;
            }
        }
        if let Ok(index) = std::env::var("SOTAX_INDEX") {
            if !index.is_empty() {
                config.index_name = index;
            }
        }
        if let Ok(dir) = std::env::var("SOTAX_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            if !base.is_empty() {
                config.api_base = base.trim_end_matches('/').to_string();
            }
        }

        config
    }
}

/// 기본 데이터 디렉토리 (~/.sotax-rag/)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sotax-rag")
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
pub fn get_api_key() -> Result<String> {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            tracing::debug!("Using API key from OPENAI_API_KEY");
            return Ok(key);
        }
    }

    anyhow::bail!(
        "API key not found. Set OPENAI_API_KEY environment variable.\n\
         Get your API key at: https://platform.openai.com/api-keys"
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    std::env::var("OPENAI_API_KEY")
        .map(|key| !key.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.embedding_model, "text-embedding-3-large");
        assert_eq!(config.index_name, "tax-index");
        assert_eq!(config.session_idle, Duration::from_secs(3600));
    }

    #[test]
    fn test_default_data_dir_ends_with_app_dir() {
        let dir = default_data_dir();
        assert!(dir.ends_with(".sotax-rag"));
    }
}
