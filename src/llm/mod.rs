//! LLM 모듈 - 챗 모델 클라이언트
//!
//! OpenAI 호환 Chat Completions API를 통해 답변을 생성합니다.
//! 단건 완성(complete)과 토큰 스트리밍(complete_stream)을 모두 지원합니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let llm = OpenAiChat::from_env(&config)?;
//! let answer = llm.complete(&messages).await?;
//! ```

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

/// 챗 모델 호출 타임아웃
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ============================================================================
// Types
// ============================================================================

/// 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 역할 태그가 붙은 채팅 메시지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 토큰/조각 스트림
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

// ============================================================================
// Errors
// ============================================================================

/// 챗 모델 호출 에러 분류
///
/// 연결 실패, API 에러, 스트림 파싱 실패, 키 미설정을 구분합니다.
/// 재시도나 폴백 없이 호출자에게 그대로 전파됩니다.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Failed to reach chat model: {0}")]
    Connectivity(String),

    #[error("Chat model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed model response: {0}")]
    Stream(String),

    #[error("OPENAI_API_KEY not set")]
    MissingApiKey,
}

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 챗 모델 트레이트
///
/// 역할 태그 메시지 목록을 받아 완성된 텍스트 또는 토큰 스트림을 반환합니다.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 단건 완성 (전체 응답 대기)
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// 스트리밍 완성 (토큰 단위 조각 스트림)
    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError>;

    /// 모델 이름
    fn model(&self) -> &str;
}

// ============================================================================
// OpenAI Chat Client
// ============================================================================

/// OpenAI 호환 Chat Completions 클라이언트
pub struct OpenAiChat {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

/// Chat Completions 요청 본문
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// 단건 응답
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// 스트리밍 청크 (SSE data 라인)
#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

impl OpenAiChat {
    /// 새 클라이언트 생성
    pub fn new(api_base: &str, api_key: String, model: &str) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Connectivity(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    /// 설정과 환경변수(OPENAI_API_KEY)로 생성
    pub fn from_env(config: &AppConfig) -> Result<Self, LlmError> {
        let api_key = crate::config::get_api_key().map_err(|_| LlmError::MissingApiKey)?;
        Self::new(&config.api_base, api_key, &config.chat_model)
    }

    async fn send_request(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/v1/chat/completions", self.api_base);

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connectivity(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let response = self.send_request(messages, false).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Stream(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Stream("Response contained no choices".to_string()))
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let response = self.send_request(messages, true).await?;

        tracing::debug!(model = %self.model, "Chat stream started");

        // SSE 파싱 상태: (바이트 스트림, 라인 버퍼, 파싱된 조각 큐, 종료 플래그)
        let state = (response.bytes_stream(), String::new(), Vec::new(), false);

        let stream = futures::stream::unfold(
            state,
            |(mut bytes, mut buffer, mut pending, mut finished)| async move {
                loop {
                    // 이미 파싱된 조각이 있으면 먼저 반환
                    if !pending.is_empty() {
                        let fragment: String = pending.remove(0);
                        return Some((Ok(fragment), (bytes, buffer, pending, finished)));
                    }

                    if finished {
                        return None;
                    }

                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            buffer.push_str(&String::from_utf8_lossy(&chunk));
                            let (fragments, done) = drain_sse_buffer(&mut buffer);
                            pending = fragments;
                            finished = done;
                        }
                        Some(Err(e)) => {
                            return Some((
                                Err(LlmError::Stream(e.to_string())),
                                (bytes, buffer, pending, true),
                            ));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// 버퍼에서 완성된 SSE 라인을 꺼내 콘텐츠 조각으로 변환
///
/// "data: {...}" 라인의 delta.content를 모으고, "data: [DONE]"을 만나면
/// 종료 플래그를 반환합니다. 미완성 라인은 버퍼에 남겨둡니다.
fn drain_sse_buffer(buffer: &mut String) -> (Vec<String>, bool) {
    let mut fragments = Vec::new();
    let mut done = false;

    while let Some(newline) = buffer.find('\n') {
        let line: String = buffer.drain(..=newline).collect();
        let line = line.trim();

        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };

        if data == "[DONE]" {
            done = true;
            break;
        }

        if let Ok(chunk) = serde_json::from_str::<ChatChunk>(data) {
            if let Some(content) = chunk.choices.first().and_then(|c| c.delta.content.as_ref()) {
                if !content.is_empty() {
                    fragments.push(content.clone());
                }
            }
        }
    }

    (fragments, done)
}

// ============================================================================
// Tests
// ============================================================================
