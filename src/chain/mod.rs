//! Chain 모듈 - 대화형 RAG 파이프라인
//!
//! 요청당 고정 순서로 실행됩니다:
//! 사전 기반 질문 변경 → 히스토리 기반 질문 재구성 → 벡터 검색 →
//! 답변 스트리밍 생성 → 완성된 턴을 세션 히스토리에 추가.
//!
//! 각 단계의 에러는 재시도·폴백 없이 호출자에게 전파되며, 실패한 요청은
//! 히스토리에 아무것도 남기지 않습니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;

use crate::config::AppConfig;
use crate::knowledge::Retriever;
use crate::llm::{ChatModel, OpenAiChat, TokenStream};
use crate::prompt::{
    build_answer_messages, build_contextualize_messages, build_rewrite_messages, FewShotExample,
    ANSWER_EXAMPLES,
};
use crate::session::{SessionStore, Turn};

/// 현재 배포에서 사용하는 고정 세션 ID
pub const DEFAULT_SESSION_ID: &str = "abc123";

// ============================================================================
// ConversationChain
// ============================================================================

/// 대화 파이프라인 오케스트레이터
///
/// 챗 모델, 검색기, 세션 저장소를 묶어 단일 진입점을 제공합니다.
pub struct ConversationChain {
    llm: Arc<dyn ChatModel>,
    retriever: Retriever,
    sessions: Arc<SessionStore>,
    examples: &'static [FewShotExample],
}

impl ConversationChain {
    /// 구성 요소를 직접 지정하여 생성
    pub fn new(llm: Arc<dyn ChatModel>, retriever: Retriever, sessions: Arc<SessionStore>) -> Self {
        Self {
            llm,
            retriever,
            sessions,
            examples: ANSWER_EXAMPLES,
        }
    }

    /// 설정 기반 생성 (OpenAI 챗 모델 + LanceDB 검색기)
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let llm = OpenAiChat::from_env(config).context("Failed to create chat model")?;
        let retriever = Retriever::from_config(config).await?;
        let sessions = Arc::new(SessionStore::new(config.session_idle));

        Ok(Self::new(Arc::new(llm), retriever, sessions))
    }

    /// 세션 저장소 접근
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// 사전 기반 질문 정규화
    ///
    /// 모델 응답 텍스트를 검증 없이 그대로 반환합니다.
    pub async fn normalize(&self, question: &str) -> Result<String> {
        let messages = build_rewrite_messages(question);
        let rewritten = self
            .llm
            .complete(&messages)
            .await
            .context("Dictionary rewrite failed")?;

        tracing::debug!(original = %question, rewritten = %rewritten, "Normalized question");
        Ok(rewritten)
    }

    /// 히스토리 기반 독립 질문 재구성
    ///
    /// 히스토리가 비어 있어도 모델을 한 번 호출합니다.
    pub async fn reformulate(&self, history: &[Turn], question: &str) -> Result<String> {
        let messages = build_contextualize_messages(history, question);
        let standalone = self
            .llm
            .complete(&messages)
            .await
            .context("History-aware reformulation failed")?;

        Ok(standalone)
    }

    /// 사용자 메시지에 대한 답변 스트림 생성
    ///
    /// 반환된 스트림은 조각을 실시간으로 중계하면서 내부적으로 연결해 두고,
    /// 스트림이 정상 종료되면 (원본 사용자 메시지, 전체 답변) 턴을 세션에
    /// 정확히 한 번 추가합니다. 에러로 끝난 스트림은 아무것도 추가하지
    /// 않습니다.
    pub async fn answer(&self, user_message: &str, session_id: &str) -> Result<TokenStream> {
        // 1. 사전 기반 정규화
        let normalized = self.normalize(user_message).await?;

        // 2. 세션 히스토리 로드 (처음 보는 ID는 빈 레코드 생성)
        let history = self.sessions.history(session_id).await;

        // 3. 독립 질문으로 재구성
        let standalone = self.reformulate(&history, &normalized).await?;

        // 4. 문맥 청크 검색
        let chunks = self.retriever.retrieve(&standalone).await?;

        // 5. 답변 스트림 생성
        let messages = build_answer_messages(&chunks, &history, self.examples, &standalone);
        let inner = self
            .llm
            .complete_stream(&messages)
            .await
            .context("Answer generation failed")?;

        tracing::info!(
            session = %session_id,
            context_chunks = chunks.len(),
            "Answer stream started"
        );

        // 6. 스트림 티: 실시간 중계 + 종료 시 히스토리 적재
        Ok(tee_into_history(
            inner,
            self.sessions.clone(),
            session_id.to_string(),
            user_message.to_string(),
        ))
    }

    /// 고정 세션 진입점
    ///
    /// 현재 배포는 모든 호출에 하나의 세션 ID를 사용합니다.
    pub async fn handle_user_message(&self, message: &str) -> Result<TokenStream> {
        self.answer(message, DEFAULT_SESSION_ID).await
    }
}

// ============================================================================
// Stream Tee
// ============================================================================

struct TeeState {
    inner: TokenStream,
    sessions: Arc<SessionStore>,
    session_id: String,
    user_message: String,
    assembled: String,
    failed: bool,
}

/// 하나의 모델 스트림으로 실시간 중계와 히스토리 적재를 모두 처리
///
/// 정상 종료 시에만 턴을 추가합니다. 모델을 다시 호출하지 않습니다.
fn tee_into_history(
    inner: TokenStream,
    sessions: Arc<SessionStore>,
    session_id: String,
    user_message: String,
) -> TokenStream {
    let state = TeeState {
        inner,
        sessions,
        session_id,
        user_message,
        assembled: String::new(),
        failed: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        match st.inner.next().await {
            Some(Ok(fragment)) => {
                st.assembled.push_str(&fragment);
                Some((Ok(fragment), st))
            }
            Some(Err(e)) => {
                st.failed = true;
                Some((Err(e), st))
            }
            None => {
                if !st.failed {
                    let turn = Turn::new(st.user_message.clone(), st.assembled.clone());
                    st.sessions.append_turn(&st.session_id, turn).await;
                    tracing::debug!(session = %st.session_id, "Turn appended to history");
                }
                None
            }
        }
    });

    Box::pin(stream)
}

// ============================================================================
// Tests
// ============================================================================
