//! 세션 모듈 - 대화 기록 저장소
//!
//! 세션 ID별로 (사용자 메시지, 어시스턴트 답변) 턴의 순서 있는 목록을
//! 프로세스 수명 동안 보관합니다. 유휴 세션은 TTL 경과 시 접근 시점에
//! 정리되고, 세션별 잠금으로 같은 세션에 대한 동시 요청이 기록을
//! 교차 수정하지 못하게 합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

// ============================================================================
// Types
// ============================================================================

/// 대화 턴 하나 (사용자 메시지 + 완성된 어시스턴트 답변)
///
/// 답변이 완전히 생성된 후에만 추가되며, 추가 후 변경되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// 사용자 메시지 (정규화 전 원본)
    pub user: String,
    /// 어시스턴트 답변 (스트림 조각의 전체 연결)
    pub assistant: String,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            created_at: Utc::now(),
        }
    }
}

/// 세션 레코드 - 순서 있는 턴 목록 (append-only)
#[derive(Debug)]
pub struct SessionRecord {
    turns: Vec<Turn>,
    last_active: Instant,
}

impl SessionRecord {
    fn new() -> Self {
        Self {
            turns: Vec::new(),
            last_active: Instant::now(),
        }
    }

    /// 턴 목록 (요청 도착 순서)
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// 턴 추가
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.last_active = Instant::now();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// ============================================================================
// SessionStore
// ============================================================================

/// 세션 저장소
///
/// 처음 보는 세션 ID는 빈 레코드로 생성하고, 이후 호출은 같은 레코드를
/// 공유합니다. 외부 맵과 세션별 레코드가 각각 잠금으로 보호되어
/// 같은 ID로의 동시 생성 경쟁이 발생하지 않습니다.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<SessionRecord>>>>,
    idle_timeout: Duration,
}

impl SessionStore {
    /// 유휴 타임아웃을 지정하여 생성
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// 세션 레코드 조회 또는 생성
    ///
    /// 접근 시점에 유휴 세션을 먼저 정리합니다. 반환된 레코드는
    /// 호출 간 공유되므로, 이후 추가된 턴을 모든 호출자가 관찰합니다.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<Mutex<SessionRecord>> {
        let mut sessions = self.sessions.lock().await;

        // 유휴 세션 정리 (레코드 잠금 중인 세션은 활성으로 간주)
        let timeout = self.idle_timeout;
        let mut expired: Vec<String> = Vec::new();
        for (id, record) in sessions.iter() {
            if id == session_id {
                continue;
            }
            if let Ok(guard) = record.try_lock() {
                if guard.last_active.elapsed() > timeout {
                    expired.push(id.clone());
                }
            }
        }
        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            tracing::debug!(evicted = expired.len(), "Evicted idle sessions");
        }

        let record = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionRecord::new())))
            .clone();
        drop(sessions);

        // 읽기 접근도 유휴 시간 기준을 갱신
        {
            let mut guard = record.lock().await;
            guard.last_active = Instant::now();
        }

        record
    }

    /// 세션의 현재 히스토리 사본
    pub async fn history(&self, session_id: &str) -> Vec<Turn> {
        let record = self.get_or_create(session_id).await;
        let guard = record.lock().await;
        guard.turns().to_vec()
    }

    /// 완성된 턴을 세션에 추가
    pub async fn append_turn(&self, session_id: &str, turn: Turn) {
        let record = self.get_or_create(session_id).await;
        let mut guard = record.lock().await;
        guard.append(turn);
    }

    /// 현재 세션 수
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::config::DEFAULT_SESSION_IDLE_SECS))
    }
}

// ============================================================================
// Tests
// ============================================================================
