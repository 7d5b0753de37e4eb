//! Refresh 세션 모델.
//!
//! 발급된 Refresh Token 하나당 세션 행 하나가 존재합니다.
//! 세션은 삭제되지 않고 `revoked` 플래그로 폐기되어 감사 기록으로 남습니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 세션 생성 시 기록되는 클라이언트 정보.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// 저장된 Refresh 세션.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct RefreshSession {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub refresh_jti: Uuid,
    pub refresh_expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 특정 시점의 세션 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 갱신에 사용 가능
    Active,
    /// 폐기됨 (로그아웃 또는 회전)
    Revoked,
    /// 만료됨
    Expired,
}

impl RefreshSession {
    /// `now` 시점의 상태. 폐기 여부를 만료보다 먼저 봅니다.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.revoked {
            SessionState::Revoked
        } else if now > self.refresh_expires_at {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    /// `now` 시점에 갱신을 허가하는지 확인.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == SessionState::Active
    }
}

/// 새 세션 입력.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Uuid,
    pub refresh_jti: Uuid,
    pub refresh_expires_at: DateTime<Utc>,
    pub meta: ClientMeta,
}

impl NewSession {
    /// 저장될 세션 행을 만듭니다.
    pub fn into_session(self, session_id: Uuid, created_at: DateTime<Utc>) -> RefreshSession {
        RefreshSession {
            session_id,
            user_id: self.user_id,
            refresh_jti: self.refresh_jti,
            refresh_expires_at: self.refresh_expires_at,
            revoked: false,
            ip: self.meta.ip,
            user_agent: self.meta.user_agent,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration, revoked: bool) -> RefreshSession {
        let now = Utc::now();
        let mut s = NewSession {
            user_id: Uuid::new_v4(),
            refresh_jti: Uuid::new_v4(),
            refresh_expires_at: now + expires_in,
            meta: ClientMeta::default(),
        }
        .into_session(Uuid::new_v4(), now);
        s.revoked = revoked;
        s
    }

    #[test]
    fn test_state_transitions() {
        let now = Utc::now();
        assert_eq!(session(Duration::days(1), false).state_at(now), SessionState::Active);
        assert_eq!(session(Duration::days(1), true).state_at(now), SessionState::Revoked);
        assert_eq!(session(Duration::seconds(-1), false).state_at(now), SessionState::Expired);
        // 폐기와 만료가 겹치면 폐기로 본다
        assert_eq!(session(Duration::seconds(-1), true).state_at(now), SessionState::Revoked);
    }

    #[test]
    fn test_expiry_is_exact() {
        let s = session(Duration::hours(1), false);
        assert!(s.is_active_at(s.refresh_expires_at));
        assert!(!s.is_active_at(s.refresh_expires_at + Duration::milliseconds(1)));
    }
}
