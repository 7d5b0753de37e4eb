//! 애플리케이션 상태 관리.
//!
//! 모든 핸들러가 `Arc<AppState>`로 공유하는 읽기 전용 상태입니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prairiemed_core::AuthConfig;
use sqlx::PgPool;

use crate::auth::{AuthService, JwtError};
use crate::repository::{MemoryStore, PgCredentialStore, PgSessionStore};

/// 애플리케이션 상태.
pub struct AppState {
    /// 인증 서비스 (토큰, 저장소 포함)
    pub auth: AuthService,

    /// 쿠키에 Secure 속성을 붙일지 여부
    pub secure_cookies: bool,

    /// 서버 시작 시간
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    pub fn new(auth: AuthService, secure_cookies: bool) -> Self {
        Self {
            auth,
            secure_cookies,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// PostgreSQL 저장소를 사용하는 상태.
    pub fn with_postgres(config: &AuthConfig, pool: PgPool) -> Result<Self, JwtError> {
        let auth = AuthService::new(
            config,
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(PgSessionStore::new(pool)),
        )?;
        Ok(Self::new(auth, config.secure_cookies))
    }

    /// 인메모리 저장소를 사용하는 상태 (개발/테스트).
    pub fn in_memory(config: &AuthConfig, store: Arc<MemoryStore>) -> Result<Self, JwtError> {
        let auth = AuthService::new(config, store.clone(), store)?;
        Ok(Self::new(auth, config.secure_cookies))
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// 테스트용 상태 생성 (인메모리 저장소, 낮은 Argon2 비용).
#[cfg(test)]
pub fn create_test_state() -> (Arc<AppState>, Arc<MemoryStore>) {
    let config = AuthConfig::new(
        "prairiemed",
        "prairiemed-admin",
        "unit-test-access-secret-0123456789abcdef",
        "unit-test-refresh-secret-0123456789abcdef",
    )
    .with_argon2(prairiemed_core::Argon2Config {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    });

    let store = Arc::new(MemoryStore::new());
    let state = AppState::in_memory(&config, store.clone()).expect("test state");
    (Arc::new(state), store)
}
