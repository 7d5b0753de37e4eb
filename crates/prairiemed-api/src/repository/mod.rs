//! Repository pattern for database operations.
//!
//! 자격증명 저장소와 세션 저장소 접근 로직을 인증 서비스에서 분리합니다.
//! 저장소는 트레이트로 정의되며 PostgreSQL 구현과 인메모리 구현이 있습니다.
//!
//! - [`PgCredentialStore`], [`PgSessionStore`]: 운영용 (sqlx)
//! - [`MemoryStore`]: 개발/테스트용. 두 트레이트를 모두 구현합니다.

use async_trait::async_trait;
use prairiemed_core::{NewSession, PublicProfile, RefreshSession, RoleSet, UserRecord};
use uuid::Uuid;

pub mod memory;
pub mod sessions;
pub mod users;

pub use memory::MemoryStore;
pub use sessions::PgSessionStore;
pub use users::PgCredentialStore;

/// 저장소 에러.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
    #[error("저장소 호출 시간 초과")]
    Timeout,
    #[error("제약 조건 위반: {0}")]
    Conflict(String),
}

impl StoreError {
    /// sqlx 에러를 분류합니다. 고유 제약 위반은 `Conflict`.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

/// 사용자 자격증명 저장소.
///
/// 인증 코어는 비밀번호 마이그레이션을 제외하고 읽기만 합니다.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 이메일로 사용자 조회 (대소문자 무시).
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// ID로 사용자 조회.
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// 사용자에게 할당된 역할.
    async fn get_roles(&self, user_id: Uuid) -> Result<RoleSet, StoreError>;

    /// 공개 프로필. 프로필 행이 없으면 `None`.
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<PublicProfile>, StoreError>;

    /// 비밀번호 해시 교체 (레거시 평문 마이그레이션).
    async fn update_password_hash(&self, user_id: Uuid, hash: &str) -> Result<(), StoreError>;

    /// 연결 상태 확인.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Refresh 세션 저장소.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 세션 생성. 중복 jti는 `StoreError::Conflict`.
    async fn create(&self, session: NewSession) -> Result<Uuid, StoreError>;

    /// jti로 세션 조회.
    async fn find_by_jti(&self, jti: Uuid) -> Result<Option<RefreshSession>, StoreError>;

    /// jti로 세션 폐기. 이미 폐기되었거나 없는 jti도 에러가 아닙니다.
    async fn revoke_by_jti(&self, jti: Uuid) -> Result<(), StoreError>;

    /// 세션 회전.
    ///
    /// `old_jti` 세션이 아직 활성 상태일 때만 폐기하고 새 세션을 만듭니다.
    /// 두 단계는 하나의 트랜잭션입니다. 동시 회전에서 진 쪽은 `Ok(None)`을 받습니다.
    async fn rotate(&self, old_jti: Uuid, session: NewSession)
        -> Result<Option<Uuid>, StoreError>;

    /// 사용자의 활성 세션을 모두 폐기하고 폐기된 수를 반환합니다.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;
}
