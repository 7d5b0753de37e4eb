//! 인메모리 저장소.
//!
//! 데이터베이스 URL이 설정되지 않은 개발 환경과 테스트에서 사용합니다.
//! 세션 회전은 쓰기 잠금 하나 안에서 수행되므로 PostgreSQL 구현과 같은
//! 원자성을 가집니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use prairiemed_core::{NewSession, PublicProfile, RefreshSession, RoleSet, UserRecord};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CredentialStore, SessionStore, StoreError};

#[derive(Default)]
struct Users {
    records: HashMap<Uuid, UserRecord>,
    roles: HashMap<Uuid, RoleSet>,
    profiles: HashMap<Uuid, PublicProfile>,
}

/// 자격증명과 세션을 모두 담는 인메모리 저장소.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Users>,
    sessions: RwLock<HashMap<Uuid, RefreshSession>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 사용자와 역할을 등록합니다.
    pub async fn insert_user(&self, user: UserRecord, roles: RoleSet) {
        let mut users = self.users.write().await;
        users.roles.insert(user.user_id, roles);
        users.records.insert(user.user_id, user);
    }

    /// 사용자 역할을 교체합니다.
    pub async fn set_roles(&self, user_id: Uuid, roles: RoleSet) {
        self.users.write().await.roles.insert(user_id, roles);
    }

    /// 사용자 활성 상태를 변경합니다.
    pub async fn set_active(&self, user_id: Uuid, active: bool) {
        if let Some(user) = self.users.write().await.records.get_mut(&user_id) {
            user.is_active = active;
        }
    }

    /// 공개 프로필을 등록합니다.
    pub async fn insert_profile(&self, profile: PublicProfile) {
        self.users
            .write()
            .await
            .profiles
            .insert(profile.user_id, profile);
    }

    /// 저장된 비밀번호 해시 (테스트 확인용).
    pub async fn password_hash(&self, user_id: Uuid) -> Option<String> {
        self.users
            .read()
            .await
            .records
            .get(&user_id)
            .map(|u| u.password_hash.clone())
    }

    /// 세션 만료 시각을 덮어씁니다.
    pub async fn set_session_expiry(&self, jti: Uuid, expires_at: chrono::DateTime<Utc>) {
        if let Some(session) = self.sessions.write().await.get_mut(&jti) {
            session.refresh_expires_at = expires_at;
        }
    }

    /// 모든 호출을 실패시키는 장애 상태를 켜거나 끕니다.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.check_available()?;
        // PostgreSQL의 LOWER()와 같은 유니코드 소문자 비교
        let email = email.trim().to_lowercase();
        Ok(self
            .users
            .read()
            .await
            .records
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        self.check_available()?;
        Ok(self.users.read().await.records.get(&user_id).cloned())
    }

    async fn get_roles(&self, user_id: Uuid) -> Result<RoleSet, StoreError> {
        self.check_available()?;
        Ok(self
            .users
            .read()
            .await
            .roles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<PublicProfile>, StoreError> {
        self.check_available()?;
        Ok(self.users.read().await.profiles.get(&user_id).cloned())
    }

    async fn update_password_hash(&self, user_id: Uuid, hash: &str) -> Result<(), StoreError> {
        self.check_available()?;
        if let Some(user) = self.users.write().await.records.get_mut(&user_id) {
            user.password_hash = hash.to_string();
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, session: NewSession) -> Result<Uuid, StoreError> {
        self.check_available()?;
        let mut sessions = self.sessions.write().await;
        insert_session(&mut sessions, session)
    }

    async fn find_by_jti(&self, jti: Uuid) -> Result<Option<RefreshSession>, StoreError> {
        self.check_available()?;
        Ok(self.sessions.read().await.get(&jti).cloned())
    }

    async fn revoke_by_jti(&self, jti: Uuid) -> Result<(), StoreError> {
        self.check_available()?;
        if let Some(session) = self.sessions.write().await.get_mut(&jti) {
            session.revoked = true;
        }
        Ok(())
    }

    async fn rotate(
        &self,
        old_jti: Uuid,
        session: NewSession,
    ) -> Result<Option<Uuid>, StoreError> {
        self.check_available()?;
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(&old_jti) {
            Some(old) if old.is_active_at(Utc::now()) => old.revoked = true,
            _ => return Ok(None),
        }

        insert_session(&mut sessions, session).map(Some)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut count = 0;
        for session in self.sessions.write().await.values_mut() {
            if session.user_id == user_id && !session.revoked {
                session.revoked = true;
                count += 1;
            }
        }
        Ok(count)
    }
}

fn insert_session(
    sessions: &mut HashMap<Uuid, RefreshSession>,
    session: NewSession,
) -> Result<Uuid, StoreError> {
    if sessions.contains_key(&session.refresh_jti) {
        return Err(StoreError::Conflict(format!(
            "duplicate refresh_jti {}",
            session.refresh_jti
        )));
    }

    let session_id = Uuid::new_v4();
    let row = session.into_session(session_id, Utc::now());
    sessions.insert(row.refresh_jti, row);
    Ok(session_id)
}
