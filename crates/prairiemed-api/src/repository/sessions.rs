//! Session Repository
//!
//! `auth_sessions` 테이블의 Refresh 세션 연산을 담당합니다.
//! 세션 행은 삭제하지 않고 `revoked` 플래그로 폐기합니다.

use async_trait::async_trait;
use prairiemed_core::{NewSession, RefreshSession};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{SessionStore, StoreError};

/// PostgreSQL 세션 저장소.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        session: &NewSession,
    ) -> Result<Uuid, StoreError> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO auth_sessions (user_id, refresh_jti, refresh_expires_at, ip, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING session_id
            "#,
        )
        .bind(session.user_id)
        .bind(session.refresh_jti)
        .bind(session.refresh_expires_at)
        .bind(&session.meta.ip)
        .bind(&session.meta.user_agent)
        .fetch_one(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: NewSession) -> Result<Uuid, StoreError> {
        let mut tx = self.pool.begin().await?;
        let session_id = Self::insert(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(session_id)
    }

    async fn find_by_jti(&self, jti: Uuid) -> Result<Option<RefreshSession>, StoreError> {
        let session = sqlx::query_as::<_, RefreshSession>(
            r#"
            SELECT session_id, user_id, refresh_jti, refresh_expires_at, revoked,
                   ip, user_agent, created_at
            FROM auth_sessions
            WHERE refresh_jti = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn revoke_by_jti(&self, jti: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE, revoked_at = COALESCE(revoked_at, NOW())
            WHERE refresh_jti = $1
            "#,
        )
        .bind(jti)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate(
        &self,
        old_jti: Uuid,
        session: NewSession,
    ) -> Result<Option<Uuid>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // 활성 세션일 때만 폐기된다. 동시 요청 중 하나만 행을 갱신한다.
        let revoked = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE, revoked_at = NOW()
            WHERE refresh_jti = $1
              AND revoked = FALSE
              AND refresh_expires_at >= NOW()
            "#,
        )
        .bind(old_jti)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let session_id = Self::insert(&mut tx, &session).await?;
        tx.commit().await?;

        Ok(Some(session_id))
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET revoked = TRUE, revoked_at = NOW()
            WHERE user_id = $1 AND revoked = FALSE
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
