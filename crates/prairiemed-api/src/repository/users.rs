//! Credential Repository
//!
//! 사용자, 역할, 프로필 조회를 담당합니다.

use async_trait::async_trait;
use prairiemed_core::{PublicProfile, RoleSet, UserRecord};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, StoreError};

/// PostgreSQL 자격증명 저장소.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, email, password_hash, is_active, organization_id, facility_id
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, email, password_hash, is_active, organization_id, facility_id
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_roles(&self, user_id: Uuid) -> Result<RoleSet, StoreError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM user_roles ur
            JOIN roles r ON r.role_id = ur.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names.into())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<PublicProfile>, StoreError> {
        let profile = sqlx::query_as::<_, PublicProfile>(
            r#"
            SELECT
                u.user_id, u.email,
                p.first_name, p.last_name, p.title, p.locale,
                u.organization_id, u.facility_id
            FROM users u
            JOIN user_profiles p ON p.user_id = u.user_id
            WHERE u.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn update_password_hash(&self, user_id: Uuid, hash: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
