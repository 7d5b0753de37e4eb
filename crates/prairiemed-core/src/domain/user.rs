//! 사용자 및 프로필 모델.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 지원하는 UI 로케일.
pub const SUPPORTED_LOCALES: [&str; 2] = ["en", "fr"];

/// 기본 로케일.
pub const DEFAULT_LOCALE: &str = "en";

/// 자격증명 저장소의 사용자 레코드.
///
/// 비밀번호 해시는 `Debug` 출력에서 가려집니다.
#[derive(Clone)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct UserRecord {
    pub user_id: Uuid,
    pub email: String,
    /// 알고리즘 태그가 붙은 해시 (`$argon2id$...`) 또는 평문 시드 값
    pub password_hash: String,
    pub is_active: bool,
    pub organization_id: Option<Uuid>,
    pub facility_id: Option<Uuid>,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("is_active", &self.is_active)
            .field("organization_id", &self.organization_id)
            .field("facility_id", &self.facility_id)
            .finish()
    }
}

/// 클라이언트에 노출되는 공개 프로필.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct PublicProfile {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub locale: Option<String>,
    pub organization_id: Option<Uuid>,
    pub facility_id: Option<Uuid>,
}

impl PublicProfile {
    /// 프로필 행이 없는 사용자를 위한 최소 프로필.
    pub fn minimal(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            first_name: None,
            last_name: None,
            title: None,
            locale: None,
            organization_id: None,
            facility_id: None,
        }
    }

    /// 지원되는 로케일이면 그대로, 아니면 기본 로케일을 반환합니다.
    pub fn effective_locale(&self) -> &str {
        match self.locale.as_deref().map(str::trim) {
            Some(locale) => SUPPORTED_LOCALES
                .iter()
                .copied()
                .find(|s| s.eq_ignore_ascii_case(locale))
                .unwrap_or(DEFAULT_LOCALE),
            None => DEFAULT_LOCALE,
        }
    }
}
