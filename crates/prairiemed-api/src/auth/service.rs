//! 인증 코어.
//!
//! 비밀번호 검증기, 토큰 발급기, 세션 저장소를 조합해
//! 로그인, Refresh Token 회전, 로그아웃, 내 정보 조회를 구현합니다.
//!
//! Refresh Token 한 개의 상태는 `ISSUED → (ROTATED | REVOKED | EXPIRED)`로만 움직이며,
//! 회전과 폐기는 해당 jti에 대해 종단 상태입니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use prairiemed_core::{
    Argon2Config, AuthConfig, ClientMeta, NewSession, PublicProfile, RoleSet, SessionState,
    UserRecord,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::AuthError;
use super::jwt::{IssuedRefreshToken, JwtError, TokenService};
use super::middleware::AuthContext;
use super::password::{burn_verification_blocking, verify_or_migrate_blocking};
use crate::metrics::{record_login, record_refresh, record_security_event};
use crate::repository::{CredentialStore, SessionStore, StoreError};

/// 클라이언트에 반환되는 사용자 정보 (프로필 + 현재 역할).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserView {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub roles: Vec<String>,
}

impl UserView {
    fn new(profile: PublicProfile, roles: &RoleSet) -> Self {
        Self {
            profile,
            roles: roles.to_vec(),
        }
    }
}

/// 로그인 결과.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: UserView,
    pub access_token: String,
    pub refresh: IssuedRefreshToken,
    /// `pm_locale` 쿠키에 쓸 로케일
    pub locale: String,
}

/// 토큰 갱신 결과.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub refresh: IssuedRefreshToken,
}

/// 인증 서비스.
///
/// 설정은 생성 시 한 번 읽히며 이후에는 읽기 전용입니다.
pub struct AuthService {
    tokens: TokenService,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    argon2: Argon2Config,
    migrate_passwords: bool,
    store_timeout: Duration,
}

impl AuthService {
    /// 인증 설정과 저장소로 서비스를 생성합니다.
    pub fn new(
        config: &AuthConfig,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, JwtError> {
        Ok(Self {
            tokens: TokenService::from_config(config)?,
            credentials,
            sessions,
            argon2: config.argon2,
            migrate_passwords: config.password_migrate_on_login,
            store_timeout: config.store_timeout(),
        })
    }

    /// 토큰 발급/검증기.
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// 저장소 호출을 타임아웃으로 감싸고 실패를 `StoreUnavailable`로 바꿉니다.
    async fn store_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(operation, error = %e, "Store call failed");
                Err(AuthError::StoreUnavailable)
            }
            Err(_) => {
                error!(
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(AuthError::from(StoreError::Timeout))
            }
        }
    }

    /// 로그인.
    ///
    /// 사용자가 없거나 비활성이거나 비밀번호가 틀리면 모두 같은
    /// `InvalidCredentials`를 반환합니다.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: ClientMeta,
    ) -> Result<LoginOutcome, AuthError> {
        let result = self.login_inner(email, password, meta).await;
        match &result {
            Ok(outcome) => {
                record_login("success");
                info!(user_id = %outcome.user.profile.user_id, "Login succeeded");
            }
            Err(e) => {
                record_login(e.kind());
                debug!(reason = e.kind(), "Login failed");
            }
        }
        result
    }

    async fn login_inner(
        &self,
        email: &str,
        password: &str,
        meta: ClientMeta,
    ) -> Result<LoginOutcome, AuthError> {
        let user = self
            .store_call("find_user_by_email", self.credentials.find_user_by_email(email))
            .await?
            .filter(|u| u.is_active);

        let Some(user) = user else {
            // 계정이 있을 때와 같은 비용을 치른다
            burn_verification_blocking(password.to_string(), self.argon2).await;
            return Err(AuthError::InvalidCredentials);
        };

        let check = verify_or_migrate_blocking(
            user.password_hash.clone(),
            password.to_string(),
            self.argon2,
            self.migrate_passwords,
        )
        .await;
        if !check.ok {
            return Err(AuthError::InvalidCredentials);
        }

        if let Some(hash) = check.migrated_hash {
            // 마이그레이션 실패는 로그인 자체를 막지 않는다
            match self
                .store_call(
                    "update_password_hash",
                    self.credentials.update_password_hash(user.user_id, &hash),
                )
                .await
            {
                Ok(()) => info!(user_id = %user.user_id, "Migrated legacy password hash"),
                Err(_) => warn!(user_id = %user.user_id, "Legacy password migration skipped"),
            }
        }

        let roles = self
            .store_call("get_roles", self.credentials.get_roles(user.user_id))
            .await?;
        let (access_token, refresh) = self.issue_pair(&user, &roles)?;

        let session_id = self
            .store_call(
                "create_session",
                self.sessions.create(NewSession {
                    user_id: user.user_id,
                    refresh_jti: refresh.jti,
                    refresh_expires_at: refresh.expires_at,
                    meta,
                }),
            )
            .await?;
        debug!(user_id = %user.user_id, %session_id, jti = %refresh.jti, "Session created");

        let profile = self.profile_of(&user).await?;
        let locale = profile.effective_locale().to_string();

        Ok(LoginOutcome {
            user: UserView::new(profile, &roles),
            access_token,
            refresh,
            locale,
        })
    }

    /// Refresh Token 회전.
    ///
    /// 제시된 토큰의 세션을 폐기하고 새 토큰 쌍과 새 세션을 만듭니다.
    /// 폐기되었거나 없는 세션은 재사용 시도로 보고 보안 이벤트로 기록합니다.
    pub async fn refresh(&self, token: &str, meta: ClientMeta) -> Result<RefreshOutcome, AuthError> {
        let result = self.refresh_inner(token, meta).await;
        match &result {
            Ok(_) => record_refresh("success"),
            Err(e) => record_refresh(e.kind()),
        }
        result
    }

    async fn refresh_inner(
        &self,
        token: &str,
        meta: ClientMeta,
    ) -> Result<RefreshOutcome, AuthError> {
        let claims = self.tokens.verify_refresh_token(token).map_err(|e| {
            debug!(error = %e, "Refresh token rejected");
            AuthError::InvalidToken
        })?;
        let jti = Uuid::parse_str(&claims.jti).map_err(|_| AuthError::InvalidToken)?;
        let subject = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let session = self
            .store_call("find_session", self.sessions.find_by_jti(jti))
            .await?;

        let session = match session {
            Some(session) if session.user_id == subject => session,
            Some(_) | None => return Err(self.replay_detected(jti, subject, "session_not_found")),
        };

        match session.state_at(Utc::now()) {
            SessionState::Active => {}
            SessionState::Revoked => {
                return Err(self.replay_detected(jti, subject, "session_revoked"))
            }
            SessionState::Expired => {
                info!(user_id = %subject, %jti, "Refresh session expired");
                return Err(AuthError::SessionExpired);
            }
        }

        // 역할과 이메일은 로그인 이후 바뀌었을 수 있다
        let user = self
            .store_call("find_user_by_id", self.credentials.find_user_by_id(subject))
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| {
                warn!(user_id = %subject, "Refresh for missing or inactive user");
                AuthError::InvalidToken
            })?;
        let roles = self
            .store_call("get_roles", self.credentials.get_roles(user.user_id))
            .await?;
        let (access_token, refresh) = self.issue_pair(&user, &roles)?;

        let rotated = self
            .store_call(
                "rotate_session",
                self.sessions.rotate(
                    jti,
                    NewSession {
                        user_id: user.user_id,
                        refresh_jti: refresh.jti,
                        refresh_expires_at: refresh.expires_at,
                        meta,
                    },
                ),
            )
            .await?;

        match rotated {
            Some(session_id) => {
                info!(
                    user_id = %user.user_id,
                    %session_id,
                    old_jti = %jti,
                    jti = %refresh.jti,
                    "Refresh token rotated"
                );
                Ok(RefreshOutcome {
                    access_token,
                    refresh,
                })
            }
            // 동시 요청이 먼저 회전했다
            None => Err(self.replay_detected(jti, subject, "rotation_race")),
        }
    }

    fn replay_detected(&self, jti: Uuid, user_id: Uuid, reason: &'static str) -> AuthError {
        warn!(
            security_event = true,
            %user_id,
            %jti,
            reason,
            "Refresh token presented for a session that no longer authorizes refresh"
        );
        record_security_event("refresh_replay");
        AuthError::SessionRevoked
    }

    /// 로그아웃.
    ///
    /// 토큰이 유효하면 세션을 폐기합니다. 내부 실패는 로그로만 남기고
    /// 항상 성공합니다.
    pub async fn logout(&self, token: Option<&str>) {
        let Some(token) = token else {
            debug!("Logout without refresh token");
            return;
        };

        let claims = match self.tokens.verify_refresh_token(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Logout with unverifiable refresh token");
                return;
            }
        };

        let Ok(jti) = Uuid::parse_str(&claims.jti) else {
            debug!("Logout with malformed jti");
            return;
        };

        match self
            .store_call("revoke_session", self.sessions.revoke_by_jti(jti))
            .await
        {
            Ok(()) => info!(user_id = %claims.sub, %jti, "Session revoked on logout"),
            Err(_) => warn!(user_id = %claims.sub, %jti, "Logout revoke failed; cookies cleared anyway"),
        }
    }

    /// 인증된 호출자의 프로필과 현재 역할.
    pub async fn me(&self, caller: &AuthContext) -> Result<UserView, AuthError> {
        let user = self
            .store_call("find_user_by_id", self.credentials.find_user_by_id(caller.user_id))
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::Unauthenticated)?;
        let roles = self
            .store_call("get_roles", self.credentials.get_roles(user.user_id))
            .await?;
        let profile = self.profile_of(&user).await?;

        Ok(UserView::new(profile, &roles))
    }

    /// 사용자의 모든 활성 세션을 폐기합니다.
    pub async fn revoke_user_sessions(
        &self,
        actor: &AuthContext,
        user_id: Uuid,
    ) -> Result<u64, AuthError> {
        let revoked = self
            .store_call(
                "revoke_all_for_user",
                self.sessions.revoke_all_for_user(user_id),
            )
            .await?;
        info!(actor = %actor.user_id, %user_id, revoked, "Revoked user sessions");
        Ok(revoked)
    }

    /// 저장소 연결 확인.
    pub async fn ready(&self) -> Result<(), AuthError> {
        self.store_call("ping", self.credentials.ping()).await
    }

    fn issue_pair(
        &self,
        user: &UserRecord,
        roles: &RoleSet,
    ) -> Result<(String, IssuedRefreshToken), AuthError> {
        let access = self
            .tokens
            .issue_access_token(user.user_id, &user.email, roles)
            .map_err(|e| {
                error!(error = %e, "Failed to sign access token");
                AuthError::Internal
            })?;
        let refresh = self.tokens.issue_refresh_token(user.user_id).map_err(|e| {
            error!(error = %e, "Failed to sign refresh token");
            AuthError::Internal
        })?;
        Ok((access, refresh))
    }

    async fn profile_of(&self, user: &UserRecord) -> Result<PublicProfile, AuthError> {
        let profile = self
            .store_call("get_profile", self.credentials.get_profile(user.user_id))
            .await?;

        Ok(profile.unwrap_or_else(|| {
            let mut minimal = PublicProfile::minimal(user.user_id, &user.email);
            minimal.organization_id = user.organization_id;
            minimal.facility_id = user.facility_id;
            minimal
        }))
    }
}
