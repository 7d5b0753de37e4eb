//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 설정은 시작 시 한 번 로드되며 이후에는 읽기 전용으로 공유됩니다.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// 서명 비밀 키의 최소 길이 (바이트).
pub const MIN_SECRET_LEN: usize = 32;

/// 토큰 TTL 상한 (초). 1년.
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// 애플리케이션 설정.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 인증 설정
    pub auth: AuthConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 전체 타임아웃 (초)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 허용할 CORS origin 목록 (비어 있으면 모두 허용)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            request_timeout_secs: default_request_timeout(),
            cors_origins: Vec::new(),
        }
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL 연결 URL (없으면 인메모리 저장소 사용)
    #[serde(default)]
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 5,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// 파일명과 줄 번호 포함 여부
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            include_location: false,
        }
    }
}

/// Argon2 해싱 비용 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Argon2Config {
    /// 메모리 비용 (KiB)
    pub memory_kib: u32,
    /// 반복 횟수
    pub iterations: u32,
    /// 병렬도
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// 인증 설정.
///
/// 토큰 서명 키, 발급자/대상, TTL, 원격 키 세트 등
/// 인증 코어가 필요로 하는 모든 값을 담습니다.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// 토큰 발급자 (`iss`)
    pub issuer: String,
    /// 토큰 대상 (`aud`)
    pub audience: String,
    /// Access Token TTL (초)
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    /// Refresh Token TTL (초)
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
    /// Access Token 서명 키 (HS256)
    pub access_secret: SecretString,
    /// Refresh Token 서명 키 (HS256)
    pub refresh_secret: SecretString,
    /// RS256 검증용 원격 JWKS URL
    #[serde(default)]
    pub jwks_url: Option<String>,
    /// JWKS 캐시 유지 시간 (초)
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl_secs: u64,
    /// 토큰 검증 시 허용하는 시계 오차 (초)
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: u64,
    /// 평문 시드 비밀번호를 로그인 시 Argon2 해시로 교체할지 여부
    #[serde(default)]
    pub password_migrate_on_login: bool,
    /// 쿠키에 Secure 속성을 붙일지 여부 (운영 환경)
    #[serde(default)]
    pub secure_cookies: bool,
    /// 저장소 호출 타임아웃 (밀리초)
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,
    /// 비밀번호 해싱 비용
    #[serde(default)]
    pub argon2: Argon2Config,
}

fn default_access_ttl() -> u64 {
    15 * 60
}
fn default_refresh_ttl() -> u64 {
    30 * 24 * 60 * 60
}
fn default_jwks_cache_ttl() -> u64 {
    300
}
fn default_clock_skew() -> u64 {
    60
}
fn default_store_timeout() -> u64 {
    5_000
}

impl AuthConfig {
    /// 기본 TTL과 옵션으로 인증 설정을 생성합니다.
    pub fn new(
        issuer: impl Into<String>,
        audience: impl Into<String>,
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            access_secret: SecretString::from(access_secret.into()),
            refresh_secret: SecretString::from(refresh_secret.into()),
            jwks_url: None,
            jwks_cache_ttl_secs: default_jwks_cache_ttl(),
            clock_skew_secs: default_clock_skew(),
            password_migrate_on_login: false,
            secure_cookies: false,
            store_timeout_ms: default_store_timeout(),
            argon2: Argon2Config::default(),
        }
    }

    /// TTL을 설정합니다.
    pub fn with_ttls(mut self, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        self.access_ttl_secs = access_ttl_secs;
        self.refresh_ttl_secs = refresh_ttl_secs;
        self
    }

    /// 원격 JWKS URL을 설정합니다.
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    /// 로그인 시 비밀번호 마이그레이션 여부를 설정합니다.
    pub fn with_password_migration(mut self, enabled: bool) -> Self {
        self.password_migrate_on_login = enabled;
        self
    }

    /// Argon2 비용 파라미터를 설정합니다.
    pub fn with_argon2(mut self, argon2: Argon2Config) -> Self {
        self.argon2 = argon2;
        self
    }

    /// Access Token TTL.
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    /// Refresh Token TTL.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    /// 저장소 호출 타임아웃.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// 설정 값의 일관성을 검증합니다.
    ///
    /// # Errors
    ///
    /// 발급자/대상이 비어 있거나, 비밀 키가 너무 짧거나, TTL이 0이거나
    /// [`MAX_TOKEN_TTL_SECS`]를 넘거나, Access TTL이 Refresh TTL 이상이면 `CoreError::Config`.
    pub fn validate(&self) -> CoreResult<()> {
        if self.issuer.trim().is_empty() {
            return Err(CoreError::Config("auth.issuer must not be empty".into()));
        }
        if self.audience.trim().is_empty() {
            return Err(CoreError::Config("auth.audience must not be empty".into()));
        }
        if self.access_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(CoreError::Config(format!(
                "auth.access_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.refresh_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(CoreError::Config(format!(
                "auth.refresh_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs == 0 {
            return Err(CoreError::Config("token TTLs must be positive".into()));
        }
        if self.access_ttl_secs.max(self.refresh_ttl_secs) > MAX_TOKEN_TTL_SECS {
            return Err(CoreError::Config(format!(
                "token TTLs must not exceed {} seconds",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.access_ttl_secs >= self.refresh_ttl_secs {
            return Err(CoreError::Config(
                "auth.access_ttl_secs must be shorter than auth.refresh_ttl_secs".into(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없어도 에러가 아닙니다. 환경 변수는 `PRAIRIEMED__` 접두사와
    /// `__` 구분자를 사용합니다 (예: `PRAIRIEMED__AUTH__ISSUER`).
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 4000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.connect_timeout_secs", 5)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("PRAIRIEMED")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.auth.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "access-secret-for-unit-tests-0123456789";
    const REFRESH: &str = "refresh-secret-for-unit-tests-0123456789";

    #[test]
    fn test_auth_config_defaults() {
        let config = AuthConfig::new("prairiemed", "prairiemed-admin", SECRET, REFRESH);
        assert_eq!(config.access_ttl(), Duration::from_secs(900));
        assert_eq!(config.refresh_ttl(), Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.clock_skew_secs, 60);
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
        assert!(!config.password_migrate_on_login);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let config = AuthConfig::new("iss", "aud", "short", REFRESH);
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_issuer() {
        let config = AuthConfig::new("  ", "aud", SECRET, REFRESH);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_ttls() {
        let config = AuthConfig::new("iss", "aud", SECRET, REFRESH).with_ttls(3600, 60);
        assert!(config.validate().is_err());

        let config = AuthConfig::new("iss", "aud", SECRET, REFRESH).with_ttls(0, 60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_ttls() {
        let config = AuthConfig::new("iss", "aud", SECRET, REFRESH)
            .with_ttls(900, MAX_TOKEN_TTL_SECS + 1);
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let config =
            AuthConfig::new("iss", "aud", SECRET, REFRESH).with_ttls(u64::MAX - 1, u64::MAX);
        assert!(config.validate().is_err());

        let config =
            AuthConfig::new("iss", "aud", SECRET, REFRESH).with_ttls(900, MAX_TOKEN_TTL_SECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let config = AuthConfig::new("iss", "aud", SECRET, REFRESH);
        let debug = format!("{:?}", config);
        assert!(!debug.contains(SECRET));
    }

    #[test]
    fn test_argon2_default_cost() {
        let argon2 = Argon2Config::default();
        assert_eq!(argon2.memory_kib, 65536);
        assert_eq!(argon2.iterations, 3);
        assert_eq!(argon2.parallelism, 1);
    }
}
