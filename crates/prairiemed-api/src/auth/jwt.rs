//! JWT 토큰 처리.
//!
//! Access Token 및 Refresh Token 발급/검증 로직.
//!
//! - 두 토큰 모두 기본적으로 HS256 (공유 비밀 키)으로 서명됩니다.
//! - Access Token은 헤더의 `alg`를 보고 검증 경로를 고릅니다.
//!   RS256이면 원격 JWKS ([`JwksCache`])로, HS256이면 Access 비밀 키로 검증합니다.
//! - 시계 오차 허용치는 발급 시각(`iat`/`nbf`)에만 적용되고,
//!   만료(`exp`)는 정확하게 비교합니다.

use std::collections::HashSet;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use prairiemed_core::{AuthConfig, RoleSet, MAX_TOKEN_TTL_SECS};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::jwks::JwksCache;

/// Access Token `typ` 클레임 값.
pub const ACCESS_TOKEN_TYPE: &str = "access";
/// Refresh Token `typ` 클레임 값.
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// `aud` 클레임. 단일 문자열 또는 문자열 배열입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    /// 주어진 대상이 포함되어 있는지 확인.
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

impl From<&str> for Audience {
    fn from(aud: &str) -> Self {
        Audience::Single(aud.to_string())
    }
}

/// JWT Access Token 페이로드.
///
/// 사용자 식별 정보와 역할을 포함합니다. 외부 IdP 토큰에는
/// `email`, `roles`, `typ`, `iat`, `jti`가 없을 수 있고 `aud`가 배열일 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject - 사용자 ID
    pub sub: String,
    /// 사용자 이메일
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// 사용자 역할
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: Audience,
    /// Issued At (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration (Unix timestamp)
    pub exp: i64,
    /// JWT ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// 토큰 종류
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl AccessClaims {
    /// 정규화된 역할 집합.
    pub fn role_set(&self) -> RoleSet {
        self.roles.iter().collect()
    }
}

/// Refresh Token 페이로드.
///
/// 권한 정보는 `jti` 하나뿐이며, 실제 유효성은 세션 저장소가 결정합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Subject - 사용자 ID
    pub sub: String,
    /// JWT ID (세션 조회 키)
    pub jti: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// 토큰 종류 (항상 "refresh")
    pub typ: String,
}

/// 발급된 Refresh Token.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    /// 서명된 토큰
    pub token: String,
    /// 세션 조회 키
    pub jti: Uuid,
    /// 서명된 토큰에서 읽은 만료 시각
    pub expires_at: DateTime<Utc>,
}

/// JWT 토큰 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("잘못된 토큰 형식")]
    InvalidToken,
    #[error("토큰 서명이 올바르지 않습니다")]
    InvalidSignature,
    #[error("지원하지 않는 서명 알고리즘: {0}")]
    UnsupportedAlgorithm(String),
    #[error("JWKS를 가져올 수 없습니다: {0}")]
    KeySetUnavailable(String),
}

/// 토큰 발급/검증 서비스.
///
/// 시작 시 [`AuthConfig`]에서 한 번 생성되며 이후 변경되지 않습니다.
pub struct TokenService {
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    leeway_secs: u64,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    jwks: Option<JwksCache>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("jwks", &self.jwks)
            .finish_non_exhaustive()
    }
}

/// 설정 검증을 거치지 않은 값도 상한으로 잘라 시각 계산이 넘치지 않게 한다.
fn to_chrono(duration: StdDuration) -> Duration {
    let secs = duration.as_secs().min(MAX_TOKEN_TTL_SECS);
    Duration::seconds(i64::try_from(secs).unwrap_or(0))
}

impl TokenService {
    /// 인증 설정으로부터 서비스를 생성합니다.
    pub fn from_config(config: &AuthConfig) -> Result<Self, JwtError> {
        let access_secret = config.access_secret.expose_secret().as_bytes();
        let refresh_secret = config.refresh_secret.expose_secret().as_bytes();

        let jwks = config
            .jwks_url
            .as_deref()
            .map(|url| JwksCache::new(url, StdDuration::from_secs(config.jwks_cache_ttl_secs)))
            .transpose()?;

        Ok(Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_ttl: to_chrono(config.access_ttl()),
            refresh_ttl: to_chrono(config.refresh_ttl()),
            leeway_secs: config.clock_skew_secs,
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            jwks,
        })
    }

    /// Access Token 만료 시간 (초).
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Access Token 발급.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        roles: &RoleSet,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            roles: roles.to_vec(),
            iss: self.issuer.clone(),
            aud: Audience::Single(self.audience.clone()),
            iat: Some(now.timestamp()),
            exp: (now + self.access_ttl).timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
            typ: Some(ACCESS_TOKEN_TYPE.to_string()),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)?)
    }

    /// Refresh Token 발급.
    ///
    /// 반환되는 만료 시각은 서명된 토큰을 다시 검증해 읽은 값입니다.
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<IssuedRefreshToken, JwtError> {
        let now = Utc::now();
        let jti = Uuid::new_v4();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
            typ: REFRESH_TOKEN_TYPE.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)?;
        let signed = self.verify_refresh_token(&token)?;
        let expires_at = Utc
            .timestamp_opt(signed.exp, 0)
            .single()
            .ok_or(JwtError::InvalidToken)?;

        Ok(IssuedRefreshToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Access Token 검증.
    ///
    /// 헤더의 알고리즘에 따라 HS256 또는 RS256(JWKS) 경로를 선택합니다.
    pub async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let header = decode_header(token).map_err(|_| JwtError::InvalidToken)?;

        let claims: AccessClaims = match header.alg {
            Algorithm::HS256 => self.decode_claims(token, &self.access_decoding, Algorithm::HS256)?,
            Algorithm::RS256 => {
                let jwks = self
                    .jwks
                    .as_ref()
                    .ok_or_else(|| JwtError::UnsupportedAlgorithm("RS256".to_string()))?;
                let key = jwks.decoding_key(header.kid.as_deref()).await?;
                self.decode_claims(token, &key, Algorithm::RS256)?
            }
            other => return Err(JwtError::UnsupportedAlgorithm(format!("{:?}", other))),
        };

        self.check_times(claims.iat, claims.exp)?;

        // Refresh Token을 Access Token으로 쓰는 것을 막는다
        if claims.typ.as_deref().is_some_and(|t| t != ACCESS_TOKEN_TYPE) {
            return Err(JwtError::InvalidToken);
        }

        Ok(claims)
    }

    /// Refresh Token 검증. Refresh 비밀 키와 HS256만 허용합니다.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let header = decode_header(token).map_err(|_| JwtError::InvalidToken)?;
        if header.alg != Algorithm::HS256 {
            return Err(JwtError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let claims: RefreshClaims =
            self.decode_claims(token, &self.refresh_decoding, Algorithm::HS256)?;
        self.check_times(Some(claims.iat), claims.exp)?;

        if claims.typ != REFRESH_TOKEN_TYPE {
            return Err(JwtError::InvalidToken);
        }

        Ok(claims)
    }

    fn decode_claims<C: DeserializeOwned>(
        &self,
        token: &str,
        key: &DecodingKey,
        algorithm: Algorithm,
    ) -> Result<C, JwtError> {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.required_spec_claims =
            HashSet::from(["exp", "iss", "aud", "sub"].map(String::from));
        // 만료는 check_times에서 오차 없이 비교한다
        validation.validate_exp = false;
        validation.validate_nbf = true;
        validation.leeway = self.leeway_secs;

        decode::<C>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidAlgorithm => {
                    JwtError::UnsupportedAlgorithm(format!("{:?}", algorithm))
                }
                _ => JwtError::InvalidToken,
            })
    }

    /// `iat`이 없는 토큰은 발급 시각 검사를 건너뛴다.
    fn check_times(&self, iat: Option<i64>, exp: i64) -> Result<(), JwtError> {
        let now = Utc::now().timestamp();
        let leeway = i64::try_from(self.leeway_secs).unwrap_or(i64::MAX);

        if now >= exp {
            return Err(JwtError::Expired);
        }
        if iat.is_some_and(|iat| iat > now.saturating_add(leeway)) {
            return Err(JwtError::InvalidToken);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_SECRET: &str = "test-access-secret-for-jwt-testing-minimum-32";
    const REFRESH_SECRET: &str = "test-refresh-secret-for-jwt-testing-minimum-32";
    const RSA_PRIVATE_PEM: &[u8] = include_bytes!("../../tests/fixtures/rs256_private.pem");
    const JWKS_BODY: &str = include_str!("../../tests/fixtures/jwks.json");

    fn config() -> AuthConfig {
        AuthConfig::new("prairiemed", "prairiemed-admin", ACCESS_SECRET, REFRESH_SECRET)
    }

    fn service() -> TokenService {
        TokenService::from_config(&config()).unwrap()
    }

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().collect()
    }

    fn access_claims_at(iat: i64, exp: i64) -> AccessClaims {
        AccessClaims {
            sub: Uuid::new_v4().to_string(),
            email: Some("nurse@prairiemed.test".to_string()),
            roles: vec!["nurse".to_string()],
            iss: "prairiemed".to_string(),
            aud: Audience::from("prairiemed-admin"),
            iat: Some(iat),
            exp,
            jti: Some(Uuid::new_v4().to_string()),
            typ: Some(ACCESS_TOKEN_TYPE.to_string()),
        }
    }

    fn sign_hs256(claims: &AccessClaims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_access_token_round_trip() {
        let service = service();
        let user_id = Uuid::new_v4();
        let token = service
            .issue_access_token(user_id, "doc@prairiemed.test", &roles(&["Doctor", "nurse"]))
            .unwrap();

        let claims = service.verify_access_token(&token).await.unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email.as_deref(), Some("doc@prairiemed.test"));
        assert_eq!(claims.role_set(), roles(&["doctor", "nurse"]));
        assert_eq!(claims.exp - claims.iat.unwrap(), 900);
        assert!(claims.aud.contains("prairiemed-admin"));
        assert_eq!(claims.typ.as_deref(), Some(ACCESS_TOKEN_TYPE));
    }

    #[test]
    fn test_refresh_token_carries_unique_jti() {
        let service = service();
        let user_id = Uuid::new_v4();
        let first = service.issue_refresh_token(user_id).unwrap();
        let second = service.issue_refresh_token(user_id).unwrap();
        assert_ne!(first.jti, second.jti);

        let claims = service.verify_refresh_token(&first.token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.jti, first.jti.to_string());
        assert_eq!(claims.exp, first.expires_at.timestamp());
        assert_eq!(claims.typ, REFRESH_TOKEN_TYPE);
    }

    #[tokio::test]
    async fn test_access_token_expired_one_second_ago() {
        let service = service();
        let now = Utc::now().timestamp();
        let token = sign_hs256(&access_claims_at(now - 900, now - 1), ACCESS_SECRET);

        let result = service.verify_access_token(&token).await;
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[tokio::test]
    async fn test_future_iat_within_skew_is_accepted() {
        let service = service();
        let now = Utc::now().timestamp();

        let token = sign_hs256(&access_claims_at(now + 30, now + 900), ACCESS_SECRET);
        assert!(service.verify_access_token(&token).await.is_ok());

        let token = sign_hs256(&access_claims_at(now + 600, now + 900), ACCESS_SECRET);
        assert!(matches!(
            service.verify_access_token(&token).await,
            Err(JwtError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let service = service();
        let now = Utc::now().timestamp();
        let token = sign_hs256(
            &access_claims_at(now, now + 900),
            "wrong-secret-key-for-testing-minimum-32-chars",
        );

        let result = service.verify_access_token(&token).await;
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_wrong_audience_and_issuer() {
        let service = service();
        let now = Utc::now().timestamp();

        let mut claims = access_claims_at(now, now + 900);
        claims.aud = Audience::from("someone-else");
        assert!(service
            .verify_access_token(&sign_hs256(&claims, ACCESS_SECRET))
            .await
            .is_err());

        let mut claims = access_claims_at(now, now + 900);
        claims.iss = "evil-issuer".to_string();
        assert!(service
            .verify_access_token(&sign_hs256(&claims, ACCESS_SECRET))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_token_kinds_are_not_interchangeable() {
        let service = service();
        let user_id = Uuid::new_v4();

        let refresh = service.issue_refresh_token(user_id).unwrap();
        assert!(service.verify_access_token(&refresh.token).await.is_err());

        let access = service
            .issue_access_token(user_id, "a@b.com", &RoleSet::new())
            .unwrap();
        assert!(service.verify_refresh_token(&access).is_err());

        // 같은 비밀 키라도 typ으로 구분된다
        let now = Utc::now().timestamp();
        let mut claims = access_claims_at(now, now + 900);
        claims.typ = Some(REFRESH_TOKEN_TYPE.to_string());
        assert!(matches!(
            service
                .verify_access_token(&sign_hs256(&claims, ACCESS_SECRET))
                .await,
            Err(JwtError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let service = service();
        assert!(matches!(
            service.verify_access_token("invalid.token.here").await,
            Err(JwtError::InvalidToken)
        ));
        assert!(service.verify_refresh_token("").is_err());
    }

    #[tokio::test]
    async fn test_rs256_without_jwks_is_rejected() {
        let service = service();
        let now = Utc::now().timestamp();
        let key = EncodingKey::from_rsa_pem(RSA_PRIVATE_PEM).unwrap();
        let token = encode(
            &Header::new(Algorithm::RS256),
            &access_claims_at(now, now + 900),
            &key,
        )
        .unwrap();

        assert!(matches!(
            service.verify_access_token(&token).await,
            Err(JwtError::UnsupportedAlgorithm(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_algorithm() {
        let service = service();
        let now = Utc::now().timestamp();
        let token = encode(
            &Header::new(Algorithm::HS512),
            &access_claims_at(now, now + 900),
            &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            service.verify_access_token(&token).await,
            Err(JwtError::UnsupportedAlgorithm(_))
        ));
    }

    #[tokio::test]
    async fn test_rs256_verified_against_jwks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/jwks.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(JWKS_BODY)
            .create_async()
            .await;

        let config = config().with_jwks_url(format!("{}/.well-known/jwks.json", server.url()));
        let service = TokenService::from_config(&config).unwrap();

        let now = Utc::now().timestamp();
        let mut claims = access_claims_at(now, now + 900);
        // 외부 IdP 토큰에는 typ이 없다
        claims.typ = None;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("test-key-1".to_string());
        let key = EncodingKey::from_rsa_pem(RSA_PRIVATE_PEM).unwrap();
        let token = encode(&header, &claims, &key).unwrap();

        let verified = service.verify_access_token(&token).await.unwrap();
        assert_eq!(verified.sub, claims.sub);
        assert_eq!(verified.role_set(), roles(&["nurse"]));

        // 서명 키와 다른 kid
        header.kid = Some("unknown".to_string());
        let token = encode(&header, &claims, &key).unwrap();
        assert!(service.verify_access_token(&token).await.is_err());
    }

    async fn jwks_service() -> (mockito::ServerGuard, TokenService) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/jwks.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(JWKS_BODY)
            .create_async()
            .await;

        let config = config().with_jwks_url(format!("{}/.well-known/jwks.json", server.url()));
        let service = TokenService::from_config(&config).unwrap();
        (server, service)
    }

    fn sign_rs256(claims: &serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("test-key-1".to_string());
        let key = EncodingKey::from_rsa_pem(RSA_PRIVATE_PEM).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    #[tokio::test]
    async fn test_rs256_accepts_audience_array() {
        let (_server, service) = jwks_service().await;
        let now = Utc::now().timestamp();
        let token = sign_rs256(&serde_json::json!({
            "sub": "idp-user-1",
            "iss": "prairiemed",
            "aud": ["prairiemed-admin", "other"],
            "iat": now,
            "exp": now + 900,
            "jti": "idp-jti-1",
        }));

        let claims = service.verify_access_token(&token).await.unwrap();
        assert!(claims.aud.contains("prairiemed-admin"));
        assert!(claims.aud.contains("other"));

        // 배열에 우리 대상이 없으면 거부
        let token = sign_rs256(&serde_json::json!({
            "sub": "idp-user-1",
            "iss": "prairiemed",
            "aud": ["other", "another"],
            "iat": now,
            "exp": now + 900,
        }));
        assert!(service.verify_access_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_rs256_accepts_missing_iat() {
        let (_server, service) = jwks_service().await;
        let now = Utc::now().timestamp();
        let token = sign_rs256(&serde_json::json!({
            "sub": "idp-user-2",
            "iss": "prairiemed",
            "aud": "prairiemed-admin",
            "exp": now + 900,
            "jti": "idp-jti-2",
        }));

        let claims = service.verify_access_token(&token).await.unwrap();
        assert_eq!(claims.iat, None);
        assert_eq!(claims.jti.as_deref(), Some("idp-jti-2"));
    }

    #[tokio::test]
    async fn test_rs256_accepts_missing_jti() {
        let (_server, service) = jwks_service().await;
        let now = Utc::now().timestamp();
        let token = sign_rs256(&serde_json::json!({
            "sub": "idp-user-3",
            "iss": "prairiemed",
            "aud": "prairiemed-admin",
            "iat": now,
            "exp": now + 900,
            "roles": ["Doctor"],
        }));

        let claims = service.verify_access_token(&token).await.unwrap();
        assert_eq!(claims.jti, None);
        assert_eq!(claims.role_set(), roles(&["doctor"]));
    }

    #[test]
    fn test_oversized_ttl_is_clamped() {
        let config = config().with_ttls(u64::MAX / 2, u64::MAX);
        let service = TokenService::from_config(&config).unwrap();
        assert_eq!(service.access_ttl_secs(), MAX_TOKEN_TTL_SECS as i64);

        // 발급이 패닉 없이 끝난다
        let issued = service.issue_refresh_token(Uuid::new_v4()).unwrap();
        assert!(issued.expires_at > Utc::now());
    }
}
