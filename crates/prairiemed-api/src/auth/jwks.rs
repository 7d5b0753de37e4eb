//! 원격 JWKS 키 세트 캐시.
//!
//! 외부 IdP가 발급한 RS256 토큰을 검증하기 위해 공개 키 세트를 HTTP로 가져와
//! 일정 시간 캐시합니다. 캐시에 없는 `kid`가 들어오면 키 로테이션으로 보고
//! 한 번 더 가져옵니다.
//!
//! 원격 요청은 한 번에 하나만 나가며, 성공이든 실패든 마지막 시도 후
//! [`MIN_REFETCH_INTERVAL`] 안에는 다시 요청하지 않습니다.

use std::time::Duration;

use jsonwebtoken::{jwk::JwkSet, DecodingKey};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::jwt::JwtError;

/// 원격 요청 사이의 최소 간격.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(10);

/// JWKS 요청 타임아웃.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// 마지막 원격 요청 기록. 이 잠금을 잡은 쪽만 요청을 보낸다.
#[derive(Default)]
struct FetchAttempt {
    at: Option<Instant>,
    error: Option<String>,
}

/// JWKS 캐시.
pub struct JwksCache {
    url: String,
    client: reqwest::Client,
    ttl: Duration,
    cached: RwLock<Option<CachedKeys>>,
    attempt: Mutex<FetchAttempt>,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("url", &self.url)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl JwksCache {
    /// 새 캐시 생성. 첫 검증 요청 시 키 세트를 가져옵니다.
    pub fn new(url: impl Into<String>, ttl: Duration) -> Result<Self, JwtError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| JwtError::KeySetUnavailable(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
            ttl,
            cached: RwLock::new(None),
            attempt: Mutex::new(FetchAttempt::default()),
        })
    }

    /// `kid`에 해당하는 검증 키를 반환합니다.
    ///
    /// `kid`가 없는 토큰은 키 세트에 키가 하나뿐일 때만 허용합니다.
    pub async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, JwtError> {
        if let Some(key) = self.cached_key(kid, true).await? {
            return Ok(key);
        }

        let mut attempt = self.attempt.lock().await;

        // 기다리는 동안 다른 요청이 키 세트를 갱신했을 수 있다
        if let Some(key) = self.cached_key(kid, true).await? {
            return Ok(key);
        }

        if attempt.at.is_some_and(|at| at.elapsed() < MIN_REFETCH_INTERVAL) {
            // 최근에 시도했다. 만료된 캐시라도 있으면 그것으로 판정한다
            if let Some(key) = self.cached_key(kid, false).await? {
                return Ok(key);
            }
            return Err(match &attempt.error {
                Some(error) => JwtError::KeySetUnavailable(error.clone()),
                None => JwtError::InvalidToken,
            });
        }

        attempt.at = Some(Instant::now());
        let keys = match self.fetch().await {
            Ok(keys) => {
                attempt.error = None;
                keys
            }
            Err(e) => {
                attempt.error = Some(match &e {
                    JwtError::KeySetUnavailable(reason) => reason.clone(),
                    other => other.to_string(),
                });
                return Err(e);
            }
        };
        let key = select_key(&keys, kid);

        *self.cached.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key?.ok_or(JwtError::InvalidToken)
    }

    /// 캐시에서 키를 찾는다. `fresh_only`면 TTL이 지난 캐시는 무시한다.
    async fn cached_key(
        &self,
        kid: Option<&str>,
        fresh_only: bool,
    ) -> Result<Option<DecodingKey>, JwtError> {
        let cached = self.cached.read().await;
        match cached.as_ref() {
            Some(entry) if !fresh_only || entry.fetched_at.elapsed() < self.ttl => {
                select_key(&entry.keys, kid)
            }
            _ => Ok(None),
        }
    }

    async fn fetch(&self) -> Result<JwkSet, JwtError> {
        debug!(url = %self.url, "Fetching JWKS");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(url = %self.url, error = %e, "JWKS fetch failed");
                JwtError::KeySetUnavailable(e.to_string())
            })?;

        response.json::<JwkSet>().await.map_err(|e| {
            warn!(url = %self.url, error = %e, "JWKS response is not a valid key set");
            JwtError::KeySetUnavailable(e.to_string())
        })
    }
}

fn select_key(keys: &JwkSet, kid: Option<&str>) -> Result<Option<DecodingKey>, JwtError> {
    let jwk = match kid {
        Some(kid) => keys.find(kid),
        None if keys.keys.len() == 1 => keys.keys.first(),
        None => None,
    };

    jwk.map(DecodingKey::from_jwk)
        .transpose()
        .map_err(|_| JwtError::InvalidToken)
}
