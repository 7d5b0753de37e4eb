//! 비밀번호 해싱 및 검증.
//!
//! Argon2id 해시를 검증하고, 평문으로 시드된 레거시 비밀번호는
//! 일치 시 새 Argon2id 해시를 함께 돌려주어 호출자가 저장소를 갱신할 수 있게 합니다.
//! 마이그레이션이 꺼져 있으면 새 해시를 만들지 않습니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use prairiemed_core::Argon2Config;
use tracing::warn;

/// 강한 해시 알고리즘의 PHC 태그 접두사.
const STRONG_HASH_PREFIX: &str = "$argon2";

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("잘못된 Argon2 파라미터")]
    InvalidParams,
}

/// 비밀번호 검증 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCheck {
    /// 비밀번호 일치 여부
    pub ok: bool,
    /// 레거시 평문 일치 시 저장해야 할 새 해시
    pub migrated_hash: Option<String>,
}

impl PasswordCheck {
    fn rejected() -> Self {
        Self {
            ok: false,
            migrated_hash: None,
        }
    }

    fn accepted(migrated_hash: Option<String>) -> Self {
        Self {
            ok: true,
            migrated_hash,
        }
    }
}

fn argon2(cost: &Argon2Config) -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
        .map_err(|_| PasswordError::InvalidParams)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// 저장된 값이 Argon2 해시인지 확인.
pub fn is_strong_hash(stored: &str) -> bool {
    stored.starts_with(STRONG_HASH_PREFIX)
}

/// 비밀번호 해싱.
///
/// 솔트는 자동으로 생성되며 결과는 PHC 형식 문자열입니다.
///
/// ```rust,ignore
/// let hash = hash_password("my_secure_password", &Argon2Config::default())?;
/// // "$argon2id$v=19$m=65536,t=3,p=1$..."
/// ```
pub fn hash_password(password: &str, cost: &Argon2Config) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = argon2(cost)?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| PasswordError::HashingFailed)?;

    Ok(hash.to_string())
}

/// 저장된 해시와 입력 비밀번호를 비교합니다.
///
/// - Argon2 태그가 있으면 상수 시간 검증을 수행합니다.
/// - 그 외에는 평문 시드로 간주하여 그대로 비교하고, 일치하고 `migrate`가 켜져 있으면
///   새 해시를 함께 반환합니다.
///
/// 불일치뿐 아니라 해시 형식 손상, 해싱 실패도 모두 `ok = false`로 처리합니다.
pub fn verify_or_migrate(
    stored: &str,
    supplied: &str,
    cost: &Argon2Config,
    migrate: bool,
) -> PasswordCheck {
    if stored.is_empty() {
        return PasswordCheck::rejected();
    }

    if is_strong_hash(stored) {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is corrupt");
                return PasswordCheck::rejected();
            }
        };
        // 검증 파라미터는 해시 문자열에서 읽는다
        let ok = Argon2::default()
            .verify_password(supplied.as_bytes(), &parsed)
            .is_ok();
        return PasswordCheck {
            ok,
            migrated_hash: None,
        };
    }

    if stored != supplied {
        return PasswordCheck::rejected();
    }
    if !migrate {
        return PasswordCheck::accepted(None);
    }

    match hash_password(supplied, cost) {
        Ok(hash) => PasswordCheck::accepted(Some(hash)),
        Err(e) => {
            warn!(error = %e, "Failed to hash legacy password for migration");
            PasswordCheck::rejected()
        }
    }
}

/// [`verify_or_migrate`]를 blocking 스레드 풀에서 실행합니다.
///
/// Argon2는 의도적으로 비싼 연산이므로 비동기 워커 스레드를 점유하지 않도록 합니다.
pub async fn verify_or_migrate_blocking(
    stored: String,
    supplied: String,
    cost: Argon2Config,
    migrate: bool,
) -> PasswordCheck {
    let task =
        tokio::task::spawn_blocking(move || verify_or_migrate(&stored, &supplied, &cost, migrate));
    match task.await {
        Ok(check) => check,
        Err(e) => {
            warn!(error = %e, "Password verification task failed");
            PasswordCheck::rejected()
        }
    }
}

/// 계정이 없을 때 실제 검증과 같은 Argon2 비용을 치르고 버립니다.
///
/// 응답 시간으로 계정 존재 여부를 추측할 수 없게 합니다.
pub async fn burn_verification_blocking(supplied: String, cost: Argon2Config) {
    let task = tokio::task::spawn_blocking(move || hash_password(&supplied, &cost).is_ok());
    if let Err(e) = task.await {
        warn!(error = %e, "Dummy password verification task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: Argon2Config = Argon2Config {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    };

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("TestPassword123!", &FAST).unwrap();
        assert!(hash.starts_with("$argon2id$"));

        let check = verify_or_migrate(&hash, "TestPassword123!", &FAST, true);
        assert!(check.ok);
        assert!(check.migrated_hash.is_none());

        assert!(!verify_or_migrate(&hash, "WrongPassword123!", &FAST, true).ok);
    }

    #[test]
    fn test_different_salts() {
        let hash1 = hash_password("Password1", &FAST).unwrap();
        let hash2 = hash_password("Password1", &FAST).unwrap();
        assert_ne!(hash1, hash2);
        assert!(verify_or_migrate(&hash1, "Password1", &FAST, true).ok);
        assert!(verify_or_migrate(&hash2, "Password1", &FAST, true).ok);
    }

    #[test]
    fn test_legacy_plaintext_migration() {
        let check = verify_or_migrate("secret1", "secret1", &FAST, true);
        assert!(check.ok);
        let migrated = check.migrated_hash.expect("migrated hash");
        assert!(is_strong_hash(&migrated));

        // 마이그레이션 후에는 강한 해시 경로를 탄다
        let second = verify_or_migrate(&migrated, "secret1", &FAST, true);
        assert!(second.ok);
        assert!(second.migrated_hash.is_none());
    }

    #[test]
    fn test_legacy_plaintext_without_migration_skips_hashing() {
        let check = verify_or_migrate("secret1", "secret1", &FAST, false);
        assert_eq!(check, PasswordCheck::accepted(None));
    }

    #[test]
    fn test_legacy_plaintext_mismatch() {
        let check = verify_or_migrate("secret1", "secret2", &FAST, true);
        assert_eq!(check, PasswordCheck::rejected());
    }

    #[test]
    fn test_corrupt_hash_is_rejected() {
        let check = verify_or_migrate("$argon2id$garbage", "anything", &FAST, true);
        assert!(!check.ok);
    }

    #[test]
    fn test_empty_stored_hash_is_rejected() {
        assert!(!verify_or_migrate("", "", &FAST, true).ok);
    }

    #[test]
    fn test_invalid_params() {
        let bad = Argon2Config {
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
        };
        assert!(matches!(
            hash_password("pw", &bad),
            Err(PasswordError::InvalidParams)
        ));
    }

    #[tokio::test]
    async fn test_burn_verification_completes() {
        burn_verification_blocking("whatever".to_string(), FAST).await;
    }

    #[tokio::test]
    async fn test_blocking_wrapper() {
        let hash = hash_password("한글패스워드123", &FAST).unwrap();
        let check =
            verify_or_migrate_blocking(hash, "한글패스워드123".to_string(), FAST, true).await;
        assert!(check.ok);
    }
}
