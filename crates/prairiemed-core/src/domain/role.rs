//! 역할 집합과 접근 판정.
//!
//! 역할 이름은 자유 형식 문자열이며 대소문자를 구분하지 않습니다.
//! [`RoleSet`]은 생성 시점에 한 번 정규화(trim + 소문자)하므로
//! 판정 함수는 다시 정규화하지 않습니다.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 허용 목록과 무관하게 모든 접근이 허용되는 역할.
pub const BYPASS_ROLES: [&str; 2] = ["superadmin", "orgadmin"];

/// 정규화된 역할 집합.
///
/// 순서와 중복은 의미가 없습니다. JSON에서는 문자열 배열로 표현됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// 빈 역할 집합.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// 역할 이름 하나를 정규화합니다. 빈 이름은 `None`.
    pub fn normalize(role: &str) -> Option<String> {
        let trimmed = role.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }

    /// 역할을 추가합니다.
    pub fn insert(&mut self, role: &str) {
        if let Some(role) = Self::normalize(role) {
            self.0.insert(role);
        }
    }

    /// 역할 포함 여부 (대소문자 무시).
    pub fn contains(&self, role: &str) -> bool {
        Self::normalize(role).is_some_and(|r| self.0.contains(&r))
    }

    /// 비어 있는지 확인.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 역할 수.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 우회 역할(superadmin, orgadmin)을 가지고 있는지 확인.
    pub fn has_bypass(&self) -> bool {
        BYPASS_ROLES.iter().any(|r| self.0.contains(*r))
    }

    /// 공통 역할이 하나라도 있는지 확인.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        self.0.intersection(&other.0).next().is_some()
    }

    /// `self`의 모든 역할이 `other`에 포함되는지 확인.
    pub fn is_subset(&self, other: &RoleSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// 정규화된 역할 이름 순회.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// 정규화된 역할 이름 벡터.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .filter_map(|r| Self::normalize(r.as_ref()))
                .collect(),
        )
    }
}

impl From<Vec<String>> for RoleSet {
    fn from(roles: Vec<String>) -> Self {
        roles.into_iter().collect()
    }
}

impl From<RoleSet> for Vec<String> {
    fn from(roles: RoleSet) -> Self {
        roles.0.into_iter().collect()
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", joined.join(","))
    }
}

/// 허용 목록 매칭 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// 허용 역할 중 하나라도 가지면 허용
    AnyOf,
    /// 나열된 역할을 모두 가져야 허용
    AllOf,
}

/// any-of 접근 판정.
///
/// - 허용 목록이 비어 있으면 제한 없음으로 보고 허용합니다.
/// - 호출자 역할이 비어 있으면 거부합니다.
/// - 우회 역할은 허용 목록과 무관하게 허용됩니다.
/// - 그 외에는 교집합이 비어 있지 않을 때만 허용합니다.
pub fn can_access(caller: &RoleSet, allowed: &RoleSet) -> bool {
    if allowed.is_empty() {
        return true;
    }
    if caller.is_empty() {
        return false;
    }
    if caller.has_bypass() {
        return true;
    }
    caller.intersects(allowed)
}

/// all-of 접근 판정. 우회 역할 규칙이 먼저 적용됩니다.
pub fn can_access_all(caller: &RoleSet, required: &RoleSet) -> bool {
    if required.is_empty() {
        return true;
    }
    if caller.has_bypass() {
        return true;
    }
    required.is_subset(caller)
}

/// 매칭 방식에 따라 접근을 판정합니다.
pub fn authorize(caller: &RoleSet, allowed: &RoleSet, mode: MatchMode) -> bool {
    match mode {
        MatchMode::AnyOf => can_access(caller, allowed),
        MatchMode::AllOf => can_access_all(caller, allowed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roles(names: &[&str]) -> RoleSet {
        names.iter().collect()
    }

    #[test]
    fn test_normalization() {
        let set = roles(&["  Nurse ", "NURSE", "doctor", ""]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("nurse"));
        assert!(set.contains("Doctor"));
        assert!(!set.contains(""));
        assert_eq!(set.to_string(), "[doctor,nurse]");
    }

    #[test]
    fn test_can_access_examples() {
        assert!(can_access(&roles(&["superadmin"]), &roles(&["anyRoleNotHeld"])));
        assert!(can_access(&roles(&["nurse"]), &roles(&["doctor", "nurse"])));
        assert!(!can_access(&roles(&["nurse"]), &roles(&["doctor"])));
        assert!(can_access(&roles(&[]), &roles(&[])));
        assert!(!can_access(&roles(&[]), &roles(&["doctor"])));
    }

    #[test]
    fn test_orgadmin_bypass() {
        assert!(can_access(&roles(&["OrgAdmin"]), &roles(&["billingclerk"])));
        assert!(can_access_all(&roles(&["orgadmin"]), &roles(&["doctor", "himmanager"])));
    }

    #[test]
    fn test_can_access_all() {
        let caller = roles(&["doctor", "himmanager"]);
        assert!(can_access_all(&caller, &roles(&["Doctor", "HIMManager"])));
        assert!(!can_access_all(&caller, &roles(&["doctor", "pharmacist"])));
        assert!(can_access_all(&roles(&[]), &roles(&[])));
        assert!(!can_access_all(&roles(&[]), &roles(&["doctor"])));
    }

    #[test]
    fn test_authorize_dispatch() {
        let caller = roles(&["doctor"]);
        let allowed = roles(&["doctor", "nurse"]);
        assert!(authorize(&caller, &allowed, MatchMode::AnyOf));
        assert!(!authorize(&caller, &allowed, MatchMode::AllOf));
    }

    #[test]
    fn test_role_set_serialization() {
        let set = roles(&["Nurse", "doctor"]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["doctor","nurse"]"#);

        let parsed: RoleSet = serde_json::from_str(r#"["NURSE","nurse","Doctor"]"#).unwrap();
        assert_eq!(parsed, set);
    }

    fn role_name() -> impl Strategy<Value = String> {
        "[A-Za-z]{1,12}"
    }

    proptest! {
        #[test]
        fn prop_empty_allow_list_always_grants(caller in prop::collection::vec(role_name(), 0..6)) {
            let caller: RoleSet = caller.iter().collect();
            prop_assert!(can_access(&caller, &RoleSet::new()));
            prop_assert!(can_access_all(&caller, &RoleSet::new()));
        }

        #[test]
        fn prop_bypass_grants_everything(
            extra in prop::collection::vec(role_name(), 0..4),
            allowed in prop::collection::vec(role_name(), 1..6),
            bypass in prop::sample::select(BYPASS_ROLES.to_vec()),
        ) {
            let mut caller: RoleSet = extra.iter().collect();
            caller.insert(&bypass.to_uppercase());
            let allowed: RoleSet = allowed.iter().collect();
            prop_assert!(can_access(&caller, &allowed));
            prop_assert!(can_access_all(&caller, &allowed));
        }

        #[test]
        fn prop_case_insensitive(
            caller in prop::collection::vec(role_name(), 0..6),
            allowed in prop::collection::vec(role_name(), 0..6),
        ) {
            let lower: RoleSet = caller.iter().map(|r| r.to_lowercase()).collect();
            let upper: RoleSet = caller.iter().map(|r| r.to_uppercase()).collect();
            let allowed: RoleSet = allowed.iter().collect();
            prop_assert_eq!(can_access(&lower, &allowed), can_access(&upper, &allowed));
        }

        #[test]
        fn prop_all_of_implies_any_of(
            caller in prop::collection::vec(role_name(), 1..6),
            allowed in prop::collection::vec(role_name(), 1..6),
        ) {
            let caller: RoleSet = caller.iter().collect();
            let allowed: RoleSet = allowed.iter().collect();
            if can_access_all(&caller, &allowed) {
                prop_assert!(can_access(&caller, &allowed));
            }
        }
    }
}
