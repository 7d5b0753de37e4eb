//! 역할 기반 접근 제어 (RBAC).
//!
//! 작업별 허용 역할 목록을 이름 붙은 권한([`Capability`])으로 정의합니다.
//! 판정 자체는 `prairiemed_core::authorize`가 담당합니다.

use prairiemed_core::{authorize, MatchMode, RoleSet};
use serde::{Deserialize, Serialize};

const VIEW_PATIENT_ROLES: &[&str] = &[
    "superadmin",
    "orgadmin",
    "facilityadmin",
    "organizerauditor",
    "orgauditor",
    "privacyofficer",
    "complianceofficer",
    "himmanager",
    "doctor",
    "nurse",
    "nursepractitioner",
    "physicianassistant",
    "nursingassistant",
    "chargenurse",
    "respiratorytherapist",
    "physicaltherapist",
    "occupationaltherapist",
    "dietitian",
    "socialworker",
    "casemanager",
    "registrar",
    "scheduler",
    "receptionist",
    "unitclerk",
    "labtechnologist",
    "labmanager",
    "phlebotomist",
    "radiologytechnologist",
    "radiologymanager",
    "pharmacist",
    "pharmacytechnician",
    "analyst",
    "readonlyviewer",
];

const EDIT_PATIENT_ROLES: &[&str] = &[
    "superadmin",
    "orgadmin",
    "facilityadmin",
    "himmanager",
    "doctor",
    "nurse",
    "nursepractitioner",
    "physicianassistant",
    "nursingassistant",
    "chargenurse",
    "registrar",
    "unitclerk",
    "receptionist",
];

const DELETE_PATIENT_ROLES: &[&str] = &["superadmin", "orgadmin", "facilityadmin", "himmanager"];

/// 환자 조회 권한에 청구 담당 역할을 더한 목록 (보험, 동의서 조회).
const VIEW_FINANCIAL_ROLES: &[&str] = &[
    "superadmin",
    "orgadmin",
    "facilityadmin",
    "organizerauditor",
    "orgauditor",
    "privacyofficer",
    "complianceofficer",
    "himmanager",
    "doctor",
    "nurse",
    "nursepractitioner",
    "physicianassistant",
    "nursingassistant",
    "chargenurse",
    "respiratorytherapist",
    "physicaltherapist",
    "occupationaltherapist",
    "dietitian",
    "socialworker",
    "casemanager",
    "registrar",
    "scheduler",
    "receptionist",
    "unitclerk",
    "labtechnologist",
    "labmanager",
    "phlebotomist",
    "radiologytechnologist",
    "radiologymanager",
    "pharmacist",
    "pharmacytechnician",
    "analyst",
    "readonlyviewer",
    "billingclerk",
    "billingmanager",
    "insurancespecialist",
    "arspecialist",
];

const EDIT_INSURANCE_ROLES: &[&str] = &[
    "superadmin",
    "orgadmin",
    "facilityadmin",
    "registrar",
    "billingclerk",
    "billingmanager",
    "insurancespecialist",
    "arspecialist",
    "himmanager",
];

const EDIT_CONSENTS_ROLES: &[&str] = &[
    "superadmin",
    "orgadmin",
    "facilityadmin",
    "doctor",
    "nurse",
    "nursepractitioner",
    "physicianassistant",
    "himmanager",
];

const MANAGE_SESSIONS_ROLES: &[&str] = &["admin", "facilityadmin"];

/// 시스템 권한.
///
/// 각 작업에 필요한 역할 목록과 매칭 방식을 정의합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// 환자 조회
    ViewPatient,
    /// 환자 정보 수정
    EditPatient,
    /// 환자 삭제
    DeletePatient,
    /// 보험 정보 조회
    ViewInsurance,
    /// 보험 정보 수정
    EditInsurance,
    /// 동의서 조회
    ViewConsents,
    /// 동의서 수정
    EditConsents,
    /// 다른 사용자의 세션 관리
    ManageSessions,
}

impl Capability {
    /// 모든 권한.
    pub const ALL: [Capability; 8] = [
        Capability::ViewPatient,
        Capability::EditPatient,
        Capability::DeletePatient,
        Capability::ViewInsurance,
        Capability::EditInsurance,
        Capability::ViewConsents,
        Capability::EditConsents,
        Capability::ManageSessions,
    ];

    /// 권한 이름 (예: "VIEW_PATIENT").
    pub fn name(&self) -> &'static str {
        match self {
            Capability::ViewPatient => "VIEW_PATIENT",
            Capability::EditPatient => "EDIT_PATIENT",
            Capability::DeletePatient => "DELETE_PATIENT",
            Capability::ViewInsurance => "VIEW_INSURANCE",
            Capability::EditInsurance => "EDIT_INSURANCE",
            Capability::ViewConsents => "VIEW_CONSENTS",
            Capability::EditConsents => "EDIT_CONSENTS",
            Capability::ManageSessions => "MANAGE_SESSIONS",
        }
    }

    /// 허용 역할 목록.
    pub fn allowed_roles(&self) -> &'static [&'static str] {
        match self {
            Capability::ViewPatient => VIEW_PATIENT_ROLES,
            Capability::EditPatient => EDIT_PATIENT_ROLES,
            Capability::DeletePatient => DELETE_PATIENT_ROLES,
            Capability::ViewInsurance | Capability::ViewConsents => VIEW_FINANCIAL_ROLES,
            Capability::EditInsurance => EDIT_INSURANCE_ROLES,
            Capability::EditConsents => EDIT_CONSENTS_ROLES,
            Capability::ManageSessions => MANAGE_SESSIONS_ROLES,
        }
    }

    /// 매칭 방식. 현재 모든 권한은 any-of입니다.
    pub fn mode(&self) -> MatchMode {
        MatchMode::AnyOf
    }

    /// 허용 역할 집합.
    pub fn allowed(&self) -> RoleSet {
        self.allowed_roles().iter().collect()
    }

    /// 호출자 역할이 이 권한을 만족하는지 확인.
    pub fn permits(&self, caller: &RoleSet) -> bool {
        authorize(caller, &self.allowed(), self.mode())
    }

    /// 이름에서 권한 파싱 (대소문자 무시).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
