use serde::{Deserialize, Serialize};

/// Enrollment status: actively enrolled.
pub const ENROLL_ACTIVE: i32 = 0;
/// Enrollment status: pre-registered for a future term.
pub const ENROLL_PRE_REGISTERED: i32 = -1;
/// Enrollment status: withdrawn / transferred out.
pub const ENROLL_WITHDRAWN: i32 = 2;
/// Enrollment status: graduated.
pub const ENROLL_GRADUATED: i32 = 3;

/// One student row from the enrollment system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub student_number: i64,
    pub first_name: String,
    pub last_name: String,
    pub graduation_year: i32,
    pub enroll_status: i32,
    pub school_id: i64,
    pub grade_level: i32,
}

impl StudentRecord {
    /// Active and pre-registered students keep their accounts enabled.
    pub fn is_enrolled(&self) -> bool {
        matches!(self.enroll_status, ENROLL_ACTIVE | ENROLL_PRE_REGISTERED)
    }

    pub fn is_graduated(&self) -> bool {
        self.enroll_status == ENROLL_GRADUATED
    }

    pub fn is_pre_registered(&self) -> bool {
        self.enroll_status == ENROLL_PRE_REGISTERED
    }
}

/// One school (building) row from the enrollment system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchoolRecord {
    pub name: String,
    pub school_number: i64,
    pub abbreviation: String,
}
