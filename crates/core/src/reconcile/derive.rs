//! Desired account state from one student's enrollment facts.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::DistrictConfig;
use crate::error::{Result, SyncError};
use crate::models::account::{CustomAttributes, DesiredAccountState};
use crate::models::student::{SchoolRecord, StudentRecord};

/// Why a student was left out of the sync entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    /// First or last name matches the placeholder/test-account deny-list.
    PlaceholderName { name: String },
}

/// Outcome of deriving a student's account state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    Desired(DesiredAccountState),
    Skip(SkipReason),
}

/// Reject placeholder and test records before anything else is computed.
pub fn screen(student: &StudentRecord, config: &DistrictConfig) -> Option<SkipReason> {
    [&student.first_name, &student.last_name]
        .into_iter()
        .find(|name| config.is_denied_name(name))
        .map(|name| SkipReason::PlaceholderName {
            name: name.trim().to_string(),
        })
}

/// Derive the target account state for `student`, enrolled at `school`, as of `today`.
///
/// Placeholder records come back as [`Derivation::Skip`]. A grade level with
/// no entry in the grade table is an error, never a silent default.
pub fn derive(
    student: &StudentRecord,
    school: &SchoolRecord,
    today: NaiveDate,
    config: &DistrictConfig,
) -> Result<Derivation> {
    if let Some(reason) = screen(student, config) {
        return Ok(Derivation::Skip(reason));
    }

    let mut suspended = !student.is_enrolled();

    let grace_period_applied = suspended && in_graduate_grace_period(student, school, today, config);
    if grace_period_applied {
        suspended = false;
    }

    let org_unit_path = resolve_org_unit(student, school, suspended, config)?;

    Ok(Derivation::Desired(DesiredAccountState {
        email: config.email_for(student.student_number),
        suspended,
        org_unit_path,
        given_name: title_case(&student.first_name),
        family_name: title_case(&student.last_name),
        custom_attributes: CustomAttributes {
            homeschool_id: student.school_id,
            graduation_year: student.graduation_year,
        },
        grace_period_applied,
    }))
}

/// This year's graduates stay active through the summer grace months.
fn in_graduate_grace_period(
    student: &StudentRecord,
    school: &SchoolRecord,
    today: NaiveDate,
    config: &DistrictConfig,
) -> bool {
    config.graduated_active_summer
        && student.graduation_year == today.year()
        && config.is_grace_month(today.month())
        && config.is_graduated_building(&school.name)
        && student.is_graduated()
}

/// The building-level OU for a school.
pub fn building_org_unit(school: &SchoolRecord, config: &DistrictConfig) -> String {
    if config.is_graduated_building(&school.name) {
        return config.graduated_ou.clone();
    }
    format!(
        "{}{}{}",
        config.ou_prefix, school.abbreviation, config.school_ou_suffix
    )
}

fn resolve_org_unit(
    student: &StudentRecord,
    school: &SchoolRecord,
    suspended: bool,
    config: &DistrictConfig,
) -> Result<String> {
    let building = building_org_unit(school, config);

    let building_only = student.school_id == config.pre_registration_school
        || student.is_graduated()
        || student.school_id == config.homeschool_school
        || student.is_pre_registered();
    if building_only {
        return Ok(building);
    }

    if suspended {
        return Ok(config.suspended_ou.clone());
    }

    let sub_path = config
        .grade_sub_path(student.grade_level)
        .ok_or(SyncError::UnmappedGrade {
            grade: student.grade_level,
        })?;
    Ok(format!("{building}{sub_path}"))
}

/// Upper-case the first letter of every alphabetic run and lower-case the rest.
///
/// `"mary-JANE o'brien"` becomes `"Mary-Jane O'Brien"`.
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_word = false;
    for c in raw.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
