use serde::{Deserialize, Serialize};

/// The two synchronization attributes stored on every student account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomAttributes {
    pub homeschool_id: i64,
    pub graduation_year: i32,
}

/// Account state derived from enrollment facts for one student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DesiredAccountState {
    pub email: String,
    pub suspended: bool,
    pub org_unit_path: String,
    pub given_name: String,
    pub family_name: String,
    pub custom_attributes: CustomAttributes,
    /// Set when the summer graduate grace period kept the account active.
    #[serde(default)]
    pub grace_period_applied: bool,
}

/// A group the account is a member of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Account state as currently held by the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObservedAccountState {
    pub email: String,
    pub suspended: bool,
    pub org_unit_path: String,
    pub given_name: String,
    pub family_name: String,
    /// `None` when the attribute category, or either field in it, is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<CustomAttributes>,
    /// Only populated when the account is about to be suspended.
    #[serde(default)]
    pub groups: Vec<GroupRef>,
}

/// Sparse update: only fields that differ from the observed account are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<CustomAttributes>,
}

impl UpdatePatch {
    pub fn is_empty(&self) -> bool {
        self.suspended.is_none()
            && self.org_unit_path.is_none()
            && self.given_name.is_none()
            && self.family_name.is_none()
            && self.custom_attributes.is_none()
    }

    /// Names of the fields carried by this patch, for logging.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.suspended.is_some() {
            fields.push("suspended");
        }
        if self.org_unit_path.is_some() {
            fields.push("orgUnitPath");
        }
        if self.given_name.is_some() {
            fields.push("givenName");
        }
        if self.family_name.is_some() {
            fields.push("familyName");
        }
        if self.custom_attributes.is_some() {
            fields.push("customAttributes");
        }
        fields
    }
}

/// Full payload for a brand-new directory account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub password: String,
    pub change_password_at_next_login: bool,
    pub org_unit_path: String,
    pub custom_attributes: CustomAttributes,
}
