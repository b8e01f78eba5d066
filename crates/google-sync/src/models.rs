//! Google Admin Directory API request/response structs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `customSchemas` payload: category name to field name to value.
pub type CustomSchemas = HashMap<String, HashMap<String, Value>>;

/// A Google Workspace user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUser {
    pub primary_email: String,
    pub name: GoogleUserName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_password_at_next_login: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_schemas: Option<CustomSchemas>,
}

/// Name fields for a Google Workspace user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUserName {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
}

/// Sparse body for `users.update`; absent fields are left alone by Google.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<GoogleNameUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_schemas: Option<CustomSchemas>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleNameUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
}

/// Result page of a users search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleUserList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<GoogleUser>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A group the user belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGroup {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Result page of a groups listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleGroupList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GoogleGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Standard Google API error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleApiErrorBody {
    pub error: GoogleApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleApiError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<GoogleApiErrorItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleApiErrorItem {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl GoogleApiError {
    /// First machine-readable reason, if Google supplied one.
    pub fn reason(&self) -> &str {
        self.errors
            .first()
            .map(|e| e.reason.as_str())
            .unwrap_or_default()
    }
}

/// Read an integer attribute that may arrive as a JSON number or a numeric string.
pub fn schema_int(schemas: Option<&CustomSchemas>, category: &str, field: &str) -> Option<i64> {
    match schemas?.get(category)?.get(field)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
