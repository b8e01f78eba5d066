//! TOML-based configuration for studentsync.
//!
//! Every value that feeds a reconciliation decision (OU strings, the grade
//! table, the placeholder-name deny-list, the grace period) lives in
//! [`DistrictConfig`], which is handed to the deriver and patch builder as-is.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Environment variable holding the initial password for new accounts.
pub const ENV_NEW_USER_PASSWORD: &str = "NEW_USER_PASSWORD";
/// Environment variable overriding `source.database_url`.
pub const ENV_DATABASE_URL: &str = "STUDENTSYNC_DATABASE_URL";
/// Environment variable holding a Google Admin API bearer token.
pub const ENV_GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";

/// Top-level configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub district: DistrictConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub sync: RunConfig,
}

/// District policy: directory layout, decision tables, and account defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictConfig {
    pub email_domain: String,
    #[serde(default = "default_ou_prefix")]
    pub ou_prefix: String,
    #[serde(default = "default_school_ou_suffix")]
    pub school_ou_suffix: String,
    #[serde(default = "default_suspended_ou")]
    pub suspended_ou: String,
    #[serde(default = "default_graduated_ou")]
    pub graduated_ou: String,
    #[serde(default = "default_graduated_school_name")]
    pub graduated_school_name: String,
    /// OU path fragments whose members are never moved automatically.
    #[serde(default = "default_frozen_ous")]
    pub frozen_ous: Vec<String>,
    /// Placeholder and test-account names that are never synced.
    #[serde(default = "default_denied_names")]
    pub denied_names: Vec<String>,
    /// Keep this year's graduates active during the grace months.
    #[serde(default = "default_true")]
    pub graduated_active_summer: bool,
    #[serde(default = "default_grace_months")]
    pub grace_months: Vec<u32>,
    #[serde(default = "default_pre_registration_school")]
    pub pre_registration_school: i64,
    #[serde(default = "default_homeschool_school")]
    pub homeschool_school: i64,
    /// Usually supplied through `NEW_USER_PASSWORD` rather than the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_user_password: Option<String>,
    #[serde(default = "default_grades")]
    pub grades: Vec<GradeOu>,
    #[serde(default)]
    pub custom_attributes: CustomAttributeConfig,
}

/// One row of the grade level to sub-OU table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradeOu {
    pub grade: i32,
    /// Appended to the building OU; empty for grades that live at the building root.
    #[serde(default)]
    pub sub_path: String,
}

/// Names of the custom schema category and fields in the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomAttributeConfig {
    #[serde(default = "default_attribute_category")]
    pub category: String,
    #[serde(default = "default_homeschool_field")]
    pub homeschool_field: String,
    #[serde(default = "default_graduation_year_field")]
    pub graduation_year_field: String,
}

impl Default for CustomAttributeConfig {
    fn default() -> Self {
        Self {
            category: default_attribute_category(),
            homeschool_field: default_homeschool_field(),
            graduation_year_field: default_graduation_year_field(),
        }
    }
}

/// Enrollment source connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

/// Google Admin Directory API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_customer_id")]
    pub customer_id: String,
    /// Domain used for user searches; falls back to `district.email_domain`.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_path: Option<String>,
    /// Override the API base URL (tests, proxies).
    #[serde(default)]
    pub api_base: Option<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            customer_id: default_customer_id(),
            domain: None,
            access_token: None,
            token_path: Some("token.json".into()),
            api_base: None,
        }
    }
}

/// Run-time behaviour of the reconcile engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Students processed concurrently within one school.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Overall deadline for one run.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            deadline_secs: default_deadline_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Retry behaviour for transient directory failures (429 and 5xx).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Exponential backoff for the given 1-based attempt, capped at `max_backoff_ms`.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        Duration::from_millis(base.min(self.max_backoff_ms as f64) as u64)
    }

    /// Rate limiting and server errors are transient; everything else is final.
    pub fn should_retry(&self, status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }
}

fn default_true() -> bool {
    true
}

fn default_ou_prefix() -> String {
    "/D118 Students/".into()
}

fn default_school_ou_suffix() -> String {
    " Students".into()
}

fn default_suspended_ou() -> String {
    "/Suspended Accounts".into()
}

fn default_graduated_ou() -> String {
    "/Suspended Accounts/Graduated Students".into()
}

fn default_graduated_school_name() -> String {
    "Graduated Students".into()
}

fn default_frozen_ous() -> Vec<String> {
    vec!["/Restricted".into(), "/Adobe Licensed Students".into()]
}

fn default_denied_names() -> Vec<String> {
    [
        "use",
        "training1",
        "trianing2",
        "trianing3",
        "trianing4",
        "planning",
        "admin",
        "nurse",
        "user",
        "test",
        "testtt",
        "test22",
        "teststudent",
        "tester",
        "karentest",
        "returning student",
        "whs",
        "wgs",
        "rcs",
        "ccs",
        "mms",
        "wms",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_grace_months() -> Vec<u32> {
    vec![6, 7, 8]
}

fn default_pre_registration_school() -> i64 {
    999_999
}

fn default_homeschool_school() -> i64 {
    901
}

fn default_grades() -> Vec<GradeOu> {
    let rows: [(i32, &str); 18] = [
        (-2, "/PreKindergarten"),
        (-1, "/PreKindergarten"),
        (0, "/Kindergarten"),
        (1, "/1st"),
        (2, "/2nd"),
        (3, "/3rd"),
        (4, "/4th"),
        (5, "/5th"),
        (6, "/6th"),
        (7, "/7th"),
        (8, "/8th"),
        (9, "/9th"),
        (10, "/10th"),
        (11, "/11th"),
        (12, "/12th"),
        (13, ""),
        (15, ""),
        (99, ""),
    ];
    rows.into_iter()
        .map(|(grade, sub_path)| GradeOu {
            grade,
            sub_path: sub_path.into(),
        })
        .collect()
}

fn default_attribute_category() -> String {
    "Synchronization_Data".into()
}

fn default_homeschool_field() -> String {
    "Homeschool_ID".into()
}

fn default_graduation_year_field() -> String {
    "Graduation_Year".into()
}

fn default_database_url() -> String {
    "sqlite:/var/lib/studentsync/powerschool.db".into()
}

fn default_customer_id() -> String {
    "my_customer".into()
}

fn default_concurrency() -> usize {
    4
}

fn default_deadline_secs() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for DistrictConfig {
    fn default() -> Self {
        Self {
            email_domain: "d118.org".into(),
            ou_prefix: default_ou_prefix(),
            school_ou_suffix: default_school_ou_suffix(),
            suspended_ou: default_suspended_ou(),
            graduated_ou: default_graduated_ou(),
            graduated_school_name: default_graduated_school_name(),
            frozen_ous: default_frozen_ous(),
            denied_names: default_denied_names(),
            graduated_active_summer: true,
            grace_months: default_grace_months(),
            pre_registration_school: default_pre_registration_school(),
            homeschool_school: default_homeschool_school(),
            new_user_password: None,
            grades: default_grades(),
            custom_attributes: CustomAttributeConfig::default(),
        }
    }
}

impl DistrictConfig {
    /// Sub-OU for a grade level, or `None` when the grade is not in the table.
    pub fn grade_sub_path(&self, grade: i32) -> Option<&str> {
        self.grades
            .iter()
            .find(|row| row.grade == grade)
            .map(|row| row.sub_path.as_str())
    }

    /// Trimmed, case-insensitive match against the placeholder-name deny-list.
    pub fn is_denied_name(&self, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        self.denied_names
            .iter()
            .any(|denied| denied.trim().to_lowercase() == needle)
    }

    pub fn is_graduated_building(&self, school_name: &str) -> bool {
        school_name
            .trim()
            .eq_ignore_ascii_case(self.graduated_school_name.trim())
    }

    /// The first frozen fragment contained in `org_unit_path`, if any.
    pub fn frozen_match(&self, org_unit_path: &str) -> Option<&str> {
        self.frozen_ous
            .iter()
            .map(String::as_str)
            .find(|frozen| !frozen.is_empty() && org_unit_path.contains(frozen))
    }

    pub fn is_grace_month(&self, month: u32) -> bool {
        self.grace_months.contains(&month)
    }

    pub fn email_for(&self, student_number: i64) -> String {
        format!("{student_number}@{}", self.email_domain)
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::Config(format!("failed to parse config: {e}")))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(password) = non_empty(ENV_NEW_USER_PASSWORD) {
            self.district.new_user_password = Some(password);
        }
        if let Some(url) = non_empty(ENV_DATABASE_URL) {
            self.source.database_url = url;
        }
        if let Some(token) = non_empty(ENV_GOOGLE_ACCESS_TOKEN) {
            self.google.access_token = Some(token);
        }
    }

    /// Domain used for directory user searches.
    pub fn search_domain(&self) -> &str {
        self.google
            .domain
            .as_deref()
            .unwrap_or(&self.district.email_domain)
    }

    /// Validate the configuration, returning an error for invalid combinations.
    pub fn validate(&self) -> Result<()> {
        let district = &self.district;

        if district.email_domain.trim().is_empty() {
            return Err(SyncError::Config(
                "district.email_domain must not be empty".into(),
            ));
        }
        if district.email_domain.contains('@') {
            return Err(SyncError::Config(
                "district.email_domain must not contain '@'".into(),
            ));
        }

        for (key, value) in [
            ("district.ou_prefix", &district.ou_prefix),
            ("district.suspended_ou", &district.suspended_ou),
            ("district.graduated_ou", &district.graduated_ou),
        ] {
            if !value.starts_with('/') {
                return Err(SyncError::Config(format!("{key} must start with '/'")));
            }
        }

        if district
            .new_user_password
            .as_deref()
            .is_none_or(|p| p.is_empty())
        {
            return Err(SyncError::Config(format!(
                "district.new_user_password is required (or set {ENV_NEW_USER_PASSWORD})"
            )));
        }

        let mut seen = HashSet::new();
        for row in &district.grades {
            if !seen.insert(row.grade) {
                return Err(SyncError::Config(format!(
                    "district.grades lists grade {} more than once",
                    row.grade
                )));
            }
        }

        if let Some(month) = district.grace_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(SyncError::Config(format!(
                "district.grace_months contains invalid month {month}"
            )));
        }

        if self.source.database_url.trim().is_empty() {
            return Err(SyncError::Config(
                "source.database_url must not be empty".into(),
            ));
        }

        if self.google.access_token.is_none() && self.google.token_path.is_none() {
            return Err(SyncError::Config(format!(
                "google.token_path or google.access_token is required (or set {ENV_GOOGLE_ACCESS_TOKEN})"
            )));
        }

        if self.sync.concurrency == 0 {
            return Err(SyncError::Config(
                "sync.concurrency must be at least 1".into(),
            ));
        }
        if self.sync.deadline_secs == 0 {
            return Err(SyncError::Config(
                "sync.deadline_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a sensible default configuration.
    pub fn generate_default() -> Self {
        Self {
            district: DistrictConfig::default(),
            source: SourceConfig::default(),
            google: GoogleConfig::default(),
            sync: RunConfig::default(),
        }
    }

    /// Serialize to TOML (used by `studentsync init`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SyncError::Serialization(format!("failed to write config: {e}")))
    }
}
