//! Read access to the enrollment system.

pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::student::{SchoolRecord, StudentRecord};
use crate::models::sync::SchoolScope;

pub use sqlite::SqliteEnrollmentSource;

/// Trait for enrollment system readers.
#[async_trait]
pub trait EnrollmentSource: Send + Sync {
    /// Schools covered by `scope`, ordered by school number.
    async fn list_schools(&self, scope: &SchoolScope) -> Result<Vec<SchoolRecord>>;

    /// Students whose current school is `school_number`, highest student number first.
    async fn list_students(&self, school_number: i64) -> Result<Vec<StudentRecord>>;

    fn provider_name(&self) -> &str;
}
