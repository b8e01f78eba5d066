use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::models::student::{SchoolRecord, StudentRecord};
use crate::models::sync::SchoolScope;

use super::EnrollmentSource;

const SCHOOL_COLUMNS: &str = "SELECT name, school_number, abbreviation FROM schools";

/// Enrollment source backed by a SQLite mirror of the SIS tables.
#[derive(Clone)]
pub struct SqliteEnrollmentSource {
    pool: SqlitePool,
}

impl SqliteEnrollmentSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `url` and make sure the mirror tables exist.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url).await?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database with the mirror schema. Useful for testing.
    pub async fn new_memory() -> Result<Self> {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        let migration_sql = include_str!("../../../../migrations/sqlite/001_enrollment_mirror.sql");
        for statement in migration_sql.split(';') {
            let trimmed = statement
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            if !trimmed.trim().is_empty() {
                sqlx::query(&trimmed).execute(pool).await?;
            }
        }
        Ok(())
    }
}

fn row_to_school(row: &SqliteRow) -> SchoolRecord {
    SchoolRecord {
        name: row.get("name"),
        school_number: row.get("school_number"),
        abbreviation: row.get("abbreviation"),
    }
}

fn row_to_student(row: &SqliteRow) -> StudentRecord {
    StudentRecord {
        student_number: row.get("student_number"),
        first_name: row
            .get::<Option<String>, _>("first_name")
            .unwrap_or_default(),
        last_name: row
            .get::<Option<String>, _>("last_name")
            .unwrap_or_default(),
        graduation_year: row.get("classof"),
        enroll_status: row.get("enroll_status"),
        school_id: row.get("schoolid"),
        grade_level: row.get("grade_level"),
    }
}

#[async_trait]
impl EnrollmentSource for SqliteEnrollmentSource {
    async fn list_schools(&self, scope: &SchoolScope) -> Result<Vec<SchoolRecord>> {
        let rows = match scope {
            SchoolScope::All => {
                sqlx::query(&format!("{SCHOOL_COLUMNS} ORDER BY school_number"))
                    .fetch_all(&self.pool)
                    .await?
            }
            SchoolScope::ReportingOnly => {
                sqlx::query(&format!(
                    "{SCHOOL_COLUMNS} WHERE state_exclude_from_reporting = 0 ORDER BY school_number"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            SchoolScope::School(number) => {
                sqlx::query(&format!(
                    "{SCHOOL_COLUMNS} WHERE school_number = ?1 ORDER BY school_number"
                ))
                .bind(*number)
                .fetch_all(&self.pool)
                .await?
            }
        };
        debug!(scope = %scope, count = rows.len(), "Loaded schools");
        Ok(rows.iter().map(row_to_school).collect())
    }

    async fn list_students(&self, school_number: i64) -> Result<Vec<StudentRecord>> {
        let rows = sqlx::query(
            "SELECT student_number, first_name, last_name, classof, enroll_status, schoolid, grade_level \
             FROM students WHERE schoolid = ?1 ORDER BY student_number DESC",
        )
        .bind(school_number)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::SourceQuery {
            school: school_number,
            message: e.to_string(),
        })?;
        Ok(rows.iter().map(row_to_student).collect())
    }

    fn provider_name(&self) -> &str {
        "sqlite"
    }
}
