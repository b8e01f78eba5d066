//! Error types for the studentsync core crate.

use thiserror::Error;

/// Top-level error type for all studentsync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("enrollment query failed for school {school}: {message}")]
    SourceQuery { school: i64, message: String },

    #[error("grade level {grade} has no organizational unit mapping")]
    UnmappedGrade { grade: i32 },

    #[error("directory lookup for {email} returned {matches} accounts")]
    LookupAmbiguity { email: String, matches: usize },

    #[error("directory API error {status}: {message}. Reason: {reason}")]
    DirectoryApi {
        status: u16,
        message: String,
        reason: String,
    },

    #[error("sync run exceeded its deadline of {secs}s")]
    Deadline { secs: u64 },
}

/// A convenience Result alias that defaults to [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = SyncError::Config("missing field".into());
        assert_eq!(err.to_string(), "configuration error: missing field");
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = SyncError::from(io_err);
        assert!(matches!(err, SyncError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn unmapped_grade_display() {
        let err = SyncError::UnmappedGrade { grade: 14 };
        assert_eq!(
            err.to_string(),
            "grade level 14 has no organizational unit mapping"
        );
    }

    #[test]
    fn directory_api_display_includes_status_and_reason() {
        let err = SyncError::DirectoryApi {
            status: 403,
            message: "Not Authorized to access this resource/api".into(),
            reason: "forbidden".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("Reason: forbidden"));
    }

    #[test]
    fn lookup_ambiguity_display() {
        let err = SyncError::LookupAmbiguity {
            email: "12345@d118.org".into(),
            matches: 2,
        };
        assert_eq!(
            err.to_string(),
            "directory lookup for 12345@d118.org returned 2 accounts"
        );
    }

    #[test]
    fn source_query_names_school() {
        let err = SyncError::SourceQuery {
            school: 10,
            message: "no such table".into(),
        };
        assert!(err.to_string().contains("school 10"));
    }
}
