//! Bearer token handling for Google Workspace.
//!
//! A simple token holder. Obtaining and refreshing the token happens outside
//! this crate; we read whatever the consent flow left in `token.json`.

use std::path::Path;

use serde::Deserialize;
use studentsync_core::error::{Result, SyncError};

#[derive(Deserialize)]
struct TokenFile {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Holds an OAuth2 bearer token for Google API requests.
#[derive(Clone)]
pub struct GoogleAuth {
    token: String,
}

impl GoogleAuth {
    /// Create a new auth instance with the given bearer token.
    pub fn new(token: String) -> Self {
        Self { token }
    }

    /// Read the bearer token from a stored credentials file.
    pub fn from_token_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: TokenFile = serde_json::from_str(&content).map_err(|e| {
            SyncError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        file.token
            .or(file.access_token)
            .filter(|t| !t.is_empty())
            .map(Self::new)
            .ok_or_else(|| {
                SyncError::Config(format!("{} contains no access token", path.display()))
            })
    }

    /// Returns the current bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleAuth").field("token", &"***").finish()
    }
}
