use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Which schools a run covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchoolScope {
    /// Every school in the enrollment system (`full`).
    All,
    /// Only schools included in state reporting (`limited`).
    ReportingOnly,
    /// One school by number.
    School(i64),
}

impl FromStr for SchoolScope {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::All),
            "limited" => Ok(Self::ReportingOnly),
            other => other.parse::<i64>().map(Self::School).map_err(|_| {
                SyncError::Config(format!(
                    "unknown run mode '{s}': expected 'full', 'limited', or a school number"
                ))
            }),
        }
    }
}

impl fmt::Display for SchoolScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("full"),
            Self::ReportingOnly => f.write_str("limited"),
            Self::School(number) => write!(f, "{number}"),
        }
    }
}
