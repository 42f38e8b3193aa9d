//! The closed set of cleaning tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// An independent cleaning feature that submits tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    /// Finds leftovers of uninstalled apps.
    CorpseFinder,
    /// Filters system-wide junk (logs, temp files, crash dumps).
    SystemCleaner,
    /// Clears caches of installed apps.
    AppCleaner,
}

impl ToolType {
    pub const ALL: [ToolType; 3] = [
        ToolType::CorpseFinder,
        ToolType::SystemCleaner,
        ToolType::AppCleaner,
    ];

    /// Wire name of the tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CorpseFinder => "corpse_finder",
            Self::SystemCleaner => "system_cleaner",
            Self::AppCleaner => "app_cleaner",
        }
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "tool",
                value: s.trim().to_string(),
            })
    }
}
