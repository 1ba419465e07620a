//! Loader configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the built-in definitions directory
pub const ENV_DEFINITIONS_PATH: &str = "CAPMAP_DEFINITIONS_PATH";

/// Environment variable naming the user mappings directory
pub const ENV_USER_MAPPINGS_PATH: &str = "CAPMAP_USER_MAPPINGS_PATH";

/// Environment variable toggling strict category resolution
pub const ENV_STRICT_CATEGORIES: &str = "CAPMAP_STRICT_CATEGORIES";

/// Where mapping files come from and how strictly they are resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Built-in definitions directory; the embedded definitions are used when unset
    #[serde(default)]
    pub definitions_dir: Option<PathBuf>,

    /// User mappings directory, searched recursively
    #[serde(default)]
    pub user_mappings_dir: Option<PathBuf>,

    /// Reject unknown category names instead of falling back to GENERIC
    #[serde(default = "default_strict")]
    pub strict_categories: bool,
}

fn default_strict() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            definitions_dir: None,
            user_mappings_dir: None,
            strict_categories: default_strict(),
        }
    }
}

impl LoaderConfig {
    /// Configuration from `CAPMAP_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        };
        let strict_categories = match lookup(ENV_STRICT_CATEGORIES) {
            Some(v) => !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ),
            None => default_strict(),
        };
        Self {
            definitions_dir: path(ENV_DEFINITIONS_PATH),
            user_mappings_dir: path(ENV_USER_MAPPINGS_PATH),
            strict_categories,
        }
    }

    pub fn with_definitions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.definitions_dir = Some(dir.into());
        self
    }

    pub fn with_user_mappings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_mappings_dir = Some(dir.into());
        self
    }

    pub fn with_strict_categories(mut self, strict: bool) -> Self {
        self.strict_categories = strict;
        self
    }
}
