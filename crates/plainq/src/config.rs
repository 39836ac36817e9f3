use crate::error::{DbError, DbResult};
use crate::mapping::mapping_check_override;
use serde::Deserialize;

/// Environment variable enabling mapping checks by default.
pub const MAPPING_CHECK_ENV: &str = "PLAINQ_MAPPING_CHECK";
/// Environment variable enabling underscore-insensitive column matching.
pub const MATCH_UNDERSCORES_ENV: &str = "PLAINQ_MATCH_UNDERSCORES";

/// Configuration for [`Db`](crate::Db).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Bind `first_name` columns to `FirstName` fields (underscores and case ignored).
    pub match_names_with_underscores: bool,
    /// Run mapping checks when no call-scoped setting is active.
    pub mapping_check: bool,
}

impl DbConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read defaults from `PLAINQ_MAPPING_CHECK` / `PLAINQ_MATCH_UNDERSCORES`.
    ///
    /// Unset variables keep their defaults; unparseable values are an error.
    pub fn from_env() -> DbResult<Self> {
        let mut config = Self::default();
        if let Some(v) = env_flag(MAPPING_CHECK_ENV)? {
            config.mapping_check = v;
        }
        if let Some(v) = env_flag(MATCH_UNDERSCORES_ENV)? {
            config.match_names_with_underscores = v;
        }
        Ok(config)
    }

    /// Set underscore-insensitive column matching.
    pub fn match_names_with_underscores(mut self, enabled: bool) -> Self {
        self.match_names_with_underscores = enabled;
        self
    }

    /// Set the default mapping-check mode.
    pub fn mapping_check(mut self, enabled: bool) -> Self {
        self.mapping_check = enabled;
        self
    }

    /// Whether mapping checks run for the current call.
    pub fn mapping_check_enabled(&self) -> bool {
        mapping_check_override().unwrap_or(self.mapping_check)
    }
}

fn env_flag(name: &str) -> DbResult<Option<bool>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    parse_flag(&raw)
        .map(Some)
        .ok_or_else(|| DbError::validation(format!("{name}: expected a boolean, got '{raw}'")))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
