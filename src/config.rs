//! Layered settings: built-in defaults, an optional file, then
//! `PASSPORT__*` environment variables.

use std::path::Path;

use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::roles::{Role, UserRegistry};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserEntry {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DemoSettings {
    pub vin: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            vin: "TEST-LIFECYCLE-001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Maximum `tracing` level: trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Users to register at startup. Empty means the built-in roster.
    #[serde(default)]
    pub users: Vec<UserEntry>,
    #[serde(default)]
    pub demo: DemoSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            users: Vec::new(),
            demo: DemoSettings::default(),
        }
    }
}

impl Settings {
    pub const ENV_PREFIX: &'static str = "PASSPORT";

    /// Load settings. A missing file is not an error when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(p) => builder.add_source(File::from(p)),
            None => builder.add_source(File::with_name("passport").required(false)),
        };
        builder
            .add_source(Environment::with_prefix(Self::ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// The configured roster, or the built-in one when none is configured.
    pub fn roster(&self) -> Vec<(String, Role)> {
        if self.users.is_empty() {
            return UserRegistry::default_roster();
        }
        self.users
            .iter()
            .map(|u| (u.user_id.clone(), u.role))
            .collect()
    }

    pub fn registry(&self) -> UserRegistry {
        UserRegistry::with_roster(self.roster())
    }
}
