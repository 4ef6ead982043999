use serde::{Deserialize, Serialize};

/// Configuration for the users_info module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsersInfoConfig {
    /// Backing JSON document; relative paths resolve against server.home_dir.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    #[serde(default = "default_max_display_name_length")]
    pub max_display_name_length: usize,
}

impl Default for UsersInfoConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            max_display_name_length: default_max_display_name_length(),
        }
    }
}

fn default_storage_path() -> String {
    "users.json".to_string()
}

fn default_max_display_name_length() -> usize {
    100
}
