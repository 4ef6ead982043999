use serde::{Deserialize, Serialize};

/// HTTP host configuration (`modules.api_ingress`)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiIngressConfig {
    /// "host:port"; when unset the server section's host and port are used.
    #[serde(default)]
    pub bind_addr: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    #[serde(default)]
    pub cors_enabled: bool,
}

impl Default for ApiIngressConfig {
    fn default() -> Self {
        Self {
            bind_addr: None,
            request_timeout_secs: default_request_timeout_secs(),
            body_limit_bytes: default_body_limit_bytes(),
            cors_enabled: false,
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_body_limit_bytes() -> usize {
    16 * 1024 * 1024
}
