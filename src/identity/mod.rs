//! Client identity resolution from request headers

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier used when no trusted header carries a client address
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Identity resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Headers checked in priority order; the first non-empty one wins
    #[serde(default = "default_trusted_headers")]
    pub trusted_headers: Vec<String>,
}

fn default_trusted_headers() -> Vec<String> {
    vec![
        "cf-connecting-ip".to_string(),
        "x-forwarded-for".to_string(),
        "x-real-ip".to_string(),
    ]
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            trusted_headers: default_trusted_headers(),
        }
    }
}

impl IdentityConfig {
    /// Resolve a stable client identifier from request headers
    ///
    /// Forwarded chains contribute their first (client-most) entry.
    pub fn client_id(&self, headers: &HeaderMap) -> String {
        for name in &self.trusted_headers {
            let value = headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());

            if let Some(client) = value {
                debug!(header = %name, client, "Resolved client identity");
                return client.to_string();
            }
        }

        UNKNOWN_CLIENT.to_string()
    }
}
