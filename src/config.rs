//! Connection settings for a Datastore project or a local emulator.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::DatastorersError;

pub const DEFAULT_ENDPOINT: &str = "https://datastore.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub project_id: String,
    /// Overrides the service endpoint (scheme and host, no trailing path).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// `host:port` of a Datastore emulator; requests go there over plain HTTP.
    #[serde(default)]
    pub emulator_host: Option<String>,
    /// OAuth2 bearer token. Never read from config files.
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ConnectionConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        ConnectionConfig {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Builds the configuration from the environment, loading `.env` first if present.
    ///
    /// - `DATASTORE_PROJECT_ID` (or `GOOGLE_CLOUD_PROJECT`): required
    /// - `DATASTORE_ENDPOINT`, `DATASTORE_EMULATOR_HOST`, `DATASTORE_ACCESS_TOKEN`: optional
    /// - `DATASTORE_TIMEOUT_SECS`: optional, whole seconds
    pub fn from_env() -> Result<Self, DatastorersError> {
        dotenvy::dotenv().ok();

        let project_id =
            env_var("DATASTORE_PROJECT_ID").or_else(|| env_var("GOOGLE_CLOUD_PROJECT"));
        let project_id = match project_id {
            Some(p) => p,
            None => {
                error!("Neither DATASTORE_PROJECT_ID nor GOOGLE_CLOUD_PROJECT is set");
                return Err(DatastorersError::Config(
                    "DATASTORE_PROJECT_ID (or GOOGLE_CLOUD_PROJECT) must be set".to_string(),
                ));
            }
        };

        let timeout_secs = match env_var("DATASTORE_TIMEOUT_SECS") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|e| {
                error!(error = ?e, raw = %raw, "DATASTORE_TIMEOUT_SECS must be a whole number");
                DatastorersError::Config(format!(
                    "DATASTORE_TIMEOUT_SECS must be a whole number: {e}"
                ))
            })?),
            None => None,
        };

        let config = ConnectionConfig {
            project_id,
            endpoint: env_var("DATASTORE_ENDPOINT"),
            emulator_host: env_var("DATASTORE_EMULATOR_HOST"),
            access_token: env_var("DATASTORE_ACCESS_TOKEN"),
            timeout_secs,
        };
        config.trace_loaded();
        Ok(config)
    }

    /// Explicit endpoint, else the emulator over HTTP, else the public service.
    pub fn resolved_endpoint(&self) -> String {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.trim_end_matches('/').to_string();
        }
        if let Some(host) = &self.emulator_host {
            return format!("http://{}", host.trim_end_matches('/'));
        }
        DEFAULT_ENDPOINT.to_string()
    }

    pub fn uses_emulator(&self) -> bool {
        self.endpoint.is_none() && self.emulator_host.is_some()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn trace_loaded(&self) {
        info!(
            project_id = %self.project_id,
            endpoint = %self.resolved_endpoint(),
            emulator = self.uses_emulator(),
            access_token_set = self.access_token.is_some(),
            "Loaded datastore connection config"
        );
        debug!(
            timeout_secs = self.timeout().as_secs(),
            "Datastore request timeout"
        );
    }
}

pub(crate) fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
