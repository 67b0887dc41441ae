use crate::config::{env_var, ConnectionConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

#[derive(Deserialize)]
struct StaticConfig {
    #[serde(default)]
    connection: ConnectionSection,
}

#[derive(Deserialize, Default)]
struct ConnectionSection {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    emulator_host: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Loads a static YAML config file (no secrets) and fills the rest from the
/// environment. The access token only ever comes from `DATASTORE_ACCESS_TOKEN`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConnectionConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {path_ref:?}: {e}"));
        }
    };

    let static_conf: StaticConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    merge_with_env(static_conf.connection)
}

/// Builds the connection config from the environment alone.
pub fn load_from_env() -> Result<ConnectionConfig> {
    merge_with_env(ConnectionSection::default())
}

fn merge_with_env(file: ConnectionSection) -> Result<ConnectionConfig> {
    let project_id = match file
        .project_id
        .filter(|p| !p.trim().is_empty())
        .or_else(|| env_var("DATASTORE_PROJECT_ID"))
        .or_else(|| env_var("GOOGLE_CLOUD_PROJECT"))
    {
        Some(project_id) => project_id,
        None => {
            error!("No project id in config file, DATASTORE_PROJECT_ID or GOOGLE_CLOUD_PROJECT");
            anyhow::bail!("project_id must be set in the config file or via DATASTORE_PROJECT_ID");
        }
    };

    let timeout_secs = match file.timeout_secs {
        Some(secs) => Some(secs),
        None => env_var("DATASTORE_TIMEOUT_SECS")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .context("DATASTORE_TIMEOUT_SECS must be a whole number")?,
    };

    let access_token = env_var("DATASTORE_ACCESS_TOKEN");
    if access_token.is_some() {
        info!("DATASTORE_ACCESS_TOKEN found in env");
    }

    let config = ConnectionConfig {
        project_id,
        endpoint: file.endpoint.or_else(|| env_var("DATASTORE_ENDPOINT")),
        emulator_host: file
            .emulator_host
            .or_else(|| env_var("DATASTORE_EMULATOR_HOST")),
        access_token,
        timeout_secs,
    };
    config.trace_loaded();
    Ok(config)
}
