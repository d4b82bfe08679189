use crate::domain::window::DEFAULT_CHALLENGE_START;
use crate::infrastructure::error::InfraError;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const REMOTE_JSON: &str = "remote.json";
const DEFAULT_NAMESPACE: &str = "habitgrid-v1";
const DEFAULT_REMOTE_TABLE: &str = "tasks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub base_url: String,
    pub api_key: String,
    pub table: String,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "HabitGrid",
                "namespace": DEFAULT_NAMESPACE,
                "storage": "local",
                "challengeStart": DEFAULT_CHALLENGE_START
            }),
        ),
        (
            REMOTE_JSON,
            serde_json::json!({
                "schema": 1,
                "baseUrl": null,
                "apiKey": null,
                "table": DEFAULT_REMOTE_TABLE
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_storage_mode(config_dir: &Path) -> Result<StorageMode, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let mode = app
        .get("storage")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .unwrap_or("local");
    match mode {
        "local" => Ok(StorageMode::Local),
        "remote" => Ok(StorageMode::Remote),
        other => Err(InfraError::InvalidConfig(format!(
            "storage mode must be 'local' or 'remote', got '{other}'"
        ))),
    }
}

pub fn read_namespace(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let namespace = app
        .get("namespace")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE);
    Ok(namespace.to_string())
}

pub fn read_challenge_start(config_dir: &Path) -> Result<NaiveDate, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let raw = app
        .get("challengeStart")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_CHALLENGE_START);
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|error| {
        InfraError::InvalidConfig(format!("challengeStart must be YYYY-MM-DD: {error}"))
    })
}

pub fn read_remote_settings(config_dir: &Path) -> Result<RemoteSettings, InfraError> {
    let remote = read_config(&config_dir.join(REMOTE_JSON))?;
    let base_url = remote
        .get("baseUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            InfraError::InvalidConfig("remote storage requires baseUrl in remote.json".to_string())
        })?;
    let api_key = remote
        .get("apiKey")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            InfraError::InvalidConfig("remote storage requires apiKey in remote.json".to_string())
        })?;
    let table = remote
        .get("table")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_REMOTE_TABLE);

    Ok(RemoteSettings {
        base_url: base_url.to_string(),
        api_key: api_key.to_string(),
        table: table.to_string(),
    })
}
