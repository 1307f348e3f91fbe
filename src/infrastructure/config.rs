use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::fs;
use std::path::Path;

const SERVER_JSON: &str = "server.json";

const CRON_SECRET_ENV: &str = "CRON_SECRET";
const VAPID_SUBJECT_ENV: &str = "VAPID_SUBJECT";
const VAPID_PRIVATE_KEY_ENV: &str = "VAPID_PRIVATE_KEY";

/// Non-secret server settings, read from config/server.json.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Canonical zone for interpreting task dates and "HH:MM" start times.
    pub timezone: Tz,
    pub host: String,
    pub port: u16,
    pub icon: String,
    pub push_ttl_seconds: u32,
}

/// Secrets come from the environment only; this crate never writes them to
/// disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secrets {
    pub cron_secret: String,
    pub vapid_subject: String,
    pub vapid_private_key: String,
}

fn default_server_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "timezone": "Europe/Oslo",
        "host": "127.0.0.1",
        "port": 8787,
        "icon": "/icon.png",
        "pushTtlSeconds": 3600
    })
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(SERVER_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_server_config())?;
        fs::write(path, format!("{formatted}\n"))?;
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

pub fn load_server_config(config_dir: &Path) -> Result<ServerConfig, InfraError> {
    let path = config_dir.join(SERVER_JSON);
    let parsed = read_config(&path)?;
    let defaults = default_server_config();

    let string_field = |name: &str| -> String {
        parsed
            .get(name)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or_else(|| defaults.get(name).and_then(serde_json::Value::as_str))
            .unwrap_or_default()
            .to_string()
    };

    let timezone_name = string_field("timezone");
    let timezone = timezone_name.parse::<Tz>().map_err(|_| {
        InfraError::InvalidConfig(format!(
            "unknown timezone '{}' in {}",
            timezone_name,
            path.display()
        ))
    })?;

    let port = parsed
        .get("port")
        .and_then(serde_json::Value::as_u64)
        .or_else(|| defaults.get("port").and_then(serde_json::Value::as_u64))
        .and_then(|value| u16::try_from(value).ok())
        .ok_or_else(|| {
            InfraError::InvalidConfig(format!("port out of range in {}", path.display()))
        })?;

    let push_ttl_seconds = parsed
        .get("pushTtlSeconds")
        .and_then(serde_json::Value::as_u64)
        .or_else(|| defaults.get("pushTtlSeconds").and_then(serde_json::Value::as_u64))
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            InfraError::InvalidConfig(format!("pushTtlSeconds out of range in {}", path.display()))
        })?;

    Ok(ServerConfig {
        timezone,
        host: string_field("host"),
        port,
        icon: string_field("icon"),
        push_ttl_seconds,
    })
}

fn required_env(name: &str) -> Result<String, InfraError> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| InfraError::InvalidConfig(format!("{name} must be set")))
}

pub fn load_secrets() -> Result<Secrets, InfraError> {
    Ok(Secrets {
        cron_secret: required_env(CRON_SECRET_ENV)?,
        vapid_subject: required_env(VAPID_SUBJECT_ENV)?,
        vapid_private_key: required_env(VAPID_PRIVATE_KEY_ENV)?,
    })
}
