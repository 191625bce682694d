//! Server manifest.
//!
//! Built once at startup from the settings and stored as its own
//! criteria-filtered tree, so the server section varies with the environment
//! the same way the settings do.

use crate::error::CliError;
use crate::settings::WebConnection;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thermo_core::{Config, ConfigError, ConfigStore, ENVIRONMENT};

/// Log level used when the active environment carries no debug settings.
pub const DEFAULT_LOG_LEVEL: &str = "debug";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Connection {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Connection {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

pub fn build(settings: &Config) -> Result<Config, CliError> {
    let web: WebConnection = settings.get_as("/connections/web")?;

    let tree = json!({
        "$meta": "Defines the settings of the web server",
        "server": {
            "$filter": ENVIRONMENT,
            "development": {},
            "$default": {
                "debug": {
                    "log": ["error"],
                    "request": ["error"]
                }
            }
        },
        "connections": [
            {
                "address": web.ip_address,
                "port": web.port,
                "labels": [web.label]
            }
        ],
        "plugins": {
            "assets": null,
            "renderer": null,
            "thermo": null
        }
    });

    Ok(settings.derive(ConfigStore::build(tree)?))
}

pub fn connections(manifest: &Config) -> Result<Vec<Connection>, CliError> {
    match manifest.get("/connections")? {
        Some(value) => serde_json::from_value(value).map_err(|source| {
            CliError::from(ConfigError::Decode {
                path: "/connections".to_string(),
                source,
            })
        }),
        None => Ok(Vec::new()),
    }
}

/// Plugins listed in the manifest with their options (`Null` when none).
pub fn plugins(manifest: &Config) -> Result<Map<String, Value>, CliError> {
    Ok(match manifest.get("/plugins")? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    })
}

/// Filter directive for the subscriber: the first `/server/debug/log` entry.
pub fn log_level(manifest: &Config) -> Result<String, CliError> {
    Ok(manifest
        .get("/server/debug/log/0")?
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings;

    fn manifest(env: &str) -> Config {
        build(&settings::load(None, Some(env)).unwrap()).unwrap()
    }

    #[test]
    fn test_manifest_connection_lookup() {
        let manifest = manifest("production");
        assert_eq!(manifest.get("/connections/0/port").unwrap(), Some(json!(8080)));
        assert_eq!(
            manifest.get("/connections/0/labels/0").unwrap(),
            Some(json!("web"))
        );
        assert_eq!(
            manifest.get("/connections/0/address").unwrap(),
            Some(json!("0.0.0.0"))
        );
        assert_eq!(manifest.get("/connections/1").unwrap(), None);

        assert_eq!(
            connections(&manifest).unwrap(),
            vec![Connection {
                address: "0.0.0.0".to_string(),
                port: 8080,
                labels: vec!["web".to_string()],
            }]
        );
    }

    #[test]
    fn test_manifest_shares_settings_criteria() {
        let manifest = manifest("development");
        assert_eq!(manifest.criteria()[ENVIRONMENT], "development");
        assert_eq!(connections(&manifest).unwrap()[0].bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_server_section_is_filtered() {
        assert_eq!(manifest("development").get("/server").unwrap(), Some(json!({})));
        assert_eq!(log_level(&manifest("development")).unwrap(), "debug");

        let prod = manifest("production");
        assert_eq!(
            prod.get("/server/debug/request").unwrap(),
            Some(json!(["error"]))
        );
        assert_eq!(log_level(&prod).unwrap(), "error");
    }

    #[test]
    fn test_manifest_meta_and_plugins() {
        let manifest = manifest("test");
        assert_eq!(
            manifest.meta("/").unwrap().as_deref(),
            Some("Defines the settings of the web server")
        );

        let plugins = plugins(&manifest).unwrap();
        assert_eq!(
            plugins.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["assets", "renderer", "thermo"]
        );
        assert!(plugins.values().all(Value::is_null));
    }
}
