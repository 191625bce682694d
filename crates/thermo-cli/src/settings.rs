//! Settings tree loading.
//!
//! The built-in tree is compiled into the binary; `--config` swaps in a file
//! read once at startup. Either way the result is an immutable [`Config`]
//! resolved with a single criteria snapshot.

use crate::error::CliError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thermo_core::{Config, ConfigStore, CriteriaResolver, process_criteria};

pub const DEFAULT_SETTINGS: &str = include_str!("../config/settings.json");

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebConnection {
    pub ip_address: String,
    pub port: u16,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSettings {
    pub base_uri: String,
    pub directory: PathBuf,
}

pub fn load(path: Option<&Path>, environment: Option<&str>) -> Result<Config, CliError> {
    let store = match path {
        Some(path) => {
            let source = fs::read_to_string(path).map_err(|source| CliError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            ConfigStore::from_json(&source)?
        }
        None => ConfigStore::from_json(DEFAULT_SETTINGS)?,
    };

    Ok(match environment {
        Some(name) => Config::from_resolver(store, &CriteriaResolver::with_environment(name)),
        None => Config::from_resolver(store, process_criteria()),
    })
}
