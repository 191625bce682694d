use crate::criteria::{Criteria, CriteriaResolver};
use crate::error::{ConfigError, ResolutionError};
use crate::store::ConfigStore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Read handle over a store and the criteria snapshot it is resolved with.
/// Built once at startup and cloned into every consumer.
#[derive(Debug, Clone)]
pub struct Config {
    store: Arc<ConfigStore>,
    criteria: Arc<Criteria>,
}

impl Config {
    pub fn new(store: ConfigStore, criteria: Arc<Criteria>) -> Self {
        Self {
            store: Arc::new(store),
            criteria,
        }
    }

    pub fn from_resolver(store: ConfigStore, resolver: &CriteriaResolver) -> Self {
        Self::new(store, resolver.snapshot())
    }

    /// Another tree resolved with the same criteria snapshot.
    pub fn derive(&self, store: ConfigStore) -> Self {
        Self::new(store, Arc::clone(&self.criteria))
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn get(&self, path: &str) -> Result<Option<Value>, ResolutionError> {
        self.store.resolve(path, &self.criteria)
    }

    pub fn meta(&self, path: &str) -> Result<Option<String>, ResolutionError> {
        self.store.resolve_meta(path, &self.criteria)
    }

    pub fn require(&self, path: &str) -> Result<Value, ConfigError> {
        self.get(path)?
            .ok_or_else(|| ConfigError::Missing(path.to_string()))
    }

    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let value = self.require(path)?;
        serde_json::from_value(value).map_err(|source| ConfigError::Decode {
            path: path.to_string(),
            source,
        })
    }
}
