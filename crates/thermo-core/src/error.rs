use crate::criteria::Criteria;
use thiserror::Error;

/// A configuration path could not be resolved against the criteria snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error(
        "cannot resolve {path}: no branch of `$filter: {filter}` matches {} and no `$default` is defined (criteria: {})",
        display_value(.value),
        display_criteria(.criteria)
    )]
    NoMatchingBranch {
        path: String,
        filter: String,
        value: Option<String>,
        criteria: Criteria,
    },
    #[error("invalid configuration path `{path}`: paths must start with '/'")]
    InvalidPath { path: String },
}

impl ResolutionError {
    pub fn path(&self) -> &str {
        match self {
            Self::NoMatchingBranch { path, .. } | Self::InvalidPath { path } => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration at {path}: {reason}")]
    Invalid { path: String, reason: String },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("missing configuration value at {0}")]
    Missing(String),
    #[error("configuration value at {path} has an unexpected shape: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(path: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            },
            reason: reason.into(),
        }
    }
}

fn display_value(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("`{v}`"),
        None => "an absent criteria value".to_string(),
    }
}

fn display_criteria(criteria: &Criteria) -> String {
    let pairs = criteria
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>();
    format!("{{{}}}", pairs.join(", "))
}
