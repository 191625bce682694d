use std::io;
use std::path::PathBuf;
use thermo_core::{ConfigError, ResolutionError};
use thermo_web::{MountError, RenderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("served page does not hydrate: {0}")]
    Mount(#[from] MountError),
    #[error("plugin `{plugin}` requires `{requires}` to be registered first")]
    PluginOrder {
        plugin: &'static str,
        requires: &'static str,
    },
    #[error("manifest defines no connections")]
    NoConnections,
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server on {addr} failed: {source}")]
    Serve {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("listener task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}
