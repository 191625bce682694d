use crate::error::CliError;
use crate::manifest;
use crate::plugins::{ServerBuilder, register_all};
use axum::Router;
use thermo_core::Config;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. `RUST_LOG` wins over the manifest level.
pub fn init_tracing(manifest: &Config) -> Result<(), CliError> {
    let fallback = manifest::log_level(manifest)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
    Ok(())
}

/// Reports the resolved criteria. Call after [`init_tracing`]; events
/// emitted before it have no subscriber and are dropped.
pub fn log_startup(settings: &Config, manifest: &Config) -> Result<(), CliError> {
    let connections = manifest::connections(manifest)?;
    tracing::info!(
        criteria = ?settings.criteria(),
        connections = connections.len(),
        "settings resolved"
    );
    Ok(())
}

pub fn build_router(settings: &Config, manifest: &Config) -> Result<Router, CliError> {
    let mut builder = ServerBuilder::new(settings.clone());
    register_all(&mut builder, manifest)?;
    Ok(builder.into_router())
}

/// Binds every manifest connection and serves `app` on all of them until
/// one fails or the process receives Ctrl-C.
pub async fn serve(app: Router, manifest: &Config) -> Result<(), CliError> {
    let connections = manifest::connections(manifest)?;
    if connections.is_empty() {
        return Err(CliError::NoConnections);
    }

    let mut listeners = Vec::with_capacity(connections.len());
    for connection in &connections {
        let addr = connection.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| CliError::Bind {
                addr: addr.clone(),
                source,
            })?;
        tracing::info!(%addr, labels = ?connection.labels, "listening");
        listeners.push((addr, listener));
    }

    let mut tasks = JoinSet::new();
    for (addr, listener) in listeners {
        let app = app.clone();
        tasks.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(|source| CliError::Serve { addr, source })
        });
    }

    while let Some(joined) = tasks.join_next().await {
        joined??;
    }
    tracing::info!("all listeners stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
