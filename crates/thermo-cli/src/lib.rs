//! `thermo` command line: loads the settings tree, builds the server manifest
//! and either serves the thermostat page or answers a one-off query.

pub mod error;
pub mod manifest;
pub mod plugins;
pub mod server;
pub mod settings;

pub use error::CliError;

use clap::{Parser, Subcommand};
use crate::settings::AssetSettings;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use thermo_core::Config;
use thermo_web::{BaseUriAssets, PageSettings, RenderPipeline, ThermostatProps, thermostat};

#[derive(Debug, Parser)]
#[command(name = "thermo", version, about = "Configuration-driven thermostat page server")]
pub struct Cli {
    /// Settings file replacing the built-in settings.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Environment to resolve settings for. Defaults to $THERMO_ENV, then production.
    #[arg(long, global = true, value_name = "NAME")]
    pub env: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the thermostat page on every configured connection.
    Serve,
    /// Print the resolved value at PATH as JSON.
    Get {
        path: String,
        /// Query the server manifest instead of the settings.
        #[arg(long)]
        manifest: bool,
    },
    /// Print the documentation attached to PATH.
    Meta {
        path: String,
        #[arg(long)]
        manifest: bool,
    },
    /// Print the rendered page document.
    Render,
}

pub async fn run_from_env() -> Result<(), CliError> {
    run(Cli::parse()).await
}

pub async fn run_from_args<I, T>(args: I) -> Result<(), CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    run(Cli::parse_from(args)).await
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = settings::load(cli.config.as_deref(), cli.env.as_deref())?;
    let manifest = manifest::build(&settings)?;
    server::init_tracing(&manifest)?;
    server::log_startup(&settings, &manifest)?;

    match cli.command {
        Command::Serve => {
            let app = server::build_router(&settings, &manifest)?;
            server::serve(app, &manifest).await
        }
        Command::Get { path, manifest: m } => {
            let value = query(&settings, &manifest, m).get(&path)?;
            match value {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("undefined"),
            }
            Ok(())
        }
        Command::Meta { path, manifest: m } => {
            if let Some(meta) = query(&settings, &manifest, m).meta(&path)? {
                println!("{meta}");
            }
            Ok(())
        }
        Command::Render => {
            println!("{}", render_document(&settings)?);
            Ok(())
        }
    }
}

fn query<'a>(settings: &'a Config, manifest: &'a Config, use_manifest: bool) -> &'a Config {
    if use_manifest { manifest } else { settings }
}

/// The page `GET /` serves, rendered without starting a server.
pub fn render_document(settings: &Config) -> Result<String, CliError> {
    let assets: AssetSettings = settings.get_as("/assets")?;
    let page: PageSettings = settings.get_as("/page")?;
    let props: ThermostatProps = settings.get_as("/thermostat")?;
    let pipeline = RenderPipeline::new(Arc::new(BaseUriAssets::new(assets.base_uri)), page);
    Ok(pipeline.render_document(thermostat, &props)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["thermo", "get", "/page/title", "--env", "development"]);
        assert_eq!(cli.env.as_deref(), Some("development"));
        assert!(matches!(
            cli.command,
            Command::Get { ref path, manifest: false } if path == "/page/title"
        ));

        let cli = Cli::parse_from(["thermo", "--config", "a.json", "meta", "--manifest", "/"]);
        assert_eq!(cli.config, Some(PathBuf::from("a.json")));
        assert!(matches!(cli.command, Command::Meta { manifest: true, .. }));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["thermo", "explode"]).is_err());
        assert!(Cli::try_parse_from(["thermo"]).is_err());
    }

    #[test]
    fn test_render_document_uses_settings() {
        let settings = settings::load(None, Some("development")).unwrap();
        let html = render_document(&settings).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>APKM Thermostat</title>"));
        assert!(html.contains("href=\"/assets/media/favicon/favicon.ico\""));
        assert!(html.contains("<link href=\"/assets/style/screen.css\" rel=\"stylesheet\" media=\"screen\"/>"));
        assert!(html.contains("Thermostat (development)"));
        assert!(html.contains(
            "<script src=\"/assets/script/thermostat.js\" defer=\"defer\"></script>"
        ));
    }

    #[tokio::test]
    async fn test_run_get_and_meta_commands() {
        run_from_args(["thermo", "--env", "production", "get", "/connections/web/port"])
            .await
            .unwrap();
        run_from_args(["thermo", "--env", "production", "meta", "--manifest", "/"])
            .await
            .unwrap();
        assert!(matches!(
            run_from_args(["thermo", "get", "no-slash"]).await,
            Err(CliError::Resolution(_))
        ));
    }
}
