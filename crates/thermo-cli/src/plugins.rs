use crate::error::CliError;
use crate::manifest;
use crate::settings::AssetSettings;
use axum::Router;
use axum::extract::Path as AxumPath;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::Value;
use std::path::{Component, Path};
use std::sync::Arc;
use thermo_core::{Config, ENVIRONMENT};
use thermo_web::{
    AssetService, AxumThermoAdapter, BaseUriAssets, Document, DocumentReady, MountError,
    PageSettings, RenderPipeline, ThermostatProps, hydrate_thermostat, thermostat,
};

pub type PluginInit = fn(&mut ServerBuilder, &Value) -> Result<(), CliError>;

/// Plugins in registration order. Each one may rely on the ones before it.
pub const PLUGINS: &[(&str, PluginInit)] = &[
    ("assets", init_assets),
    ("renderer", init_renderer),
    ("thermo", init_thermo),
];

/// State shared by plugins while the server is assembled.
pub struct ServerBuilder {
    settings: Config,
    router: Router,
    assets: Option<Arc<dyn AssetService>>,
    pipeline: Option<Arc<RenderPipeline>>,
    registered: Vec<&'static str>,
}

impl ServerBuilder {
    pub fn new(settings: Config) -> Self {
        Self {
            settings,
            router: Router::new(),
            assets: None,
            pipeline: None,
            registered: Vec::new(),
        }
    }

    pub fn registered(&self) -> &[&'static str] {
        &self.registered
    }

    pub fn pipeline(&self) -> Option<&Arc<RenderPipeline>> {
        self.pipeline.as_ref()
    }

    fn route(&mut self, add: impl FnOnce(Router) -> Router) {
        self.router = add(std::mem::take(&mut self.router));
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Initialises every plugin the manifest lists, in [`PLUGINS`] order.
pub fn register_all(builder: &mut ServerBuilder, manifest: &Config) -> Result<(), CliError> {
    let listed = manifest::plugins(manifest)?;
    for name in listed.keys() {
        if !PLUGINS.iter().any(|(known, _)| *known == name.as_str()) {
            tracing::warn!(plugin = %name, "manifest lists an unknown plugin");
        }
    }

    for (name, init) in PLUGINS {
        let Some(options) = listed.get(*name) else {
            tracing::debug!(plugin = *name, "plugin not in manifest, skipping");
            continue;
        };
        init(builder, options)?;
        builder.registered.push(*name);
        tracing::info!(plugin = *name, "plugin registered");
    }
    Ok(())
}

fn init_assets(builder: &mut ServerBuilder, _options: &Value) -> Result<(), CliError> {
    let settings: AssetSettings = builder.settings.get_as("/assets")?;
    let assets = BaseUriAssets::new(settings.base_uri);

    if assets.base().starts_with('/') {
        let route = format!("{}{{*path}}", assets.base());
        let directory = Arc::new(settings.directory);
        tracing::debug!(%route, directory = %directory.display(), "serving static assets");
        builder.route(|router| {
            router.route(
                &route,
                get(move |AxumPath(path): AxumPath<String>| {
                    let directory = Arc::clone(&directory);
                    async move { serve_asset(&directory, &path).await }
                }),
            )
        });
    } else {
        tracing::debug!(base = assets.base(), "assets are served externally");
    }

    builder.assets = Some(Arc::new(assets));
    Ok(())
}

fn init_renderer(builder: &mut ServerBuilder, _options: &Value) -> Result<(), CliError> {
    let assets = builder.assets.clone().ok_or(CliError::PluginOrder {
        plugin: "renderer",
        requires: "assets",
    })?;
    let page: PageSettings = builder.settings.get_as("/page")?;
    builder.pipeline = Some(Arc::new(RenderPipeline::new(assets, page)));
    Ok(())
}

/// Registers the page route; `options.path` overrides `/`.
fn init_thermo(builder: &mut ServerBuilder, options: &Value) -> Result<(), CliError> {
    let pipeline = builder.pipeline.clone().ok_or(CliError::PluginOrder {
        plugin: "thermo",
        requires: "renderer",
    })?;
    let props: ThermostatProps = builder.settings.get_as("/thermostat")?;
    // Props that cannot render fail startup instead of every request.
    check_hydration(&pipeline, &props)?;

    let path = options
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or("/")
        .to_string();
    let adapter = AxumThermoAdapter::new(pipeline)
        .with_props(props)
        .with_environment_header(builder.settings.criteria().get(ENVIRONMENT).cloned());

    builder.route(|router| {
        router.route(
            &path,
            get(move || {
                let adapter = adapter.clone();
                async move { adapter.render_page() }
            }),
        )
    });
    Ok(())
}

/// Mounts the client over the page the route will serve. Mismatches are
/// logged by `mount`; broken markup or props abort startup.
fn check_hydration(pipeline: &RenderPipeline, props: &ThermostatProps) -> Result<(), CliError> {
    let html = pipeline.render_document(thermostat, props)?;
    let mut document = Document::parse(&html).map_err(MountError::from)?;
    let ready = DocumentReady::new();
    ready.fire();
    let mounted = hydrate_thermostat(&mut document, &ready)?;
    tracing::debug!(
        mismatches = mounted.mismatches().len(),
        "served page hydrates"
    );
    Ok(())
}

async fn serve_asset(root: &Path, raw_path: &str) -> Response {
    let rel = Path::new(raw_path.trim_start_matches('/'));
    if !rel
        .components()
        .all(|part| matches!(part, Component::Normal(_) | Component::CurDir))
    {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    }

    let file = root.join(rel);
    let is_file = tokio::fs::metadata(&file)
        .await
        .is_ok_and(|meta| meta.is_file());
    if rel.as_os_str().is_empty() || !is_file {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    match tokio::fs::read(&file).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, asset_content_type(rel))], bytes).into_response(),
        Err(err) => {
            tracing::error!(path = %file.display(), error = %err, "failed to read asset");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

/// Content types for what the page links: styles, its script, icons, fonts.
fn asset_content_type(rel: &Path) -> &'static str {
    let ext = rel.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "ico" => "image/vnd.microsoft.icon",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
