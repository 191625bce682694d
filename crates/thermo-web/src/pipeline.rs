use crate::components::{Component, MOUNT_ID, PageProps, page};
use crate::error::RenderError;
use crate::node::{Node, el, render_to_string};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Maps relative asset paths to URIs the browser can fetch.
pub trait AssetService: Send + Sync {
    fn build_uri(&self, relative_path: &str) -> String;
}

/// Serves every asset under one base URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUriAssets {
    base: String,
}

impl BaseUriAssets {
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl AssetService for BaseUriAssets {
    fn build_uri(&self, relative_path: &str) -> String {
        if relative_path.starts_with("http://")
            || relative_path.starts_with("https://")
            || relative_path.starts_with("//")
        {
            return relative_path.to_string();
        }
        format!("{}{}", self.base, relative_path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSettings {
    pub title: String,
    pub favicon: String,
    #[serde(default)]
    pub stylesheets: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default = "default_mount_id")]
    pub mount_id: String,
}

fn default_mount_id() -> String {
    MOUNT_ID.to_string()
}

/// Id of the JSON script element carrying the props for `mount_id`.
pub fn props_script_id(mount_id: &str) -> String {
    format!("{mount_id}-props")
}

/// Renders `component(props)` to markup. Deterministic and free of shared
/// state; a panicking component is reported as `RenderError::Panicked`.
pub fn render_static<P>(component: Component<P>, props: &P) -> Result<String, RenderError> {
    render_node(component, props).map(|node| render_to_string(&node))
}

pub(crate) fn render_node<P>(component: Component<P>, props: &P) -> Result<Node, RenderError> {
    panic::catch_unwind(AssertUnwindSafe(|| component(props))).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        RenderError::Panicked { message }
    })?
}

pub struct RenderPipeline {
    assets: Arc<dyn AssetService>,
    settings: PageSettings,
}

impl RenderPipeline {
    pub fn new(assets: Arc<dyn AssetService>, settings: PageSettings) -> Self {
        Self { assets, settings }
    }

    pub fn mount_id(&self) -> &str {
        &self.settings.mount_id
    }

    pub fn stylesheet_uris(&self) -> Vec<String> {
        self.settings
            .stylesheets
            .iter()
            .map(|path| self.assets.build_uri(path))
            .collect()
    }

    /// Complete HTML document around trusted `markup`, one stylesheet link
    /// per entry of `asset_uris` in order.
    pub fn wrap_page(&self, markup: &str, asset_uris: &[String]) -> String {
        let props = PageProps {
            title: self.settings.title.clone(),
            favicon_uri: self.assets.build_uri(&self.settings.favicon),
            stylesheets: asset_uris.to_vec(),
        };
        let mut html = String::from("<!DOCTYPE html>");
        html.push_str(&render_to_string(&page(&props, Node::raw(markup))));
        html
    }

    /// Body markup: the mount container holding the server render, the props
    /// the client hydrates with, and the client scripts.
    pub fn render_body<P: Serialize>(
        &self,
        component: Component<P>,
        props: &P,
    ) -> Result<String, RenderError> {
        let content = render_static(component, props)?;
        let mount_id = self.mount_id();

        // `</` would end the script element early.
        let props_json = serde_json::to_string(props)?.replace("</", "<\\/");

        let mut body = render_to_string(
            &el("div")
                .attr("id", mount_id)
                .child(Node::raw(content))
                .into(),
        );
        body.push_str(&render_to_string(
            &el("script")
                .attr("type", "application/json")
                .attr("id", props_script_id(mount_id))
                .child(Node::raw(props_json))
                .into(),
        ));
        for script in &self.settings.scripts {
            body.push_str(&render_to_string(
                &el("script")
                    .attr("src", self.assets.build_uri(script))
                    .flag("defer", true)
                    .into(),
            ));
        }
        Ok(body)
    }

    pub fn render_document<P: Serialize>(
        &self,
        component: Component<P>,
        props: &P,
    ) -> Result<String, RenderError> {
        let body = self.render_body(component, props)?;
        Ok(self.wrap_page(&body, &self.stylesheet_uris()))
    }
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ThermostatProps, thermostat};
    use std::thread;

    fn pipeline() -> RenderPipeline {
        RenderPipeline::new(
            Arc::new(BaseUriAssets::new("/assets")),
            PageSettings {
                title: "APKM Thermostat".to_string(),
                favicon: "media/favicon/favicon.ico".to_string(),
                stylesheets: vec!["/style/screen.css".to_string()],
                scripts: vec!["script/main.js".to_string()],
                mount_id: MOUNT_ID.to_string(),
            },
        )
    }

    #[test]
    fn test_asset_uris_join_base() {
        let assets = BaseUriAssets::new("https://cdn.example.com/static");
        assert_eq!(
            assets.build_uri("/style/screen.css"),
            "https://cdn.example.com/static/style/screen.css"
        );
        assert_eq!(
            assets.build_uri("media/a.png"),
            "https://cdn.example.com/static/media/a.png"
        );
        assert_eq!(assets.build_uri("//fonts/x.css"), "//fonts/x.css");
    }

    #[test]
    fn test_render_static_is_deterministic() {
        let props = ThermostatProps::default();
        let first = render_static(thermostat, &props).unwrap();
        let second = render_static(thermostat, &props).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_static_is_reentrant_across_threads() {
        let expected = render_static(thermostat, &ThermostatProps::default()).unwrap();
        let outputs = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    let props = ThermostatProps {
                        target: 60 + i,
                        ..ThermostatProps::default()
                    };
                    let own = render_static(thermostat, &props).unwrap();
                    let shared = render_static(thermostat, &ThermostatProps::default()).unwrap();
                    (i, own, shared)
                })
            })
            .collect::<Vec<_>>();

        for handle in outputs {
            let (i, own, shared) = handle.join().unwrap();
            assert!(own.contains(&format!("aria-valuenow=\"{}\"", 60 + i)));
            assert_eq!(shared, expected);
        }
    }

    #[test]
    fn test_render_static_contains_panics() {
        fn exploding(_: &()) -> Result<Node, RenderError> {
            panic!("component blew up")
        }

        match render_static(exploding, &()) {
            Err(RenderError::Panicked { message }) => assert_eq!(message, "component blew up"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_wrap_page_keeps_stylesheet_order() {
        let html = pipeline().wrap_page("<p>x</p>", &["a.css".to_string(), "b.css".to_string()]);

        assert!(html.starts_with("<!DOCTYPE html><html lang=\"en\"><head>"));
        assert_eq!(html.matches("rel=\"stylesheet\"").count(), 2);
        let a = html.find("href=\"a.css\"").unwrap();
        let b = html.find("href=\"b.css\"").unwrap();
        assert!(a < b);
        assert_eq!(html.matches("<title>").count(), 1);
        assert_eq!(html.matches("rel=\"icon\"").count(), 1);
        assert_eq!(html.matches("name=\"viewport\"").count(), 1);
        assert!(html.contains("href=\"/assets/media/favicon/favicon.ico\""));
        assert!(html.contains("<body><p>x</p></body>"));
    }

    #[test]
    fn test_render_document_embeds_mount_props_and_scripts() {
        let html = pipeline()
            .render_document(thermostat, &ThermostatProps::default())
            .unwrap();

        assert!(html.contains("<body><div id=\"thermostat\"><section class=\"thermostat"));
        assert!(html.contains("<script type=\"application/json\" id=\"thermostat-props\">{"));
        assert!(html.contains("<script src=\"/assets/script/main.js\" defer=\"defer\"></script>"));
        assert!(html.contains("<link href=\"/assets/style/screen.css\" rel=\"stylesheet\" media=\"screen\"/>"));
    }

    #[test]
    fn test_props_json_cannot_close_script() {
        let props = ThermostatProps {
            title: "</script><script>alert(1)</script>".to_string(),
            ..ThermostatProps::default()
        };
        let body = pipeline().render_body(thermostat, &props).unwrap();
        assert_eq!(body.matches("</script>").count(), 2);
    }

    #[test]
    fn test_invalid_props_surface_as_render_error() {
        let props = ThermostatProps {
            target: 10,
            ..ThermostatProps::default()
        };
        assert!(matches!(
            pipeline().render_document(thermostat, &props),
            Err(RenderError::InvalidProps { .. })
        ));
    }
}
