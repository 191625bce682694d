use crate::components::{ThermostatProps, thermostat};
use crate::pipeline::RenderPipeline;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use std::sync::Arc;

pub type PropsResolver = Arc<dyn Fn() -> ThermostatProps + Send + Sync + 'static>;

/// Serves the thermostat page from a shared [`RenderPipeline`].
#[derive(Clone)]
pub struct AxumThermoAdapter {
    pipeline: Arc<RenderPipeline>,
    props: PropsResolver,
    environment: Option<String>,
}

impl AxumThermoAdapter {
    pub fn new(pipeline: Arc<RenderPipeline>) -> Self {
        Self {
            pipeline,
            props: Arc::new(ThermostatProps::default),
            environment: None,
        }
    }

    pub fn with_props(self, props: ThermostatProps) -> Self {
        self.with_props_resolver(move || props.clone())
    }

    pub fn with_props_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn() -> ThermostatProps + Send + Sync + 'static,
    {
        self.props = Arc::new(resolver);
        self
    }

    /// Adds an `x-thermo-environment` header naming the active environment.
    pub fn with_environment_header(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn render_page(&self) -> Response {
        let props = (self.props)();
        let html = match self.pipeline.render_document(thermostat, &props) {
            Ok(html) => html,
            Err(err) => {
                tracing::error!(error = %err, "thermostat page failed to render");
                return (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
                    .into_response();
            }
        };

        let mut response = Html(html).into_response();
        if let Some(env) = self.environment.as_deref() {
            if let Ok(v) = HeaderValue::from_str(env) {
                response.headers_mut().insert("x-thermo-environment", v);
            }
        }
        response
    }
}

impl std::fmt::Debug for AxumThermoAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxumThermoAdapter")
            .field("pipeline", &self.pipeline)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::MOUNT_ID;
    use crate::pipeline::{BaseUriAssets, PageSettings};
    use axum::body::to_bytes;
    use axum::http::header::CONTENT_TYPE;

    fn adapter() -> AxumThermoAdapter {
        let pipeline = RenderPipeline::new(
            Arc::new(BaseUriAssets::new("/assets/")),
            PageSettings {
                title: "APKM Thermostat".to_string(),
                favicon: "media/favicon/favicon.ico".to_string(),
                stylesheets: vec!["style/screen.css".to_string()],
                scripts: Vec::new(),
                mount_id: MOUNT_ID.to_string(),
            },
        );
        AxumThermoAdapter::new(Arc::new(pipeline))
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_render_page_returns_document() {
        let response = adapter()
            .with_props(ThermostatProps {
                title: "Office".to_string(),
                ..ThermostatProps::default()
            })
            .with_environment_header(Some("development".to_string()))
            .render_page();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        assert_eq!(response.headers()["x-thermo-environment"], "development");

        let body = body_text(response).await;
        assert!(body.starts_with("<!DOCTYPE html>"));
        assert!(body.contains("<title>APKM Thermostat</title>"));
        assert!(body.contains("<h1 class=\"thermostat__title\">Office</h1>"));
    }

    #[tokio::test]
    async fn test_render_failure_hides_details() {
        let response = adapter()
            .with_props(ThermostatProps {
                target: 500,
                ..ThermostatProps::default()
            })
            .render_page();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("x-thermo-environment").is_none());
        assert_eq!(body_text(response).await, "internal server error");
    }

    #[test]
    fn test_props_resolver_runs_per_request() {
        use std::sync::atomic::{AtomicI32, Ordering};

        let counter = Arc::new(AtomicI32::new(60));
        let seen = counter.clone();
        let adapter = adapter().with_props_resolver(move || ThermostatProps {
            target: seen.fetch_add(1, Ordering::SeqCst),
            ..ThermostatProps::default()
        });

        assert_eq!(adapter.render_page().status(), StatusCode::OK);
        assert_eq!(adapter.render_page().status(), StatusCode::OK);
        assert_eq!(counter.load(Ordering::SeqCst), 62);
    }
}
