//! Thermostat page rendering shared by the server and the client.
//!
//! Components are plain functions from props to a [`Node`] tree. The server
//! turns the tree into markup with [`render_static`] and wraps it into a full
//! document through a [`RenderPipeline`]; the client reads the embedded props
//! back and mounts the same component with [`client::mount`].

#[cfg(feature = "axum")]
pub mod adapters;
pub mod client;
pub mod components;
pub mod dom;
mod error;
pub mod node;
pub mod pipeline;

#[cfg(feature = "axum")]
pub use adapters::axum::{AxumThermoAdapter, PropsResolver};
pub use client::{
    DocumentReady, HydrationMismatch, MismatchKind, Mounted, ReadySignal, bootstrap_props,
    hydrate_thermostat, mount,
};
pub use components::{
    Component, MOUNT_ID, Mode, PageProps, TemperatureUnit, ThermostatAction, ThermostatProps,
    page, thermostat,
};
pub use dom::Document;
pub use error::{DomError, MountError, RenderError};
pub use node::{Element, Node, el, escape_html, render_to_string};
pub use pipeline::{
    AssetService, BaseUriAssets, PageSettings, RenderPipeline, props_script_id, render_static,
};
