//! Client-side mounting.
//!
//! The server sends the rendered component inside the mount container plus
//! the props it rendered with. Once the host reports the document ready, the
//! client reads those props back, renders the same component and takes over
//! the container. Any structural difference between the server markup and the
//! client render is a hydration mismatch: it is logged and reported on the
//! mount handle, and the client render wins.

use crate::components::{Component, MOUNT_ID, ThermostatAction, ThermostatProps, thermostat};
use crate::dom::{Document, DomElement, DomNode, from_node};
use crate::error::MountError;
use crate::pipeline::{props_script_id, render_node};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether the host document has finished loading.
pub trait ReadySignal {
    fn is_ready(&self) -> bool;
}

/// Ready flag flipped once by the host when the document has loaded.
#[derive(Debug, Default)]
pub struct DocumentReady {
    ready: AtomicBool,
}

impl DocumentReady {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

impl ReadySignal for DocumentReady {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchKind {
    NodeKind {
        expected: &'static str,
        found: &'static str,
    },
    Tag {
        expected: String,
        found: String,
    },
    Attributes {
        expected: Vec<(String, String)>,
        found: Vec<(String, String)>,
    },
    ChildCount {
        expected: usize,
        found: usize,
    },
    Text {
        expected: String,
        found: String,
    },
}

/// One difference between server markup and the client render. `path` locates
/// the node below the mount target, e.g. `#thermostat/0:section/1:div`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationMismatch {
    pub path: String,
    pub kind: MismatchKind,
}

impl fmt::Display for HydrationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MismatchKind::NodeKind { expected, found } => {
                write!(f, "{}: expected {expected} node, found {found}", self.path)
            }
            MismatchKind::Tag { expected, found } => {
                write!(f, "{}: expected <{expected}>, found <{found}>", self.path)
            }
            MismatchKind::Attributes { expected, found } => write!(
                f,
                "{}: attributes differ, expected {expected:?}, found {found:?}",
                self.path
            ),
            MismatchKind::ChildCount { expected, found } => write!(
                f,
                "{}: expected {expected} children, found {found}",
                self.path
            ),
            MismatchKind::Text { expected, found } => {
                write!(f, "{}: expected text {expected:?}, found {found:?}", self.path)
            }
        }
    }
}

/// Differences between the client render (`expected`) and the markup already
/// in the container (`found`). Empty when hydration is clean.
pub fn hydration_mismatches(
    expected: &[DomNode],
    found: &[DomNode],
    root: &str,
) -> Vec<HydrationMismatch> {
    let mut out = Vec::new();
    compare_children(expected, found, root, &mut out);
    out
}

fn compare_children(
    expected: &[DomNode],
    found: &[DomNode],
    path: &str,
    out: &mut Vec<HydrationMismatch>,
) {
    if expected.len() != found.len() {
        out.push(HydrationMismatch {
            path: path.to_string(),
            kind: MismatchKind::ChildCount {
                expected: expected.len(),
                found: found.len(),
            },
        });
    }
    for (index, (want, have)) in expected.iter().zip(found).enumerate() {
        let child_path = match want {
            DomNode::Element(el) => format!("{path}/{index}:{}", el.tag),
            DomNode::Text(_) => format!("{path}/{index}"),
        };
        compare_node(want, have, &child_path, out);
    }
}

fn compare_node(
    expected: &DomNode,
    found: &DomNode,
    path: &str,
    out: &mut Vec<HydrationMismatch>,
) {
    let mut push = |kind| {
        out.push(HydrationMismatch {
            path: path.to_string(),
            kind,
        })
    };
    match (expected, found) {
        (DomNode::Text(want), DomNode::Text(have)) => {
            if want != have {
                push(MismatchKind::Text {
                    expected: want.clone(),
                    found: have.clone(),
                });
            }
        }
        (DomNode::Element(want), DomNode::Element(have)) => {
            if want.tag != have.tag {
                push(MismatchKind::Tag {
                    expected: want.tag.clone(),
                    found: have.tag.clone(),
                });
                return;
            }
            if want.attrs != have.attrs {
                push(MismatchKind::Attributes {
                    expected: want.attrs.clone(),
                    found: have.attrs.clone(),
                });
            }
            compare_children(&want.children, &have.children, path, out);
        }
        (want, have) => push(MismatchKind::NodeKind {
            expected: kind_name(want),
            found: kind_name(have),
        }),
    }
}

fn kind_name(node: &DomNode) -> &'static str {
    match node {
        DomNode::Element(_) => "element",
        DomNode::Text(_) => "text",
    }
}

/// Handle to a component mounted into a document.
#[derive(Debug)]
pub struct Mounted<P> {
    component: Component<P>,
    props: P,
    target_id: String,
    mismatches: Vec<HydrationMismatch>,
}

/// Renders `component(props)` into the element with id `target_id`, replacing
/// whatever the server put there. Fails with `NotReady` until `ready` fires.
pub fn mount<P>(
    document: &mut Document,
    ready: &dyn ReadySignal,
    component: Component<P>,
    props: P,
    target_id: &str,
) -> Result<Mounted<P>, MountError> {
    if !ready.is_ready() {
        return Err(MountError::NotReady);
    }

    let fresh = from_node(&render_node(component, &props)?)?;
    let target = target(document, target_id)?;

    let mismatches = hydration_mismatches(&fresh, &target.children, &format!("#{target_id}"));
    for mismatch in &mismatches {
        tracing::warn!(target_id, %mismatch, "hydration mismatch");
    }
    target.children = fresh;
    tracing::debug!(target_id, mismatches = mismatches.len(), "component mounted");

    Ok(Mounted {
        component,
        props,
        target_id: target_id.to_string(),
        mismatches,
    })
}

fn target<'a>(document: &'a mut Document, id: &str) -> Result<&'a mut DomElement, MountError> {
    document
        .element_by_id_mut(id)
        .ok_or_else(|| MountError::TargetMissing(id.to_string()))
}

impl<P> Mounted<P> {
    pub fn props(&self) -> &P {
        &self.props
    }

    /// Mismatches found when the component took over the server markup.
    pub fn mismatches(&self) -> &[HydrationMismatch] {
        &self.mismatches
    }

    pub fn hydrated_cleanly(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Re-renders with new props. On error the document and the current
    /// props are left untouched.
    pub fn update(&mut self, document: &mut Document, props: P) -> Result<(), MountError> {
        let fresh = from_node(&render_node(self.component, &props)?)?;
        target(document, &self.target_id)?.children = fresh;
        self.props = props;
        Ok(())
    }
}

impl Mounted<ThermostatProps> {
    pub fn dispatch(
        &mut self,
        document: &mut Document,
        action: ThermostatAction,
    ) -> Result<(), MountError> {
        let next = self.props.apply(action);
        tracing::debug!(?action, target = next.target, mode = next.mode.as_str(), "thermostat action");
        self.update(document, next)
    }
}

/// Props the server embedded for the component mounted at `mount_id`.
pub fn bootstrap_props<P: DeserializeOwned>(
    document: &Document,
    mount_id: &str,
) -> Result<P, MountError> {
    let id = props_script_id(mount_id);
    let script = document
        .element_by_id(&id)
        .ok_or(MountError::MissingProps(id))?;
    serde_json::from_str(&script.text_content()).map_err(MountError::Props)
}

/// Client entry point for the thermostat page.
pub fn hydrate_thermostat(
    document: &mut Document,
    ready: &dyn ReadySignal,
) -> Result<Mounted<ThermostatProps>, MountError> {
    let props = bootstrap_props(document, MOUNT_ID)?;
    mount(document, ready, thermostat, props, MOUNT_ID)
}
