use thiserror::Error;

/// Failure while producing markup or DOM from a component.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{component} cannot render these props: {reason}")]
    InvalidProps {
        component: &'static str,
        reason: String,
    },
    #[error("component panicked while rendering: {message}")]
    Panicked { message: String },
    #[error("failed to serialize props: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed markup at byte {offset}: {reason}")]
pub struct DomError {
    pub offset: usize,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum MountError {
    #[error("document is not ready; mount must wait for the ready signal")]
    NotReady,
    #[error("mount target #{0} does not exist")]
    TargetMissing(String),
    #[error("bootstrap props #{0} are missing from the document")]
    MissingProps(String),
    #[error("bootstrap props are not valid: {0}")]
    Props(#[source] serde_json::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Markup(#[from] DomError),
}
