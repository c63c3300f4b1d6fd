//! Scene-level errors.

use crate::elements::ElementId;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by scene operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("Connector not found: {0}")]
    ConnectorNotFound(Uuid),

    #[error("Cannot parent {child} under {parent}: it would create a cycle")]
    CyclicParent { child: ElementId, parent: ElementId },

    #[error("Cannot connect an element to itself")]
    SelfConnection,

    #[error("Elements are already connected")]
    AlreadyConnected,

    #[error("Incompatible connection: {0}")]
    Incompatible(String),

    #[error("Clipboard is empty")]
    EmptyClipboard,

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Scene consistency violated: {0}")]
    Consistency(String),
}

impl SceneError {
    /// Whether this error is a rejected intent (as opposed to a resource
    /// failure or an internal inconsistency).
    pub fn is_validation(&self) -> bool {
        !matches!(self, SceneError::Resource(_) | SceneError::Consistency(_))
    }
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;
