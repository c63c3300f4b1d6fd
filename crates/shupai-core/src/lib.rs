//! Shupai Core Library
//!
//! Platform-agnostic core of the Shupai vertical text editor: the glyph
//! layout engine, the scene of text and image elements with their
//! connectors, undoable editing commands, and persistence for projects and
//! reusable assets.

pub mod commands;
pub mod config;
pub mod connector;
pub mod document;
pub mod elements;
pub mod error;
pub mod layout;
pub mod scene;
pub mod snapshot;
pub mod storage;
pub mod undo;

pub use commands::SceneCommand;
pub use config::SceneConfig;
pub use connector::{ConnectionType, Connector, ConnectorId, ConnectorKind};
pub use document::SceneDocument;
pub use elements::{
    AnchorKind, AnchorRef, Element, ElementId, ElementKind, ImageElement, SerializableColor,
    TextElement,
};
pub use error::{SceneError, SceneResult};
pub use layout::{FontMetrics, LayoutParams, ScaledMetrics, TextLayout, layout};
pub use scene::{Drawable, ExportOptions, InteractionMode, Scene, TreeNode, ViewOptions};
pub use snapshot::{ElementData, GroupSnapshot};
pub use storage::{AssetStore, ProjectSerializer, StorageError, StorageResult};
pub use undo::{Command, UndoEngine};
