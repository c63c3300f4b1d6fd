//! The scene: single mutation entry point for the editor.
//!
//! A [`Scene`] wraps the [`SceneDocument`] with selection, the interaction
//! mode, the clipboard and the undo history. Structural edits are turned
//! into [`SceneCommand`]s and pushed through the history; non-structural
//! edits (moves, text and image properties) mutate in place and refresh the
//! affected connectors before returning.

use crate::commands::SceneCommand;
use crate::config::SceneConfig;
use crate::connector::{Connector, ConnectorId, ConnectorKind};
use crate::document::SceneDocument;
use crate::elements::{
    AnchorRef, Element, ElementId, ElementKind, ImageElement, SerializableColor, TextElement,
};
use crate::error::{SceneError, SceneResult};
use crate::layout::{FontMetrics, ScaledMetrics};
use crate::snapshot::{GroupSnapshot, ImageData};
use crate::storage::assets::{GroupAsset, ImageAsset, TextAsset};
use crate::undo::UndoEngine;
use kurbo::{Affine, BezPath, Line, Point, Rect, Size, Vec2};
use peniko::Color;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What the next click means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Idle,
    /// The next clicked element becomes the parent of `source`.
    ReparentPending { source: ElementId },
    /// The next clicked element gets a content connector from `source`.
    ContentLinkPending { source: ElementId },
    /// The next clicked anchor gets a content connector from `source`.
    AnchorLinkPending { source: AnchorRef },
}

/// Global visibility toggles for the editor view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub show_grid: bool,
    pub show_hierarchy_connectors: bool,
    pub show_content_connectors: bool,
    pub show_anchors: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            show_grid: true,
            show_hierarchy_connectors: true,
            show_content_connectors: true,
            show_anchors: true,
        }
    }
}

/// Visibility used when producing drawables.
///
/// The default is the export setting: content only, no editing aids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub show_grid: bool,
    pub show_hierarchy_connectors: bool,
    pub show_content_connectors: bool,
    pub show_anchors: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            show_grid: false,
            show_hierarchy_connectors: false,
            show_content_connectors: true,
            show_anchors: false,
        }
    }
}

impl From<ViewOptions> for ExportOptions {
    fn from(view: ViewOptions) -> Self {
        Self {
            show_grid: view.show_grid,
            show_hierarchy_connectors: view.show_hierarchy_connectors,
            show_content_connectors: view.show_content_connectors,
            show_anchors: view.show_anchors,
        }
    }
}

/// A paintable item in scene coordinates.
#[derive(Debug, Clone)]
pub enum Drawable {
    GridLine(Line),
    Connector {
        id: ConnectorId,
        kind: ConnectorKind,
        path: BezPath,
        line_width: f64,
    },
    Glyph {
        element: ElementId,
        ch: char,
        font_family: String,
        font_size: f64,
        color: Color,
        /// Maps the glyph cell (top-left at the origin) into the scene.
        transform: Affine,
        size: Size,
    },
    Image {
        element: ElementId,
        source: PathBuf,
        rect: Rect,
    },
    Anchor {
        anchor: AnchorRef,
        center: Point,
    },
}

/// Outline node for hierarchy views.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: ElementId,
    pub label: String,
    pub children: Vec<TreeNode>,
}

/// The editor scene.
#[derive(Debug)]
pub struct Scene {
    document: SceneDocument,
    history: UndoEngine<SceneCommand>,
    selection: Vec<ElementId>,
    mode: InteractionMode,
    clipboard: Option<GroupSnapshot>,
    view: ViewOptions,
    canvas_size: Size,
    config: SceneConfig,
    metrics: Box<dyn FontMetrics>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene with the default config and heuristic metrics.
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default(), Box::new(ScaledMetrics::default()))
    }

    pub fn with_config(config: SceneConfig, metrics: Box<dyn FontMetrics>) -> Self {
        let mut document = SceneDocument::new();
        document.hierarchy_line_width = config.hierarchy_line_width;
        Self::from_document(document, config, metrics)
    }

    /// Wrap an existing document. The history starts empty.
    pub(crate) fn from_document(
        document: SceneDocument,
        config: SceneConfig,
        metrics: Box<dyn FontMetrics>,
    ) -> Self {
        Self {
            document,
            history: UndoEngine::new(config.undo_cap),
            selection: Vec::new(),
            mode: InteractionMode::Idle,
            clipboard: None,
            view: ViewOptions::default(),
            canvas_size: config.canvas_size,
            config,
            metrics,
        }
    }

    pub fn document(&self) -> &SceneDocument {
        &self.document
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn metrics(&self) -> &dyn FontMetrics {
        self.metrics.as_ref()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.document.get(id)
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn view(&self) -> ViewOptions {
        self.view
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    pub fn set_canvas_size(&mut self, width: f64, height: f64) {
        self.canvas_size = Size::new(width.max(0.0), height.max(0.0));
    }

    // --- Command plumbing ----------------------------------------------

    fn execute(&mut self, command: SceneCommand) -> SceneResult<()> {
        let name = command.name();
        match self.history.push(command, &mut self.document) {
            Ok(()) => {
                log::debug!("Applied {name}");
                self.after_change()
            }
            Err(err) => {
                report(name, &err);
                Err(err)
            }
        }
    }

    /// Drop references to elements that no longer exist and verify the
    /// document.
    fn after_change(&mut self) -> SceneResult<()> {
        self.selection.retain(|id| self.document.contains(*id));
        let armed = match self.mode {
            InteractionMode::Idle => None,
            InteractionMode::ReparentPending { source }
            | InteractionMode::ContentLinkPending { source } => Some(source),
            InteractionMode::AnchorLinkPending { source } => Some(source.element),
        };
        if armed.is_some_and(|id| !self.document.contains(id)) {
            self.mode = InteractionMode::Idle;
        }
        self.verify()
    }

    fn verify(&self) -> SceneResult<()> {
        if let Err(err) = self.document.check_consistency() {
            log::error!("{err}");
            debug_assert!(false, "{err}");
            return Err(err);
        }
        Ok(())
    }

    pub fn undo(&mut self) -> SceneResult<bool> {
        let undone = self.history.undo(&mut self.document).inspect_err(|e| report("undo", e))?;
        if undone {
            self.after_change()?;
        }
        Ok(undone)
    }

    pub fn redo(&mut self) -> SceneResult<bool> {
        let redone = self.history.redo(&mut self.document).inspect_err(|e| report("redo", e))?;
        if redone {
            self.after_change()?;
        }
        Ok(redone)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Elements ------------------------------------------------------

    /// Create a text element with the configured default parameters.
    pub fn create_text_element(&mut self, text: Option<&str>, position: Point) -> SceneResult<ElementId> {
        let content = text.unwrap_or(&self.config.placeholder_text).to_string();
        let element = TextElement::new(content, self.config.text.clone(), self.metrics.as_ref())
            .at(position);
        self.add_element(element)
    }

    /// Create an image element, reading the source size from the file.
    pub fn create_image_element(&mut self, path: impl AsRef<Path>, position: Point) -> SceneResult<ElementId> {
        let image = ImageElement::open(path, self.config.image_width).inspect_err(|e| report("create image", e))?;
        self.add_element(image.at(position))
    }

    /// Add a prebuilt element as a root.
    pub fn add_element(&mut self, element: impl Into<Element>) -> SceneResult<ElementId> {
        let mut element = element.into();
        element.set_parent_link(None);
        element.set_anchor_visible(self.view.show_anchors);
        let id = element.id();
        self.execute(SceneCommand::add_element(element))?;
        Ok(id)
    }

    /// Delete an element with its subtree and incident connectors.
    pub fn delete_element(&mut self, id: ElementId) -> SceneResult<()> {
        self.execute(SceneCommand::delete_element(id))
    }

    /// Delete every selected element as one undo step.
    ///
    /// Returns the number of top-level deletions.
    pub fn delete_selection(&mut self) -> SceneResult<usize> {
        let selected: HashSet<ElementId> = self.selection.iter().copied().collect();
        // Elements under a selected ancestor go with that ancestor.
        let tops: Vec<ElementId> = self
            .selection
            .iter()
            .copied()
            .filter(|&id| {
                !selected
                    .iter()
                    .any(|&other| other != id && self.document.is_descendant(id, other))
            })
            .collect();
        if tops.is_empty() {
            return Ok(0);
        }
        let count = tops.len();
        let commands = tops.into_iter().map(SceneCommand::delete_element).collect();
        self.execute(SceneCommand::batch(commands))?;
        Ok(count)
    }

    /// Set or clear the parent of `id`, keeping its scene position.
    pub fn set_parent(&mut self, id: ElementId, parent: Option<ElementId>) -> SceneResult<()> {
        let current = self
            .document
            .get(id)
            .ok_or(SceneError::ElementNotFound(id))?
            .parent();
        if current == parent {
            log::debug!("Parent of {id} unchanged");
            return Ok(());
        }
        self.execute(SceneCommand::reparent(id, parent))
    }

    /// Move an element to a new local position.
    pub fn move_element(&mut self, id: ElementId, position: Point) -> SceneResult<()> {
        self.document
            .get_mut(id)
            .ok_or(SceneError::ElementNotFound(id))?
            .set_position(position);
        self.document.refresh_connectors_for(id);
        Ok(())
    }

    pub fn move_by(&mut self, id: ElementId, delta: Vec2) -> SceneResult<()> {
        let position = self
            .document
            .get(id)
            .ok_or(SceneError::ElementNotFound(id))?
            .position();
        self.move_element(id, position + delta)
    }

    /// Move so the element lands at `target` in scene coordinates.
    fn move_to_scene(&mut self, id: ElementId, target: Point) -> SceneResult<()> {
        let parent_origin = match self.document.get(id).and_then(Element::parent) {
            Some(parent) => self
                .document
                .scene_position(parent)
                .ok_or(SceneError::ElementNotFound(parent))?,
            None => Point::ZERO,
        };
        self.move_element(id, target - parent_origin.to_vec2())
    }

    fn edit_text(
        &mut self,
        id: ElementId,
        edit: impl FnOnce(&mut TextElement, &dyn FontMetrics),
    ) -> SceneResult<()> {
        let metrics = self.metrics.as_ref();
        let element = self.document.get_mut(id).ok_or(SceneError::ElementNotFound(id))?;
        let text = element
            .as_text_mut()
            .ok_or_else(|| SceneError::Incompatible(format!("{id} is not a text element")))?;
        edit(text, metrics);
        self.document.refresh_connectors_for(id);
        Ok(())
    }

    fn edit_image(
        &mut self,
        id: ElementId,
        edit: impl FnOnce(&mut ImageElement) -> SceneResult<()>,
    ) -> SceneResult<()> {
        let element = self.document.get_mut(id).ok_or(SceneError::ElementNotFound(id))?;
        let image = element
            .as_image_mut()
            .ok_or_else(|| SceneError::Incompatible(format!("{id} is not an image element")))?;
        edit(image)?;
        self.document.refresh_connectors_for(id);
        Ok(())
    }

    pub fn set_text(&mut self, id: ElementId, content: &str) -> SceneResult<()> {
        self.edit_text(id, |t, m| t.set_text(content, m))
    }

    pub fn set_font(&mut self, id: ElementId, family: &str, size: f64) -> SceneResult<()> {
        self.edit_text(id, |t, m| t.set_font(family, size, m))
    }

    pub fn set_font_size(&mut self, id: ElementId, size: f64) -> SceneResult<()> {
        self.edit_text(id, |t, m| t.set_font_size(size, m))
    }

    pub fn set_color(&mut self, id: ElementId, color: SerializableColor) -> SceneResult<()> {
        self.edit_text(id, |t, _| t.set_color(color))
    }

    pub fn set_chars_per_column(&mut self, id: ElementId, chars: usize) -> SceneResult<()> {
        self.edit_text(id, |t, m| t.set_chars_per_column(chars, m))
    }

    pub fn set_column_spacing(&mut self, id: ElementId, spacing: f64) -> SceneResult<()> {
        self.edit_text(id, |t, m| t.set_column_spacing(spacing, m))
    }

    pub fn set_box_height(&mut self, id: ElementId, height: f64) -> SceneResult<()> {
        self.edit_text(id, |t, m| t.set_box_height(height, m))
    }

    pub fn set_auto_height(&mut self, id: ElementId, enabled: bool) -> SceneResult<()> {
        self.edit_text(id, |t, m| t.set_auto_height(enabled, m))
    }

    pub fn set_manual_line_break(&mut self, id: ElementId, enabled: bool) -> SceneResult<()> {
        self.edit_text(id, |t, m| t.set_manual_line_break(enabled, m))
    }

    pub fn set_image_width(&mut self, id: ElementId, width: f64) -> SceneResult<()> {
        self.edit_image(id, |i| {
            i.set_target_width(width);
            Ok(())
        })
    }

    /// Point an image at a new file, reading its size.
    pub fn set_image_source(&mut self, id: ElementId, path: impl AsRef<Path>) -> SceneResult<()> {
        self.edit_image(id, |i| i.set_source_file(path))
    }

    /// Topmost element whose bounds contain `point`.
    pub fn hit_test(&self, point: Point) -> Option<ElementId> {
        self.document
            .paint_order()
            .into_iter()
            .rev()
            .find(|&id| {
                self.document
                    .scene_bounds(id)
                    .is_some_and(|r| r.contains(point))
            })
    }

    // --- Content connectors --------------------------------------------

    fn content_connector(&self, a: ElementId, b: ElementId) -> SceneResult<Connector> {
        let kind_a = self.document.get(a).ok_or(SceneError::ElementNotFound(a))?.kind();
        let kind_b = self.document.get(b).ok_or(SceneError::ElementNotFound(b))?.kind();
        if a == b {
            return Err(SceneError::SelfConnection);
        }
        if self.document.find_content_connector(a, b).is_some() {
            return Err(SceneError::AlreadyConnected);
        }
        Ok(Connector::new(ConnectorKind::between(kind_a, kind_b), a, b)
            .with_line_width(self.config.content_line_width))
    }

    /// Connect two elements. The kind follows from their element kinds.
    pub fn add_content_connector(&mut self, a: ElementId, b: ElementId) -> SceneResult<ConnectorId> {
        let connector = self.content_connector(a, b).inspect_err(|e| report("connect", e))?;
        let id = connector.id();
        self.execute(SceneCommand::add_connector(connector))?;
        Ok(id)
    }

    pub fn remove_content_connector(&mut self, id: ConnectorId) -> SceneResult<()> {
        self.remove_content_connectors(&[id]).map(|_| ())
    }

    /// Remove several connectors as one undo step.
    pub fn remove_content_connectors(&mut self, ids: &[ConnectorId]) -> SceneResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.execute(SceneCommand::remove_connectors(ids.to_vec()))?;
        Ok(ids.len())
    }

    /// Remove every content connector touching `id`.
    pub fn remove_content_connectors_of(&mut self, id: ElementId) -> SceneResult<usize> {
        if !self.document.contains(id) {
            return Err(SceneError::ElementNotFound(id));
        }
        let ids = self.document.content_connectors_of(id);
        self.remove_content_connectors(&ids)
    }

    pub fn remove_all_content_connectors(&mut self) -> SceneResult<usize> {
        let ids: Vec<ConnectorId> = self
            .document
            .content_connectors()
            .iter()
            .map(Connector::id)
            .collect();
        let removed = self.remove_content_connectors(&ids)?;
        log::info!("Removed {removed} content connectors");
        Ok(removed)
    }

    /// Push one batch for `pairs`, skipping pairs that are already joined.
    fn connect_pairs(&mut self, pairs: Vec<(ElementId, ElementId)>) -> SceneResult<usize> {
        let mut connectors: Vec<Connector> = Vec::new();
        for (a, b) in pairs {
            if a == b || connectors.iter().any(|c| c.joins(a, b)) {
                continue;
            }
            match self.content_connector(a, b) {
                Ok(connector) => connectors.push(connector),
                Err(SceneError::AlreadyConnected) => continue,
                Err(err) => return Err(err),
            }
        }
        let count = connectors.len();
        if count > 0 {
            let commands = connectors.into_iter().map(SceneCommand::add_connector).collect();
            self.execute(SceneCommand::batch(commands))?;
        }
        Ok(count)
    }

    /// Chain the selection with content connectors, in selection order.
    ///
    /// A selected image and its selected direct text child act as one
    /// group: links arrive at the image and leave from the text.
    pub fn smart_connect_selection(&mut self) -> SceneResult<usize> {
        let selected = self.selection.clone();
        let mut partner_of = std::collections::HashMap::new();
        let mut paired_texts = HashSet::new();
        for &id in &selected {
            if !self.document.get(id).is_some_and(Element::is_image) {
                continue;
            }
            let child = selected.iter().copied().find(|&t| {
                !paired_texts.contains(&t)
                    && self
                        .document
                        .get(t)
                        .is_some_and(|e| e.is_text() && e.parent() == Some(id))
            });
            if let Some(text) = child {
                paired_texts.insert(text);
                partner_of.insert(id, text);
            }
        }

        let groups: Vec<(ElementId, ElementId)> = selected
            .iter()
            .copied()
            .filter(|id| !paired_texts.contains(id))
            .map(|id| (id, partner_of.get(&id).copied().unwrap_or(id)))
            .collect();

        if groups.len() < 2 {
            log::info!("Smart connect needs at least two groups, got {}", groups.len());
            return Ok(0);
        }
        let pairs = groups.windows(2).map(|w| (w[0].1, w[1].0)).collect();
        let made = self.connect_pairs(pairs)?;
        log::info!("Smart connect created {made} connectors");
        Ok(made)
    }

    /// Link vertically adjacent image/text pairs of the selection.
    pub fn connect_by_position(&mut self) -> SceneResult<usize> {
        let mut items: Vec<(ElementId, ElementKind, f64)> = self
            .selection
            .iter()
            .filter_map(|&id| {
                let kind = self.document.get(id)?.kind();
                Some((id, kind, self.document.scene_position(id)?.y))
            })
            .collect();
        if items.len() < 2 {
            return Ok(0);
        }
        items.sort_by(|a, b| a.2.total_cmp(&b.2));

        let pairs = items
            .windows(2)
            .filter(|w| w[0].1 != w[1].1 && (w[1].2 - w[0].2).abs() < self.config.link_distance)
            .map(|w| match w[0].1 {
                ElementKind::Image => (w[0].0, w[1].0),
                ElementKind::Text => (w[1].0, w[0].0),
            })
            .collect();
        let made = self.connect_pairs(pairs)?;
        log::info!("Position connect created {made} connectors");
        Ok(made)
    }

    fn selected_of(&self, kind: ElementKind) -> Vec<ElementId> {
        self.selection
            .iter()
            .copied()
            .filter(|&id| self.document.get(id).is_some_and(|e| e.kind() == kind))
            .collect()
    }

    /// Link every selected image to the single selected text.
    pub fn connect_images_to_text(&mut self) -> SceneResult<usize> {
        let images = self.selected_of(ElementKind::Image);
        let texts = self.selected_of(ElementKind::Text);
        if texts.len() != 1 || images.is_empty() {
            log::warn!("Select exactly one text and at least one image");
            return Ok(0);
        }
        let pairs = images.into_iter().map(|image| (image, texts[0])).collect();
        self.connect_pairs(pairs)
    }

    /// Link every selected text to the single selected image.
    pub fn connect_texts_to_image(&mut self) -> SceneResult<usize> {
        let images = self.selected_of(ElementKind::Image);
        let texts = self.selected_of(ElementKind::Text);
        if images.len() != 1 || texts.is_empty() {
            log::warn!("Select exactly one image and at least one text");
            return Ok(0);
        }
        let pairs = texts.into_iter().map(|text| (images[0], text)).collect();
        self.connect_pairs(pairs)
    }

    // --- Interaction modes ---------------------------------------------

    /// Arm `source`; the next clicked element becomes its parent.
    pub fn begin_reparent(&mut self, source: ElementId) -> SceneResult<()> {
        if !self.document.contains(source) {
            return Err(SceneError::ElementNotFound(source));
        }
        self.mode = InteractionMode::ReparentPending { source };
        log::info!("Select a parent for {source}");
        Ok(())
    }

    /// Arm `source`; the next clicked element gets a content connector.
    pub fn begin_content_link(&mut self, source: ElementId) -> SceneResult<()> {
        if !self.document.contains(source) {
            return Err(SceneError::ElementNotFound(source));
        }
        self.mode = InteractionMode::ContentLinkPending { source };
        log::info!("Select an element to connect to {source}");
        Ok(())
    }

    /// Leave any pending mode without side effects.
    pub fn cancel(&mut self) {
        if self.mode != InteractionMode::Idle {
            log::debug!("Cancelled {:?}", self.mode);
        }
        self.mode = InteractionMode::Idle;
    }

    /// Handle a click on an element.
    ///
    /// In a pending mode the click completes it, and the mode returns to
    /// idle whether or not the action succeeds. When idle the element
    /// becomes the selection.
    pub fn click_element(&mut self, target: ElementId) -> SceneResult<()> {
        match std::mem::take(&mut self.mode) {
            InteractionMode::Idle => self.select(target),
            InteractionMode::ReparentPending { source } => {
                if source == target {
                    let err = SceneError::CyclicParent {
                        child: source,
                        parent: target,
                    };
                    report("reparent", &err);
                    return Err(err);
                }
                self.set_parent(source, Some(target))
            }
            InteractionMode::ContentLinkPending { source } => {
                self.add_content_connector(source, target).map(|_| ())
            }
            InteractionMode::AnchorLinkPending { source } => {
                let anchor = self
                    .document
                    .get(target)
                    .and_then(Element::primary_anchor)
                    .map(|kind| AnchorRef::new(target, kind))
                    .ok_or(SceneError::ElementNotFound(target))?;
                self.mode = InteractionMode::AnchorLinkPending { source };
                self.click_anchor(anchor).map(|_| ())
            }
        }
    }

    /// Handle a click on an anchor.
    ///
    /// The first click arms the anchor, the second one connects the two
    /// owners. Returns the new connector on completion.
    pub fn click_anchor(&mut self, anchor: AnchorRef) -> SceneResult<Option<ConnectorId>> {
        let exists = self
            .document
            .get(anchor.element)
            .is_some_and(|e| e.anchors().contains(&anchor.kind));
        if !exists {
            self.mode = InteractionMode::Idle;
            return Err(SceneError::ElementNotFound(anchor.element));
        }

        match std::mem::take(&mut self.mode) {
            InteractionMode::AnchorLinkPending { source } => {
                if source == anchor || source.element == anchor.element {
                    let err = SceneError::SelfConnection;
                    report("anchor link", &err);
                    return Err(err);
                }
                self.add_content_connector(source.element, anchor.element).map(Some)
            }
            InteractionMode::Idle => {
                self.mode = InteractionMode::AnchorLinkPending { source: anchor };
                log::info!("Click another anchor to complete the connection");
                Ok(None)
            }
            pending => {
                self.mode = pending;
                self.click_element(anchor.element).map(|_| None)
            }
        }
    }

    // --- Selection -----------------------------------------------------

    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    /// Replace the selection with `id`.
    pub fn select(&mut self, id: ElementId) -> SceneResult<()> {
        if !self.document.contains(id) {
            return Err(SceneError::ElementNotFound(id));
        }
        self.selection.clear();
        self.selection.push(id);
        Ok(())
    }

    /// Append `id` to the selection, keeping selection order.
    pub fn add_to_selection(&mut self, id: ElementId) -> SceneResult<()> {
        if !self.document.contains(id) {
            return Err(SceneError::ElementNotFound(id));
        }
        if !self.selection.contains(&id) {
            self.selection.push(id);
        }
        Ok(())
    }

    pub fn deselect(&mut self, id: ElementId) {
        self.selection.retain(|&s| s != id);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select_all(&mut self) {
        self.selection = self.document.ids().to_vec();
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.selection.contains(&id)
    }

    // --- Clipboard and assets ------------------------------------------

    /// Copy the selection. Returns the number of copied elements; an empty
    /// selection leaves the clipboard untouched.
    pub fn copy_selection(&mut self) -> usize {
        if self.selection.is_empty() {
            log::debug!("Nothing selected to copy");
            return 0;
        }
        let group = GroupSnapshot::capture(&self.document, &self.selection);
        let count = group.len();
        self.clipboard = Some(group);
        log::info!("Copied {count} elements");
        count
    }

    pub fn clipboard(&self) -> Option<&GroupSnapshot> {
        self.clipboard.as_ref()
    }

    /// Paste the clipboard with its top-left at `at` (or the configured
    /// paste origin). The pasted elements become the selection.
    pub fn paste_clipboard(&mut self, at: Option<Point>) -> SceneResult<Vec<ElementId>> {
        let group = match &self.clipboard {
            Some(group) if !group.is_empty() => group.clone(),
            _ => {
                let err = SceneError::EmptyClipboard;
                report("paste", &err);
                return Err(err);
            }
        };
        let ids = self.instantiate_snapshot(&group, at.unwrap_or(self.config.paste_origin))?;
        self.selection = ids.clone();
        Ok(ids)
    }

    /// Insert a group with fresh ids as one undo step.
    pub fn instantiate_snapshot(&mut self, group: &GroupSnapshot, origin: Point) -> SceneResult<Vec<ElementId>> {
        let built = group
            .build(origin, self.metrics.as_ref())
            .inspect_err(|e| report("instantiate", e))?;
        let show_anchors = self.view.show_anchors;
        let ids: Vec<ElementId> = built.elements.iter().map(Element::id).collect();

        let mut commands: Vec<SceneCommand> = built
            .elements
            .into_iter()
            .map(|mut element| {
                if !show_anchors {
                    element.set_anchor_visible(false);
                }
                SceneCommand::add_element(element)
            })
            .collect();
        commands.extend(built.connectors.into_iter().map(SceneCommand::add_connector));
        self.execute(SceneCommand::batch(commands))?;
        Ok(ids)
    }

    pub fn instantiate_text_asset(&mut self, asset: &TextAsset, at: Point) -> SceneResult<ElementId> {
        let text = asset.data.build(self.metrics.as_ref()).at(at);
        self.add_element(text)
    }

    pub fn instantiate_image_asset(&mut self, asset: &ImageAsset, at: Point) -> SceneResult<ElementId> {
        let data = ImageData {
            path: asset.path.clone(),
            width: asset.width,
            source_width: asset.source_width,
            source_height: asset.source_height,
        };
        let image = data.build().inspect_err(|e| report("instantiate image", e))?;
        self.add_element(image.at(at))
    }

    pub fn instantiate_group_asset(&mut self, asset: &GroupAsset, at: Point) -> SceneResult<Vec<ElementId>> {
        self.instantiate_snapshot(&asset.group, at)
    }

    // --- Layout helpers ------------------------------------------------

    /// Align the scene tops of `ids` to the highest one.
    pub fn align_top(&mut self, ids: &[ElementId]) -> SceneResult<()> {
        if ids.len() < 2 {
            return Ok(());
        }
        let top = ids
            .iter()
            .map(|&id| self.scene_position(id).map(|p| p.y))
            .collect::<SceneResult<Vec<f64>>>()?
            .into_iter()
            .fold(f64::INFINITY, f64::min);
        for &id in ids {
            let current = self.scene_position(id)?;
            self.move_to_scene(id, Point::new(current.x, top))?;
        }
        Ok(())
    }

    /// Align the scene right edges of `ids` to the rightmost one.
    pub fn align_right(&mut self, ids: &[ElementId]) -> SceneResult<()> {
        if ids.len() < 2 {
            return Ok(());
        }
        let right = ids
            .iter()
            .map(|&id| {
                self.document
                    .scene_bounds(id)
                    .map(|r| r.x1)
                    .ok_or(SceneError::ElementNotFound(id))
            })
            .collect::<SceneResult<Vec<f64>>>()?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        for &id in ids {
            let bounds = self
                .document
                .scene_bounds(id)
                .ok_or(SceneError::ElementNotFound(id))?;
            self.move_to_scene(id, Point::new(right - bounds.width(), bounds.y0))?;
        }
        Ok(())
    }

    fn scene_position(&self, id: ElementId) -> SceneResult<Point> {
        self.document
            .scene_position(id)
            .ok_or(SceneError::ElementNotFound(id))
    }

    // --- View ----------------------------------------------------------

    /// Show or hide every anchor, including per-element overrides.
    pub fn set_anchors_visible(&mut self, visible: bool) {
        self.view.show_anchors = visible;
        let ids = self.document.ids().to_vec();
        for id in ids {
            if let Some(element) = self.document.get_mut(id) {
                element.set_anchor_visible(visible);
            }
        }
    }

    /// Flip one element's anchor visibility. Returns the new state.
    pub fn toggle_anchor(&mut self, id: ElementId) -> SceneResult<bool> {
        let element = self.document.get_mut(id).ok_or(SceneError::ElementNotFound(id))?;
        let visible = !element.anchor_visible();
        element.set_anchor_visible(visible);
        Ok(visible)
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        self.view.show_grid = visible;
    }

    pub fn set_hierarchy_connectors_visible(&mut self, visible: bool) {
        self.view.show_hierarchy_connectors = visible;
    }

    pub fn set_content_connectors_visible(&mut self, visible: bool) {
        self.view.show_content_connectors = visible;
    }

    /// Hierarchy outline: roots in insertion order, children nested.
    pub fn tree(&self) -> Vec<TreeNode> {
        self.document
            .roots()
            .into_iter()
            .filter_map(|id| self.tree_node(id, 0))
            .collect()
    }

    fn tree_node(&self, id: ElementId, depth: usize) -> Option<TreeNode> {
        if depth > self.document.len() {
            return None;
        }
        let element = self.document.get(id)?;
        Some(TreeNode {
            id,
            label: element.label(),
            children: self
                .document
                .children(id)
                .into_iter()
                .filter_map(|child| self.tree_node(child, depth + 1))
                .collect(),
        })
    }

    /// Drawables for the editor view, honoring the current toggles.
    pub fn view_drawables(&self) -> Vec<Drawable> {
        self.drawables(&self.view.into())
    }

    /// Visible drawables in paint order: grid, hierarchy connectors,
    /// content connectors, elements, anchors.
    pub fn drawables(&self, options: &ExportOptions) -> Vec<Drawable> {
        let mut out = Vec::new();

        if options.show_grid && self.config.grid_step > 0.0 {
            let Size { width, height } = self.canvas_size;
            let step = self.config.grid_step;
            let mut x = 0.0;
            while x <= width {
                out.push(Drawable::GridLine(Line::new((x, 0.0), (x, height))));
                x += step;
            }
            let mut y = 0.0;
            while y <= height {
                out.push(Drawable::GridLine(Line::new((0.0, y), (width, y))));
                y += step;
            }
        }

        let connector = |c: &Connector| Drawable::Connector {
            id: c.id(),
            kind: c.kind,
            path: c.path(),
            line_width: c.line_width,
        };
        if options.show_hierarchy_connectors {
            out.extend(self.document.hierarchy_connectors().iter().map(connector));
        }
        if options.show_content_connectors {
            out.extend(self.document.content_connectors().iter().map(connector));
        }

        let order = self.document.paint_order();
        for &id in &order {
            let (Some(element), Some(origin)) =
                (self.document.get(id), self.document.scene_position(id))
            else {
                continue;
            };
            match element {
                Element::Text(text) => {
                    let color: Color = text.color().into();
                    let place = Affine::translate(origin.to_vec2());
                    out.extend(text.layout().glyphs.iter().map(|g| Drawable::Glyph {
                        element: id,
                        ch: g.ch,
                        font_family: text.font_family().to_string(),
                        font_size: text.font_size(),
                        color,
                        transform: place * g.transform(),
                        size: g.size,
                    }));
                }
                Element::Image(image) => out.push(Drawable::Image {
                    element: id,
                    source: image.source().to_path_buf(),
                    rect: Rect::from_origin_size(origin, element.size()),
                }),
            }
        }

        if options.show_anchors {
            for &id in &order {
                let Some(element) = self.document.get(id) else {
                    continue;
                };
                if !element.anchor_visible() {
                    continue;
                }
                for &kind in element.anchors() {
                    let anchor = AnchorRef::new(id, kind);
                    if let Some(center) = self.document.anchor_position(anchor) {
                        out.push(Drawable::Anchor { anchor, center });
                    }
                }
            }
        }
        out
    }
}

fn report(action: &str, err: &SceneError) {
    if err.is_validation() {
        log::warn!("Refused {action}: {err}");
    } else {
        log::error!("Failed {action}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::AnchorKind;

    fn image_at(scene: &mut Scene, x: f64, y: f64) -> ElementId {
        let image = ImageElement::with_source_size("a.png", 100, 100, 40.0).at(Point::new(x, y));
        scene.add_element(image).unwrap()
    }

    fn text_at(scene: &mut Scene, text: &str, x: f64, y: f64) -> ElementId {
        scene.create_text_element(Some(text), Point::new(x, y)).unwrap()
    }

    fn approx(a: Point, b: Point) -> bool {
        (a - b).hypot() < 1e-9
    }

    #[test]
    fn test_create_and_undo_redo() {
        let mut scene = Scene::new();
        let text = text_at(&mut scene, "竖排", 10.0, 10.0);
        let image = image_at(&mut scene, 100.0, 100.0);
        assert_eq!(scene.document().len(), 2);

        assert!(scene.undo().unwrap());
        assert!(scene.element(image).is_none());
        assert!(scene.undo().unwrap());
        assert!(scene.document().is_empty());
        assert!(!scene.undo().unwrap());

        assert!(scene.redo().unwrap());
        assert!(scene.redo().unwrap());
        assert!(scene.element(text).is_some());
        assert!(scene.element(image).is_some());
        assert!(!scene.redo().unwrap());
    }

    #[test]
    fn test_reparent_preserves_world_position() {
        let mut scene = Scene::new();
        let parent = image_at(&mut scene, 100.0, 100.0);
        let child = text_at(&mut scene, "子", 300.0, 250.0);

        scene.set_parent(child, Some(parent)).unwrap();
        let world = scene.document().scene_position(child).unwrap();
        assert!(approx(world, Point::new(300.0, 250.0)));
        assert!(approx(scene.element(child).unwrap().position(), Point::new(200.0, 150.0)));

        // Moving the parent carries the child.
        scene.move_by(parent, Vec2::new(10.0, 0.0)).unwrap();
        let world = scene.document().scene_position(child).unwrap();
        assert!(approx(world, Point::new(310.0, 250.0)));

        scene.set_parent(child, None).unwrap();
        assert!(approx(scene.element(child).unwrap().position(), Point::new(310.0, 250.0)));
        assert!(scene.document().hierarchy_connectors().is_empty());
    }

    #[test]
    fn test_undo_reparent_after_parent_moved() {
        let mut scene = Scene::new();
        let parent = image_at(&mut scene, 100.0, 100.0);
        let child = text_at(&mut scene, "子", 300.0, 250.0);
        scene.set_parent(child, Some(parent)).unwrap();
        scene.move_by(parent, Vec2::new(10.0, 0.0)).unwrap();

        assert!(scene.undo().unwrap());
        assert_eq!(scene.element(child).unwrap().parent(), None);
        assert!(approx(scene.element(child).unwrap().position(), Point::new(310.0, 250.0)));
    }

    #[test]
    fn test_reparent_rejects_descendant() {
        let mut scene = Scene::new();
        let a = image_at(&mut scene, 0.0, 0.0);
        let b = image_at(&mut scene, 50.0, 50.0);
        scene.set_parent(b, Some(a)).unwrap();

        let result = scene.set_parent(a, Some(b));
        assert!(matches!(result, Err(SceneError::CyclicParent { .. })));
        assert_eq!(scene.element(a).unwrap().parent(), None);
        assert_eq!(scene.document().hierarchy_connectors().len(), 1);
    }

    #[test]
    fn test_delete_cleans_connectors_and_selection() {
        let mut scene = Scene::new();
        let a = image_at(&mut scene, 0.0, 0.0);
        let b = text_at(&mut scene, "字", 0.0, 100.0);
        let c = image_at(&mut scene, 0.0, 300.0);
        scene.add_content_connector(a, b).unwrap();
        scene.add_content_connector(b, c).unwrap();
        scene.select(b).unwrap();

        scene.delete_element(b).unwrap();
        assert!(scene.document().content_connectors().is_empty());
        assert!(scene.selection().is_empty());

        scene.undo().unwrap();
        assert_eq!(scene.document().content_connectors().len(), 2);
        assert_eq!(scene.document().ids(), &[a, b, c]);
    }

    #[test]
    fn test_delete_takes_subtree() {
        let mut scene = Scene::new();
        let parent = image_at(&mut scene, 0.0, 0.0);
        let child = text_at(&mut scene, "子", 0.0, 60.0);
        scene.set_parent(child, Some(parent)).unwrap();

        scene.delete_element(parent).unwrap();
        assert!(scene.document().is_empty());
        scene.undo().unwrap();
        assert_eq!(scene.element(child).unwrap().parent(), Some(parent));
    }

    #[test]
    fn test_content_connector_kinds() {
        let mut scene = Scene::new();
        let image = image_at(&mut scene, 0.0, 0.0);
        let text = text_at(&mut scene, "字", 0.0, 100.0);
        let other = text_at(&mut scene, "文", 100.0, 100.0);

        let it = scene.add_content_connector(text, image).unwrap();
        let tt = scene.add_content_connector(text, other).unwrap();
        let doc = scene.document();
        assert_eq!(doc.content_connector(it).unwrap().kind, ConnectorKind::ImageText);
        assert_eq!(
            doc.content_connector(tt).unwrap().kind,
            ConnectorKind::Generic(crate::connector::ConnectionType::TextText)
        );

        assert_eq!(scene.add_content_connector(image, text), Err(SceneError::AlreadyConnected));
        assert_eq!(scene.add_content_connector(text, text), Err(SceneError::SelfConnection));
    }

    #[test]
    fn test_smart_connect_chain() {
        let mut scene = Scene::new();
        let x = text_at(&mut scene, "甲", 0.0, 0.0);
        let y = text_at(&mut scene, "乙", 0.0, 100.0);
        let z = text_at(&mut scene, "丙", 0.0, 200.0);
        for id in [x, y, z] {
            scene.add_to_selection(id).unwrap();
        }

        assert_eq!(scene.smart_connect_selection().unwrap(), 2);
        let doc = scene.document();
        assert!(doc.find_content_connector(x, y).is_some());
        assert!(doc.find_content_connector(y, z).is_some());
        assert!(doc.find_content_connector(x, z).is_none());

        assert_eq!(scene.smart_connect_selection().unwrap(), 0);
        assert_eq!(scene.document().content_connectors().len(), 2);

        // One undo step removes the whole chain.
        scene.undo().unwrap();
        assert!(scene.document().content_connectors().is_empty());
    }

    #[test]
    fn test_smart_connect_merges_image_with_child_text() {
        let mut scene = Scene::new();
        let img1 = image_at(&mut scene, 0.0, 0.0);
        let cap1 = text_at(&mut scene, "一", 0.0, 60.0);
        let img2 = image_at(&mut scene, 200.0, 0.0);
        scene.set_parent(cap1, Some(img1)).unwrap();

        // Selection order puts the caption first; it still joins its image.
        for id in [cap1, img1, img2] {
            scene.add_to_selection(id).unwrap();
        }
        assert_eq!(scene.smart_connect_selection().unwrap(), 1);
        let connector = &scene.document().content_connectors()[0];
        assert_eq!((connector.item1, connector.item2), (cap1, img2));
    }

    #[test]
    fn test_smart_connect_needs_two_groups() {
        let mut scene = Scene::new();
        let a = text_at(&mut scene, "甲", 0.0, 0.0);
        scene.select(a).unwrap();
        assert_eq!(scene.smart_connect_selection().unwrap(), 0);
        assert!(!scene.can_redo());
    }

    #[test]
    fn test_connect_by_position() {
        let mut scene = Scene::new();
        let img = image_at(&mut scene, 0.0, 0.0);
        let near = text_at(&mut scene, "近", 0.0, 150.0);
        let far = image_at(&mut scene, 0.0, 600.0);
        for id in [far, near, img] {
            scene.add_to_selection(id).unwrap();
        }
        assert_eq!(scene.connect_by_position().unwrap(), 1);
        let connector = &scene.document().content_connectors()[0];
        assert_eq!((connector.item1, connector.item2), (img, near));
        assert_eq!(connector.kind, ConnectorKind::ImageText);
    }

    #[test]
    fn test_connect_images_to_text() {
        let mut scene = Scene::new();
        let a = image_at(&mut scene, 0.0, 0.0);
        let b = image_at(&mut scene, 100.0, 0.0);
        let t = text_at(&mut scene, "字", 0.0, 100.0);
        scene.select_all();
        assert_eq!(scene.connect_images_to_text().unwrap(), 2);
        assert_eq!(scene.connect_texts_to_image().unwrap(), 0);
        assert!(scene.document().find_content_connector(a, t).is_some());
        assert!(scene.document().find_content_connector(b, t).is_some());
    }

    #[test]
    fn test_reparent_mode() {
        let mut scene = Scene::new();
        let parent = image_at(&mut scene, 0.0, 0.0);
        let child = image_at(&mut scene, 100.0, 100.0);

        scene.begin_reparent(child).unwrap();
        assert_eq!(scene.mode(), InteractionMode::ReparentPending { source: child });
        scene.click_element(parent).unwrap();
        assert_eq!(scene.mode(), InteractionMode::Idle);
        assert_eq!(scene.element(child).unwrap().parent(), Some(parent));

        // Clicking the source itself is refused and leaves idle.
        scene.begin_reparent(parent).unwrap();
        assert!(scene.click_element(parent).is_err());
        assert_eq!(scene.mode(), InteractionMode::Idle);
    }

    #[test]
    fn test_content_link_mode_and_cancel() {
        let mut scene = Scene::new();
        let image = image_at(&mut scene, 0.0, 0.0);
        let text = text_at(&mut scene, "字", 0.0, 100.0);

        scene.begin_content_link(image).unwrap();
        scene.cancel();
        assert_eq!(scene.mode(), InteractionMode::Idle);
        assert!(scene.document().content_connectors().is_empty());

        scene.begin_content_link(image).unwrap();
        scene.click_element(text).unwrap();
        assert_eq!(scene.mode(), InteractionMode::Idle);
        assert_eq!(scene.document().content_connectors().len(), 1);
    }

    #[test]
    fn test_anchor_link_mode() {
        let mut scene = Scene::new();
        let image = image_at(&mut scene, 0.0, 0.0);
        let text = text_at(&mut scene, "字", 0.0, 100.0);
        let image_top = AnchorRef::new(image, AnchorKind::ImageTop);
        let text_bottom = AnchorRef::new(text, AnchorKind::TextBottom);

        assert_eq!(scene.click_anchor(image_top).unwrap(), None);
        assert_eq!(scene.click_anchor(image_top), Err(SceneError::SelfConnection));
        assert_eq!(scene.mode(), InteractionMode::Idle);

        scene.click_anchor(image_top).unwrap();
        let id = scene.click_anchor(text_bottom).unwrap().unwrap();
        let connector = scene.document().content_connector(id).unwrap();
        assert_eq!(connector.kind, ConnectorKind::ImageText);

        // The curve runs between the two anchors.
        let start = scene.document().anchor_position(image_top).unwrap();
        let end = scene.document().anchor_position(text_bottom).unwrap();
        assert!(approx(connector.curve().p0, start));
        assert!(approx(connector.curve().p3, end));
    }

    #[test]
    fn test_relayout_updates_connectors() {
        let mut scene = Scene::new();
        let image = image_at(&mut scene, 0.0, 0.0);
        let text = text_at(&mut scene, "字", 100.0, 100.0);
        let id = scene.add_content_connector(image, text).unwrap();

        scene.set_text(text, "一二三四五六七八九十一二三四五六七八九十").unwrap();
        let bottom = scene
            .document()
            .anchor_position(AnchorRef::new(text, AnchorKind::TextBottom))
            .unwrap();
        let curve = scene.document().content_connector(id).unwrap().curve();
        assert!(approx(curve.p3, bottom));
        assert_eq!(scene.set_image_width(text, 10.0).map_err(|e| e.is_validation()), Err(true));
    }

    #[test]
    fn test_copy_paste() {
        let mut scene = Scene::new();
        assert_eq!(scene.paste_clipboard(None), Err(SceneError::EmptyClipboard));

        let image = image_at(&mut scene, 50.0, 50.0);
        let caption = text_at(&mut scene, "图注", 60.0, 120.0);
        scene.set_parent(caption, Some(image)).unwrap();
        scene.add_content_connector(image, caption).unwrap();
        scene.select(image).unwrap();
        scene.add_to_selection(caption).unwrap();
        assert_eq!(scene.copy_selection(), 2);

        let pasted = scene.paste_clipboard(Some(Point::new(500.0, 500.0))).unwrap();
        assert_eq!(pasted.len(), 2);
        assert!(!pasted.contains(&image) && !pasted.contains(&caption));
        assert_eq!(scene.selection(), pasted.as_slice());

        let doc = scene.document();
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.get(pasted[1]).unwrap().parent(), Some(pasted[0]));
        assert!(doc.find_content_connector(pasted[0], pasted[1]).is_some());
        assert!(approx(doc.scene_position(pasted[0]).unwrap(), Point::new(500.0, 500.0)));
        assert!(approx(doc.scene_position(pasted[1]).unwrap(), Point::new(510.0, 570.0)));

        // A paste is a single undo step.
        scene.undo().unwrap();
        assert_eq!(scene.document().len(), 2);
    }

    #[test]
    fn test_align() {
        let mut scene = Scene::new();
        let a = image_at(&mut scene, 0.0, 30.0);
        let b = image_at(&mut scene, 100.0, 80.0);
        let c = text_at(&mut scene, "字", 10.0, 10.0);
        scene.set_parent(c, Some(b)).unwrap();

        scene.align_top(&[a, b]).unwrap();
        assert!((scene.document().scene_position(b).unwrap().y - 30.0).abs() < 1e-9);

        scene.align_right(&[a, c]).unwrap();
        let a_right = scene.document().scene_bounds(a).unwrap().x1;
        let c_right = scene.document().scene_bounds(c).unwrap().x1;
        assert!((a_right - c_right).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_visibility() {
        let mut scene = Scene::new();
        let a = image_at(&mut scene, 0.0, 0.0);
        assert!(!scene.toggle_anchor(a).unwrap());
        assert!(scene.toggle_anchor(a).unwrap());

        scene.set_anchors_visible(false);
        assert!(!scene.element(a).unwrap().anchor_visible());
        let b = image_at(&mut scene, 10.0, 0.0);
        assert!(!scene.element(b).unwrap().anchor_visible());
    }

    #[test]
    fn test_drawables_export_defaults() {
        let mut scene = Scene::new();
        let parent = image_at(&mut scene, 0.0, 0.0);
        let child = text_at(&mut scene, "字，", 0.0, 100.0);
        scene.set_parent(child, Some(parent)).unwrap();
        scene.add_content_connector(parent, child).unwrap();

        let exported = scene.drawables(&ExportOptions::default());
        assert!(!exported.iter().any(|d| matches!(d, Drawable::GridLine(_))));
        assert!(!exported.iter().any(|d| matches!(d, Drawable::Anchor { .. })));
        let connectors: Vec<ConnectorKind> = exported
            .iter()
            .filter_map(|d| match d {
                Drawable::Connector { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(connectors, vec![ConnectorKind::ImageText]);
        let glyphs = exported
            .iter()
            .filter(|d| matches!(d, Drawable::Glyph { .. }))
            .count();
        assert_eq!(glyphs, 2);

        scene.set_canvas_size(100.0, 100.0);
        let view = scene.view_drawables();
        // 0, 50, 100 in each direction.
        let grid = view.iter().filter(|d| matches!(d, Drawable::GridLine(_))).count();
        assert_eq!(grid, 6);
        let anchors = view.iter().filter(|d| matches!(d, Drawable::Anchor { .. })).count();
        assert_eq!(anchors, 2);
    }

    #[test]
    fn test_tree() {
        let mut scene = Scene::new();
        let root = image_at(&mut scene, 0.0, 0.0);
        let child = text_at(&mut scene, "一二三四五六七八九十", 0.0, 100.0);
        let other = image_at(&mut scene, 300.0, 0.0);
        scene.set_parent(child, Some(root)).unwrap();

        let tree = scene.tree();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].id, root);
        assert_eq!(tree[0].label, "Image");
        assert_eq!(tree[0].children[0].label, "Txt: 一二三四五六七八...");
        assert_eq!(tree[1].id, other);
    }

    #[test]
    fn test_remove_connectors_of() {
        let mut scene = Scene::new();
        let a = text_at(&mut scene, "甲", 0.0, 0.0);
        let b = text_at(&mut scene, "乙", 100.0, 0.0);
        let c = text_at(&mut scene, "丙", 200.0, 0.0);
        scene.add_content_connector(a, b).unwrap();
        scene.add_content_connector(b, c).unwrap();
        scene.add_content_connector(a, c).unwrap();

        assert_eq!(scene.remove_content_connectors_of(b).unwrap(), 2);
        assert_eq!(scene.document().content_connectors().len(), 1);
        assert_eq!(scene.remove_all_content_connectors().unwrap(), 1);
        scene.undo().unwrap();
        scene.undo().unwrap();
        assert_eq!(scene.document().content_connectors().len(), 3);
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut scene = Scene::new();
        let below = image_at(&mut scene, 0.0, 0.0);
        let above = image_at(&mut scene, 20.0, 20.0);
        assert_eq!(scene.hit_test(Point::new(30.0, 30.0)), Some(above));
        assert_eq!(scene.hit_test(Point::new(5.0, 5.0)), Some(below));
        assert_eq!(scene.hit_test(Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn test_undo_cap_from_config() {
        let config = SceneConfig {
            undo_cap: 2,
            ..SceneConfig::default()
        };
        let mut scene = Scene::with_config(config, Box::new(ScaledMetrics::default()));
        for i in 0..4 {
            image_at(&mut scene, i as f64 * 50.0, 0.0);
        }
        while scene.undo().unwrap() {}
        assert_eq!(scene.document().len(), 2);
    }
}
