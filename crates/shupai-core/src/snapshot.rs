//! Serializable element snapshots.
//!
//! Snapshots are how elements leave the scene: the clipboard, the asset
//! catalog and the project file all store [`ElementData`]. Groups keep
//! their internal parent links and content connections as indices into
//! the item list, and rebuild in three phases (elements, parents,
//! connections) with fresh ids.

use crate::connector::{Connector, ConnectorKind, DEFAULT_LINE_WIDTH};
use crate::document::SceneDocument;
use crate::elements::{Element, ElementId, ElementKind, ImageElement, SerializableColor, TextElement};
use crate::error::{SceneError, SceneResult};
use crate::layout::{DEFAULT_FONT_SIZE, FontMetrics, LayoutParams};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Persisted fields of a text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextData {
    pub text: String,
    pub font_family: String,
    pub font_size: f64,
    /// `#rrggbb`.
    pub text_color: String,
    pub box_height: f64,
    pub chars_per_column: usize,
    pub column_spacing: f64,
    pub auto_height: bool,
    pub manual_line_break: bool,
}

impl Default for TextData {
    fn default() -> Self {
        Self::from_params(String::new(), &LayoutParams::default())
    }
}

impl TextData {
    fn from_params(text: String, params: &LayoutParams) -> Self {
        Self {
            text,
            font_family: params.font_family.clone(),
            font_size: params.font_size,
            text_color: params.color.to_hex(),
            box_height: params.box_height,
            chars_per_column: params.chars_per_column,
            column_spacing: params.column_spacing,
            auto_height: params.auto_height,
            manual_line_break: params.manual_line_break,
        }
    }

    pub fn capture(text: &TextElement) -> Self {
        Self::from_params(text.content().to_string(), text.params())
    }

    /// Layout parameters. An unparsable color falls back to black.
    pub fn params(&self) -> LayoutParams {
        let color = SerializableColor::from_hex(&self.text_color).unwrap_or_else(|| {
            log::warn!("Invalid text color {:?}, using black", self.text_color);
            SerializableColor::black()
        });
        LayoutParams {
            font_family: self.font_family.clone(),
            font_size: self.font_size,
            column_spacing: self.column_spacing,
            chars_per_column: self.chars_per_column.max(1),
            box_height: self.box_height,
            auto_height: self.auto_height,
            manual_line_break: self.manual_line_break,
            color,
        }
    }

    pub fn build(&self, metrics: &dyn FontMetrics) -> TextElement {
        TextElement::new(self.text.clone(), self.params(), metrics)
    }
}

fn default_image_width() -> f64 {
    DEFAULT_FONT_SIZE
}

/// Persisted fields of an image element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub path: PathBuf,
    #[serde(default = "default_image_width")]
    pub width: f64,
    /// Source pixel size; zero when unknown.
    #[serde(default)]
    pub source_width: u32,
    #[serde(default)]
    pub source_height: u32,
}

impl ImageData {
    pub fn capture(image: &ImageElement) -> Self {
        let (source_width, source_height) = image.source_size();
        Self {
            path: image.source().to_path_buf(),
            width: image.target_width(),
            source_width,
            source_height,
        }
    }

    /// Build the element. The file is only read when the source size was
    /// not recorded.
    pub fn build(&self) -> SceneResult<ImageElement> {
        if self.source_width > 0 && self.source_height > 0 {
            Ok(ImageElement::with_source_size(
                &self.path,
                self.source_width,
                self.source_height,
                self.width,
            ))
        } else {
            ImageElement::open(&self.path, self.width)
        }
    }
}

/// Persisted element content, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementData {
    #[serde(rename = "text", alias = "VTextItem")]
    Text(TextData),
    #[serde(rename = "image", alias = "VImageItem")]
    Image(ImageData),
}

impl ElementData {
    pub fn capture(element: &Element) -> Self {
        match element {
            Element::Text(t) => ElementData::Text(TextData::capture(t)),
            Element::Image(i) => ElementData::Image(ImageData::capture(i)),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ElementData::Text(_) => ElementKind::Text,
            ElementData::Image(_) => ElementKind::Image,
        }
    }

    /// Build a new element with a fresh id at the origin.
    pub fn build(&self, metrics: &dyn FontMetrics) -> SceneResult<Element> {
        match self {
            ElementData::Text(t) => Ok(t.build(metrics).into()),
            ElementData::Image(i) => Ok(i.build()?.into()),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointRepr {
    Pair(f64, f64),
    Point(Point),
}

/// Accepts `{"x": .., "y": ..}` as well as an `[x, y]` pair.
fn point_or_pair<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Point, D::Error> {
    Ok(match PointRepr::deserialize(deserializer)? {
        PointRepr::Pair(x, y) => Point::new(x, y),
        PointRepr::Point(point) => point,
    })
}

/// Negative indices mean "no parent".
fn optional_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    let index = Option::<i64>::deserialize(deserializer)?;
    Ok(index.and_then(|i| usize::try_from(i).ok()))
}

/// One element of a group snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    #[serde(flatten)]
    pub data: ElementData,
    #[serde(deserialize_with = "point_or_pair")]
    pub scene_pos: Point,
    #[serde(deserialize_with = "point_or_pair")]
    pub local_pos: Point,
    #[serde(default)]
    pub z: f64,
    /// Index of the parent within the same group.
    #[serde(default, deserialize_with = "optional_index")]
    pub parent_index: Option<usize>,
    #[serde(default = "default_true")]
    pub anchor_visible: bool,
}

fn default_line_width() -> f64 {
    DEFAULT_LINE_WIDTH
}

/// A content connection between two group items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub from: usize,
    pub to: usize,
    pub kind: ConnectorKind,
    #[serde(default = "default_line_width")]
    pub line_width: f64,
}

/// Elements with their internal parent links and content connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GroupRecord")]
pub struct GroupSnapshot {
    pub items: Vec<ElementSnapshot>,
    pub connections: Vec<ConnectionRecord>,
}

/// Stored form of a group. Older catalogs list image-text links as
/// `[image, text]` index pairs instead of connection records.
#[derive(Deserialize)]
struct GroupRecord {
    items: Vec<ElementSnapshot>,
    #[serde(default)]
    connections: Vec<ConnectionRecord>,
    #[serde(default)]
    image_text_connections: Vec<(usize, usize)>,
}

impl From<GroupRecord> for GroupSnapshot {
    fn from(record: GroupRecord) -> Self {
        let mut connections = record.connections;
        for (image, text) in record.image_text_connections {
            let known = connections
                .iter()
                .any(|c| (c.from, c.to) == (image, text) || (c.from, c.to) == (text, image));
            if !known {
                connections.push(ConnectionRecord {
                    from: image,
                    to: text,
                    kind: ConnectorKind::ImageText,
                    line_width: DEFAULT_LINE_WIDTH,
                });
            }
        }
        Self {
            items: record.items,
            connections,
        }
    }
}

/// A group rebuilt with fresh ids, ready to insert.
#[derive(Debug, Clone)]
pub struct BuiltGroup {
    /// Parents before children.
    pub elements: Vec<Element>,
    pub connectors: Vec<Connector>,
}

impl GroupSnapshot {
    /// Capture `ids` from `doc`. Items are ordered parents first; parent
    /// links and content connectors leaving the set are dropped.
    pub fn capture(doc: &SceneDocument, ids: &[ElementId]) -> Self {
        let wanted: HashSet<ElementId> = ids.iter().copied().filter(|id| doc.contains(*id)).collect();
        let ordered: Vec<ElementId> = doc
            .pre_order()
            .into_iter()
            .filter(|id| wanted.contains(id))
            .collect();
        let index: HashMap<ElementId, usize> =
            ordered.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let items = ordered
            .iter()
            .filter_map(|id| {
                let element = doc.get(*id)?;
                Some(ElementSnapshot {
                    data: ElementData::capture(element),
                    scene_pos: doc.scene_position(*id)?,
                    local_pos: element.position(),
                    z: element.z(),
                    parent_index: element.parent().and_then(|p| index.get(&p).copied()),
                    anchor_visible: element.anchor_visible(),
                })
            })
            .collect();

        let connections = doc
            .content_connectors()
            .iter()
            .filter_map(|c| {
                Some(ConnectionRecord {
                    from: *index.get(&c.item1)?,
                    to: *index.get(&c.item2)?,
                    kind: c.kind,
                    line_width: c.line_width,
                })
            })
            .collect();

        Self { items, connections }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn count(&self, kind: ElementKind) -> usize {
        self.items.iter().filter(|i| i.data.kind() == kind).count()
    }

    /// Top-left of the items' scene positions.
    pub fn min_scene_pos(&self) -> Option<Point> {
        self.items.iter().map(|i| i.scene_pos).reduce(|a, b| {
            Point::new(a.x.min(b.x), a.y.min(b.y))
        })
    }

    /// Parent index of each item after dropping invalid links.
    fn resolved_parents(&self) -> SceneResult<Vec<Option<usize>>> {
        let parents: Vec<Option<usize>> = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| item.parent_index.filter(|&p| p < self.items.len() && p != i))
            .collect();
        for start in 0..parents.len() {
            let mut current = parents[start];
            for _ in 0..parents.len() {
                match current {
                    Some(p) if p == start => {
                        return Err(SceneError::Consistency(format!(
                            "group item {start} is its own ancestor"
                        )));
                    }
                    Some(p) => current = parents[p],
                    None => break,
                }
            }
        }
        Ok(parents)
    }

    /// Rebuild the group with fresh ids. Root items keep their relative
    /// layout with the group's top-left at `origin`; children keep their
    /// local positions.
    pub fn build(&self, origin: Point, metrics: &dyn FontMetrics) -> SceneResult<BuiltGroup> {
        let parents = self.resolved_parents()?;
        let base = self.min_scene_pos().unwrap_or(Point::ZERO);
        let shift: Vec2 = origin - base;

        // Phase 1: elements.
        let mut elements = Vec::with_capacity(self.items.len());
        for (item, parent) in self.items.iter().zip(&parents) {
            let mut element = item.data.build(metrics)?;
            let position = match parent {
                Some(_) => item.local_pos,
                None => item.scene_pos + shift,
            };
            element.set_position(position);
            element.set_z(item.z);
            element.set_anchor_visible(item.anchor_visible);
            elements.push(element);
        }

        // Phase 2: parents.
        let ids: Vec<ElementId> = elements.iter().map(Element::id).collect();
        for (element, parent) in elements.iter_mut().zip(&parents) {
            element.set_parent_link(parent.map(|p| ids[p]));
        }

        // Phase 3: connections.
        let mut connectors: Vec<Connector> = Vec::new();
        for record in &self.connections {
            let (Some(&a), Some(&b)) = (ids.get(record.from), ids.get(record.to)) else {
                log::warn!("Skipping connection {} -> {}: index out of range", record.from, record.to);
                continue;
            };
            if a == b || connectors.iter().any(|c| c.joins(a, b)) || !record.kind.is_content() {
                log::warn!("Skipping invalid connection {} -> {}", record.from, record.to);
                continue;
            }
            connectors.push(Connector::new(record.kind, a, b).with_line_width(record.line_width));
        }

        let mut depth: Vec<usize> = vec![0; parents.len()];
        for (i, d) in depth.iter_mut().enumerate() {
            let mut current = parents[i];
            while let Some(p) = current {
                *d += 1;
                current = parents[p];
            }
        }
        let mut order: Vec<usize> = (0..elements.len()).collect();
        order.sort_by_key(|&i| depth[i]);
        let mut slots: Vec<Option<Element>> = elements.into_iter().map(Some).collect();
        let elements = order.into_iter().filter_map(|i| slots[i].take()).collect();

        Ok(BuiltGroup {
            elements,
            connectors,
        })
    }
}
