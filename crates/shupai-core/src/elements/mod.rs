//! Element definitions for the layout scene.

mod image;
mod text;

pub use image::ImageElement;
pub use text::TextElement;

use kurbo::{Point, Rect, Size};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// Format as `#rrggbb` (alpha is dropped, matching the persisted format).
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let r = channel(&hex[0..1])? * 17;
                let g = channel(&hex[1..2])? * 17;
                let b = channel(&hex[2..3])? * 17;
                Some(Self::new(r, g, b, 255))
            }
            6 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                255,
            )),
            8 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }
}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::black()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Where a connector may attach on an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// Top-center of an image.
    ImageTop,
    /// Bottom-center of a text block.
    TextBottom,
}

impl AnchorKind {
    /// Anchor position in element-local coordinates for an element of `size`.
    pub fn local_position(self, size: Size) -> Point {
        match self {
            AnchorKind::ImageTop => Point::new(size.width / 2.0, 0.0),
            AnchorKind::TextBottom => Point::new(size.width / 2.0, size.height),
        }
    }
}

/// A specific anchor on a specific element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorRef {
    pub element: ElementId,
    pub kind: AnchorKind,
}

impl AnchorRef {
    pub fn new(element: ElementId, kind: AnchorKind) -> Self {
        Self { element, kind }
    }
}

/// Element variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Text,
    Image,
}

/// Common trait for all elements.
pub trait ElementTrait {
    /// Get the unique identifier.
    fn id(&self) -> ElementId;

    /// Position relative to the parent (or the scene for roots).
    fn position(&self) -> Point;

    /// Set the position relative to the parent.
    fn set_position(&mut self, position: Point);

    /// Parent element, if any.
    fn parent(&self) -> Option<ElementId>;

    /// Size of the element's bounding box.
    fn size(&self) -> Size;

    /// Anchors this element exposes.
    fn anchors(&self) -> &'static [AnchorKind];

    /// Bounding box in element-local coordinates.
    fn bounding_rect(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.size())
    }
}

/// Enum wrapper for all element types.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Text(e) => e.id(),
            Element::Image(e) => e.id(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Text(_) => ElementKind::Text,
            Element::Image(_) => ElementKind::Image,
        }
    }

    pub fn position(&self) -> Point {
        match self {
            Element::Text(e) => e.position(),
            Element::Image(e) => e.position(),
        }
    }

    pub fn set_position(&mut self, position: Point) {
        match self {
            Element::Text(e) => e.set_position(position),
            Element::Image(e) => e.set_position(position),
        }
    }

    pub fn parent(&self) -> Option<ElementId> {
        match self {
            Element::Text(e) => e.parent(),
            Element::Image(e) => e.parent(),
        }
    }

    /// Rewrite the parent link. Only the document may do this, since the
    /// hierarchy connectors have to follow.
    pub(crate) fn set_parent_link(&mut self, parent: Option<ElementId>) {
        match self {
            Element::Text(e) => e.parent = parent,
            Element::Image(e) => e.parent = parent,
        }
    }

    pub fn size(&self) -> Size {
        match self {
            Element::Text(e) => e.size(),
            Element::Image(e) => e.size(),
        }
    }

    pub fn bounding_rect(&self) -> Rect {
        match self {
            Element::Text(e) => e.bounding_rect(),
            Element::Image(e) => e.bounding_rect(),
        }
    }

    pub fn anchors(&self) -> &'static [AnchorKind] {
        match self {
            Element::Text(e) => e.anchors(),
            Element::Image(e) => e.anchors(),
        }
    }

    /// Primary anchor (the first one), if the element has any.
    pub fn primary_anchor(&self) -> Option<AnchorKind> {
        self.anchors().first().copied()
    }

    pub fn z(&self) -> f64 {
        match self {
            Element::Text(e) => e.z,
            Element::Image(e) => e.z,
        }
    }

    pub fn set_z(&mut self, z: f64) {
        match self {
            Element::Text(e) => e.z = z,
            Element::Image(e) => e.z = z,
        }
    }

    pub fn anchor_visible(&self) -> bool {
        match self {
            Element::Text(e) => e.anchor_visible,
            Element::Image(e) => e.anchor_visible,
        }
    }

    pub fn set_anchor_visible(&mut self, visible: bool) {
        match self {
            Element::Text(e) => e.anchor_visible = visible,
            Element::Image(e) => e.anchor_visible = visible,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Element::Text(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Element::Image(_))
    }

    pub fn as_text(&self) -> Option<&TextElement> {
        match self {
            Element::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextElement> {
        match self {
            Element::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageElement> {
        match self {
            Element::Image(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut ImageElement> {
        match self {
            Element::Image(i) => Some(i),
            _ => None,
        }
    }

    /// Short human-readable label for outline views.
    pub fn label(&self) -> String {
        match self {
            Element::Text(t) => {
                let head: String = t.content().chars().take(8).collect();
                format!("Txt: {head}...")
            }
            Element::Image(_) => "Image".to_string(),
        }
    }
}

impl From<TextElement> for Element {
    fn from(text: TextElement) -> Self {
        Element::Text(text)
    }
}

impl From<ImageElement> for Element {
    fn from(image: ImageElement) -> Self {
        Element::Image(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex_roundtrip() {
        let color = SerializableColor::new(0x12, 0xab, 0xef, 255);
        assert_eq!(color.to_hex(), "#12abef");
        assert_eq!(SerializableColor::from_hex("#12abef"), Some(color));
    }

    #[test]
    fn test_color_hex_short_and_invalid() {
        assert_eq!(
            SerializableColor::from_hex("#f00"),
            Some(SerializableColor::new(255, 0, 0, 255))
        );
        assert_eq!(SerializableColor::from_hex("red"), None);
        assert_eq!(SerializableColor::from_hex("#12345"), None);
    }

    #[test]
    fn test_color_hex_rejects_non_ascii() {
        // Byte lengths that match a valid form must not be sliced mid-char.
        assert_eq!(SerializableColor::from_hex("#中"), None);
        assert_eq!(SerializableColor::from_hex("#中中"), None);
        assert_eq!(SerializableColor::from_hex("#ab中"), None);
        assert_eq!(SerializableColor::from_hex("#é"), None);
    }

    #[test]
    fn test_anchor_positions() {
        let size = Size::new(40.0, 100.0);
        assert_eq!(AnchorKind::ImageTop.local_position(size), Point::new(20.0, 0.0));
        assert_eq!(AnchorKind::TextBottom.local_position(size), Point::new(20.0, 100.0));
    }
}
