//! Connector geometry.
//!
//! A connector is a cubic curve between two elements. The curve itself is a
//! cache: the document recomputes it whenever an endpoint (or an ancestor
//! of one) moves or changes size.

use crate::elements::{ElementId, ElementKind};
use kurbo::{BezPath, CubicBez, Point, Shape, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for connectors.
pub type ConnectorId = Uuid;

/// Default stroke width for all connector kinds.
pub const DEFAULT_LINE_WIDTH: f64 = 3.0;

/// Control offset cap for generic connectors.
pub const GENERIC_CURVE_CAP: f64 = 80.0;

/// Control offset cap for image-text connectors.
pub const IMAGE_TEXT_CURVE_CAP: f64 = 100.0;

/// Fixed vertical control offset for hierarchy connectors.
pub const HIERARCHY_CURVE_OFFSET: f64 = 50.0;

/// Fraction of the manhattan distance used as control offset.
const CURVE_FACTOR: f64 = 0.3;

/// Which pair of element kinds a generic connector joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    ImageImage,
    TextText,
    #[default]
    Generic,
}

/// Connector kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    /// Mirrors a parent/child link. Never created directly.
    Hierarchy,
    /// Joins an image and a text.
    ImageText,
    /// Joins two elements of the same kind.
    Generic(ConnectionType),
}

impl ConnectorKind {
    /// Content connector kind for a link between elements of kinds `a` and `b`.
    pub fn between(a: ElementKind, b: ElementKind) -> Self {
        match (a, b) {
            (ElementKind::Image, ElementKind::Text) | (ElementKind::Text, ElementKind::Image) => {
                ConnectorKind::ImageText
            }
            (ElementKind::Image, ElementKind::Image) => {
                ConnectorKind::Generic(ConnectionType::ImageImage)
            }
            (ElementKind::Text, ElementKind::Text) => {
                ConnectorKind::Generic(ConnectionType::TextText)
            }
        }
    }

    /// Whether this is a content connector (image-text or generic).
    pub fn is_content(self) -> bool {
        !matches!(self, ConnectorKind::Hierarchy)
    }

    fn curve_cap(self) -> f64 {
        match self {
            ConnectorKind::Hierarchy => HIERARCHY_CURVE_OFFSET,
            ConnectorKind::ImageText => IMAGE_TEXT_CURVE_CAP,
            ConnectorKind::Generic(_) => GENERIC_CURVE_CAP,
        }
    }
}

/// A curve joining two elements.
///
/// For hierarchy connectors `item1` is the parent and `item2` the child.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub(crate) id: ConnectorId,
    pub kind: ConnectorKind,
    pub item1: ElementId,
    pub item2: ElementId,
    pub line_width: f64,
    pub(crate) curve: CubicBez,
}

impl Connector {
    pub fn new(kind: ConnectorKind, item1: ElementId, item2: ElementId) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            item1,
            item2,
            line_width: DEFAULT_LINE_WIDTH,
            curve: CubicBez::new(Point::ZERO, Point::ZERO, Point::ZERO, Point::ZERO),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }

    pub fn id(&self) -> ConnectorId {
        self.id
    }

    /// Cached curve, valid after the document refreshed this connector.
    pub fn curve(&self) -> CubicBez {
        self.curve
    }

    pub fn path(&self) -> BezPath {
        self.curve.to_path(0.1)
    }

    /// Whether the connector touches `id`.
    pub fn involves(&self, id: ElementId) -> bool {
        self.item1 == id || self.item2 == id
    }

    /// Whether the connector joins `a` and `b`, in either order.
    pub fn joins(&self, a: ElementId, b: ElementId) -> bool {
        (self.item1 == a && self.item2 == b) || (self.item1 == b && self.item2 == a)
    }
}

/// Curve from `from` to `to` for a connector of `kind`.
pub fn curve_between(kind: ConnectorKind, from: Point, to: Point) -> CubicBez {
    let delta = to - from;
    let offset = match kind {
        ConnectorKind::Hierarchy => Vec2::new(0.0, HIERARCHY_CURVE_OFFSET),
        _ => {
            let distance = (delta.x.abs() + delta.y.abs()) * CURVE_FACTOR;
            let magnitude = distance.min(kind.curve_cap());
            if delta.x.abs() > delta.y.abs() {
                Vec2::new(magnitude.copysign(delta.x), 0.0)
            } else {
                Vec2::new(0.0, magnitude.copysign(delta.y))
            }
        }
    };
    CubicBez::new(from, from + offset, to - offset, to)
}
