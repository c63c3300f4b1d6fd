//! Image element.

use super::{AnchorKind, ElementId, ElementTrait};
use crate::error::{SceneError, SceneResult};
use kurbo::{Point, Size};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An image scaled to a target width with its aspect ratio locked.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageElement {
    pub(crate) id: ElementId,
    /// Position relative to the parent (top-left corner).
    pub position: Point,
    pub(crate) parent: Option<ElementId>,
    /// Stacking order.
    pub z: f64,
    /// Whether the top anchor is drawn.
    pub anchor_visible: bool,
    source: PathBuf,
    source_width: u32,
    source_height: u32,
    target_width: f64,
    target_height: f64,
}

impl ImageElement {
    /// Create an image element from known source dimensions.
    pub fn with_source_size(
        source: impl Into<PathBuf>,
        source_width: u32,
        source_height: u32,
        target_width: f64,
    ) -> Self {
        let mut image = Self {
            id: Uuid::new_v4(),
            position: Point::ZERO,
            parent: None,
            z: 0.0,
            anchor_visible: true,
            source: source.into(),
            source_width,
            source_height,
            target_width,
            target_height: 0.0,
        };
        image.recompute_height();
        image
    }

    /// Create an image element, reading the pixel size from the file.
    pub fn open(source: impl AsRef<Path>, target_width: f64) -> SceneResult<Self> {
        let source = source.as_ref();
        let (width, height) = read_dimensions(source)?;
        Ok(Self::with_source_size(source, width, height, target_width))
    }

    /// Set the initial position.
    pub fn at(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Source size in pixels.
    pub fn source_size(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn target_width(&self) -> f64 {
        self.target_width
    }

    pub fn target_height(&self) -> f64 {
        self.target_height
    }

    /// Source height over source width (1.0 when the size is unknown).
    pub fn aspect_ratio(&self) -> f64 {
        if self.source_width == 0 || self.source_height == 0 {
            1.0
        } else {
            self.source_height as f64 / self.source_width as f64
        }
    }

    pub fn set_target_width(&mut self, width: f64) {
        self.target_width = width;
        self.recompute_height();
    }

    /// Replace the source with one of known dimensions.
    pub fn set_source(&mut self, source: impl Into<PathBuf>, width: u32, height: u32) {
        self.source = source.into();
        self.source_width = width;
        self.source_height = height;
        self.recompute_height();
    }

    /// Replace the source, reading its dimensions from disk.
    pub fn set_source_file(&mut self, source: impl AsRef<Path>) -> SceneResult<()> {
        let source = source.as_ref();
        let (width, height) = read_dimensions(source)?;
        self.set_source(source, width, height);
        Ok(())
    }

    fn recompute_height(&mut self) {
        self.target_height = self.target_width * self.aspect_ratio();
    }
}

fn read_dimensions(path: &Path) -> SceneResult<(u32, u32)> {
    ::image::image_dimensions(path).map_err(|e| {
        SceneError::Resource(format!("Failed to read image {}: {}", path.display(), e))
    })
}

impl ElementTrait for ImageElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn position(&self) -> Point {
        self.position
    }

    fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    fn size(&self) -> Size {
        Size::new(self.target_width, self.target_height)
    }

    fn anchors(&self) -> &'static [AnchorKind] {
        &[AnchorKind::ImageTop]
    }
}
