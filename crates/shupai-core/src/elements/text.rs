//! Vertical text element.

use super::{AnchorKind, ElementId, ElementTrait, SerializableColor};
use crate::layout::{self, FontMetrics, LayoutParams, TextLayout};
use kurbo::{Point, Size};
use uuid::Uuid;

/// A block of vertically typeset text.
///
/// The glyph layout is derived state: every setter that can change glyph
/// placement re-runs the layout before returning, so [`TextElement::layout`]
/// and the bounding box always match the current fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub(crate) id: ElementId,
    /// Position relative to the parent (top-left of the bounding box).
    pub position: Point,
    pub(crate) parent: Option<ElementId>,
    /// Stacking order.
    pub z: f64,
    /// Whether the bottom anchor is drawn.
    pub anchor_visible: bool,
    content: String,
    params: LayoutParams,
    layout: TextLayout,
}

impl TextElement {
    /// Create a new text element and lay it out.
    pub fn new(content: impl Into<String>, params: LayoutParams, metrics: &dyn FontMetrics) -> Self {
        let content = content.into();
        let layout = layout::layout(&content, &params, metrics);
        Self {
            id: Uuid::new_v4(),
            position: Point::ZERO,
            parent: None,
            z: 0.0,
            anchor_visible: true,
            content,
            params,
            layout,
        }
    }

    /// Set the initial position.
    pub fn at(mut self, position: Point) -> Self {
        self.position = position;
        self
    }

    /// Get the text content.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn layout(&self) -> &TextLayout {
        &self.layout
    }

    pub fn font_family(&self) -> &str {
        &self.params.font_family
    }

    pub fn font_size(&self) -> f64 {
        self.params.font_size
    }

    pub fn color(&self) -> SerializableColor {
        self.params.color
    }

    /// Re-run the layout and keep the right edge in place.
    ///
    /// Columns grow leftward, so when the width changes the origin moves by
    /// the width delta. Returns that delta.
    pub fn relayout(&mut self, metrics: &dyn FontMetrics) -> f64 {
        let old_width = self.layout.width;
        self.layout = layout::layout(&self.content, &self.params, metrics);
        let dx = old_width - self.layout.width;
        self.position.x += dx;
        dx
    }

    pub fn set_text(&mut self, content: impl Into<String>, metrics: &dyn FontMetrics) {
        self.content = content.into();
        self.relayout(metrics);
    }

    pub fn set_font(&mut self, family: impl Into<String>, size: f64, metrics: &dyn FontMetrics) {
        self.params.font_family = family.into();
        self.params.font_size = size;
        self.relayout(metrics);
    }

    pub fn set_font_size(&mut self, size: f64, metrics: &dyn FontMetrics) {
        self.params.font_size = size;
        self.relayout(metrics);
    }

    /// Color does not move glyphs, so only the layout's color is refreshed.
    pub fn set_color(&mut self, color: SerializableColor) {
        self.params.color = color;
        self.layout.color = color;
    }

    pub fn set_chars_per_column(&mut self, chars: usize, metrics: &dyn FontMetrics) {
        self.params.chars_per_column = chars.max(1);
        self.relayout(metrics);
    }

    pub fn set_column_spacing(&mut self, spacing: f64, metrics: &dyn FontMetrics) {
        self.params.column_spacing = spacing;
        self.relayout(metrics);
    }

    pub fn set_box_height(&mut self, height: f64, metrics: &dyn FontMetrics) {
        self.params.box_height = height;
        self.relayout(metrics);
    }

    pub fn set_auto_height(&mut self, enabled: bool, metrics: &dyn FontMetrics) {
        self.params.auto_height = enabled;
        self.relayout(metrics);
    }

    pub fn set_manual_line_break(&mut self, enabled: bool, metrics: &dyn FontMetrics) {
        self.params.manual_line_break = enabled;
        self.relayout(metrics);
    }
}

impl ElementTrait for TextElement {
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
        self.layout.size()
    }

    fn anchors(&self) -> &'static [AnchorKind] {
        &[AnchorKind::TextBottom]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ScaledMetrics;

    fn params() -> LayoutParams {
        LayoutParams {
            font_family: "SimSun".to_string(),
            font_size: 24.0,
            column_spacing: 10.0,
            chars_per_column: 3,
            box_height: 400.0,
            auto_height: true,
            manual_line_break: true,
            color: SerializableColor::black(),
        }
    }

    #[test]
    fn test_text_creation() {
        let metrics = ScaledMetrics::default();
        let text = TextElement::new("竖排", params(), &metrics);
        assert_eq!(text.content(), "竖排");
        assert_eq!(text.layout().glyphs.len(), 2);
        assert!(text.size().width > 0.0);
        assert!(text.size().height > 0.0);
    }

    #[test]
    fn test_right_edge_stays_anchored() {
        let metrics = ScaledMetrics::default();
        let mut text = TextElement::new("一二", params(), &metrics).at(Point::new(300.0, 50.0));
        let right_edge = text.position.x + text.size().width;

        text.set_text("一二三四五六七", &metrics);
        assert_eq!(text.layout().columns, 3);
        assert!((text.position.x + text.size().width - right_edge).abs() < 1e-9);

        text.set_text("一", &metrics);
        assert!((text.position.x + text.size().width - right_edge).abs() < 1e-9);
        assert!((text.position.y - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_setters_relayout() {
        let metrics = ScaledMetrics::default();
        let mut text = TextElement::new("一二三四", params(), &metrics);
        assert_eq!(text.layout().columns, 2);

        text.set_chars_per_column(4, &metrics);
        assert_eq!(text.layout().columns, 1);

        let width_before = text.size().width;
        text.set_column_spacing(30.0, &metrics);
        assert!((text.size().width - (width_before + 20.0)).abs() < 1e-9);

        text.set_auto_height(false, &metrics);
        text.set_box_height(30.0, &metrics);
        assert_eq!(text.layout().columns, 4);
    }

    #[test]
    fn test_color_does_not_move() {
        let metrics = ScaledMetrics::default();
        let mut text = TextElement::new("一二", params(), &metrics);
        let glyphs = text.layout().glyphs.clone();
        let red = SerializableColor::new(255, 0, 0, 255);
        text.set_color(red);
        assert_eq!(text.color(), red);
        assert_eq!(text.layout().color, red);
        assert_eq!(text.layout().glyphs, glyphs);
    }
}
