//! Vertical glyph layout.
//!
//! Text flows top-to-bottom inside a column, and columns are ordered
//! right-to-left. Columns are generated left-to-right internally and the
//! whole block is shifted at the end so the first column sits rightmost.
//!
//! [`layout`] is a pure function of its inputs.

use crate::elements::SerializableColor;
use kurbo::{Affine, Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Line height as a multiple of the font's glyph height.
pub const LINE_HEIGHT_RATIO: f64 = 1.2;

/// Punctuation offset as a multiple of the font size.
pub const PUNCTUATION_OFFSET_RATIO: f64 = 0.4;

/// Extra space below the last glyph.
pub const BOTTOM_MARGIN: f64 = 5.0;

pub const DEFAULT_FONT_FAMILY: &str = "SimSun";
pub const DEFAULT_FONT_SIZE: f64 = 24.0;
pub const DEFAULT_BOX_HEIGHT: f64 = 400.0;
pub const DEFAULT_CHARS_PER_COLUMN: usize = 15;
pub const DEFAULT_COLUMN_SPACING: f64 = 10.0;

/// Characters drawn rotated by 90° so horizontal marks read along the column.
pub const ROTATE_CHARS: &[char] = &[
    '—', '…', '(', ')', '[', ']', '{', '}', '《', '》', '-', '_',
];

/// Punctuation nudged toward the upper-right of its cell.
pub const OFFSET_CHARS: &[char] = &[
    '，', '。', '、', '：', '；', '！', '？', ',', '.', '!', '?',
];

/// Whether `ch` is drawn rotated.
pub fn is_rotated(ch: char) -> bool {
    ROTATE_CHARS.contains(&ch)
}

/// Whether `ch` gets the punctuation offset.
pub fn is_offset(ch: char) -> bool {
    OFFSET_CHARS.contains(&ch)
}

/// Source of font measurements.
///
/// This is the seam to a real font backend. The layout only needs a glyph
/// cell height per font and a horizontal advance per character.
pub trait FontMetrics: std::fmt::Debug {
    /// Height of a glyph cell for the given font.
    fn height(&self, family: &str, size: f64) -> f64;

    /// Horizontal advance of `ch` for the given font.
    fn advance(&self, family: &str, size: f64, ch: char) -> f64;
}

/// Font metrics derived from the font size alone.
///
/// CJK and other non-ASCII characters are treated as full-width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledMetrics {
    /// Glyph cell height as a multiple of the font size.
    pub height_ratio: f64,
    /// Advance of full-width characters as a multiple of the font size.
    pub full_width_ratio: f64,
    /// Advance of ASCII characters as a multiple of the font size.
    pub half_width_ratio: f64,
}

impl ScaledMetrics {
    pub fn new(height_ratio: f64) -> Self {
        Self {
            height_ratio,
            ..Self::default()
        }
    }
}

impl Default for ScaledMetrics {
    fn default() -> Self {
        Self {
            height_ratio: 1.0,
            full_width_ratio: 1.0,
            half_width_ratio: 0.5,
        }
    }
}

impl FontMetrics for ScaledMetrics {
    fn height(&self, _family: &str, size: f64) -> f64 {
        size * self.height_ratio
    }

    fn advance(&self, _family: &str, size: f64, ch: char) -> f64 {
        if ch.is_ascii() {
            size * self.half_width_ratio
        } else {
            size * self.full_width_ratio
        }
    }
}

/// Parameters that affect glyph placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub font_family: String,
    pub font_size: f64,
    /// Gap between adjacent columns.
    pub column_spacing: f64,
    /// Column capacity when `auto_height` is on.
    pub chars_per_column: usize,
    /// Column height when `auto_height` is off.
    pub box_height: f64,
    pub auto_height: bool,
    /// Honor `\n` as a column break.
    pub manual_line_break: bool,
    pub color: SerializableColor,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_size: DEFAULT_FONT_SIZE,
            column_spacing: DEFAULT_COLUMN_SPACING,
            chars_per_column: DEFAULT_CHARS_PER_COLUMN,
            box_height: DEFAULT_BOX_HEIGHT,
            auto_height: true,
            manual_line_break: true,
            color: SerializableColor::black(),
        }
    }
}

impl LayoutParams {
    /// Horizontal distance between adjacent columns.
    pub fn column_step(&self) -> f64 {
        self.font_size + self.column_spacing
    }

    /// Height available to a column for glyphs of height `char_height`.
    pub fn effective_column_height(&self, char_height: f64) -> f64 {
        if self.auto_height {
            self.chars_per_column as f64 * char_height * LINE_HEIGHT_RATIO
        } else {
            self.box_height
        }
    }
}

/// Placement of a single glyph in element-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphPlacement {
    pub ch: char,
    /// Character index in the source text.
    pub index: usize,
    /// Logical column (0 is the first column, drawn rightmost).
    pub column: usize,
    /// Top-left of the unrotated glyph cell.
    pub origin: Point,
    /// Unrotated glyph cell size.
    pub size: Size,
    pub rotated: bool,
    pub offset: bool,
}

impl GlyphPlacement {
    /// Rotation in radians about the glyph's own center.
    pub fn rotation(&self) -> f64 {
        if self.rotated { FRAC_PI_2 } else { 0.0 }
    }

    /// Center of the glyph cell.
    pub fn center(&self) -> Point {
        self.origin + self.size.to_vec2() / 2.0
    }

    /// Transform from glyph space (cell top-left at the origin) to element space.
    pub fn transform(&self) -> Affine {
        let local_center = Point::new(self.size.width / 2.0, self.size.height / 2.0);
        Affine::translate(self.origin.to_vec2()) * Affine::rotate_about(self.rotation(), local_center)
    }

    /// Bounding box of the (possibly rotated) glyph in element space.
    pub fn bounds(&self) -> Rect {
        self.transform()
            .transform_rect_bbox(Rect::from_origin_size(Point::ZERO, self.size))
    }
}

/// Result of laying out a text block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub glyphs: Vec<GlyphPlacement>,
    /// Number of columns, at least one.
    pub columns: usize,
    pub width: f64,
    pub height: f64,
    pub color: SerializableColor,
}

impl TextLayout {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Glyphs belonging to one logical column.
    pub fn column(&self, column: usize) -> impl Iterator<Item = &GlyphPlacement> {
        self.glyphs.iter().filter(move |g| g.column == column)
    }
}

/// Lay out `text` in vertical columns.
pub fn layout(text: &str, params: &LayoutParams, metrics: &dyn FontMetrics) -> TextLayout {
    let char_height = metrics.height(&params.font_family, params.font_size);
    let column_step = params.column_step();
    let column_height = params.effective_column_height(char_height);
    let line_advance = char_height * LINE_HEIGHT_RATIO;
    let offset = params.font_size * PUNCTUATION_OFFSET_RATIO;

    let mut cursor_y = 0.0;
    let mut column = 0usize;
    let mut glyphs = Vec::new();

    for (index, ch) in text.chars().enumerate() {
        if ch == '\n' {
            if params.manual_line_break {
                cursor_y = 0.0;
                column += 1;
            }
            continue;
        }

        // Unconditional, even at the top of a column. Tall glyphs are never split.
        if cursor_y + char_height > column_height {
            cursor_y = 0.0;
            column += 1;
        }

        let rotated = is_rotated(ch);
        let offset_applies = is_offset(ch);

        let mut origin = Point::new(-(column as f64 * column_step), cursor_y);
        if offset_applies {
            origin.x += offset;
            origin.y -= offset;
        }

        glyphs.push(GlyphPlacement {
            ch,
            index,
            column,
            origin,
            size: Size::new(
                metrics.advance(&params.font_family, params.font_size, ch),
                char_height,
            ),
            rotated,
            offset: offset_applies,
        });
        cursor_y += line_advance;
    }

    let columns = column + 1;
    let width = columns as f64 * column_step;
    let shift = width - column_step;
    for glyph in &mut glyphs {
        glyph.origin.x += shift;
    }

    let height = glyphs
        .iter()
        .map(|g| g.origin.y + g.size.height)
        .reduce(f64::max)
        .map(|max_bottom| (max_bottom + BOTTOM_MARGIN).max(char_height))
        .unwrap_or(char_height);

    TextLayout {
        glyphs,
        columns,
        width,
        height,
        color: params.color,
    }
}
