//! Annotation label rasterization.
//!
//! A label is the text on a filled box with a border, both drawn in the
//! shape's color. The text color is picked for contrast with the box. Glyph
//! coverage comes from `ab_glyph` when a font is loaded; without one the
//! layout uses fixed monospace metrics and only the box is drawn.

use std::fmt;
use std::path::Path;
use std::sync::Once;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};
use image::{Rgba, RgbaImage};

use crate::error::LabelError;
use crate::shape::ShapeColor;

/// Space between the border and the text, in pixels.
pub const LABEL_PADDING: u32 = 8;
/// Border thickness in pixels.
pub const LABEL_BORDER: u32 = 2;
/// Largest font size a label is drawn at.
pub const MAX_FONT_SIZE: f32 = 512.0;
/// Widest label texture; longer text is clipped at the right edge.
pub const MAX_LABEL_WIDTH: u32 = 4096;
const DEFAULT_FONT_SIZE: f32 = 32.0;
/// Box fill opacity (~85%).
const BACKGROUND_ALPHA: u8 = 217;

const DARK_TEXT: [u8; 4] = [17, 17, 17, 255];
const LIGHT_TEXT: [u8; 4] = [245, 245, 245, 255];

// Monospace fallback metrics, in ems.
const FALLBACK_ADVANCE: f32 = 0.6;
const FALLBACK_ASCENT: f32 = 0.8;
const FALLBACK_DESCENT: f32 = -0.2;

static MISSING_FONT_WARNING: Once = Once::new();

/// A parsed label font.
#[derive(Clone)]
pub struct LabelFont {
    font: FontArc,
}

impl LabelFont {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, LabelError> {
        let font = FontArc::try_from_vec(data).map_err(|_| LabelError::InvalidFont)?;
        Ok(Self { font })
    }

    pub fn load(path: &Path) -> Result<Self, LabelError> {
        Self::from_bytes(std::fs::read(path)?)
    }
}

impl fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelFont")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

/// Colors for one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelStyle {
    pub background: [u8; 4],
    pub border: [u8; 4],
    pub text: [u8; 4],
}

impl LabelStyle {
    pub fn from_color(color: ShapeColor) -> Self {
        let text = if color.relative_luminance() > 0.5 {
            DARK_TEXT
        } else {
            LIGHT_TEXT
        };
        Self {
            background: color.to_rgba8(BACKGROUND_ALPHA),
            border: color.to_rgba8(255),
            text,
        }
    }
}

/// Measured label geometry, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLayout {
    pub width: u32,
    pub height: u32,
    pub font_size: f32,
    pub text_width: f32,
    /// Distance from the baseline to the top of the line box.
    pub ascent: f32,
    /// Distance from the baseline to the bottom (negative).
    pub descent: f32,
}

impl LabelLayout {
    pub fn measure(text: &str, font_size: f32, font: Option<&LabelFont>) -> Self {
        let font_size = sanitize_font_size(font_size);
        let (text_width, ascent, descent) = match font {
            Some(font) => {
                let scaled = font.font.as_scaled(PxScale::from(font_size));
                let mut width = 0.0;
                let mut previous = None;
                for c in text.chars() {
                    let id = scaled.glyph_id(c);
                    if let Some(prev) = previous {
                        width += scaled.kern(prev, id);
                    }
                    width += scaled.h_advance(id);
                    previous = Some(id);
                }
                (width, scaled.ascent(), scaled.descent())
            }
            None => (
                text.chars().count() as f32 * FALLBACK_ADVANCE * font_size,
                FALLBACK_ASCENT * font_size,
                FALLBACK_DESCENT * font_size,
            ),
        };

        // Sub-pixel overhang lands in the padding.
        let inset = 2 * (LABEL_PADDING + LABEL_BORDER);
        Self {
            width: (text_width.round().max(0.0) as u32)
                .saturating_add(inset)
                .min(MAX_LABEL_WIDTH),
            height: (ascent - descent).round().max(1.0) as u32 + inset,
            font_size,
            text_width,
            ascent,
            descent,
        }
    }
}

fn sanitize_font_size(font_size: f32) -> f32 {
    if !font_size.is_finite() || font_size < 1.0 {
        DEFAULT_FONT_SIZE
    } else if font_size > MAX_FONT_SIZE {
        tracing::warn!("Label font size {font_size} capped at {MAX_FONT_SIZE}");
        MAX_FONT_SIZE
    } else {
        font_size
    }
}

/// Draw `text` into a new RGBA image sized by [`LabelLayout::measure`].
pub fn rasterize_label(
    text: &str,
    font_size: f32,
    style: &LabelStyle,
    font: Option<&LabelFont>,
) -> RgbaImage {
    let layout = LabelLayout::measure(text, font_size, font);
    let mut image = RgbaImage::from_pixel(layout.width, layout.height, Rgba(style.background));

    let (w, h) = (layout.width, layout.height);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x < LABEL_BORDER || y < LABEL_BORDER || x >= w - LABEL_BORDER || y >= h - LABEL_BORDER {
            *pixel = Rgba(style.border);
        }
    }

    let Some(font) = font else {
        MISSING_FONT_WARNING.call_once(|| {
            tracing::warn!("No label font loaded; annotation labels will be drawn without text");
        });
        return image;
    };

    let scaled = font.font.as_scaled(PxScale::from(layout.font_size));
    let origin = (LABEL_PADDING + LABEL_BORDER) as f32;
    let baseline = origin + layout.ascent;
    let mut caret = origin;
    let mut previous = None;

    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(layout.font_size, point(caret, baseline));
        caret += scaled.h_advance(id);
        previous = Some(id);

        let Some(outlined) = font.font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i32 + gx as i32;
            let y = bounds.min.y as i32 + gy as i32;
            if x < 0 || y < 0 || x >= w as i32 || y >= h as i32 {
                return;
            }
            let pixel = image.get_pixel_mut(x as u32, y as u32);
            *pixel = blend(*pixel, style.text, coverage);
        });
    }

    image
}

fn blend(under: Rgba<u8>, over: [u8; 4], coverage: f32) -> Rgba<u8> {
    let a = coverage.clamp(0.0, 1.0);
    let mix = |u: u8, o: u8| (u as f32 * (1.0 - a) + o as f32 * a).round() as u8;
    Rgba([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
        mix(under[3], over[3]),
    ])
}
