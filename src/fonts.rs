//! Typefaces for the renderer
//!
//! Text is drawn either with a scalable TrueType/OpenType font rasterized by
//! `fontdue`, or with one of the embedded-graphics bitmap fonts compiled into
//! the binary. Loading a scalable font is best-effort; the bitmap fonts are
//! always available, so font selection can never fail a render.

use crate::canvas::{Canvas, Color};
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_10X20, FONT_7X13, FONT_9X15, FONT_9X18_BOLD},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{renderer::TextRenderer, Baseline, Text},
};
use std::{fs, path::Path, sync::Arc};
use tracing::{debug, warn};

/// Glyph coverage at or above this value becomes an ink pixel
const COVERAGE_THRESHOLD: u8 = 128;

/// Pixel sizes of the scalable font per role
pub const TITLE_PX: f32 = 40.0;
pub const HEADING_PX: f32 = 26.0;
pub const BODY_PX: f32 = 22.0;
pub const SMALL_PX: f32 = 16.0;

/// A font at a fixed size
#[derive(Clone)]
pub enum Typeface {
    /// Rasterized outline font at `px` pixels per em
    Scalable { font: Arc<fontdue::Font>, px: f32 },
    /// Built-in monospaced bitmap font
    Builtin(&'static MonoFont<'static>),
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Typeface::Scalable { px, .. } => write!(f, "Scalable({px}px)"),
            Typeface::Builtin(font) => write!(
                f,
                "Builtin({}x{})",
                font.character_size.width, font.character_size.height
            ),
        }
    }
}

impl Typeface {
    /// Rendered width of `text` in pixels.
    pub fn text_width(&self, text: &str) -> u32 {
        match self {
            Typeface::Scalable { font, px } => {
                let advance: f32 = text
                    .chars()
                    .map(|ch| font.metrics(ch, *px).advance_width)
                    .sum();
                advance.round().max(0.0) as u32
            }
            Typeface::Builtin(font) => MonoTextStyle::new(*font, BinaryColor::On)
                .measure_string(text, Point::zero(), Baseline::Top)
                .bounding_box
                .size
                .width,
        }
    }

    /// Line height in pixels.
    pub fn line_height(&self) -> u32 {
        match self {
            Typeface::Scalable { font, px } => match font.horizontal_line_metrics(*px) {
                Some(m) => (m.ascent - m.descent).ceil().max(1.0) as u32,
                None => px.ceil() as u32,
            },
            Typeface::Builtin(font) => font.character_size.height,
        }
    }

    /// Draw `text` with its top-left corner at `origin`.
    pub fn draw(&self, canvas: &mut Canvas, origin: Point, text: &str, color: BinaryColor) {
        match self {
            Typeface::Scalable { font, px } => {
                draw_scalable(canvas, font, *px, origin, text, color.into())
            }
            Typeface::Builtin(font) => {
                // Canvas drawing is infallible
                let _ = Text::with_baseline(
                    text,
                    origin,
                    MonoTextStyle::new(*font, color),
                    Baseline::Top,
                )
                .draw(canvas);
            }
        }
    }
}

fn draw_scalable(
    canvas: &mut Canvas,
    font: &fontdue::Font,
    px: f32,
    origin: Point,
    text: &str,
    color: Color,
) {
    let ascent = font
        .horizontal_line_metrics(px)
        .map(|m| m.ascent)
        .unwrap_or(px);
    let baseline = origin.y + ascent.round() as i32;
    let mut pen_x = origin.x as f32;

    for ch in text.chars() {
        let (metrics, coverage) = font.rasterize(ch, px);
        let left = pen_x.round() as i32 + metrics.xmin;
        let top = baseline - (metrics.ymin + metrics.height as i32);

        for (row, line) in coverage.chunks(metrics.width.max(1)).enumerate() {
            for (col, &value) in line.iter().enumerate() {
                if value < COVERAGE_THRESHOLD {
                    continue;
                }
                let x = left + col as i32;
                let y = top + row as i32;
                if x >= 0 && y >= 0 {
                    canvas.set_pixel(x as u32, y as u32, color);
                }
            }
        }
        pen_x += metrics.advance_width;
    }
}

/// Try to load the font at `path` for use at `px` pixels.
///
/// Returns `None` when the file cannot be read or parsed.
pub fn try_load_scalable_font(path: &Path, px: f32) -> Option<Typeface> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "font file not readable");
            return None;
        }
    };
    match fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default()) {
        Ok(font) => Some(Typeface::Scalable {
            font: Arc::new(font),
            px,
        }),
        Err(e) => {
            debug!(path = %path.display(), error = e, "font file not parseable");
            None
        }
    }
}

/// Typefaces for each text role of the layout
#[derive(Clone, Debug)]
pub struct FontSet {
    pub title: Typeface,
    pub heading: Typeface,
    pub body: Typeface,
    pub small: Typeface,
}

impl Default for FontSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FontSet {
    /// Bitmap fonts compiled into the binary.
    pub fn builtin() -> Self {
        FontSet {
            title: Typeface::Builtin(&FONT_10X20),
            heading: Typeface::Builtin(&FONT_9X18_BOLD),
            body: Typeface::Builtin(&FONT_9X15),
            small: Typeface::Builtin(&FONT_7X13),
        }
    }

    /// Load the scalable font at `path` for every role, falling back to the
    /// built-in fonts for all roles if any size fails to load.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };

        let scalable = (
            try_load_scalable_font(path, TITLE_PX),
            try_load_scalable_font(path, HEADING_PX),
            try_load_scalable_font(path, BODY_PX),
            try_load_scalable_font(path, SMALL_PX),
        );
        match scalable {
            (Some(title), Some(heading), Some(body), Some(small)) => FontSet {
                title,
                heading,
                body,
                small,
            },
            _ => {
                warn!(path = %path.display(), "failed to load scalable font, using built-in fonts");
                Self::builtin()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_font_falls_back() {
        assert!(try_load_scalable_font(Path::new("/nonexistent/font.ttf"), 20.0).is_none());

        let fonts = FontSet::load(Some(Path::new("/nonexistent/font.ttf")));
        assert!(matches!(fonts.title, Typeface::Builtin(_)));
        assert!(matches!(fonts.small, Typeface::Builtin(_)));
    }

    #[test]
    fn test_garbage_font_falls_back() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), b"definitely not a font").unwrap();
        assert!(try_load_scalable_font(file.path(), 20.0).is_none());
        assert!(matches!(
            FontSet::load(Some(file.path())).body,
            Typeface::Builtin(_)
        ));
    }

    fn fixture_font() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/fonts/DejaVuSans.ttf")
    }

    #[test]
    fn test_scalable_font_loads_for_every_role() {
        let fonts = FontSet::load(Some(&fixture_font()));
        for (typeface, expected_px) in [
            (&fonts.title, TITLE_PX),
            (&fonts.heading, HEADING_PX),
            (&fonts.body, BODY_PX),
            (&fonts.small, SMALL_PX),
        ] {
            match typeface {
                Typeface::Scalable { px, .. } => assert_eq!(*px, expected_px),
                other => panic!("expected scalable font, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_scalable_metrics() {
        let title = try_load_scalable_font(&fixture_font(), TITLE_PX).unwrap();
        let small = try_load_scalable_font(&fixture_font(), SMALL_PX).unwrap();

        assert_eq!(title.text_width(""), 0);
        assert!(title.text_width("Apple") > small.text_width("Apple"));
        assert!(title.text_width("Apple Pie") > title.text_width("Apple"));
        assert!(title.line_height() >= TITLE_PX as u32);
        assert!(small.line_height() < title.line_height());
    }

    #[test]
    fn test_scalable_draw_inks_within_line() {
        let font = try_load_scalable_font(&fixture_font(), BODY_PX).unwrap();
        let mut canvas = Canvas::new(200, 40);
        font.draw(&mut canvas, Point::new(4, 4), "Kiwi", BinaryColor::On);
        assert!(canvas.ink_count() > 0);

        // Nothing is drawn right of the measured advance
        let right = 4 + font.text_width("Kiwi") + 4;
        for x in right..200 {
            for y in 0..40 {
                assert_eq!(canvas.pixel(x, y), Some(Color::White));
            }
        }

        font.draw(&mut canvas, Point::new(4, 4), "Kiwi", BinaryColor::Off);
        assert_eq!(canvas.ink_count(), 0);
    }

    #[test]
    fn test_builtin_metrics() {
        let title = Typeface::Builtin(&FONT_10X20);
        assert_eq!(title.text_width("Apple"), 50);
        assert_eq!(title.text_width(""), 0);
        assert_eq!(title.line_height(), 20);
    }

    #[test]
    fn test_builtin_draw_uses_requested_color() {
        let mut canvas = Canvas::new(60, 20);
        let font = Typeface::Builtin(&FONT_9X15);
        font.draw(&mut canvas, Point::new(2, 2), "Kiwi", BinaryColor::On);
        let ink = canvas.ink_count();
        assert!(ink > 0);

        font.draw(&mut canvas, Point::new(2, 2), "Kiwi", BinaryColor::Off);
        assert_eq!(canvas.ink_count(), 0);
    }
}
