//! # Snapshot Rendering
//!
//! This module lays a [`Snapshot`] out on a fixed-size 1-bit canvas and
//! serializes it as a BMP for the TRMNL device. Layout is a pure function of
//! the snapshot and the configured geometry: identical input gives identical
//! bytes.
//!
//! ## Layout
//!
//! ```text
//! +------------------------------------------+
//! |################ Title ###################|  header band (inverted)
//! |                                          |
//! |  +----------------+  +----------------+  |
//! |  | Heading        |  | Heading        |  |  content panels
//! |  | Label    Value |  | Label    Value |  |  (per layout strategy)
//! |  +----------------+  +----------------+  |
//! |                                          |
//! |#Last Update: ...####################K of N|  footer band (inverted)
//! +------------------------------------------+
//! ```
//!
//! The content area is drawn by a [`LayoutStrategy`] picked from the shape of
//! the item: fruit records get nutrition and classification panels, anything
//! else a single key/value panel.

use crate::canvas::Canvas;
use crate::config::{Config, LayoutConfig};
use crate::fonts::{FontSet, Typeface};
use crate::formatters::{format_timestamp, sanitize_string, MAX_DISPLAY_LEN};
use crate::{Item, Snapshot};
use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
};
use serde_json::Value;
use thiserror::Error;

/// Heading shown on every error bitmap
pub const ERROR_HEADING: &str = "Error";

/// Inset of the error heading and message from the top-left corner
const ERROR_MARGIN: u32 = 20;

/// Horizontal inset of footer text
const FOOTER_INSET: u32 = 10;

/// Panel border width
const BORDER: u32 = 2;

/// Gap between a panel border and its text
const PANEL_INSET: u32 = 14;

/// Extra vertical space between list rows
const ROW_GAP: u32 = 8;

/// Errors raised while laying out a snapshot.
#[derive(Error, Debug, PartialEq)]
pub enum RenderError {
    /// The item lacks a field its layout requires
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Draws the content area for one shape of item.
pub trait LayoutStrategy: Sync {
    /// Title shown in the header band.
    fn title(&self, item: &Item, default_title: &str) -> Result<String, RenderError>;

    /// Draw the panels inside `content`.
    fn draw_content(
        &self,
        canvas: &mut Canvas,
        fonts: &FontSet,
        content: Rectangle,
        item: &Item,
    ) -> Result<(), RenderError>;
}

/// Nutrition and classification panels for fruit records.
pub struct FruitLayout;

/// One key/value panel for records of any shape.
pub struct GenericLayout;

static FRUIT_LAYOUT: FruitLayout = FruitLayout;
static GENERIC_LAYOUT: GenericLayout = GenericLayout;

/// Pick the layout for an item by its shape.
pub fn select_layout(item: &Item) -> &'static dyn LayoutStrategy {
    if item.has_field("nutritions") || item.has_field("family") {
        &FRUIT_LAYOUT
    } else {
        &GENERIC_LAYOUT
    }
}

/// Nutrients shown in the fruit panel: (record key, label, unit)
const NUTRIENTS: [(&str, &str, &str); 5] = [
    ("calories", "Calories", "kcal"),
    ("carbohydrates", "Carbohydrates", "g"),
    ("protein", "Protein", "g"),
    ("fat", "Fat", "g"),
    ("sugar", "Sugar", "g"),
];

impl LayoutStrategy for FruitLayout {
    fn title(&self, item: &Item, _default_title: &str) -> Result<String, RenderError> {
        // A present name of any type is shown; only an absent one fails
        item.fields
            .get("name")
            .map(format_value)
            .ok_or(RenderError::MissingField("name"))
    }

    fn draw_content(
        &self,
        canvas: &mut Canvas,
        fonts: &FontSet,
        content: Rectangle,
        item: &Item,
    ) -> Result<(), RenderError> {
        if !item.has_field("nutritions") {
            return Err(RenderError::MissingField("nutritions"));
        }
        // Non-object nutrition data renders as empty rows
        let nutritions = item.nested("nutritions");

        let nutrition_rows: Vec<(String, String)> = NUTRIENTS
            .iter()
            .map(|(key, label, unit)| {
                let value = match nutritions.and_then(|n| n.get(*key)) {
                    Some(Value::Number(n)) => format!("{} {}", format_number(n), unit),
                    Some(other) => format_value(other),
                    None => "-".to_string(),
                };
                (label.to_string(), value)
            })
            .collect();

        let classification_rows: Vec<(String, String)> = [
            ("family", "Family"),
            ("order", "Order"),
            ("genus", "Genus"),
        ]
        .iter()
        .map(|(key, label)| {
            let value = item
                .fields
                .get(*key)
                .map(format_value)
                .unwrap_or_else(|| "-".to_string());
            (label.to_string(), value)
        })
        .chain(std::iter::once(("ID".to_string(), item.id.to_string())))
        .collect();

        let (left, right) = split_columns(content);
        draw_panel(canvas, fonts, left, "Nutrition (per 100g)", &nutrition_rows);
        draw_panel(canvas, fonts, right, "Classification", &classification_rows);
        Ok(())
    }
}

impl LayoutStrategy for GenericLayout {
    fn title(&self, _item: &Item, default_title: &str) -> Result<String, RenderError> {
        Ok(sanitize_string(default_title, MAX_DISPLAY_LEN))
    }

    fn draw_content(
        &self,
        canvas: &mut Canvas,
        fonts: &FontSet,
        content: Rectangle,
        item: &Item,
    ) -> Result<(), RenderError> {
        let heading = match item.name() {
            Some(name) => sanitize_string(name, MAX_DISPLAY_LEN),
            None => format!("Item #{}", item.id),
        };
        let rows: Vec<(String, String)> = item
            .fields
            .iter()
            .filter(|(key, value)| key.as_str() != "name" && is_scalar(value))
            .map(|(key, value)| (label_for_key(key), format_value(value)))
            .collect();

        draw_panel(canvas, fonts, content, &heading, &rows);
        Ok(())
    }
}

/// Renders snapshots and error messages to BMP bytes.
///
/// Constructed once at startup; fonts are loaded up front so every render
/// uses the same typefaces.
pub struct DisplayRenderer {
    width: u32,
    height: u32,
    layout: LayoutConfig,
    title: String,
    fonts: FontSet,
}

impl DisplayRenderer {
    pub fn new(width: u32, height: u32, layout: LayoutConfig, fonts: FontSet) -> Self {
        Self {
            width,
            height,
            layout,
            title: "Fruit of the Day".to_string(),
            fonts,
        }
    }

    /// Renderer for the configured display, loading the configured font if any.
    pub fn from_config(config: &Config) -> Self {
        let fonts = FontSet::load(config.display.font_path.as_deref());
        Self::new(
            config.display.width,
            config.display.height,
            config.layout,
            fonts,
        )
        .with_title(config.display.title.clone())
    }

    /// Header title used by layouts without their own title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Render a snapshot to BMP bytes.
    pub fn render(&self, snapshot: &Snapshot) -> Result<Vec<u8>, RenderError> {
        Ok(self.render_canvas(snapshot)?.to_bmp())
    }

    /// Render a snapshot to a canvas.
    pub fn render_canvas(&self, snapshot: &Snapshot) -> Result<Canvas, RenderError> {
        let strategy = select_layout(&snapshot.item);
        let title = strategy.title(&snapshot.item, &self.title)?;

        let mut canvas = Canvas::new(self.width, self.height);
        self.draw_header(&mut canvas, &title);
        strategy.draw_content(&mut canvas, &self.fonts, self.content_area(), &snapshot.item)?;
        self.draw_status_bar(&mut canvas, snapshot);
        Ok(canvas)
    }

    /// Render an error bitmap. Never fails; long messages are wrapped and
    /// whatever does not fit is clipped.
    pub fn render_error(&self, message: &str) -> Vec<u8> {
        self.error_canvas(message).to_bmp()
    }

    pub fn error_canvas(&self, message: &str) -> Canvas {
        let mut canvas = Canvas::new(self.width, self.height);
        let heading_font = &self.fonts.title;
        let body_font = &self.fonts.body;

        heading_font.draw(
            &mut canvas,
            point(ERROR_MARGIN, ERROR_MARGIN),
            ERROR_HEADING,
            BinaryColor::On,
        );

        let max_width = self.width.saturating_sub(2 * ERROR_MARGIN);
        let line_height = body_font.line_height();
        let mut y = ERROR_MARGIN + heading_font.line_height() + 10;
        for line in wrap_text(body_font, message, max_width) {
            if y >= self.height {
                break;
            }
            body_font.draw(&mut canvas, point(ERROR_MARGIN, y), &line, BinaryColor::On);
            y += line_height;
        }
        canvas
    }

    /// Status bar text for the left side of the footer.
    pub fn status_text(snapshot: &Snapshot) -> String {
        format!("Last Update: {}", format_timestamp(&snapshot.timestamp))
    }

    /// Region between the header and footer bands, inset by the padding.
    pub fn content_area(&self) -> Rectangle {
        let padding = self.layout.padding;
        let width = self.width.saturating_sub(padding.saturating_mul(2));
        let height = self
            .height
            .saturating_sub(self.layout.header_height)
            .saturating_sub(self.layout.footer_height)
            .saturating_sub(padding.saturating_mul(2));
        Rectangle::new(
            point(padding, self.layout.header_height.saturating_add(padding)),
            Size::new(width, height),
        )
    }

    fn draw_header(&self, canvas: &mut Canvas, title: &str) {
        let band_height = self.layout.header_height.min(self.height);
        fill_band(canvas, 0, band_height);

        let font = &self.fonts.title;
        let y = band_height.saturating_sub(font.line_height()) / 2;
        draw_centered(canvas, font, title, 0, self.width, y, BinaryColor::Off);
    }

    fn draw_status_bar(&self, canvas: &mut Canvas, snapshot: &Snapshot) {
        let band_height = self.layout.footer_height.min(self.height);
        let bar_y = self.height - band_height;
        fill_band(canvas, bar_y, band_height);

        let font = &self.fonts.small;
        let y = bar_y + band_height.saturating_sub(font.line_height()) / 2;

        let status = Self::status_text(snapshot);
        font.draw(canvas, point(FOOTER_INSET, y), &status, BinaryColor::Off);

        let position = snapshot.position_label();
        let x = self
            .width
            .saturating_sub(FOOTER_INSET)
            .saturating_sub(font.text_width(&position));
        font.draw(canvas, point(x, y), &position, BinaryColor::Off);
    }
}

/// Left origin that centers a `text_width` wide string in a region.
pub fn centered_x(region_x: u32, region_width: u32, text_width: u32) -> u32 {
    region_x + region_width.saturating_sub(text_width) / 2
}

/// Greedy word wrap to `max_width` pixels. Words wider than a line are
/// broken between characters; explicit newlines start a new line.
pub fn wrap_text(font: &Typeface, text: &str, max_width: u32) -> Vec<String> {
    let mut lines = Vec::new();
    if max_width == 0 {
        return lines;
    }

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if font.text_width(&candidate) <= max_width {
                line = candidate;
                continue;
            }

            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            for ch in word.chars() {
                line.push(ch);
                if font.text_width(&line) > max_width && line.chars().count() > 1 {
                    line.pop();
                    lines.push(std::mem::replace(&mut line, ch.to_string()));
                }
            }
        }
        lines.push(line);
    }
    lines
}

fn point(x: u32, y: u32) -> Point {
    Point::new(x as i32, y as i32)
}

fn fill_band(canvas: &mut Canvas, y: u32, height: u32) {
    let width = canvas.width();
    // Canvas drawing is infallible
    let _ = Rectangle::new(point(0, y), Size::new(width, height))
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
        .draw(canvas);
}

fn draw_centered(
    canvas: &mut Canvas,
    font: &Typeface,
    text: &str,
    region_x: u32,
    region_width: u32,
    y: u32,
    color: BinaryColor,
) {
    let x = centered_x(region_x, region_width, font.text_width(text));
    font.draw(canvas, point(x, y), text, color);
}

/// Split a region into two equal columns separated by a gutter.
fn split_columns(area: Rectangle) -> (Rectangle, Rectangle) {
    let gutter = (area.size.width / 20).max(BORDER * 4);
    let column_width = area.size.width.saturating_sub(gutter) / 2;
    let size = Size::new(column_width, area.size.height);
    let left = Rectangle::new(area.top_left, size);
    let right = Rectangle::new(
        area.top_left + Point::new((column_width + gutter) as i32, 0),
        size,
    );
    (left, right)
}

/// Bordered panel with a heading and a two-column label/value list.
/// Rows that do not fit above the bottom border are left out.
fn draw_panel(
    canvas: &mut Canvas,
    fonts: &FontSet,
    area: Rectangle,
    heading: &str,
    rows: &[(String, String)],
) {
    let border = PrimitiveStyleBuilder::new()
        .stroke_color(BinaryColor::On)
        .stroke_width(BORDER)
        .stroke_alignment(StrokeAlignment::Inside)
        .build();
    let _ = area.into_styled(border).draw(canvas);

    let left = area.top_left.x.max(0) as u32 + PANEL_INSET;
    let bottom = (area.top_left.y.max(0) as u32 + area.size.height).saturating_sub(PANEL_INSET);
    let value_x = area.top_left.x.max(0) as u32 + area.size.width / 2;
    let mut y = area.top_left.y.max(0) as u32 + PANEL_INSET;

    let heading_height = fonts.heading.line_height();
    if y + heading_height > bottom {
        return;
    }
    fonts
        .heading
        .draw(canvas, point(left, y), heading, BinaryColor::On);
    y += heading_height + ROW_GAP / 2;

    // Rule under the heading
    let rule_width = area.size.width.saturating_sub(2 * PANEL_INSET);
    let _ = Rectangle::new(point(left, y), Size::new(rule_width, 1))
        .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
        .draw(canvas);
    y += ROW_GAP;

    let row_height = fonts.body.line_height();
    for (label, value) in rows {
        if y + row_height > bottom {
            break;
        }
        fonts.body.draw(canvas, point(left, y), label, BinaryColor::On);
        fonts.body.draw(canvas, point(value_x, y), value, BinaryColor::On);
        y += row_height + ROW_GAP;
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Whole numbers without decimals, everything else with one decimal.
fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    let value = n.as_f64().unwrap_or(0.0);
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => sanitize_string(s, MAX_DISPLAY_LEN),
        Value::Number(n) => format_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(_) | Value::Object(_) => "...".to_string(),
    }
}

/// `sugar_content` -> `Sugar content`
fn label_for_key(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
