//! PDF layout sink built on `lopdf`.
//!
//! Content is laid out top to bottom inside the theme's margins. Text uses
//! the base-14 Type1 fonts with WinAnsi encoding, so no font files are
//! embedded; line breaking is greedy over per-font average glyph widths.
//! A page is closed when the next line, row or image would cross the bottom
//! margin, or on an explicit [`LayoutSink::page_break`].
//!
//! Images are decoded with the `image` crate, flattened onto white and
//! embedded as JPEG (`DCTDecode`) XObjects, which keeps every input format
//! on one code path.

use crate::config::ImageBox;
use crate::pipeline::sink::{HeadingLevel, LayoutSink, SinkError, TextRole};
use crate::theme::{ColorPalette, Rgb, ThemeSpec};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Standard Type1 text fonts every PDF viewer provides.
const BASE14_TEXT_FONTS: &[&str] = &[
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
];

/// Hard wrap for code listings, in characters.
const CODE_MAX_COLUMNS: usize = 100;
const CODE_PADDING: f32 = 6.0;
const CELL_PADDING: f32 = 4.0;
const BULLET_INDENT: f32 = 14.0;
const CAPTION_FONT_SIZE: f32 = 9.0;
const JPEG_QUALITY: u8 = 90;

const CAPTION_GREY: Rgb = Rgb(0.4, 0.4, 0.4);
const TABLE_BODY_FILL: Rgb = Rgb(245.0 / 255.0, 245.0 / 255.0, 220.0 / 255.0);
const TABLE_HEADER_TEXT: Rgb = Rgb(245.0 / 255.0, 245.0 / 255.0, 245.0 / 255.0);

// ── Fonts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FontSlot {
    Heading,
    Body,
    Oblique,
    Code,
}

impl FontSlot {
    const ALL: [FontSlot; 4] = [
        FontSlot::Heading,
        FontSlot::Body,
        FontSlot::Oblique,
        FontSlot::Code,
    ];

    /// Name of the font in the page resource dictionary.
    fn resource(self) -> &'static str {
        match self {
            FontSlot::Heading => "FH",
            FontSlot::Body => "FB",
            FontSlot::Oblique => "FI",
            FontSlot::Code => "FC",
        }
    }
}

#[derive(Debug, Clone)]
struct Fonts {
    heading: String,
    body: String,
    oblique: String,
    code: String,
}

impl Fonts {
    fn from_theme(theme: &ThemeSpec) -> Self {
        let body = base14_or(&theme.fonts.body, "Helvetica");
        Self {
            heading: base14_or(&theme.fonts.heading, "Helvetica-Bold"),
            oblique: oblique_of(&body),
            code: base14_or(&theme.fonts.code, "Courier"),
            body,
        }
    }

    fn base_name(&self, slot: FontSlot) -> &str {
        match slot {
            FontSlot::Heading => &self.heading,
            FontSlot::Body => &self.body,
            FontSlot::Oblique => &self.oblique,
            FontSlot::Code => &self.code,
        }
    }

    fn text_width(&self, slot: FontSlot, text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * width_factor(self.base_name(slot)) * size
    }
}

fn base14_or(name: &str, fallback: &str) -> String {
    if BASE14_TEXT_FONTS.contains(&name) {
        name.to_string()
    } else {
        warn!("Font '{}' is not a standard PDF font; using {}", name, fallback);
        fallback.to_string()
    }
}

fn oblique_of(body: &str) -> String {
    match body {
        "Helvetica" => "Helvetica-Oblique",
        "Helvetica-Bold" => "Helvetica-BoldOblique",
        "Times-Roman" => "Times-Italic",
        "Times-Bold" => "Times-BoldItalic",
        "Courier" => "Courier-Oblique",
        "Courier-Bold" => "Courier-BoldOblique",
        other => other,
    }
    .to_string()
}

/// Average advance width as a fraction of the font size.
fn width_factor(base_name: &str) -> f32 {
    if base_name.starts_with("Courier") {
        0.6
    } else if base_name.contains("Bold") {
        0.56
    } else if base_name.starts_with("Times") {
        0.47
    } else {
        0.52
    }
}

// ── Colours ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Palette {
    primary: Rgb,
    secondary: Rgb,
    accent: Rgb,
    text: Rgb,
    code_bg: Rgb,
}

impl Palette {
    fn from_theme(colors: &ColorPalette) -> Self {
        let defaults = ColorPalette::default();
        let pick = |value: &str, fallback: &str| {
            Rgb::from_hex(value).unwrap_or_else(|| {
                warn!("Invalid colour '{}' in theme; using {}", value, fallback);
                Rgb::from_hex(fallback).unwrap_or(Rgb::BLACK)
            })
        };
        Self {
            primary: pick(&colors.primary, &defaults.primary),
            secondary: pick(&colors.secondary, &defaults.secondary),
            accent: pick(&colors.accent, &defaults.accent),
            text: pick(&colors.text, &defaults.text),
            code_bg: pick(&colors.code_bg, &defaults.code_bg),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    font: FontSlot,
    size: f32,
    color: Rgb,
    centered: bool,
    space_before: f32,
    space_after: f32,
}

// ── Sink ─────────────────────────────────────────────────────────────────

/// Production [`LayoutSink`] writing a PDF file.
pub struct PdfSink {
    target: PathBuf,
    title: String,
    theme: ThemeSpec,
    fonts: Fonts,
    palette: Palette,
    doc: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    page_ids: Vec<ObjectId>,
    xobjects: Vec<(String, ObjectId)>,
    /// Operations of the page being filled.
    ops: Vec<Operation>,
    /// Top of the free area on the current page, in PDF user space.
    y: f32,
    page_has_content: bool,
    finalized: bool,
}

impl PdfSink {
    /// A sink that writes `target` when finalized. Nothing touches the file
    /// system before then.
    pub fn new(theme: &ThemeSpec, title: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        Self {
            target: target.into(),
            title: title.into(),
            fonts: Fonts::from_theme(theme),
            palette: Palette::from_theme(&theme.colors),
            theme: theme.clone(),
            doc,
            pages_id,
            resources_id,
            page_ids: Vec::new(),
            xobjects: Vec::new(),
            ops: Vec::new(),
            y: theme.page_height - theme.margin_top,
            page_has_content: false,
            finalized: false,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Physical pages so far, counting the one being filled.
    pub fn page_count(&self) -> usize {
        self.page_ids.len() + usize::from(self.page_has_content)
    }

    fn top(&self) -> f32 {
        self.theme.page_height - self.theme.margin_top
    }

    fn bottom(&self) -> f32 {
        self.theme.margin_bottom
    }

    fn left(&self) -> f32 {
        self.theme.margin_left
    }

    fn width(&self) -> f32 {
        self.theme.content_width()
    }

    fn line_height(&self, size: f32) -> f32 {
        size * self.theme.line_spacing.max(1.0)
    }

    fn role_style(&self, role: TextRole) -> TextStyle {
        let t = &self.theme;
        let ps = t.paragraph_spacing;
        let body = TextStyle {
            font: FontSlot::Body,
            size: t.body_font_size as f32,
            color: self.palette.text,
            centered: false,
            space_before: 0.0,
            space_after: ps,
        };
        match role {
            TextRole::Title => TextStyle {
                font: FontSlot::Heading,
                size: t.title_font_size as f32,
                color: self.palette.primary,
                centered: true,
                space_after: ps * 5.0,
                ..body
            },
            TextRole::Subtitle => TextStyle {
                size: t.subtitle_font_size as f32,
                color: self.palette.secondary,
                centered: true,
                space_after: ps * 3.0,
                ..body
            },
            TextRole::Body => body,
            TextRole::Caption => TextStyle {
                size: CAPTION_FONT_SIZE,
                color: CAPTION_GREY,
                centered: true,
                ..body
            },
            TextRole::Placeholder => TextStyle {
                font: FontSlot::Oblique,
                color: self.palette.accent,
                ..body
            },
        }
    }

    fn heading_style(&self, level: HeadingLevel) -> TextStyle {
        let t = &self.theme;
        let ps = t.paragraph_spacing;
        let (size, color, space) = match level {
            HeadingLevel::H1 => (t.h1_font_size, self.palette.primary, ps * 2.0),
            HeadingLevel::H2 => (t.h2_font_size, self.palette.secondary, ps),
            HeadingLevel::H3 => (t.h3_font_size, self.palette.text, ps * 0.8),
        };
        TextStyle {
            font: FontSlot::Heading,
            size: size as f32,
            color,
            centered: false,
            space_before: space,
            space_after: space,
        }
    }

    // ── Page management ──────────────────────────────────────────────────

    /// Make room for `height` points, opening a new page when needed.
    fn ensure_space(&mut self, height: f32) -> Result<(), SinkError> {
        if self.y - height < self.bottom() {
            if self.page_has_content {
                self.finish_page()?;
            } else {
                // Leading spacers pushed us down; content still starts this page.
                self.y = self.top();
            }
        }
        Ok(())
    }

    fn finish_page(&mut self) -> Result<(), SinkError> {
        let content = Content {
            operations: std::mem::take(&mut self.ops),
        };
        let bytes = content
            .encode()
            .map_err(|e| SinkError::Pdf(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), bytes));

        let page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                self.theme.page_width.into(),
                self.theme.page_height.into(),
            ],
            "Contents" => content_id,
            "Resources" => self.resources_id,
        };
        let page_id = self.doc.add_object(page);
        self.page_ids.push(page_id);
        debug!("Closed PDF page {}", self.page_ids.len());

        self.y = self.top();
        self.page_has_content = false;
        Ok(())
    }

    // ── Drawing ──────────────────────────────────────────────────────────

    fn draw_text(&mut self, text: &str, x: f32, baseline: f32, font: FontSlot, size: f32, color: Rgb) {
        if text.is_empty() {
            return;
        }
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource().as_bytes().to_vec()), size.into()],
        ));
        self.ops.push(fill_color(color));
        self.ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(to_win_ansi(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.ops.push(fill_color(color));
        self.ops.push(Operation::new(
            "re",
            vec![x.into(), y.into(), w.into(), h.into()],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn wrap(&self, text: &str, font: FontSlot, size: f32, max_width: f32) -> Vec<String> {
        let fonts = &self.fonts;
        wrap_text(text, max_width, |s| fonts.text_width(font, s, size))
    }

    /// Lay out wrapped text in `style`, indented by `indent` points.
    fn write_text(&mut self, text: &str, style: TextStyle, indent: f32) -> Result<(), SinkError> {
        if self.page_has_content {
            self.y -= style.space_before;
        }
        let width = self.width() - indent;
        let line_height = self.line_height(style.size);

        for line in self.wrap(text, style.font, style.size, width) {
            self.ensure_space(line_height)?;
            let mut x = self.left() + indent;
            if style.centered {
                let w = self.fonts.text_width(style.font, &line, style.size);
                x += ((width - w) / 2.0).max(0.0);
            }
            let baseline = self.y - style.size;
            self.draw_text(&line, x, baseline, style.font, style.size, style.color);
            self.y -= line_height;
            self.page_has_content = true;
        }
        self.y -= style.space_after;
        Ok(())
    }

    fn table_row(&mut self, cells: &[String], column_width: f32, header: bool) -> Result<(), SinkError> {
        let body_size = self.theme.body_font_size as f32;
        let (font, size, fill, text_color) = if header {
            (FontSlot::Heading, body_size, self.palette.primary, TABLE_HEADER_TEXT)
        } else {
            (FontSlot::Body, (body_size - 1.0).max(6.0), TABLE_BODY_FILL, self.palette.text)
        };
        let inner = (column_width - 2.0 * CELL_PADDING).max(1.0);
        let wrapped: Vec<Vec<String>> = cells
            .iter()
            .map(|cell| self.wrap(cell, font, size, inner))
            .collect();
        let line_height = self.line_height(size);
        let max_lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
        let row_height = max_lines as f32 * line_height + 2.0 * CELL_PADDING;

        self.ensure_space(row_height)?;
        let left = self.left();
        let top = self.y;
        let row_bottom = top - row_height;

        self.fill_rect(left, row_bottom, column_width * cells.len() as f32, row_height, fill);

        self.ops.push(Operation::new("w", vec![1.0_f32.into()]));
        self.ops.push(stroke_color(Rgb::BLACK));
        for i in 0..cells.len() {
            let x = left + i as f32 * column_width;
            self.ops.push(Operation::new(
                "re",
                vec![x.into(), row_bottom.into(), column_width.into(), row_height.into()],
            ));
        }
        self.ops.push(Operation::new("S", vec![]));

        for (i, lines) in wrapped.iter().enumerate() {
            let x = left + i as f32 * column_width + CELL_PADDING;
            for (j, line) in lines.iter().enumerate() {
                let baseline = top - CELL_PADDING - j as f32 * line_height - size;
                self.draw_text(line, x, baseline, font, size, text_color);
            }
        }

        self.y = row_bottom;
        self.page_has_content = true;
        Ok(())
    }

    /// Decode, flatten and register an image XObject. Returns its resource
    /// name and pixel size.
    fn embed_image(&mut self, path: &Path) -> Result<(String, u32, u32), SinkError> {
        let image_error = |reason: String| SinkError::Image {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SinkError::MissingImage {
                    path: path.to_path_buf(),
                }
            } else {
                image_error(e.to_string())
            }
        })?;
        let decoded = image::load_from_memory(&bytes).map_err(|e| image_error(e.to_string()))?;
        let (w, h) = (decoded.width(), decoded.height());
        if w == 0 || h == 0 {
            return Err(image_error("image has no pixels".to_string()));
        }

        let rgb = flatten_onto_white(&decoded);
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|e| image_error(e.to_string()))?;

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        let id = self.doc.add_object(stream);
        let name = format!("Im{}", self.xobjects.len() + 1);
        self.xobjects.push((name.clone(), id));
        debug!("Embedded {} ({}x{} px) as /{}", path.display(), w, h, name);
        Ok((name, w, h))
    }

    fn write_document(&mut self) -> Result<(), SinkError> {
        let mut fonts = Dictionary::new();
        for slot in FontSlot::ALL {
            let font = dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => Object::Name(self.fonts.base_name(slot).as_bytes().to_vec()),
                "Encoding" => "WinAnsiEncoding",
            };
            let id = self.doc.add_object(font);
            fonts.set(slot.resource(), id);
        }

        let mut resources = dictionary! { "Font" => fonts };
        if !self.xobjects.is_empty() {
            let mut xobjects = Dictionary::new();
            for (name, id) in &self.xobjects {
                xobjects.set(name.as_str(), *id);
            }
            resources.set("XObject", xobjects);
        }
        self.doc
            .objects
            .insert(self.resources_id, Object::Dictionary(resources));

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::String(to_win_ansi(&self.title), StringFormat::Literal),
            "Producer" => Object::String(
                format!("docpress {}", env!("CARGO_PKG_VERSION")).into_bytes(),
                StringFormat::Literal,
            ),
        });
        self.doc.trailer.set("Info", info_id);

        let mut writer = BufWriter::new(File::create(&self.target)?);
        self.doc
            .save_to(&mut writer)
            .map_err(|e| SinkError::Pdf(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

impl LayoutSink for PdfSink {
    fn heading(&mut self, text: &str, level: HeadingLevel) -> Result<(), SinkError> {
        let style = self.heading_style(level);
        // Keep a heading together with at least one following body line.
        let body = self.theme.body_font_size as f32;
        self.ensure_space(self.line_height(style.size) + self.line_height(body))?;
        self.write_text(text, style, 0.0)
    }

    fn paragraph(&mut self, text: &str, role: TextRole) -> Result<(), SinkError> {
        let style = self.role_style(role);
        self.write_text(text, style, 0.0)
    }

    fn bullet_list(&mut self, items: &[String]) -> Result<(), SinkError> {
        let style = self.role_style(TextRole::Body);
        let line_height = self.line_height(style.size);
        let width = self.width() - BULLET_INDENT;

        for item in items {
            for (i, line) in self.wrap(item, style.font, style.size, width).into_iter().enumerate() {
                self.ensure_space(line_height)?;
                let baseline = self.y - style.size;
                if i == 0 {
                    let x = self.left() + 2.0;
                    self.draw_text("\u{2022}", x, baseline, style.font, style.size, style.color);
                }
                let x = self.left() + BULLET_INDENT;
                self.draw_text(&line, x, baseline, style.font, style.size, style.color);
                self.y -= line_height;
                self.page_has_content = true;
            }
            self.y -= style.space_after;
        }
        Ok(())
    }

    fn table(&mut self, headers: Option<&[String]>, rows: &[Vec<String>]) -> Result<(), SinkError> {
        let columns = headers
            .map(<[String]>::len)
            .or_else(|| rows.first().map(Vec::len))
            .unwrap_or(0);
        if columns == 0 {
            return Err(SinkError::Table("table has no columns".to_string()));
        }
        if rows.is_empty() {
            return Err(SinkError::Table("table has no rows".to_string()));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns) {
            return Err(SinkError::Table(format!(
                "row {} has {} cells, expected {}",
                i + 1,
                row.len(),
                columns
            )));
        }

        let column_width = self.width() / columns as f32;
        if let Some(headers) = headers {
            self.table_row(headers, column_width, true)?;
        }
        for row in rows {
            self.table_row(row, column_width, false)?;
        }
        self.y -= self.theme.paragraph_spacing;
        Ok(())
    }

    fn image(&mut self, path: &Path, size: ImageBox) -> Result<(), SinkError> {
        if !size.is_valid() {
            return Err(SinkError::Image {
                path: path.to_path_buf(),
                reason: format!("invalid image box {}×{}", size.width_pt, size.height_pt),
            });
        }
        let (name, px_w, px_h) = self.embed_image(path)?;

        let scale = (size.width_pt / px_w as f32).min(size.height_pt / px_h as f32);
        let (mut w, mut h) = (px_w as f32 * scale, px_h as f32 * scale);
        let shrink = (self.width() / w).min((self.top() - self.bottom()) / h).min(1.0);
        w *= shrink;
        h *= shrink;

        self.ensure_space(h)?;
        let x = self.left() + (self.width() - w) / 2.0;
        let y = self.y - h;
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                w.into(),
                0.0_f32.into(),
                0.0_f32.into(),
                h.into(),
                x.into(),
                y.into(),
            ],
        ));
        self.ops.push(Operation::new(
            "Do",
            vec![Object::Name(name.into_bytes())],
        ));
        self.ops.push(Operation::new("Q", vec![]));

        self.y = y - self.theme.paragraph_spacing;
        self.page_has_content = true;
        Ok(())
    }

    fn code_block(
        &mut self,
        code: &str,
        language: Option<&str>,
        line_numbers: bool,
    ) -> Result<(), SinkError> {
        if let Some(lang) = language {
            debug!("Code block ({}), {} bytes", lang, code.len());
        }
        let size = self.theme.code_font_size as f32;
        let line_height = self.line_height(size);
        let char_width = self.fonts.text_width(FontSlot::Code, "M", size).max(0.1);
        let fit = ((self.width() - 2.0 * CODE_PADDING) / char_width).floor() as usize;
        let columns = fit.clamp(1, CODE_MAX_COLUMNS);

        let left = self.left();
        let width = self.width();
        let bg = self.palette.code_bg;
        let color = self.palette.text;

        self.ensure_space(CODE_PADDING + line_height)?;
        self.fill_rect(left, self.y - CODE_PADDING, width, CODE_PADDING, bg);
        self.y -= CODE_PADDING;

        for line in code_lines(code, line_numbers, columns) {
            self.ensure_space(line_height)?;
            self.fill_rect(left, self.y - line_height, width, line_height, bg);
            self.draw_text(&line, left + CODE_PADDING, self.y - size, FontSlot::Code, size, color);
            self.y -= line_height;
            self.page_has_content = true;
        }

        self.ensure_space(CODE_PADDING)?;
        self.fill_rect(left, self.y - CODE_PADDING, width, CODE_PADDING, bg);
        self.y -= CODE_PADDING + self.theme.paragraph_spacing;
        Ok(())
    }

    fn spacer(&mut self, height_pt: f32) -> Result<(), SinkError> {
        self.y -= height_pt.max(0.0);
        if self.y < self.bottom() {
            if self.page_has_content {
                self.finish_page()?;
            } else {
                self.y = self.top();
            }
        }
        Ok(())
    }

    fn page_break(&mut self) -> Result<(), SinkError> {
        if self.page_has_content {
            self.finish_page()
        } else {
            self.y = self.top();
            Ok(())
        }
    }

    fn finalize(&mut self) -> Result<usize, SinkError> {
        if self.finalized {
            return Err(SinkError::Pdf("document already finalized".to_string()));
        }
        self.finalized = true;
        if self.page_has_content || self.page_ids.is_empty() {
            self.finish_page()?;
        }
        self.write_document()?;
        debug!(
            "Wrote {} PDF page(s) to {}",
            self.page_ids.len(),
            self.target.display()
        );
        Ok(self.page_ids.len())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn fill_color(c: Rgb) -> Operation {
    Operation::new("rg", vec![c.0.into(), c.1.into(), c.2.into()])
}

fn stroke_color(c: Rgb) -> Operation {
    Operation::new("RG", vec![c.0.into(), c.1.into(), c.2.into()])
}

/// Greedy word wrap. Explicit newlines are kept; a word wider than
/// `max_width` is split across lines.
fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let mut current = String::new();
        for word in raw.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                current.push(ch);
                if current.chars().count() > 1 && measure(&current) > max_width {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        lines.push(current);
    }
    lines
}

/// Expand tabs, add the optional `{:4}  ` gutter and hard-wrap at `columns`.
fn code_lines(code: &str, line_numbers: bool, columns: usize) -> Vec<String> {
    let code = code.replace('\t', "    ");
    let mut out = Vec::new();
    for (i, line) in code.trim_end_matches('\n').split('\n').enumerate() {
        let line = line.trim_end_matches('\r');
        let text = if line_numbers {
            format!("{:4}  {}", i + 1, line)
        } else {
            line.to_string()
        };
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            out.push(String::new());
        } else {
            out.extend(chars.chunks(columns).map(|c| c.iter().collect::<String>()));
        }
    }
    out
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encode text for a WinAnsi-encoded Type1 font. Characters outside the
/// code page become `?`; control characters are dropped.
fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|c| match c {
            '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}' => Some(c as u8),
            c if c.is_control() => None,
            '\u{20AC}' => Some(0x80),
            '\u{201A}' => Some(0x82),
            '\u{0192}' => Some(0x83),
            '\u{201E}' => Some(0x84),
            '\u{2026}' => Some(0x85),
            '\u{2020}' => Some(0x86),
            '\u{2021}' => Some(0x87),
            '\u{02C6}' => Some(0x88),
            '\u{2030}' => Some(0x89),
            '\u{0160}' => Some(0x8A),
            '\u{2039}' => Some(0x8B),
            '\u{0152}' => Some(0x8C),
            '\u{017D}' => Some(0x8E),
            '\u{2018}' => Some(0x91),
            '\u{2019}' => Some(0x92),
            '\u{201C}' => Some(0x93),
            '\u{201D}' => Some(0x94),
            '\u{2022}' => Some(0x95),
            '\u{2013}' => Some(0x96),
            '\u{2014}' => Some(0x97),
            '\u{02DC}' => Some(0x98),
            '\u{2122}' => Some(0x99),
            '\u{0161}' => Some(0x9A),
            '\u{203A}' => Some(0x9B),
            '\u{0153}' => Some(0x9C),
            '\u{017E}' => Some(0x9E),
            '\u{0178}' => Some(0x9F),
            _ => Some(b'?'),
        })
        .collect()
}
