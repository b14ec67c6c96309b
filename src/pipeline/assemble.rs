//! Page assembly: translate each [`PageSpec`] into layout-sink calls.
//!
//! Pages are handled strictly in request order, one at a time. Every page
//! ends with a page break, so each one starts on a fresh physical page.
//!
//! Failures split into two classes:
//!
//! * **Content failures** (an asset that cannot be resolved, an image the
//!   sink cannot decode, a ragged table) degrade the page: a placeholder or
//!   plain-text rendering takes the content's place and assembly continues.
//! * **Sink failures** (I/O, serialisation) abort assembly with
//!   [`GenerateError::Assembly`].
//!
//! A degraded page still counts towards the page total.

use crate::config::ImageBox;
use crate::document::{
    AssetRef, CodePage, ContentBlock, ContentPage, Description, FigurePage, PageKind, PageSpec,
    ReferenceStyle, ReferencesPage, SectionPage, SummaryPage, TitlePage, TocPage,
};
use crate::error::{AssetError, GenerateError};
use crate::pipeline::assets::AssetResolver;
use crate::pipeline::sink::{HeadingLevel, LayoutSink, SinkError, TextRole};
use crate::progress::ProgressCallback;
use tracing::{debug, error, info, warn};

/// Points per inch, for spacing.
const INCH: f32 = 72.0;

/// What one assembly pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Pages dispatched, degraded ones included.
    pub pages: usize,
    /// Pages with at least one placeholder or plain-text fallback.
    pub degraded_pages: usize,
    /// Assets the resolver turned into temp files.
    pub assets_resolved: usize,
    /// Assets that failed to resolve.
    pub assets_failed: usize,
    /// Placeholder paragraphs emitted.
    pub placeholders: usize,
}

/// Inputs that stay fixed for a whole assembly pass.
#[derive(Clone, Default)]
pub struct AssembleOptions {
    /// Used by title pages that carry no title of their own.
    pub document_title: String,
    pub image_box: ImageBox,
    pub progress: Option<ProgressCallback>,
}

/// Assemble `pages` into `sink`, resolving assets through `resolver`.
///
/// The sink is not finalized here.
pub async fn assemble(
    pages: &[PageSpec],
    resolver: &mut AssetResolver,
    sink: &mut dyn LayoutSink,
    options: &AssembleOptions,
) -> Result<AssemblyReport, GenerateError> {
    let mut assembler = Assembler {
        resolver,
        sink,
        options,
        report: AssemblyReport::default(),
        page_num: 0,
        degraded: false,
    };
    assembler.run(pages).await?;
    Ok(assembler.report)
}

struct Assembler<'a> {
    resolver: &'a mut AssetResolver,
    sink: &'a mut dyn LayoutSink,
    options: &'a AssembleOptions,
    report: AssemblyReport,
    /// 1-indexed number of the page being assembled.
    page_num: usize,
    degraded: bool,
}

impl Assembler<'_> {
    async fn run(&mut self, pages: &[PageSpec]) -> Result<(), GenerateError> {
        let total = pages.len();
        info!("Assembling {} page(s)", total);
        if let Some(cb) = &self.options.progress {
            cb.on_generation_start(total);
        }

        for (i, page) in pages.iter().enumerate() {
            self.page_num = i + 1;
            self.degraded = false;
            let kind = page.kind();
            debug!("Page {}/{}: {}", self.page_num, total, kind);
            if let Some(cb) = &self.options.progress {
                cb.on_page_start(self.page_num, total, kind);
            }

            match self.dispatch(page).await.and_then(|()| self.sink.page_break()) {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    warn!("Page {} ({}): {}", self.page_num, kind, e);
                    self.degraded = true;
                }
                Err(e) => {
                    error!("Page {} ({}): layout engine failure: {}", self.page_num, kind, e);
                    return Err(GenerateError::Assembly {
                        page: self.page_num,
                        detail: e.to_string(),
                    });
                }
            }

            self.report.pages += 1;
            if self.degraded {
                self.report.degraded_pages += 1;
            }
            if let Some(cb) = &self.options.progress {
                cb.on_page_complete(self.page_num, total, self.degraded);
            }
        }

        info!(
            "Assembled {} page(s), {} degraded",
            self.report.pages, self.report.degraded_pages
        );
        Ok(())
    }

    async fn dispatch(&mut self, page: &PageSpec) -> Result<(), SinkError> {
        match page {
            PageSpec::Title(p) => self.title_page(p),
            PageSpec::Toc(p) => self.toc_page(p),
            PageSpec::Section(p) => self.section_page(p),
            PageSpec::Content(p) => self.content_page(p).await,
            PageSpec::Code(p) => self.code_page(p),
            PageSpec::Diagram(p) | PageSpec::Mermaid(p) => {
                self.figure_page(p, page.kind()).await
            }
            PageSpec::Image(p) => self.figure_page(p, PageKind::Image).await,
            PageSpec::Summary(p) => self.summary_page(p),
            PageSpec::References(p) => self.references_page(p),
        }
    }

    // ── Page handlers ────────────────────────────────────────────────────

    fn title_page(&mut self, page: &TitlePage) -> Result<(), SinkError> {
        self.sink.spacer(2.0 * INCH)?;
        let title = page
            .title
            .as_deref()
            .unwrap_or(&self.options.document_title);
        self.sink.paragraph(title, TextRole::Title)?;
        if let Some(subtitle) = &page.subtitle {
            self.sink.paragraph(subtitle, TextRole::Subtitle)?;
            self.sink.spacer(0.3 * INCH)?;
        }
        if let Some(author) = &page.author {
            self.sink.paragraph(author, TextRole::Body)?;
        }
        if let Some(date) = &page.date {
            self.sink.paragraph(date, TextRole::Body)?;
        }
        if let Some(info) = &page.additional_info {
            self.sink.spacer(0.5 * INCH)?;
            self.sink.paragraph(info, TextRole::Body)?;
        }
        Ok(())
    }

    fn toc_page(&mut self, page: &TocPage) -> Result<(), SinkError> {
        self.page_heading(Some(&page.title))?;
        for entry in &page.entries {
            self.sink.paragraph(entry, TextRole::Body)?;
        }
        Ok(())
    }

    fn section_page(&mut self, page: &SectionPage) -> Result<(), SinkError> {
        self.sink.spacer(2.5 * INCH)?;
        if let Some(title) = &page.title {
            self.sink.paragraph(title, TextRole::Title)?;
        }
        if let Some(subtitle) = &page.subtitle {
            self.sink.paragraph(subtitle, TextRole::Subtitle)?;
        }
        Ok(())
    }

    async fn content_page(&mut self, page: &ContentPage) -> Result<(), SinkError> {
        self.page_heading(page.title.as_deref())?;
        for block in &page.blocks {
            match block {
                ContentBlock::Text(text) => self.sink.paragraph(text, TextRole::Body)?,
                ContentBlock::Bullets(items) => self.sink.bullet_list(items)?,
                ContentBlock::Image { asset, caption } => {
                    self.embed(asset, caption.as_deref()).await?
                }
                ContentBlock::Code { code, language } => {
                    self.sink.code_block(code, language.as_deref(), false)?;
                    self.sink.spacer(0.2 * INCH)?;
                }
                ContentBlock::Table { headers, rows } => self.table(headers.as_deref(), rows)?,
            }
        }
        Ok(())
    }

    fn code_page(&mut self, page: &CodePage) -> Result<(), SinkError> {
        self.page_heading(page.title.as_deref())?;
        if let Some(code) = &page.code {
            self.sink
                .code_block(code, page.language.as_deref(), page.line_numbers)?;
            self.sink.spacer(0.2 * INCH)?;
        }
        Ok(())
    }

    /// Diagram, image and mermaid pages: heading, figure, then description.
    async fn figure_page(&mut self, page: &FigurePage, kind: PageKind) -> Result<(), SinkError> {
        self.page_heading(page.title.as_deref())?;
        if let Some(asset) = &page.asset {
            self.embed(asset, page.caption.as_deref()).await?;
        }
        if let Some(description) = &page.description {
            self.sink.spacer(0.2 * INCH)?;
            match (description, kind) {
                (Description::Text(text), _) => self.sink.paragraph(text, TextRole::Body)?,
                // Image pages read a list as one paragraph; diagram pages as bullets.
                (Description::Points(points), PageKind::Image) => {
                    self.sink.paragraph(&points.join("\n"), TextRole::Body)?
                }
                (Description::Points(points), _) => self.sink.bullet_list(points)?,
            }
        }
        Ok(())
    }

    fn summary_page(&mut self, page: &SummaryPage) -> Result<(), SinkError> {
        self.page_heading(Some(&page.title))?;
        if !page.key_points.is_empty() {
            self.sink.bullet_list(&page.key_points)?;
        }
        if let Some(conclusion) = &page.conclusion {
            self.sink.spacer(0.3 * INCH)?;
            self.sink.paragraph(conclusion, TextRole::Body)?;
        }
        Ok(())
    }

    fn references_page(&mut self, page: &ReferencesPage) -> Result<(), SinkError> {
        self.page_heading(Some(&page.title))?;
        match page.style {
            ReferenceStyle::Numbered => {
                for (i, reference) in page.references.iter().enumerate() {
                    self.sink
                        .paragraph(&format!("{}. {}", i + 1, reference), TextRole::Body)?;
                }
            }
            ReferenceStyle::Bulleted => self.sink.bullet_list(&page.references)?,
            ReferenceStyle::Plain => {
                for reference in &page.references {
                    self.sink.paragraph(reference, TextRole::Body)?;
                }
            }
        }
        Ok(())
    }

    // ── Shared pieces ────────────────────────────────────────────────────

    fn page_heading(&mut self, title: Option<&str>) -> Result<(), SinkError> {
        if let Some(title) = title {
            self.sink.heading(title, HeadingLevel::H1)?;
            self.sink.spacer(0.2 * INCH)?;
        }
        Ok(())
    }

    /// Resolve and embed one image, or leave a placeholder in its place.
    async fn embed(&mut self, asset: &AssetRef, caption: Option<&str>) -> Result<(), SinkError> {
        let resolved = match self.resolver.resolve(asset).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Page {}: {}", self.page_num, e);
                self.report.assets_failed += 1;
                if let Some(cb) = &self.options.progress {
                    cb.on_asset_error(self.page_num, &e.to_string());
                }
                return self.placeholder(&asset_placeholder(asset, &e));
            }
        };
        if resolved.temporary {
            self.report.assets_resolved += 1;
        }

        match self.sink.image(&resolved.path, self.options.image_box) {
            Ok(()) => {
                if let Some(caption) = caption {
                    self.sink.spacer(0.1 * INCH)?;
                    self.sink.paragraph(caption, TextRole::Caption)?;
                }
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!("Page {}: {}", self.page_num, e);
                if let Some(cb) = &self.options.progress {
                    cb.on_asset_error(self.page_num, &e.to_string());
                }
                let text = match e {
                    SinkError::MissingImage { .. } => {
                        format!("[Image not found: {}]", asset.describe())
                    }
                    other => format!("[Error loading image: {}]", other),
                };
                self.placeholder(&text)
            }
            Err(e) => Err(e),
        }
    }

    fn placeholder(&mut self, text: &str) -> Result<(), SinkError> {
        self.report.placeholders += 1;
        self.degraded = true;
        self.sink.paragraph(text, TextRole::Placeholder)
    }

    /// Draw a table, falling back to one text line per row when the sink
    /// rejects the data.
    fn table(&mut self, headers: Option<&[String]>, rows: &[Vec<String>]) -> Result<(), SinkError> {
        match self.sink.table(headers, rows) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                warn!("Page {}: {}; rendering as text", self.page_num, e);
                self.degraded = true;
                for line in headers.into_iter().chain(rows.iter().map(Vec::as_slice)) {
                    self.sink.paragraph(&line.join(" | "), TextRole::Body)?;
                }
            }
            Err(e) => return Err(e),
        }
        self.sink.spacer(0.2 * INCH)
    }
}

/// Placeholder text for an asset that could not be resolved.
fn asset_placeholder(asset: &AssetRef, error: &AssetError) -> String {
    if error.is_download_error() {
        format!("[Failed to download image from: {}]", asset.describe())
    } else if error.is_render_error() {
        format!("[Diagram could not be rendered: {}]", error)
    } else {
        format!("[Error loading image: {}]", error)
    }
}
