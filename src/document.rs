//! Document request model: the declarative, per-page description of a PDF.
//!
//! Requests arrive as JSON in a flat, forgiving wire format where every page
//! carries `page_type` plus whichever optional fields apply, and where images
//! can be given through several overlapping fields (`image`, `image_url`,
//! `diagram_path`, …). [`PageSpec`] deserialises through that wire format
//! ([`PageSpecInput`]) and reconciles it into one canonical variant per page
//! kind, so the assembler only ever sees a single [`AssetRef`] per image slot.
//!
//! ## Reconciliation table
//!
//! | Page kind | Asset slot precedence |
//! |-----------|-----------------------|
//! | `diagram` | `diagram_path` → `diagram_url` → `image` |
//! | `image`   | `image_path` → `image_url` → `image` |
//! | `mermaid` | `mermaid_code` (inline markup) |
//! | content item `image` | `image_path` → `image_url` |

use crate::theme::ThemeSpec;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

// ── Asset references ─────────────────────────────────────────────────────

/// Markup languages the external renderer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramKind {
    Mermaid,
}

/// A single, canonical reference to an image-producing asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// Caller-owned file on the local filesystem. Never existence-checked here.
    Local(PathBuf),
    /// `http://` or `https://` address to download.
    Remote(String),
    /// Inline diagram source to be rasterised by the external renderer.
    Diagram { kind: DiagramKind, markup: String },
}

impl AssetRef {
    /// Classify a path-or-URL string: a URL iff it starts with `http://` or
    /// `https://`, otherwise a local path.
    pub fn classify(reference: &str) -> AssetRef {
        if is_url(reference) {
            AssetRef::Remote(reference.to_string())
        } else {
            AssetRef::Local(PathBuf::from(reference))
        }
    }

    /// Human-readable description used in placeholders and logs.
    pub fn describe(&self) -> String {
        match self {
            AssetRef::Local(p) => p.display().to_string(),
            AssetRef::Remote(url) => url.clone(),
            AssetRef::Diagram { kind, markup } => {
                format!("{kind:?} diagram ({} bytes)", markup.len())
            }
        }
    }
}

/// Check if the reference string looks like a URL.
pub fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

// ── Canonical pages ──────────────────────────────────────────────────────

/// The kind of a page, used for dispatch, logging and progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Title,
    Toc,
    Section,
    Content,
    Code,
    Diagram,
    Image,
    Mermaid,
    Summary,
    References,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageKind::Title => "title",
            PageKind::Toc => "toc",
            PageKind::Section => "section",
            PageKind::Content => "content",
            PageKind::Code => "code",
            PageKind::Diagram => "diagram",
            PageKind::Image => "image",
            PageKind::Mermaid => "mermaid",
            PageKind::Summary => "summary",
            PageKind::References => "references",
        };
        f.write_str(name)
    }
}

/// One page of the document, already reconciled.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "PageSpecInput")]
pub enum PageSpec {
    Title(TitlePage),
    Toc(TocPage),
    Section(SectionPage),
    Content(ContentPage),
    Code(CodePage),
    Diagram(FigurePage),
    Image(FigurePage),
    Mermaid(FigurePage),
    Summary(SummaryPage),
    References(ReferencesPage),
}

impl PageSpec {
    pub fn kind(&self) -> PageKind {
        match self {
            PageSpec::Title(_) => PageKind::Title,
            PageSpec::Toc(_) => PageKind::Toc,
            PageSpec::Section(_) => PageKind::Section,
            PageSpec::Content(_) => PageKind::Content,
            PageSpec::Code(_) => PageKind::Code,
            PageSpec::Diagram(_) => PageKind::Diagram,
            PageSpec::Image(_) => PageKind::Image,
            PageSpec::Mermaid(_) => PageKind::Mermaid,
            PageSpec::Summary(_) => PageKind::Summary,
            PageSpec::References(_) => PageKind::References,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TitlePage {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TocPage {
    pub title: String,
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionPage {
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentPage {
    pub title: Option<String>,
    pub blocks: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodePage {
    pub title: Option<String>,
    pub code: Option<String>,
    pub language: Option<String>,
    pub line_numbers: bool,
}

/// Shared shape of diagram, image and mermaid pages.
#[derive(Debug, Clone, PartialEq)]
pub struct FigurePage {
    pub title: Option<String>,
    pub asset: Option<AssetRef>,
    pub caption: Option<String>,
    pub description: Option<Description>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPage {
    pub title: String,
    pub key_points: Vec<String>,
    pub conclusion: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferencesPage {
    pub title: String,
    pub references: Vec<String>,
    pub style: ReferenceStyle,
}

/// Free-text description: a single paragraph or a list of points.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Text(String),
    Points(Vec<String>),
}

/// How a references page numbers its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceStyle {
    #[default]
    Numbered,
    Bulleted,
    Plain,
}

impl ReferenceStyle {
    /// `numbered` and `bulleted` are recognised; anything else is plain.
    pub fn parse_lossy(s: &str) -> ReferenceStyle {
        match s.trim().to_ascii_lowercase().as_str() {
            "numbered" => ReferenceStyle::Numbered,
            "bulleted" => ReferenceStyle::Bulleted,
            _ => ReferenceStyle::Plain,
        }
    }
}

/// One block of a content page.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    Bullets(Vec<String>),
    Image {
        asset: AssetRef,
        caption: Option<String>,
    },
    Code {
        code: String,
        language: Option<String>,
    },
    Table {
        headers: Option<Vec<String>>,
        rows: Vec<Vec<String>>,
    },
}

// ── Wire format ──────────────────────────────────────────────────────────

/// Flat wire form of a page, exactly as a request supplies it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageSpecInput {
    pub page_type: Option<PageKind>,

    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub additional_info: Option<String>,

    pub entries: Option<Vec<String>>,

    pub content: Option<Vec<ContentItemInput>>,

    pub code: Option<String>,
    pub language: Option<String>,
    pub line_numbers: bool,

    /// Shorthand: mapped onto the kind-appropriate explicit field.
    pub image: Option<String>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub diagram_path: Option<String>,
    pub diagram_url: Option<String>,
    pub caption: Option<String>,
    pub description: Option<Description>,

    pub mermaid_code: Option<String>,

    pub key_points: Option<Vec<String>>,
    pub conclusion: Option<String>,

    pub references: Option<Vec<String>>,
    pub style: Option<String>,
}

/// Flat wire form of a content-page item.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentItemInput {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
    pub items: Option<Vec<String>>,
    pub code: Option<String>,
    pub language: Option<String>,
    pub image_path: Option<String>,
    pub image_url: Option<String>,
    pub caption: Option<String>,
    pub table_data: Option<Vec<Vec<String>>>,
    pub table_headers: Option<Vec<String>>,
}

impl Default for ContentItemInput {
    fn default() -> Self {
        Self {
            kind: "text".to_string(),
            text: None,
            items: None,
            code: None,
            language: None,
            image_path: None,
            image_url: None,
            caption: None,
            table_data: None,
            table_headers: None,
        }
    }
}

/// First non-empty candidate, classified into an [`AssetRef`].
fn first_reference(candidates: [Option<String>; 3]) -> Option<AssetRef> {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(|s| AssetRef::classify(&s))
}

impl TryFrom<PageSpecInput> for PageSpec {
    type Error = String;

    fn try_from(p: PageSpecInput) -> Result<Self, Self::Error> {
        let kind = p
            .page_type
            .ok_or_else(|| "missing field `page_type`".to_string())?;

        let page = match kind {
            PageKind::Title => PageSpec::Title(TitlePage {
                title: p.title,
                subtitle: p.subtitle,
                author: p.author,
                date: p.date,
                additional_info: p.additional_info,
            }),
            PageKind::Toc => PageSpec::Toc(TocPage {
                title: p.title.unwrap_or_else(|| "Table of Contents".into()),
                entries: p.entries.unwrap_or_default(),
            }),
            PageKind::Section => PageSpec::Section(SectionPage {
                title: p.title,
                subtitle: p.subtitle,
            }),
            PageKind::Content => PageSpec::Content(ContentPage {
                title: p.title,
                blocks: p
                    .content
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(ContentBlock::from_input)
                    .collect(),
            }),
            PageKind::Code => PageSpec::Code(CodePage {
                title: p.title,
                code: p.code,
                language: p.language.or_else(|| Some("python".into())),
                line_numbers: p.line_numbers,
            }),
            PageKind::Diagram => PageSpec::Diagram(FigurePage {
                title: p.title,
                // Explicit fields win over the shorthand.
                asset: first_reference([p.diagram_path, p.diagram_url, p.image]),
                caption: p.caption,
                description: p.description,
            }),
            PageKind::Image => PageSpec::Image(FigurePage {
                title: p.title,
                asset: first_reference([p.image_path, p.image_url, p.image]),
                caption: p.caption,
                description: p.description,
            }),
            PageKind::Mermaid => PageSpec::Mermaid(FigurePage {
                title: p.title,
                asset: p
                    .mermaid_code
                    .filter(|m| !m.trim().is_empty())
                    .map(|markup| AssetRef::Diagram {
                        kind: DiagramKind::Mermaid,
                        markup,
                    }),
                caption: p.caption,
                description: p.description,
            }),
            PageKind::Summary => PageSpec::Summary(SummaryPage {
                title: p.title.unwrap_or_else(|| "Summary".into()),
                key_points: p.key_points.unwrap_or_default(),
                conclusion: p.conclusion,
            }),
            PageKind::References => PageSpec::References(ReferencesPage {
                title: p.title.unwrap_or_else(|| "References".into()),
                references: p.references.unwrap_or_default(),
                style: p
                    .style
                    .as_deref()
                    .map(ReferenceStyle::parse_lossy)
                    .unwrap_or_default(),
            }),
        };
        Ok(page)
    }
}

impl ContentBlock {
    /// Reconcile one wire item. Items without a payload yield `None`.
    fn from_input(item: ContentItemInput) -> Option<ContentBlock> {
        match item.kind.as_str() {
            "text" => item.text.map(ContentBlock::Text),
            "bullet" => item.items.map(ContentBlock::Bullets),
            "image" => first_reference([item.image_path, item.image_url, None]).map(|asset| {
                ContentBlock::Image {
                    asset,
                    caption: item.caption,
                }
            }),
            "code" => item.code.map(|code| ContentBlock::Code {
                code,
                language: item.language,
            }),
            "table" => item.table_data.map(|rows| ContentBlock::Table {
                headers: item.table_headers,
                rows,
            }),
            other => {
                warn!("Skipping content item of unknown type '{}'", other);
                None
            }
        }
    }
}

// ── Document ─────────────────────────────────────────────────────────────

/// Where the caller would like the PDF written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputSpec {
    /// Requested directory; when absent the configured fallback is used.
    pub directory: Option<String>,
    /// File name; auto-generated from the title when absent.
    pub filename: Option<String>,
}

/// A complete document-generation request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentSpec {
    pub title: String,
    #[serde(default)]
    pub theme: ThemeSpec,
    pub pages: Vec<PageSpec>,
    #[serde(default)]
    pub output: OutputSpec,
}

impl DocumentSpec {
    /// Parse a request from JSON and check structural invariants.
    pub fn from_json(json: &str) -> Result<DocumentSpec, crate::error::GenerateError> {
        let spec: DocumentSpec = serde_json::from_str(json)
            .map_err(|e| crate::error::GenerateError::InvalidSpec(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// A document must contain at least one page.
    pub fn validate(&self) -> Result<(), crate::error::GenerateError> {
        if self.pages.is_empty() {
            return Err(crate::error::GenerateError::InvalidSpec(
                "`pages` must contain at least one page".into(),
            ));
        }
        Ok(())
    }
}
