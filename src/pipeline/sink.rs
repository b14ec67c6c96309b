//! The layout capability the page assembler writes into.
//!
//! A sink accretes content in call order and owns all layout decisions:
//! line breaking, pagination, fonts, colours. The assembler only decides
//! *what* to append. [`crate::pipeline::pdf::PdfSink`] is the production
//! implementation; tests substitute a recording sink.

use crate::config::ImageBox;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Heading depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

/// How a paragraph is styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    /// Large, centred document or section title.
    Title,
    /// Centred secondary line under a title.
    Subtitle,
    Body,
    /// Small, centred, grey text under an image.
    Caption,
    /// Stands in for content that could not be produced.
    Placeholder,
}

/// Errors raised by a [`LayoutSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// No file exists at the image path.
    #[error("Image not found: {}", path.display())]
    MissingImage { path: PathBuf },

    /// The image file is unreadable or cannot be decoded.
    #[error("Cannot embed image '{}': {reason}", path.display())]
    Image { path: PathBuf, reason: String },

    /// The table data cannot be laid out as a grid.
    #[error("Cannot lay out table: {0}")]
    Table(String),

    /// Writing the document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document could not be serialised.
    #[error("PDF error: {0}")]
    Pdf(String),
}

impl SinkError {
    /// True when the error concerns one piece of content and the document
    /// can carry on without it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SinkError::MissingImage { .. } | SinkError::Image { .. } | SinkError::Table(_)
        )
    }
}

/// Layout primitives consumed by the page assembler.
///
/// Calls append content in order. `finalize` writes the finished document to
/// the path the sink was created for and must be called exactly once.
pub trait LayoutSink: Send {
    fn heading(&mut self, text: &str, level: HeadingLevel) -> Result<(), SinkError>;

    fn paragraph(&mut self, text: &str, role: TextRole) -> Result<(), SinkError>;

    fn bullet_list(&mut self, items: &[String]) -> Result<(), SinkError>;

    /// Fails with [`SinkError::Table`] when rows are empty or ragged.
    fn table(&mut self, headers: Option<&[String]>, rows: &[Vec<String>]) -> Result<(), SinkError>;

    /// Embed the image at `path`, fitted into `size` with its aspect ratio kept.
    fn image(&mut self, path: &Path, size: ImageBox) -> Result<(), SinkError>;

    fn code_block(
        &mut self,
        code: &str,
        language: Option<&str>,
        line_numbers: bool,
    ) -> Result<(), SinkError>;

    /// Vertical space in points.
    fn spacer(&mut self, height_pt: f32) -> Result<(), SinkError>;

    /// Start a new page. A break on an empty page is ignored.
    fn page_break(&mut self) -> Result<(), SinkError>;

    /// Write the document out. Returns the number of physical pages written.
    fn finalize(&mut self) -> Result<usize, SinkError>;
}
