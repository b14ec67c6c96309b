//! Error types for the docpress library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`GenerateError`] — **Fatal**: the request cannot produce a document at
//!   all (no writable output directory, the layout sink cannot write, the
//!   request itself is malformed). Surfaced as the `error` field of
//!   [`crate::output::GenerationResult`].
//!
//! * [`AssetError`] — **Non-fatal**: a single asset (remote image, diagram
//!   markup) could not be turned into a local image. The page handler embeds a
//!   visible placeholder instead and the document is still produced.

use crate::pipeline::location::OutputError;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docpress library.
///
/// Asset-level failures use [`AssetError`] and never reach this type.
#[derive(Debug, Error)]
pub enum GenerateError {
    // ── Output location ───────────────────────────────────────────────────
    /// Neither the requested nor the fallback directory is writable.
    #[error(transparent)]
    Output(#[from] OutputError),

    // ── Request errors ────────────────────────────────────────────────────
    /// The document request could not be parsed or is structurally invalid.
    #[error("Invalid document specification: {0}")]
    InvalidSpec(String),

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The layout sink failed for reasons unrelated to a single asset.
    #[error("Page {page}: layout engine failure: {detail}")]
    Assembly { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The finished document could not be written or moved into place.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single asset reference.
///
/// Converted into a placeholder paragraph by the page handler that asked for
/// the asset; the generation request continues.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum AssetError {
    /// Remote fetch failed (network error, non-2xx status, not an image).
    #[error("Failed to download image from: {url} ({reason})")]
    Download { url: String, reason: String },

    /// Remote fetch exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The external renderer exited unsuccessfully.
    #[error("Diagram renderer failed: {detail}")]
    Render { detail: String, diagnostics: String },

    /// The external renderer did not finish in time and was killed.
    #[error("Diagram renderer timed out after {secs}s")]
    RenderTimeout { secs: u64 },

    /// The external renderer executable could not be started.
    #[error("Diagram renderer '{program}' not found; install @mermaid-js/mermaid-cli")]
    RendererNotFound { program: String },

    /// A temporary file for the asset could not be created or written.
    #[error("Temporary file error: {detail}")]
    TempFile { detail: String },
}

impl AssetError {
    /// True for failures of the external diagram renderer.
    pub fn is_render_error(&self) -> bool {
        matches!(
            self,
            AssetError::Render { .. }
                | AssetError::RenderTimeout { .. }
                | AssetError::RendererNotFound { .. }
        )
    }

    /// True for failures fetching a remote asset.
    pub fn is_download_error(&self) -> bool {
        matches!(
            self,
            AssetError::Download { .. } | AssetError::DownloadTimeout { .. }
        )
    }
}
