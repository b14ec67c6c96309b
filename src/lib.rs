//! # docpress
//!
//! Generate themed, multi-page PDF documents from a declarative page list.
//!
//! A request names a title, a theme and an ordered list of pages (title,
//! table of contents, section divider, free content, code listing, diagram,
//! image, mermaid diagram, summary, references). docpress fetches remote
//! images, renders inline diagram markup through an external renderer,
//! lays every page out and writes one PDF.
//!
//! ## Why this crate?
//!
//! Document requests tend to come from automated producers (scripts, report
//! jobs, LLM tool calls) that cannot be trusted to supply working image
//! links or valid diagram syntax. A broken asset must never cost the whole
//! document: it becomes a visible placeholder on its page and generation
//! carries on. Only conditions that make writing a PDF impossible (no
//! writable directory, a failing layout engine) fail the request.
//!
//! ## Pipeline Overview
//!
//! ```text
//! DocumentSpec (JSON)
//!  │
//!  ├─ 1. Location  requested dir → fallback dir (+ advisory message)
//!  ├─ 2. Assemble  page by page, in order
//!  │      └─ Assets  local path │ download → temp │ mermaid → renderer → temp
//!  ├─ 3. Finalize  lopdf document → <name>.part → rename
//!  └─ 4. Cleanup   every temp file removed, on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docpress::{generate, DocumentSpec, GeneratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spec = DocumentSpec::from_json(r#"{
//!         "title": "Architecture Notes",
//!         "pages": [
//!             {"page_type": "title", "subtitle": "v2"},
//!             {"page_type": "mermaid", "title": "Flow", "mermaid_code": "graph TD; A-->B"}
//!         ],
//!         "output": {"directory": "./out"}
//!     }"#)?;
//!     let config = GeneratorConfig::builder()
//!         .fallback_output_dir("/tmp/pdf-output")
//!         .build()?;
//!     let result = generate(&spec, &config).await.into_result()?;
//!     eprintln!("{} page(s) → {:?}", result.pages_generated, result.output);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docpress` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docpress = { version = "0.1", default-features = false }
//! ```
//!
//! ## Diagram rendering
//!
//! Mermaid pages need an external renderer. The default is
//! `npx -p @mermaid-js/mermaid-cli mmdc`; any program that accepts
//! `-i <in> -o <out.png> -b <background>` works, see
//! [`GeneratorConfigBuilder::renderer`]. Without a renderer, mermaid pages
//! degrade to placeholders.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod theme;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GeneratorConfig, GeneratorConfigBuilder, ImageBox, RendererCommand};
pub use document::{AssetRef, DocumentSpec, OutputSpec, PageKind, PageSpec};
pub use error::{AssetError, GenerateError};
pub use generate::{generate, generate_from_json, generate_sync, generate_to_json, reject};
pub use output::{GenerationResult, GenerationStats};
pub use pipeline::location::{OutputError, OutputLocation};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use theme::ThemeSpec;
