//! Pipeline stages for document generation.
//!
//! Each submodule implements exactly one step. The orchestrator in
//! [`crate::generate`] drives them in order and owns the per-request state.
//!
//! ## Data Flow
//!
//! ```text
//! location ──▶ assemble ──▶ sink/pdf ──▶ (rename) ──▶ cleanup
//!  (dir)        │  ▲          (lopdf)                 (assets)
//!               ▼  │
//!             assets ──▶ diagram
//!          (path/URL)   (renderer)
//! ```
//!
//! 1. [`location`] — pick a writable output directory, falling back to the
//!    configured one with an advisory message
//! 2. [`assemble`] — walk the pages in order and translate each into layout
//!    calls; asset failures become placeholders
//! 3. [`assets`]   — turn a path, URL or diagram markup into a local image
//!    file and record every file it creates
//! 4. [`diagram`]  — run the external renderer under a wall-clock timeout
//! 5. [`sink`]     — the layout capability the assembler writes into
//! 6. [`pdf`]      — the production sink, writing PDF through lopdf

pub mod assemble;
pub mod assets;
pub mod diagram;
pub mod location;
pub mod pdf;
pub mod sink;
