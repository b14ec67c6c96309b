//! Generation entry points: one request in, one [`GenerationResult`] out.
//!
//! A request walks a fixed sequence of stages:
//!
//! ```text
//! resolve output dir ──► assemble pages ──► finalize <name>.part ──► rename
//!         │                    │                    │
//!         └────────────────────┴────────────────────┴──► cleanup temp files (always)
//! ```
//!
//! Any stage may fail fatally; every failure is mapped onto a
//! [`GenerationResult`] with `ok = false`, and temp-file cleanup runs on every
//! path. Asset failures are not fatal: they show up as placeholders on the
//! affected pages and in the result's `stats`.

use crate::config::GeneratorConfig;
use crate::document::DocumentSpec;
use crate::error::GenerateError;
use crate::output::{GenerationResult, GenerationStats};
use crate::pipeline::assemble::{self, AssembleOptions, AssemblyReport};
use crate::pipeline::assets::AssetResolver;
use crate::pipeline::location::{self, OutputLocation};
use crate::pipeline::pdf::PdfSink;
use crate::pipeline::sink::{LayoutSink, SinkError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Generate the PDF described by `spec`.
///
/// Never returns an error: fatal failures come back as a result with
/// `ok = false` and a human-readable `error`. Use
/// [`GenerationResult::into_result`] to get a `Result` instead.
///
/// # Example
/// ```rust,no_run
/// use docpress::{generate, DocumentSpec, GeneratorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let spec = DocumentSpec::from_json(r#"{
///     "title": "Quarterly Report",
///     "pages": [{"page_type": "title", "subtitle": "Q3"}]
/// }"#)?;
/// let result = generate(&spec, &GeneratorConfig::default()).await;
/// println!("{}", serde_json::to_string_pretty(&result)?);
/// # Ok(())
/// # }
/// ```
pub async fn generate(spec: &DocumentSpec, config: &GeneratorConfig) -> GenerationResult {
    let started = Instant::now();
    info!("Starting generation: '{}' ({} page(s))", spec.title, spec.pages.len());

    let mut resolver = match AssetResolver::new(config) {
        Ok(resolver) => resolver,
        Err(e) => {
            error!("Generation failed: {}", e);
            return finish_failed(&e, None, config);
        }
    };

    let outcome = run(spec, config, &mut resolver).await;

    // ── Cleanup: unconditional ───────────────────────────────────────────
    let cleaned = resolver.cleanup_all();
    debug!("Cleaned up {} temp file(s)", cleaned);

    let duration_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(done) => {
            let stats = done.report.stats(cleaned, duration_ms);
            info!(
                "Generation complete: {} page(s) → {} in {}ms",
                done.report.pages,
                done.path.display(),
                duration_ms
            );
            if let Some(cb) = &config.progress_callback {
                cb.on_generation_complete(done.report.pages, true);
            }
            GenerationResult::success(
                done.path,
                done.filename,
                done.report.pages,
                done.location.message,
                stats,
            )
        }
        Err((e, report)) => {
            error!("Generation failed: {}", e);
            let stats = report.map(|r| r.stats(cleaned, duration_ms));
            finish_failed(&e, stats, config)
        }
    }
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally; do not call from inside an
/// async context.
pub fn generate_sync(spec: &DocumentSpec, config: &GeneratorConfig) -> GenerationResult {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(generate(spec, config)),
        Err(e) => GenerationResult::failure(
            &GenerateError::Internal(format!("Failed to create tokio runtime: {}", e)),
            None,
        ),
    }
}

/// Parse a JSON request and generate it. A malformed request becomes a
/// failed result rather than an error.
pub async fn generate_from_json(json: &str, config: &GeneratorConfig) -> GenerationResult {
    match DocumentSpec::from_json(json) {
        Ok(spec) => generate(&spec, config).await,
        Err(e) => reject(&e, config),
    }
}

/// The failed result for a request that never reached the pipeline, e.g.
/// one that did not parse. Still reports completion to the progress callback.
pub fn reject(error: &GenerateError, config: &GeneratorConfig) -> GenerationResult {
    warn!("Rejected request: {}", error);
    finish_failed(error, None, config)
}

/// Like [`generate_from_json`], returning the result serialised as JSON.
pub async fn generate_to_json(json: &str, config: &GeneratorConfig) -> String {
    let result = generate_from_json(json, config).await;
    serde_json::to_string(&result).unwrap_or_else(|e| {
        // Only reachable for non-UTF-8 paths; keep the shape intact.
        format!(
            r#"{{"ok":false,"output":null,"pages_generated":0,"message":null,"error":"Failed to serialise result: {}"}}"#,
            e.to_string().replace('"', "'")
        )
    })
}

// ── Stages ───────────────────────────────────────────────────────────────

struct Finished {
    path: PathBuf,
    filename: String,
    location: OutputLocation,
    report: AssemblyReport,
}

/// Stages up to and including the final rename. Cleanup is left to the caller.
async fn run(
    spec: &DocumentSpec,
    config: &GeneratorConfig,
    resolver: &mut AssetResolver,
) -> Result<Finished, (GenerateError, Option<AssemblyReport>)> {
    // ── Step 1: Resolve output directory ─────────────────────────────────
    let requested = spec.output.directory.as_deref().map(Path::new);
    let location = location::resolve_output_dir(requested, &config.fallback_output_dir)
        .map_err(|e| (GenerateError::from(e), None))?;
    if let Some(message) = &location.message {
        warn!("{}", message);
    }

    let filename = match spec.output.filename.as_deref() {
        Some(name) if !name.trim().is_empty() => normalise_filename(name),
        _ => default_filename(&spec.title, chrono::Local::now()),
    };
    let path = location.directory.join(&filename);
    let partial = partial_path(&path);
    info!("Output: {}", path.display());

    // ── Step 2: Assemble pages ───────────────────────────────────────────
    let mut sink = PdfSink::new(&spec.theme, spec.title.clone(), partial.clone());
    let options = AssembleOptions {
        document_title: spec.title.clone(),
        image_box: config.image_box,
        progress: config.progress_callback.clone(),
    };
    let report = assemble::assemble(&spec.pages, resolver, &mut sink, &options)
        .await
        .map_err(|e| (e, None))?;

    // ── Step 3: Finalize into <name>.part ────────────────────────────────
    if let Err(e) = sink.finalize() {
        remove_partial(&partial);
        let e = match e {
            SinkError::Io(source) => GenerateError::OutputWriteFailed {
                path: partial.clone(),
                source,
            },
            other => GenerateError::Assembly {
                page: report.pages,
                detail: other.to_string(),
            },
        };
        return Err((e, Some(report)));
    }

    // ── Step 4: Move into place ──────────────────────────────────────────
    if let Err(source) = tokio::fs::rename(&partial, &path).await {
        remove_partial(&partial);
        return Err((
            GenerateError::OutputWriteFailed {
                path: path.clone(),
                source,
            },
            Some(report),
        ));
    }

    Ok(Finished {
        path,
        filename,
        location,
        report,
    })
}

fn finish_failed(
    error: &GenerateError,
    stats: Option<GenerationStats>,
    config: &GeneratorConfig,
) -> GenerationResult {
    if let Some(cb) = &config.progress_callback {
        cb.on_generation_complete(0, false);
    }
    GenerationResult::failure(error, stats)
}

impl AssemblyReport {
    fn stats(&self, temp_files_cleaned: usize, duration_ms: u64) -> GenerationStats {
        GenerationStats {
            assets_resolved: self.assets_resolved,
            assets_failed: self.assets_failed,
            placeholders: self.placeholders,
            temp_files_cleaned,
            duration_ms,
        }
    }
}

// ── File names ───────────────────────────────────────────────────────────

static RE_UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{Alphabetic}\p{N} _-]").unwrap());

/// `<sanitised title>_<YYYYmmdd_HHMMSS>.pdf`.
pub fn default_filename<Tz: chrono::TimeZone>(title: &str, now: chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}.pdf", sanitize_title(title), now.format("%Y%m%d_%H%M%S"))
}

/// Keep letters, digits, space, `-` and `_`; everything else becomes `_`.
/// Spaces become `_` and the result is lowercased.
pub fn sanitize_title(title: &str) -> String {
    let safe = RE_UNSAFE_CHARS.replace_all(title, "_");
    let name = safe.replace(' ', "_").to_lowercase();
    if name.is_empty() {
        "document".to_string()
    } else {
        name
    }
}

/// Strip any directory part from a caller-supplied name and make sure it
/// ends in `.pdf`.
fn normalise_filename(name: &str) -> String {
    let base = Path::new(name.trim())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "document".to_string());
    if base.to_ascii_lowercase().ends_with(".pdf") {
        base
    } else {
        format!("{}.pdf", base)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}
