//! CLI binary for docpress.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig`, reads the request JSON and prints the
//! `GenerationResult` JSON on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use docpress::{
    generate, reject, DocumentSpec, GenerationProgressCallback, GeneratorConfig, PageKind,
    ProgressCallback, RendererCommand,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar on stderr with one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    asset_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving output directory…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            asset_errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Generating");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Assembling {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize, kind: PageKind) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num} ({kind})"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, degraded: bool) {
        let mark = if degraded { yellow("⚠") } else { green("✓") };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            mark,
            page_num,
            total,
            dim(&format!("{:.1}s", self.elapsed_secs())),
        ));
        self.bar.inc(1);
    }

    fn on_asset_error(&self, page_num: usize, error: &str) {
        self.asset_errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("    {} page {}: {}", red("✗"), page_num, red(&msg)));
    }

    fn on_generation_complete(&self, pages_generated: usize, ok: bool) {
        self.bar.finish_and_clear();
        let failed_assets = self.asset_errors.load(Ordering::SeqCst);
        if !ok {
            eprintln!("{} generation failed", red("✘"));
        } else if failed_assets == 0 {
            eprintln!("{} {} pages generated", green("✔"), bold(&pages_generated.to_string()));
        } else {
            eprintln!(
                "{} {} pages generated  ({} asset(s) replaced by placeholders)",
                yellow("⚠"),
                bold(&pages_generated.to_string()),
                red(&failed_assets.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate from a request file
  docpress report.json

  # Read the request from stdin, pretty-print the result
  cat report.json | docpress - --pretty

  # Override where the PDF goes
  docpress report.json --output-dir ./out --filename report.pdf

  # Use a locally installed mermaid renderer
  docpress diagrams.json --renderer mmdc

REQUEST FORMAT:
  {
    "title": "Quarterly Report",
    "pages": [
      {"page_type": "title", "subtitle": "Q3", "author": "Ops"},
      {"page_type": "content", "title": "Overview",
       "content": [{"type": "text", "text": "…"},
                   {"type": "image", "image_url": "https://…/chart.png"}]},
      {"page_type": "mermaid", "title": "Flow", "mermaid_code": "graph TD; A-->B"}
    ],
    "output": {"directory": "./out", "filename": "q3.pdf"}
  }

  Page types: title, toc, section, content, code, diagram, image, mermaid,
  summary, references.

ENVIRONMENT VARIABLES:
  OUTPUT_DIR   Fallback directory when the requested one is absent or unwritable
  RUST_LOG     Log filter, overrides --verbose/--quiet

EXIT STATUS:
  0 when a PDF was written (possibly with placeholders), 1 otherwise.
"#;

/// Generate themed PDF documents from a JSON page specification.
#[derive(Parser, Debug)]
#[command(
    name = "docpress",
    version,
    about = "Generate themed PDF documents from a JSON page specification",
    long_about = "Generate a multi-page PDF from a declarative JSON request. Remote images are \
downloaded, mermaid diagrams are rendered through an external renderer, and any asset that \
cannot be produced is replaced by a visible placeholder instead of failing the document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Request JSON file, or `-` for stdin.
    input: String,

    /// Fallback output directory.
    #[arg(long, env = "OUTPUT_DIR")]
    fallback_dir: Option<PathBuf>,

    /// Output directory; overrides the request's `output.directory`.
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Output file name; overrides the request's `output.filename`.
    #[arg(short, long)]
    filename: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 30)]
    download_timeout: u64,

    /// Diagram render timeout in seconds.
    #[arg(long, default_value_t = 30)]
    render_timeout: u64,

    /// Diagram renderer program (e.g. `mmdc`). Default: npx mermaid-cli.
    #[arg(long)]
    renderer: Option<String>,

    /// Pretty-print the result JSON.
    #[arg(long)]
    pretty: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read request ─────────────────────────────────────────────────────
    let json = read_input(&cli.input)?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run generation ───────────────────────────────────────────────────
    let result = match DocumentSpec::from_json(&json) {
        Ok(mut spec) => {
            if let Some(dir) = &cli.output_dir {
                spec.output.directory = Some(dir.clone());
            }
            if let Some(name) = &cli.filename {
                spec.output.filename = Some(name.clone());
            }
            generate(&spec, &config).await
        }
        Err(e) => reject(&e, &config),
    };

    let out = if cli.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .context("Failed to serialise result")?;
    println!("{out}");

    if !cli.quiet {
        if let Some(message) = &result.message {
            eprintln!("{} {}", yellow("⚠"), message);
        }
        if let Some(path) = &result.output {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
        if let Some(error) = &result.error {
            eprintln!("{} {}", red("✘"), error);
        }
    }

    if !result.ok {
        std::process::exit(1);
    }
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read request from {input}"))
    }
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GeneratorConfig> {
    let mut builder = GeneratorConfig::builder()
        .download_timeout_secs(cli.download_timeout)
        .render_timeout_secs(cli.render_timeout);

    if let Some(dir) = &cli.fallback_dir {
        builder = builder.fallback_output_dir(dir);
    }
    if let Some(program) = &cli.renderer {
        builder = builder.renderer(RendererCommand::new(program));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
