//! End-to-end tests for docpress.
//!
//! Every test runs the full pipeline (location → assembly → PDF → cleanup)
//! against scratch directories. Remote assets are served by a throw-away
//! HTTP responder on a local port; the diagram renderer is replaced by
//! small shell scripts on unix.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use docpress::{
    generate, generate_from_json, DocumentSpec, GenerationProgressCallback, GenerationResult,
    GeneratorConfig, PageKind, RendererCommand,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Scratch {
    _root: TempDir,
    fallback: PathBuf,
    temp: PathBuf,
    root: PathBuf,
}

/// Route library logs through the test harness; `RUST_LOG=docpress=debug` to see them.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scratch() -> Scratch {
    init_logging();
    let root = TempDir::new().unwrap();
    let fallback = root.path().join("fallback");
    let temp = root.path().join("tmp");
    std::fs::create_dir_all(&temp).unwrap();
    Scratch {
        root: root.path().to_path_buf(),
        _root: root,
        fallback,
        temp,
    }
}

fn config(s: &Scratch) -> GeneratorConfig {
    GeneratorConfig::builder()
        .fallback_output_dir(&s.fallback)
        .temp_dir(&s.temp)
        .download_timeout_secs(5)
        .render_timeout_secs(5)
        .build()
        .unwrap()
}

fn write_png(path: &Path, w: u32, h: u32) {
    image::RgbaImage::from_pixel(w, h, image::Rgba([30, 120, 200, 255]))
        .save(path)
        .unwrap();
}

fn png_bytes() -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::RgbImage::from_pixel(8, 8, image::Rgb([0, 200, 0]))
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Serve `status` and `body` to every connection; returns the base URL.
async fn serve(status: &'static str, content_type: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}")
}

/// Accept connections and never answer; returns the base URL.
async fn serve_stalled() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

fn pdf_page_count(path: &Path) -> usize {
    lopdf::Document::load(path).unwrap().get_pages().len()
}

/// Files the resolver left behind in its temp directory.
fn leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

fn assert_ok(result: &GenerationResult) -> PathBuf {
    assert!(result.ok, "generation failed: {:?}", result.error);
    assert!(result.error.is_none());
    let output = result.output.clone().expect("output path on success");
    assert!(output.is_file(), "missing {}", output.display());
    output
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_title_and_content_page_with_local_image() {
    let s = scratch();
    let png = s.root.join("chart.png");
    write_png(&png, 320, 200);
    let out_dir = s.root.join("out");

    let json = format!(
        r#"{{
            "title": "T",
            "pages": [
                {{"page_type": "title", "title": "T"}},
                {{"page_type": "content", "title": "Chart", "content": [
                    {{"type": "text", "text": "Quarterly numbers"}},
                    {{"type": "image", "image_path": "{}", "caption": "Figure 1"}}
                ]}}
            ],
            "output": {{"directory": "{}", "filename": "t.pdf"}}
        }}"#,
        png.display(),
        out_dir.display()
    );
    let result = generate_from_json(&json, &config(&s)).await;

    let output = assert_ok(&result);
    assert_eq!(result.pages_generated, 2);
    assert!(result.message.is_none());
    assert_eq!(output, std::path::absolute(out_dir.join("t.pdf")).unwrap());
    assert_eq!(pdf_page_count(&output), 2);

    let stats = result.stats.unwrap();
    assert_eq!(stats.placeholders, 0);
    assert_eq!(stats.assets_resolved, 0);
    assert!(png.exists(), "caller-owned image must survive cleanup");
}

#[tokio::test]
async fn test_404_diagram_becomes_placeholder() {
    let s = scratch();
    let base = serve("404 Not Found", "text/plain", b"nope".to_vec()).await;
    let url = format!("{base}/diagram.png");

    let json = format!(
        r#"{{
            "title": "Broken",
            "pages": [{{"page_type": "diagram", "title": "D", "image": "{url}", "description": "still here"}}]
        }}"#
    );
    let result = generate_from_json(&json, &config(&s)).await;

    let output = assert_ok(&result);
    assert_eq!(result.pages_generated, 1);
    assert!(output.starts_with(std::path::absolute(&s.fallback).unwrap()));

    let bytes = std::fs::read(&output).unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("Failed to download image from:"));
    assert!(text.contains("still here"));

    let stats = result.stats.unwrap();
    assert_eq!(stats.assets_failed, 1);
    assert_eq!(stats.placeholders, 1);
    assert!(leftovers(&s.temp).is_empty());
}

#[tokio::test]
async fn test_remote_image_is_downloaded_and_cleaned_up() {
    let s = scratch();
    let base = serve("200 OK", "image/png", png_bytes()).await;

    let json = format!(
        r#"{{
            "title": "Remote",
            "pages": [{{"page_type": "content", "title": "C", "content": [
                {{"type": "image", "image_url": "{base}/pic.png", "caption": "remote"}},
                {{"type": "text", "text": "after"}}
            ]}}]
        }}"#
    );
    let result = generate_from_json(&json, &config(&s)).await;

    let output = assert_ok(&result);
    let stats = result.stats.unwrap();
    assert_eq!(stats.assets_resolved, 1);
    assert_eq!(stats.placeholders, 0);
    assert_eq!(stats.temp_files_cleaned, 1);
    assert!(leftovers(&s.temp).is_empty());
    assert!(String::from_utf8_lossy(&std::fs::read(&output).unwrap()).contains("DCTDecode"));
}

#[tokio::test]
async fn test_html_served_as_image_is_rejected() {
    let s = scratch();
    let base = serve("200 OK", "text/html", b"<html>login</html>".to_vec()).await;

    let json = format!(
        r#"{{"title": "H", "pages": [{{"page_type": "image", "image_url": "{base}/x.png"}}]}}"#
    );
    let result = generate_from_json(&json, &config(&s)).await;

    assert_ok(&result);
    let stats = result.stats.unwrap();
    assert_eq!(stats.assets_failed, 1);
    assert_eq!(stats.temp_files_cleaned, 1);
    assert!(leftovers(&s.temp).is_empty());
}

#[tokio::test]
async fn test_stalled_download_times_out_into_placeholder() {
    let s = scratch();
    let base = serve_stalled().await;
    let config = GeneratorConfig::builder()
        .fallback_output_dir(&s.fallback)
        .temp_dir(&s.temp)
        .download_timeout_secs(1)
        .build()
        .unwrap();

    let json = format!(
        r#"{{
            "title": "Slow",
            "pages": [{{"page_type": "image", "title": "Late", "image_url": "{base}/slow.png"}}]
        }}"#
    );
    let result = generate_from_json(&json, &config).await;

    let output = assert_ok(&result);
    assert_eq!(result.pages_generated, 1);
    let text = String::from_utf8_lossy(&std::fs::read(&output).unwrap()).into_owned();
    assert!(text.contains("Failed to download image from:"));

    let stats = result.stats.unwrap();
    assert_eq!(stats.assets_failed, 1);
    assert_eq!(stats.placeholders, 1);
    assert_eq!(stats.temp_files_cleaned, 0);
    assert!(leftovers(&s.temp).is_empty());
}

#[tokio::test]
async fn test_write_failure_after_download_still_cleans_up() {
    let s = scratch();
    let base = serve("200 OK", "image/png", png_bytes()).await;
    let out_dir = s.root.join("out");
    // A directory squatting on the partial-file path makes the write fail.
    std::fs::create_dir_all(out_dir.join("x.pdf.part")).unwrap();

    let json = format!(
        r#"{{
            "title": "Doomed",
            "pages": [{{"page_type": "content", "title": "C", "content": [
                {{"type": "image", "image_url": "{base}/pic.png"}}
            ]}}],
            "output": {{"directory": "{}", "filename": "x.pdf"}}
        }}"#,
        out_dir.display()
    );
    let result = generate_from_json(&json, &config(&s)).await;

    assert!(!result.ok);
    assert!(result.output.is_none());
    assert_eq!(result.pages_generated, 0);
    let error = result.error.unwrap();
    assert!(error.contains("Failed to write output file"), "got: {error}");
    assert!(error.contains("x.pdf.part"), "got: {error}");

    let stats = result.stats.unwrap();
    assert_eq!(stats.assets_resolved, 1);
    assert_eq!(stats.temp_files_cleaned, 1);
    assert!(leftovers(&s.temp).is_empty());
    assert!(!out_dir.join("x.pdf").exists());
}

#[tokio::test]
async fn test_unwritable_requested_dir_falls_back_with_message() {
    let s = scratch();
    let blocker = s.root.join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let requested = blocker.join("reports");

    let json = format!(
        r#"{{
            "title": "Fallback",
            "pages": [{{"page_type": "section", "title": "S"}}],
            "output": {{"directory": "{}"}}
        }}"#,
        requested.display()
    );
    let result = generate_from_json(&json, &config(&s)).await;

    let output = assert_ok(&result);
    assert_eq!(
        result.message.as_deref(),
        Some(
            format!(
                "Saved to {} (requested directory {} was not accessible)",
                s.fallback.display(),
                requested.display()
            )
            .as_str()
        )
    );
    assert!(output.starts_with(std::path::absolute(&s.fallback).unwrap()));
}

#[tokio::test]
async fn test_no_writable_dir_fails_without_assembly() {
    let s = scratch();
    let blocker = s.root.join("blocker");
    std::fs::write(&blocker, b"").unwrap();

    let config = GeneratorConfig::builder()
        .fallback_output_dir(blocker.join("fallback"))
        .temp_dir(&s.temp)
        .build()
        .unwrap();
    let json = format!(
        r#"{{
            "title": "Nowhere",
            "pages": [{{"page_type": "title"}}],
            "output": {{"directory": "{}"}}
        }}"#,
        blocker.join("requested").display()
    );
    let result = generate_from_json(&json, &config).await;

    assert!(!result.ok);
    assert!(result.output.is_none());
    assert_eq!(result.pages_generated, 0);
    let error = result.error.unwrap();
    assert!(error.contains("requested"), "got: {error}");
    assert!(error.contains("fallback"), "got: {error}");
    assert!(leftovers(&s.temp).is_empty());
}

#[tokio::test]
async fn test_every_page_kind_in_one_document() {
    let s = scratch();
    let json = r##"{
        "title": "Everything",
        "theme": {"colors": {"primary": "#003366"}},
        "pages": [
            {"page_type": "title", "subtitle": "All kinds", "author": "QA", "date": "2024-01-01"},
            {"page_type": "toc", "entries": ["1. Intro", "2. Code"]},
            {"page_type": "section", "title": "Part One", "subtitle": "Basics"},
            {"page_type": "content", "title": "Intro", "content": [
                {"type": "text", "text": "Hello world"},
                {"type": "bullet", "items": ["Item 1", "Item 2"]},
                {"type": "code", "code": "let x = 1;", "language": "rust"},
                {"type": "table", "table_headers": ["k", "v"], "table_data": [["a", "1"], ["b", "2"]]}
            ]},
            {"page_type": "code", "title": "Example", "code": "print('Hello')", "line_numbers": true},
            {"page_type": "image", "title": "Missing", "image_path": "/definitely/not/here.png"},
            {"page_type": "summary", "key_points": ["one", "two"], "conclusion": "done"},
            {"page_type": "references", "references": ["Ref A", "Ref B"]}
        ]
    }"##;
    let result = generate_from_json(json, &config(&s)).await;

    let output = assert_ok(&result);
    assert_eq!(result.pages_generated, 8);
    assert!(pdf_page_count(&output) >= 8);
    let text = String::from_utf8_lossy(&std::fs::read(&output).unwrap()).into_owned();
    assert!(text.contains("Image not found: /definitely/not/here.png"));
    assert!(text.contains("1. Ref A"));
}

#[tokio::test]
async fn test_invalid_request_is_rejected() {
    let s = scratch();
    for json in ["not json", r#"{"title": "x", "pages": []}"#, r#"{"title": "x", "pages": [{"page_type": "poster"}]}"#] {
        let result = generate_from_json(json, &config(&s)).await;
        assert!(!result.ok, "accepted: {json}");
        assert_eq!(result.pages_generated, 0);
        assert!(result.error.is_some());
    }
    assert!(!s.fallback.exists(), "nothing should be created for a rejected request");
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl GenerationProgressCallback for Recorder {
    fn on_generation_start(&self, total_pages: usize) {
        self.push(format!("start {total_pages}"));
    }
    fn on_page_start(&self, page_num: usize, _total: usize, kind: PageKind) {
        self.push(format!("page {page_num} {kind}"));
    }
    fn on_page_complete(&self, page_num: usize, _total: usize, degraded: bool) {
        self.push(format!("done {page_num} {degraded}"));
    }
    fn on_asset_error(&self, page_num: usize, _error: &str) {
        self.push(format!("asset {page_num}"));
    }
    fn on_generation_complete(&self, pages_generated: usize, ok: bool) {
        self.push(format!("complete {pages_generated} {ok}"));
    }
}

#[tokio::test]
async fn test_progress_events_in_order() {
    let s = scratch();
    let recorder = Arc::new(Recorder::default());
    let config = GeneratorConfig::builder()
        .fallback_output_dir(&s.fallback)
        .temp_dir(&s.temp)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let spec = DocumentSpec::from_json(
        r#"{"title": "P", "pages": [
            {"page_type": "toc", "entries": ["x"]},
            {"page_type": "image", "image_path": "/nope.png"}
        ]}"#,
    )
    .unwrap();

    let result = generate(&spec, &config).await;
    assert!(result.ok);
    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start 2",
            "page 1 toc",
            "done 1 false",
            "page 2 image",
            "asset 2",
            "done 2 true",
            "complete 2 true",
        ]
    );
}

// ── Diagram rendering (fake renderers) ───────────────────────────────────────

#[cfg(unix)]
fn fake_renderer(script: String) -> RendererCommand {
    RendererCommand::new("sh").arg("-c").arg(script).arg("renderer")
}

#[cfg(unix)]
#[tokio::test]
async fn test_mermaid_page_rendered_by_external_program() {
    let s = scratch();
    let png = s.root.join("rendered.png");
    write_png(&png, 200, 120);
    // $2 is the markup file, $4 the requested output.
    let script = format!(
        r#"grep -q "graph TD" "$2" && cp "{}" "$4""#,
        png.display()
    );
    let config = GeneratorConfig::builder()
        .fallback_output_dir(&s.fallback)
        .temp_dir(&s.temp)
        .renderer(fake_renderer(script))
        .build()
        .unwrap();

    let json = r#"{
        "title": "Mermaid",
        "pages": [{"page_type": "mermaid", "title": "Flow", "mermaid_code": "graph TD; A-->B", "caption": "flow"}]
    }"#;
    let result = generate_from_json(json, &config).await;

    let output = assert_ok(&result);
    let stats = result.stats.unwrap();
    assert_eq!(stats.assets_resolved, 1);
    assert_eq!(stats.placeholders, 0);
    // Markup file and rendered image.
    assert_eq!(stats.temp_files_cleaned, 2);
    assert!(leftovers(&s.temp).is_empty());
    assert!(String::from_utf8_lossy(&std::fs::read(&output).unwrap()).contains("DCTDecode"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_mermaid_syntax_error_becomes_placeholder() {
    let s = scratch();
    let config = GeneratorConfig::builder()
        .fallback_output_dir(&s.fallback)
        .temp_dir(&s.temp)
        .renderer(fake_renderer("echo 'Parse error on line 1' >&2; exit 1".into()))
        .build()
        .unwrap();

    let json = r#"{
        "title": "Bad Mermaid",
        "pages": [
            {"page_type": "mermaid", "title": "Broken", "mermaid_code": "graph ??", "description": ["kept"]},
            {"page_type": "summary", "key_points": ["next page still rendered"]}
        ]
    }"#;
    let result = generate_from_json(json, &config).await;

    let output = assert_ok(&result);
    assert_eq!(result.pages_generated, 2);
    let text = String::from_utf8_lossy(&std::fs::read(&output).unwrap()).into_owned();
    assert!(text.contains("Diagram could not be rendered"));
    assert!(text.contains("kept"));
    assert!(text.contains("next page still rendered"));
    assert!(leftovers(&s.temp).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_hanging_renderer_is_killed() {
    let s = scratch();
    let config = GeneratorConfig::builder()
        .fallback_output_dir(&s.fallback)
        .temp_dir(&s.temp)
        .render_timeout_secs(1)
        .renderer(fake_renderer("sleep 30".into()))
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let result = generate_from_json(
        r#"{"title": "Slow", "pages": [{"page_type": "mermaid", "mermaid_code": "graph TD; A-->B"}]}"#,
        &config,
    )
    .await;

    assert_ok(&result);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(result.stats.unwrap().placeholders, 1);
    assert!(leftovers(&s.temp).is_empty());
}
