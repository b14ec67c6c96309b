//! Diagram rasterisation through an external renderer process.
//!
//! The renderer is invoked as
//! `<program> <args…> -i <input> -o <output> -b <background>` with stdout and
//! stderr captured. The child is spawned with `kill_on_drop`, so when the
//! wall-clock timeout fires and the wait future is dropped, the process is
//! killed rather than left running in the background.

use crate::config::{GeneratorConfig, RendererCommand};
use crate::error::AssetError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Diagnostics longer than this are cut before they reach errors and logs.
const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// A configured external renderer.
#[derive(Debug, Clone)]
pub struct DiagramRenderer {
    command: RendererCommand,
    background: String,
    timeout: Duration,
}

impl DiagramRenderer {
    pub fn new(command: RendererCommand, background: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command,
            background: background.into(),
            timeout,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(
            config.renderer.clone(),
            config.renderer_background.clone(),
            Duration::from_secs(config.render_timeout_secs),
        )
    }

    /// Rasterise the markup in `input` into `output`.
    ///
    /// Succeeds only when the process exits zero *and* leaves a non-empty
    /// file at `output`. Every failure is an [`AssetError`] for which
    /// [`AssetError::is_render_error`] holds.
    pub async fn render(&self, input: &Path, output: &Path) -> Result<(), AssetError> {
        let program = &self.command.program;
        debug!(
            "Running renderer: {} {} -i {} -o {} -b {}",
            program,
            self.command.args.join(" "),
            input.display(),
            output.display(),
            self.background
        );

        let child = Command::new(program)
            .args(&self.command.args)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-b")
            .arg(&self.background)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AssetError::RendererNotFound {
                        program: program.clone(),
                    }
                } else {
                    AssetError::Render {
                        detail: format!("failed to start '{}': {}", program, e),
                        diagnostics: String::new(),
                    }
                }
            })?;

        let finished = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| AssetError::Render {
                detail: format!("failed waiting for '{}': {}", program, e),
                diagnostics: String::new(),
            })?,
            Err(_) => {
                warn!(
                    "Renderer '{}' timed out after {}s; killed",
                    program,
                    self.timeout.as_secs()
                );
                return Err(AssetError::RenderTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let diagnostics = collect_diagnostics(&finished.stderr, &finished.stdout);

        if !finished.status.success() {
            warn!("Renderer '{}' failed with {}: {}", program, finished.status, diagnostics);
            return Err(AssetError::Render {
                detail: format!("'{}' exited with {}", program, finished.status),
                diagnostics,
            });
        }

        // The output path may be pre-created by the caller; an empty file counts as missing.
        let wrote_output = matches!(tokio::fs::metadata(output).await, Ok(m) if m.len() > 0);
        if !wrote_output {
            warn!(
                "Renderer '{}' exited successfully but wrote no file at {}",
                program,
                output.display()
            );
            return Err(AssetError::Render {
                detail: format!("'{}' produced no output file", program),
                diagnostics,
            });
        }

        info!("Rendered diagram to: {}", output.display());
        Ok(())
    }
}

/// Stderr first, then stdout, trimmed and capped.
fn collect_diagnostics(stderr: &[u8], stdout: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stderr).trim().to_string();
    let out = String::from_utf8_lossy(stdout);
    let out = out.trim();
    if !out.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(out);
    }
    if text.chars().count() > MAX_DIAGNOSTIC_CHARS {
        text = text.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
        text.push('…');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_prefer_stderr_then_stdout() {
        assert_eq!(collect_diagnostics(b"  bad syntax\n", b"hint\n"), "bad syntax\nhint");
        assert_eq!(collect_diagnostics(b"", b"only stdout"), "only stdout");
        assert_eq!(collect_diagnostics(b"", b""), "");
    }

    #[test]
    fn diagnostics_are_capped() {
        let long = vec![b'x'; MAX_DIAGNOSTIC_CHARS + 50];
        let text = collect_diagnostics(&long, b"");
        assert_eq!(text.chars().count(), MAX_DIAGNOSTIC_CHARS + 1);
        assert!(text.ends_with('…'));
    }

    #[tokio::test]
    async fn missing_program_is_renderer_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let renderer = DiagramRenderer::new(
            RendererCommand::new("docpress-no-such-renderer-binary"),
            "transparent",
            Duration::from_secs(5),
        );
        let err = renderer
            .render(&tmp.path().join("in.mmd"), &tmp.path().join("out.png"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AssetError::RendererNotFound { ref program } if program == "docpress-no-such-renderer-binary"),
            "got: {err:?}"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_carries_diagnostics() {
        let tmp = tempfile::TempDir::new().unwrap();
        let renderer = DiagramRenderer::new(
            RendererCommand::new("sh")
                .arg("-c")
                .arg("echo 'Parse error on line 2' >&2; exit 3")
                .arg("renderer"),
            "transparent",
            Duration::from_secs(5),
        );
        let err = renderer
            .render(&tmp.path().join("in.mmd"), &tmp.path().join("out.png"))
            .await
            .unwrap_err();
        match err {
            AssetError::Render { diagnostics, .. } => {
                assert!(diagnostics.contains("Parse error on line 2"), "got: {diagnostics}")
            }
            other => panic!("expected Render, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_without_output_file_is_a_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let renderer = DiagramRenderer::new(
            RendererCommand::new("true"),
            "transparent",
            Duration::from_secs(5),
        );
        let err = renderer
            .render(&tmp.path().join("in.mmd"), &tmp.path().join("out.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Render { .. }), "got: {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_renderer_times_out() {
        let tmp = tempfile::TempDir::new().unwrap();
        let renderer = DiagramRenderer::new(
            RendererCommand::new("sh").arg("-c").arg("sleep 10").arg("renderer"),
            "transparent",
            Duration::from_secs(1),
        );
        let started = std::time::Instant::now();
        let err = renderer
            .render(&tmp.path().join("in.mmd"), &tmp.path().join("out.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::RenderTimeout { secs: 1 }), "got: {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
