//! Asset resolution: turn an [`AssetRef`] into a local, readable image file.
//!
//! Local paths pass through untouched. Remote URLs are downloaded into a
//! fresh temp file and diagram markup is rasterised by the external renderer.
//! Every file this module creates is recorded in the resolver's registry the
//! moment it exists, so [`AssetResolver::cleanup_all`] can remove it however
//! the request ends.
//!
//! A resolver belongs to exactly one generation request. Concurrent requests
//! each build their own, so one request's cleanup never touches another's
//! files.

use crate::config::GeneratorConfig;
use crate::document::{AssetRef, DiagramKind};
use crate::error::{AssetError, GenerateError};
use crate::pipeline::diagram::DiagramRenderer;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Extensions kept when inferring a download's temp-file suffix.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

/// A local image file ready to hand to the layout sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub path: PathBuf,
    /// `true` when the resolver created the file and will delete it;
    /// `false` for caller-owned local paths.
    pub temporary: bool,
}

/// Per-request asset resolver and temp-file registry.
pub struct AssetResolver {
    client: reqwest::Client,
    renderer: DiagramRenderer,
    download_timeout_secs: u64,
    temp_dir: PathBuf,
    registry: Vec<PathBuf>,
}

impl AssetResolver {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerateError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GenerateError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            renderer: DiagramRenderer::from_config(config),
            download_timeout_secs: config.download_timeout_secs,
            temp_dir: config.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
            registry: Vec::new(),
        })
    }

    /// Resolve one reference to a local file.
    pub async fn resolve(&mut self, reference: &AssetRef) -> Result<ResolvedAsset, AssetError> {
        match reference {
            AssetRef::Local(path) => {
                debug!("Using local asset: {}", path.display());
                Ok(ResolvedAsset {
                    path: path.clone(),
                    temporary: false,
                })
            }
            AssetRef::Remote(url) => self.download(url).await,
            AssetRef::Diagram { kind, markup } => self.render(*kind, markup).await,
        }
    }

    /// Temp files created so far and not yet cleaned up.
    pub fn registered(&self) -> &[PathBuf] {
        &self.registry
    }

    /// Delete every registered file and empty the registry.
    ///
    /// Files that are already gone are skipped silently; other deletion
    /// failures are logged. Returns the number of files actually removed.
    pub fn cleanup_all(&mut self) -> usize {
        let mut removed = 0;
        for path in self.registry.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed temp file: {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
            }
        }
        removed
    }

    // ── Remote ───────────────────────────────────────────────────────────

    async fn download(&mut self, url: &str) -> Result<ResolvedAsset, AssetError> {
        info!("Downloading image from: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Download of {} failed: HTTP {}", url, status);
            return Err(AssetError::Download {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.request_error(url, e))?;

        let path = self.create_temp(&extension_for_url(url))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AssetError::TempFile {
                detail: format!("{}: {}", path.display(), e),
            })?;

        // Catch HTML error pages served with 200 before they reach the sink.
        if image::guess_format(&bytes).is_err() {
            warn!("Download of {} is not a recognised image ({} bytes)", url, bytes.len());
            return Err(AssetError::Download {
                url: url.to_string(),
                reason: "response is not a recognised image".to_string(),
            });
        }

        info!("Downloaded {} bytes to: {}", bytes.len(), path.display());
        Ok(ResolvedAsset {
            path,
            temporary: true,
        })
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> AssetError {
        if e.is_timeout() {
            warn!("Download of {} timed out after {}s", url, self.download_timeout_secs);
            AssetError::DownloadTimeout {
                url: url.to_string(),
                secs: self.download_timeout_secs,
            }
        } else {
            warn!("Download of {} failed: {}", url, e);
            AssetError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    // ── Diagram markup ───────────────────────────────────────────────────

    async fn render(&mut self, kind: DiagramKind, markup: &str) -> Result<ResolvedAsset, AssetError> {
        let source_ext = match kind {
            DiagramKind::Mermaid => ".mmd",
        };
        info!("Rendering {:?} diagram ({} bytes of markup)", kind, markup.len());

        let input = self.create_temp(source_ext)?;
        tokio::fs::write(&input, markup)
            .await
            .map_err(|e| AssetError::TempFile {
                detail: format!("{}: {}", input.display(), e),
            })?;
        let output = self.create_temp(".png")?;

        self.renderer.render(&input, &output).await?;

        Ok(ResolvedAsset {
            path: output,
            temporary: true,
        })
    }

    // ── Temp files ───────────────────────────────────────────────────────

    /// Create an empty, uniquely named file and register it before returning.
    fn create_temp(&mut self, suffix: &str) -> Result<PathBuf, AssetError> {
        let path = tempfile::Builder::new()
            .prefix("docpress-")
            .suffix(suffix)
            .tempfile_in(&self.temp_dir)
            .map_err(|e| AssetError::TempFile {
                detail: format!("{}: {}", self.temp_dir.display(), e),
            })?
            .into_temp_path()
            .keep()
            .map_err(|e| AssetError::TempFile {
                detail: e.to_string(),
            })?;
        self.registry.push(path.clone());
        Ok(path)
    }
}

impl Drop for AssetResolver {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            warn!(
                "Asset resolver dropped with {} temp file(s) registered; cleaning up",
                self.registry.len()
            );
            self.cleanup_all();
        }
    }
}

/// `.ext` from the URL path when it is a known image extension, else `.png`.
fn extension_for_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
        })
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| ".png".to_string())
}
