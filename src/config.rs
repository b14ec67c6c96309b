//! Configuration for document generation.
//!
//! All generation behaviour is controlled through [`GeneratorConfig`], built
//! via its [`GeneratorConfigBuilder`]. The configuration is explicit: the
//! library never reads environment variables. The CLI maps `OUTPUT_DIR` and
//! its flags onto the builder.

use crate::error::GenerateError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a document-generation request.
///
/// Built via [`GeneratorConfig::builder()`] or using
/// [`GeneratorConfig::default()`].
///
/// # Example
/// ```rust
/// use docpress::GeneratorConfig;
///
/// let config = GeneratorConfig::builder()
///     .fallback_output_dir("./output")
///     .download_timeout_secs(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.download_timeout_secs, 10);
/// ```
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Directory used when the request names no directory, or when the
    /// requested one cannot be written. Default: `$HOME/pdf-output`.
    pub fallback_output_dir: PathBuf,

    /// Timeout for each remote asset download in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Wall-clock limit for one diagram render in seconds. Default: 30.
    ///
    /// On expiry the renderer process is killed and the page gets a
    /// placeholder, exactly as for a renderer that exited with an error.
    pub render_timeout_secs: u64,

    /// External diagram renderer. Default: `npx -p @mermaid-js/mermaid-cli mmdc`.
    pub renderer: RendererCommand,

    /// Background passed to the renderer's `-b` flag. Default: `transparent`.
    pub renderer_background: String,

    /// `User-Agent` header for asset downloads.
    pub user_agent: String,

    /// Box every embedded image is fitted into. Default: 4 × 3 inches.
    pub image_box: ImageBox,

    /// Directory for resolver temp files. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Optional per-page event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            fallback_output_dir: default_fallback_dir(),
            download_timeout_secs: 30,
            render_timeout_secs: 30,
            renderer: RendererCommand::default(),
            renderer_background: "transparent".to_string(),
            user_agent: format!("docpress/{}", env!("CARGO_PKG_VERSION")),
            image_box: ImageBox::default(),
            temp_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("fallback_output_dir", &self.fallback_output_dir)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("renderer", &self.renderer)
            .field("renderer_background", &self.renderer_background)
            .field("user_agent", &self.user_agent)
            .field("image_box", &self.image_box)
            .field("temp_dir", &self.temp_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn GenerationProgressCallback>"),
            )
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// `$HOME/pdf-output`, or `./pdf-output` when no home directory is known.
fn default_fallback_dir() -> PathBuf {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(|h| PathBuf::from(h).join("pdf-output"))
        .unwrap_or_else(|| PathBuf::from("pdf-output"))
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn fallback_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.fallback_output_dir = dir.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn renderer(mut self, renderer: RendererCommand) -> Self {
        self.config.renderer = renderer;
        self
    }

    pub fn renderer_background(mut self, background: impl Into<String>) -> Self {
        self.config.renderer_background = background.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn image_box(mut self, width_pt: f32, height_pt: f32) -> Self {
        self.config.image_box = ImageBox {
            width_pt,
            height_pt,
        };
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, GenerateError> {
        let c = &self.config;
        if c.fallback_output_dir.as_os_str().is_empty() {
            return Err(GenerateError::InvalidConfig(
                "Fallback output directory must not be empty".into(),
            ));
        }
        if c.download_timeout_secs == 0 {
            return Err(GenerateError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        if c.render_timeout_secs == 0 {
            return Err(GenerateError::InvalidConfig(
                "Render timeout must be ≥ 1 second".into(),
            ));
        }
        if c.renderer.program.trim().is_empty() {
            return Err(GenerateError::InvalidConfig(
                "Renderer program must not be empty".into(),
            ));
        }
        if !c.image_box.is_valid() {
            return Err(GenerateError::InvalidConfig(format!(
                "Image box must be positive and finite, got {}×{}",
                c.image_box.width_pt, c.image_box.height_pt
            )));
        }
        Ok(self.config)
    }
}

// ── Value types ──────────────────────────────────────────────────────────

/// Program plus leading arguments used to rasterise diagram markup.
///
/// The resolver appends `-i <input> -o <output> -b <background>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl RendererCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Default for RendererCommand {
    fn default() -> Self {
        RendererCommand::new("npx")
            .arg("-p")
            .arg("@mermaid-js/mermaid-cli")
            .arg("mmdc")
    }
}

/// Target display box for embedded images, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageBox {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl Default for ImageBox {
    fn default() -> Self {
        Self {
            width_pt: 288.0,
            height_pt: 216.0,
        }
    }
}

impl ImageBox {
    /// Both sides finite and greater than zero.
    pub fn is_valid(&self) -> bool {
        let side = |v: f32| v.is_finite() && v > 0.0;
        side(self.width_pt) && side(self.height_pt)
    }
}
