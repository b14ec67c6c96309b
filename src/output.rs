//! Result types returned to the caller of a generation request.

use crate::error::GenerateError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one generation request.
///
/// Every recognised failure path is mapped onto this shape; the pipeline
/// never returns a bare error or panics on its caller. Serialises as
/// `{ ok, output, pages_generated, message, error, filename?, stats? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub ok: bool,
    /// Absolute path of the written PDF; `None` on failure.
    pub output: Option<PathBuf>,
    /// Pages dispatched, degraded ones included. Zero on fatal failure.
    pub pages_generated: usize,
    /// Advisory message, e.g. when the fallback directory was used.
    pub message: Option<String>,
    /// Human-readable description of a fatal failure.
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<GenerationStats>,
}

impl GenerationResult {
    pub fn success(
        output: PathBuf,
        filename: String,
        pages_generated: usize,
        message: Option<String>,
        stats: GenerationStats,
    ) -> Self {
        Self {
            ok: true,
            output: Some(output),
            pages_generated,
            message,
            error: None,
            filename: Some(filename),
            stats: Some(stats),
        }
    }

    pub fn failure(error: &GenerateError, stats: Option<GenerationStats>) -> Self {
        Self {
            ok: false,
            output: None,
            pages_generated: 0,
            message: None,
            error: Some(error.to_string()),
            filename: None,
            stats,
        }
    }

    /// Convert a failed result into `Err`, for callers that prefer `?`.
    ///
    /// The result only keeps the failure's message, so every failure comes
    /// back as [`GenerateError::Internal`] carrying the original text; the
    /// original variant is not recoverable from a result.
    pub fn into_result(self) -> Result<GenerationResult, GenerateError> {
        if self.ok {
            Ok(self)
        } else {
            Err(GenerateError::Internal(
                self.error.unwrap_or_else(|| "generation failed".to_string()),
            ))
        }
    }
}

/// Counters collected over one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Remote or diagram assets turned into local files.
    pub assets_resolved: usize,
    /// Assets that failed and were replaced by a placeholder.
    pub assets_failed: usize,
    /// Placeholder paragraphs emitted, from any cause.
    pub placeholders: usize,
    /// Temp files removed by the final cleanup.
    pub temp_files_cleaned: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_shape() {
        let r = GenerationResult::success(
            PathBuf::from("/out/report.pdf"),
            "report.pdf".into(),
            2,
            None,
            GenerationStats::default(),
        );
        let v: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(v["ok"], true);
        assert_eq!(v["output"], "/out/report.pdf");
        assert_eq!(v["pages_generated"], 2);
        assert!(v["message"].is_null());
        assert!(v["error"].is_null());
        assert_eq!(v["filename"], "report.pdf");
        assert!(r.into_result().is_ok());
    }

    #[test]
    fn failure_shape_keeps_null_fields() {
        let err = GenerateError::InvalidSpec("no pages".into());
        let r = GenerationResult::failure(&err, None);
        let v: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(v["ok"], false);
        assert!(v["output"].is_null());
        assert_eq!(v["pages_generated"], 0);
        assert!(v.get("message").is_some());
        assert!(v["error"].as_str().unwrap().contains("no pages"));
        assert!(v.get("filename").is_none());
        assert!(v.get("stats").is_none());
        match r.into_result() {
            Err(GenerateError::Internal(msg)) => {
                assert_eq!(msg, "Invalid document specification: no pages")
            }
            other => panic!("expected Internal, got {other:?}"),
        }
    }
}
