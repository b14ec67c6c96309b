//! Output location: pick a writable directory for the finished PDF.
//!
//! The requested directory is tried first; when it is absent the configured
//! fallback is used silently, and when it is present but unusable the
//! fallback is used with an advisory message. "Usable" means the directory
//! exists (it is created, with parents, when missing) and a probe file can
//! be created in it and removed again.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// A directory that was verified writable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    /// Absolute path of the chosen directory.
    pub directory: PathBuf,
    /// Present only when the requested directory was rejected.
    pub message: Option<String>,
}

impl OutputLocation {
    pub fn used_fallback(&self) -> bool {
        self.message.is_some()
    }
}

/// Neither candidate directory could be written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    #[error(
        "Cannot write to requested directory '{}' ({requested_cause}) or fallback directory '{}' \
         ({fallback_cause}). Please check permissions and configuration.",
        .requested.display(),
        .fallback.display()
    )]
    BothUnwritable {
        requested: PathBuf,
        requested_cause: String,
        fallback: PathBuf,
        fallback_cause: String,
    },

    #[error(
        "Cannot write to output directory '{}' ({fallback_cause}). \
         Please check permissions and configuration.",
        .fallback.display()
    )]
    FallbackUnwritable {
        fallback: PathBuf,
        fallback_cause: String,
    },
}

impl OutputError {
    /// The requested directory, when one was tried and rejected.
    pub fn requested(&self) -> Option<&Path> {
        match self {
            Self::BothUnwritable { requested, .. } => Some(requested),
            Self::FallbackUnwritable { .. } => None,
        }
    }

    pub fn fallback(&self) -> &Path {
        match self {
            Self::BothUnwritable { fallback, .. } | Self::FallbackUnwritable { fallback, .. } => {
                fallback
            }
        }
    }
}

/// Resolve the directory the document will be written to.
///
/// `requested` that is `None` or blank skips straight to `fallback` with no
/// advisory message.
pub fn resolve_output_dir(
    requested: Option<&Path>,
    fallback: &Path,
) -> Result<OutputLocation, OutputError> {
    let requested = requested.filter(|p| !p.as_os_str().is_empty() && !is_blank(p));

    let requested_failure = match requested {
        Some(dir) => match ensure_writable(dir) {
            Ok(directory) => {
                info!("Using requested output directory: {}", directory.display());
                return Ok(OutputLocation {
                    directory,
                    message: None,
                });
            }
            Err(e) => {
                warn!("Cannot use requested directory {}: {}", dir.display(), e);
                Some((dir.to_path_buf(), e.to_string()))
            }
        },
        None => None,
    };

    match ensure_writable(fallback) {
        Ok(directory) => {
            let message = requested.map(|r| {
                format!(
                    "Saved to {} (requested directory {} was not accessible)",
                    fallback.display(),
                    r.display()
                )
            });
            if message.is_some() {
                info!("Falling back to configured output directory: {}", directory.display());
            } else {
                info!("Using configured output directory: {}", directory.display());
            }
            Ok(OutputLocation { directory, message })
        }
        Err(e) => {
            error!("Cannot use fallback directory {}: {}", fallback.display(), e);
            let fallback_cause = e.to_string();
            let fallback = fallback.to_path_buf();
            Err(match requested_failure {
                Some((requested, requested_cause)) => OutputError::BothUnwritable {
                    requested,
                    requested_cause,
                    fallback,
                    fallback_cause,
                },
                None => OutputError::FallbackUnwritable {
                    fallback,
                    fallback_cause,
                },
            })
        }
    }
}

fn is_blank(p: &Path) -> bool {
    p.to_str().is_some_and(|s| s.trim().is_empty())
}

/// Create `dir` if needed, prove it writable, and return its absolute form.
fn ensure_writable(dir: &Path) -> io::Result<PathBuf> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)?;
        debug!("Created output directory: {}", dir.display());
    }

    // Unique probe names keep concurrent requests from tripping over each other.
    let probe = tempfile::Builder::new()
        .prefix(".docpress-write-test-")
        .tempfile_in(dir)?;
    probe.close()?;

    std::path::absolute(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// A path that can never be a directory: it lives under a regular file.
    fn unwritable(root: &Path) -> PathBuf {
        let file = root.join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        file.join("x")
    }

    #[test]
    fn existing_writable_requested_dir_is_used_as_is() {
        let tmp = TempDir::new().unwrap();
        let requested = tmp.path().join("requested");
        std::fs::create_dir(&requested).unwrap();
        let fallback = tmp.path().join("fallback");

        let loc = resolve_output_dir(Some(&requested), &fallback).unwrap();
        assert_eq!(loc.directory, std::path::absolute(&requested).unwrap());
        assert_eq!(loc.message, None);
        assert!(!fallback.exists(), "fallback must not be touched");
    }

    #[test]
    fn missing_requested_dir_is_created_with_parents() {
        let tmp = TempDir::new().unwrap();
        let requested = tmp.path().join("a/b/c");
        let loc = resolve_output_dir(Some(&requested), tmp.path()).unwrap();
        assert!(requested.is_dir());
        assert_eq!(loc.message, None);
    }

    #[test]
    fn probe_file_is_removed() {
        let tmp = TempDir::new().unwrap();
        resolve_output_dir(Some(tmp.path()), tmp.path()).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "probe left behind: {leftovers:?}");
    }

    #[test]
    fn unwritable_requested_dir_falls_back_with_message() {
        let tmp = TempDir::new().unwrap();
        let requested = unwritable(tmp.path());
        let fallback = tmp.path().join("fallback");

        let loc = resolve_output_dir(Some(&requested), &fallback).unwrap();
        assert_eq!(loc.directory, std::path::absolute(&fallback).unwrap());
        assert!(loc.used_fallback());
        let msg = loc.message.unwrap();
        assert!(msg.contains(&requested.display().to_string()), "got: {msg}");
        assert!(msg.contains(&fallback.display().to_string()), "got: {msg}");
        assert_eq!(
            msg,
            format!(
                "Saved to {} (requested directory {} was not accessible)",
                fallback.display(),
                requested.display()
            )
        );
    }

    #[test]
    fn absent_requested_dir_uses_fallback_without_message() {
        let tmp = TempDir::new().unwrap();
        let loc = resolve_output_dir(None, tmp.path()).unwrap();
        assert_eq!(loc.message, None);

        let loc = resolve_output_dir(Some(Path::new("   ")), tmp.path()).unwrap();
        assert_eq!(loc.message, None);
    }

    #[test]
    fn both_unwritable_is_an_error_naming_both() {
        let tmp = TempDir::new().unwrap();
        let requested = unwritable(tmp.path());
        let fallback = tmp.path().join("not-a-dir").join("y");

        let err = resolve_output_dir(Some(&requested), &fallback).unwrap_err();
        assert_eq!(err.requested(), Some(requested.as_path()));
        assert_eq!(err.fallback(), fallback.as_path());
        assert!(matches!(err, OutputError::BothUnwritable { .. }));
        let msg = err.to_string();
        assert!(msg.contains(&requested.display().to_string()), "got: {msg}");
        assert!(msg.contains(&fallback.display().to_string()), "got: {msg}");
    }

    #[test]
    fn unwritable_fallback_alone_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let fallback = unwritable(tmp.path());
        let err = resolve_output_dir(None, &fallback).unwrap_err();
        assert!(err.requested().is_none());
        assert!(matches!(err, OutputError::FallbackUnwritable { .. }));
        assert!(err.to_string().contains("output directory"));
    }
}
