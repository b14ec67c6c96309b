//! Progress-callback trait for per-page generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GeneratorConfigBuilder::progress_callback`] to receive
//! events as the assembler walks the page list.
//!
//! # Example
//!
//! ```rust
//! use docpress::{GenerationProgressCallback, GeneratorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     degraded: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, _page_num: usize, _total: usize, degraded: bool) {
//!         if degraded {
//!             self.degraded.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { degraded: AtomicUsize::new(0) });
//! let config = GeneratorConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::document::PageKind;
use std::sync::Arc;

/// Called by the pipeline as it assembles each page.
///
/// Pages are assembled one at a time, in request order, so events for a
/// single request never interleave. The trait is `Send + Sync` because the
/// same callback may be shared by concurrent requests. All methods default to
/// no-ops.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once, after the output location is resolved and before the
    /// first page is assembled.
    fn on_generation_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page handler runs. `page_num` is 1-indexed.
    fn on_page_start(&self, page_num: usize, total_pages: usize, kind: PageKind) {
        let _ = (page_num, total_pages, kind);
    }

    /// Called when a page was dispatched. `degraded` is true when at least
    /// one placeholder replaced real content on the page.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, degraded: bool) {
        let _ = (page_num, total_pages, degraded);
    }

    /// Called for every asset that failed to resolve or embed.
    fn on_asset_error(&self, page_num: usize, error: &str) {
        let _ = (page_num, error);
    }

    /// Called once at the very end, after temp-file cleanup.
    fn on_generation_complete(&self, pages_generated: usize, ok: bool) {
        let _ = (pages_generated, ok);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        degraded: AtomicUsize,
        asset_errors: AtomicUsize,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total: usize, _kind: PageKind) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total: usize, degraded: bool) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            if degraded {
                self.degraded.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_asset_error(&self, _page_num: usize, _error: &str) {
            self.asset_errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_generation_start(2);
        cb.on_page_start(1, 2, PageKind::Title);
        cb.on_page_complete(1, 2, false);
        cb.on_asset_error(2, "HTTP 404");
        cb.on_generation_complete(2, true);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_start(1, 2, PageKind::Title);
        tracker.on_page_complete(1, 2, false);
        tracker.on_page_start(2, 2, PageKind::Diagram);
        tracker.on_asset_error(2, "HTTP 404");
        tracker.on_page_complete(2, 2, true);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.degraded.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.asset_errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn GenerationProgressCallback>();
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_generation_start(10);
    }
}
