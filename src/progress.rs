//! Progress-callback trait for stage and per-slide generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through outline, rendering, and assembly.
//! The CLI draws a progress bar from these events; the task manager turns
//! them into the progress strings clients poll for.
//!
//! # Example
//!
//! ```rust
//! use edgequake_text2pptx::{GenerationConfig, GenerationProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide_number: usize, total_slides: usize, _path: &Path) {
//!         let done = self.rendered.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("slide {slide_number}/{total_slides} rendered ({done} so far)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//! let config = GenerationConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the generation pipeline as it advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events of one run arrive in order from a single
/// task, but one callback instance may be shared by concurrent runs.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called before the outline request is sent.
    fn on_outline_start(&self) {}

    /// Called once the outline is known.
    ///
    /// # Arguments
    /// * `slide_count`: number of planned slides
    /// * `placeholder`: the model output was unusable and the placeholder
    ///   outline is being used instead
    fn on_outline_complete(&self, slide_count: usize, placeholder: bool) {
        let _ = (slide_count, placeholder);
    }

    /// Called just before a slide's background is requested.
    fn on_slide_start(&self, slide_number: usize, total_slides: usize) {
        let _ = (slide_number, total_slides);
    }

    /// Called when a background has been saved to `path`.
    fn on_slide_complete(&self, slide_number: usize, total_slides: usize, path: &Path) {
        let _ = (slide_number, total_slides, path);
    }

    /// Called when a slide is dropped (no prompt, or every transport missed).
    fn on_slide_error(&self, slide_number: usize, total_slides: usize, error: &str) {
        let _ = (slide_number, total_slides, error);
    }

    /// Called before the deck file is written.
    fn on_assembly_start(&self, slide_count: usize) {
        let _ = slide_count;
    }

    /// Called once the deck is on disk.
    ///
    /// # Arguments
    /// * `rendered`: slides in the deck
    /// * `planned` : slides in the outline
    fn on_generation_complete(&self, rendered: usize, planned: usize) {
        let _ = (rendered, planned);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: Mutex<Vec<usize>>,
        outcome: Mutex<Option<(usize, usize)>>,
    }

    impl GenerationProgressCallback for TrackingCallback {
        fn on_slide_start(&self, _slide_number: usize, _total_slides: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_complete(&self, _slide_number: usize, _total_slides: usize, _path: &Path) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_slide_error(&self, slide_number: usize, _total_slides: usize, _error: &str) {
            self.errors.lock().unwrap().push(slide_number);
        }

        fn on_generation_complete(&self, rendered: usize, planned: usize) {
            *self.outcome.lock().unwrap() = Some((rendered, planned));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_outline_start();
        cb.on_outline_complete(5, false);
        cb.on_slide_start(1, 5);
        cb.on_slide_complete(1, 5, Path::new("a.png"));
        cb.on_slide_error(2, 5, "miss");
        cb.on_assembly_start(4);
        cb.on_generation_complete(4, 5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        for n in 1..=3 {
            tracker.on_slide_start(n, 3);
        }
        tracker.on_slide_complete(1, 3, Path::new("1.png"));
        tracker.on_slide_error(2, 3, "all transports missed");
        tracker.on_slide_complete(3, 3, Path::new("3.png"));
        tracker.on_generation_complete(2, 3);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(*tracker.errors.lock().unwrap(), vec![2]);
        assert_eq!(*tracker.outcome.lock().unwrap(), Some((2, 3)));
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_outline_complete(3, true);
    }
}
