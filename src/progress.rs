//! Progress-callback trait for prefill stage events.
//!
//! Inject an [`Arc<dyn PrefillProgressCallback>`] via
//! [`crate::config::PrefillConfigBuilder::progress_callback`] to follow a run
//! as it moves from loading the documents to waiting on the model. The CLI
//! uses it to drive a spinner; a host application can forward the events to
//! a channel or a status field instead.
//!
//! # Example
//!
//! ```rust
//! use edgequake_tender::{PrefillConfig, PrefillProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PrefillProgressCallback for Printer {
//!     fn on_stage(&self, stage: Stage) {
//!         eprintln!("{}", stage.message());
//!     }
//! }
//!
//! let config = PrefillConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn PrefillProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Steps of a prefill run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Encoding,
    Prompting,
    Generating,
}

impl Stage {
    /// Human-readable status line.
    pub fn message(&self) -> &'static str {
        match self {
            Stage::Loading => "Reading documents…",
            Stage::Encoding => "Encoding PDFs…",
            Stage::Prompting => "Building prompt…",
            Stage::Generating => "Waiting for response…",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Called by [`crate::prefill`] as the run advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PrefillProgressCallback: Send + Sync {
    /// Called when a new stage begins.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called just before the request is sent.
    ///
    /// # Arguments
    /// * `model`       — model identifier
    /// * `payload_len` — total base64 length of the attached documents
    fn on_request_start(&self, model: &str, payload_len: usize) {
        let _ = (model, payload_len);
    }

    /// Called once the model returned text.
    fn on_complete(&self, text_len: usize) {
        let _ = text_len;
    }

    /// Called when the run fails at any stage.
    fn on_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PrefillProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PrefillConfig`].
pub type ProgressCallback = Arc<dyn PrefillProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
        errors: Mutex<Vec<String>>,
    }

    impl PrefillProgressCallback for Recorder {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_error(&self, error: &str) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(Stage::Loading);
        cb.on_request_start("gemini-1.5-flash", 1024);
        cb.on_complete(42);
        cb.on_error("boom");
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_stage(Stage::Loading);
        rec.on_stage(Stage::Generating);
        rec.on_error("timeout");
        assert_eq!(
            *rec.stages.lock().unwrap(),
            vec![Stage::Loading, Stage::Generating]
        );
        assert_eq!(rec.errors.lock().unwrap().len(), 1);
    }

    #[test]
    fn generating_message_matches_cli_wording() {
        assert_eq!(Stage::Generating.to_string(), "Waiting for response…");
    }
}
