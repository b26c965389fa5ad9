//! # edgequake-tender
//!
//! Prefill a Tender Response Document (TRD) from a Request for Tender (RFT)
//! and a plain-text company profile, using a Gemini model.
//!
//! ## Pipeline Overview
//!
//! ```text
//! RFT.pdf ─┐
//! TRD.pdf ─┼─ 1. Input    read files, URLs or in-memory uploads
//! info.txt ┘  2. Encode   PDF bytes → standard base64 inline data
//!             3. Prompt   company profile → instruction template
//!             4. Model    one generateContent call, no retry
//!             5. Polish   whitespace cleanup (fences, CRLF, blank runs)
//!             6. Output   prefilled text + size/token stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_tender::{prefill, PrefillConfig, PrefillInputs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let config = PrefillConfig::default();
//!     let inputs = PrefillInputs::from_args("rft.pdf", "trd_template.pdf", "company.txt");
//!     let output = prefill(&inputs, &config).await?;
//!     println!("{}", output.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tender-prefill` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prefill;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PrefillConfig, PrefillConfigBuilder};
pub use error::PrefillError;
pub use output::{PrefillOutput, PrefillStats};
pub use pipeline::gemini::{GeminiClient, GenerativeModel, ModelResponse, PrefillRequest};
pub use pipeline::input::{DocumentRole, DocumentSource};
pub use prefill::{
    prefill, prefill_from_bytes, prefill_sync, prefill_to_file, preview_prompt, PrefillInputs,
};
pub use progress::{NoopProgressCallback, PrefillProgressCallback, ProgressCallback, Stage};
