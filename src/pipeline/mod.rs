//! Pipeline stages for tender-response prefilling.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ gemini ──▶ postprocess
//! (path/URL/bytes)  (base64)  (one call)  (cleanup)
//! ```
//!
//! 1. [`input`]  — read each document into memory; PDFs must start with `%PDF`,
//!    the company profile must be UTF-8
//! 2. [`encode`] — base64-wrap each PDF as inline request data
//! 3. [`gemini`] — the only stage with network I/O to the model
//! 4. [`postprocess`] — whitespace cleanup of the answer

pub mod encode;
pub mod gemini;
pub mod input;
pub mod postprocess;
