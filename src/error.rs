//! Error types for the edgequake-tender library.
//!
//! A prefill run is a single request, so there is one error type,
//! [`PrefillError`]. Every failure is fatal for the run: missing inputs,
//! unreadable files, a misconfigured model, or a model answer that has no
//! text in it. The binary turns these into a one-line message and a
//! non-zero exit code.

use crate::pipeline::input::DocumentRole;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-tender library.
#[derive(Debug, Error)]
pub enum PrefillError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Both tender PDFs are required before anything is sent.
    #[error("Please upload both the RFT and TRD documents.")]
    MissingTenderDocuments,

    /// A required document was not supplied.
    #[error("{role} document is required but was not provided.")]
    MissingDocument { role: DocumentRole },

    /// Input file was not found at the given path.
    #[error("{role} file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { role: DocumentRole, path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Reading the file failed for another reason.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The document has no bytes at all.
    #[error("{role} document '{name}' is empty")]
    EmptyDocument { role: DocumentRole, name: String },

    /// The document was read, but is not a PDF.
    #[error("{role} document '{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf {
        role: DocumentRole,
        name: String,
        magic: [u8; 4],
    },

    /// The company information file is not UTF-8 text.
    #[error("{role} document '{name}' is not valid UTF-8 text: {detail}")]
    InvalidText {
        role: DocumentRole,
        name: String,
        detail: String,
    },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No API key was supplied and none was found in the environment.
    #[error("No API key configured for model '{model}'.\nEnter the API key first: pass --api-key or set GEMINI_API_KEY.")]
    ApiKeyMissing { model: String },

    /// The model API returned a non-retryable error.
    #[error("Model API error (HTTP {status}): {message}")]
    LlmApiError { status: u16, message: String },

    /// The model API returned HTTP 429.
    #[error("Rate limit exceeded for model '{model}'")]
    RateLimitExceeded {
        model: String,
        retry_after_secs: Option<u64>,
    },

    /// The model API rejected the credentials (401/403).
    #[error("Authentication error from model API: {detail}")]
    AuthError { detail: String },

    /// The model call did not finish within the configured timeout.
    #[error("Model call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The request never reached the API or the body could not be read.
    #[error("Model request failed: {0}")]
    Transport(String),

    /// The model answered, but the answer carries no text.
    #[error("Unexpected response format from the AI model: {detail}")]
    UnexpectedResponse { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tender_documents_display() {
        let msg = PrefillError::MissingTenderDocuments.to_string();
        assert!(msg.contains("RFT"), "got: {msg}");
        assert!(msg.contains("TRD"), "got: {msg}");
    }

    #[test]
    fn not_a_pdf_names_role() {
        let e = PrefillError::NotAPdf {
            role: DocumentRole::Trd,
            name: "template.docx".into(),
            magic: *b"PK\x03\x04",
        };
        let msg = e.to_string();
        assert!(msg.contains("Tender Response Document"), "got: {msg}");
        assert!(msg.contains("template.docx"), "got: {msg}");
    }

    #[test]
    fn api_error_display() {
        let e = PrefillError::LlmApiError {
            status: 400,
            message: "Request payload size exceeds the limit".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("payload size"));
    }

    #[test]
    fn rate_limit_display() {
        let e = PrefillError::RateLimitExceeded {
            model: "gemini-1.5-flash".into(),
            retry_after_secs: Some(30),
        };
        assert!(e.to_string().contains("gemini-1.5-flash"));
    }

    #[test]
    fn api_key_missing_hints_env_var() {
        let e = PrefillError::ApiKeyMissing {
            model: "gemini-1.5-flash".into(),
        };
        assert!(e.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn unexpected_response_display() {
        let e = PrefillError::UnexpectedResponse {
            detail: "prompt blocked: SAFETY".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("Unexpected response format"));
        assert!(msg.contains("SAFETY"));
    }
}
