//! Document encoding: raw bytes → base64 `InlineDocument`.
//!
//! Gemini accepts whole PDFs as `inline_data` parts of the JSON request
//! body. The data must be standard base64 (RFC 4648 alphabet, padded); the
//! URL-safe alphabet is rejected by the API.

use crate::pipeline::input::LoadedDocument;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A document embedded in the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineDocument {
    pub mime_type: String,
    /// Standard base64 of the document bytes.
    pub data: String,
}

impl InlineDocument {
    pub fn encoded_len(&self) -> usize {
        self.data.len()
    }
}

/// Base64-encode arbitrary bytes under the given MIME type.
pub fn encode_document(bytes: &[u8], mime_type: &str) -> InlineDocument {
    InlineDocument {
        mime_type: mime_type.to_string(),
        data: STANDARD.encode(bytes),
    }
}

/// Encode a loaded PDF for the model request.
pub fn encode_pdf(doc: &LoadedDocument) -> InlineDocument {
    let encoded = encode_document(&doc.bytes, PDF_MIME_TYPE);
    debug!(
        "Encoded {} → {} bytes base64",
        doc.role,
        encoded.encoded_len()
    );
    encoded
}
