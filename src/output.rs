//! Result types returned by [`crate::prefill`].

use serde::{Deserialize, Serialize};

/// The prefilled tender response plus run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefillOutput {
    /// Model text, cleaned unless `raw_output` was set.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    pub finish_reason: Option<String>,
    pub stats: PrefillStats,
}

/// Sizes, token usage and timings of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefillStats {
    pub rft_bytes: usize,
    pub trd_bytes: usize,
    pub company_info_bytes: usize,
    /// Base64 length of the RFT as sent.
    pub rft_encoded_len: usize,
    /// Base64 length of the TRD template as sent.
    pub trd_encoded_len: usize,
    pub prompt_chars: usize,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration_ms: u64,
    pub llm_duration_ms: u64,
}
