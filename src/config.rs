//! Configuration types for tender-response prefilling.
//!
//! All prefill behaviour is controlled through [`PrefillConfig`], built via
//! its [`PrefillConfigBuilder`]. Callers set only what they care about and
//! rely on documented defaults for the rest.

use crate::error::PrefillError;
use crate::pipeline::gemini::GenerativeModel;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini REST root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables consulted, in order, when no API key is set.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Configuration for a prefill run.
///
/// # Example
/// ```rust
/// use edgequake_tender::PrefillConfig;
///
/// let config = PrefillConfig::builder()
///     .model("gemini-1.5-pro")
///     .temperature(0.2)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-1.5-pro");
/// ```
#[derive(Clone)]
pub struct PrefillConfig {
    /// Gemini model identifier. Default: `gemini-1.5-flash`.
    pub model: String,

    /// API key. If None, read from `GEMINI_API_KEY` then `GOOGLE_API_KEY`.
    /// An empty string counts as missing.
    pub api_key: Option<String>,

    /// REST root, without the `/models/...` suffix.
    pub base_url: String,

    /// Sampling temperature. None leaves the model default in place.
    pub temperature: Option<f32>,

    /// Output token cap. None leaves the model default in place.
    pub max_output_tokens: Option<u32>,

    /// Custom prompt template. If None, uses
    /// [`crate::prompts::DEFAULT_PREFILL_TEMPLATE`].
    pub prompt_template: Option<String>,

    /// Skip whitespace cleanup of the model text. Default: false.
    pub raw_output: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for the model call in seconds. Default: 300.
    ///
    /// Two full PDFs in one request make for slow answers; a minute is
    /// regularly not enough for long tenders.
    pub api_timeout_secs: u64,

    /// Pre-constructed model. Takes precedence over `model`/`api_key`.
    pub model_client: Option<Arc<dyn GenerativeModel>>,

    /// Receives stage events during the run.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PrefillConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_output_tokens: None,
            prompt_template: None,
            raw_output: false,
            download_timeout_secs: 120,
            api_timeout_secs: 300,
            model_client: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PrefillConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefillConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("prompt_template", &self.prompt_template.as_ref().map(|t| t.len()))
            .field("raw_output", &self.raw_output)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "model_client",
                &self.model_client.as_ref().map(|_| "<dyn GenerativeModel>"),
            )
            .finish()
    }
}

impl PrefillConfig {
    /// Create a new builder for `PrefillConfig`.
    pub fn builder() -> PrefillConfigBuilder {
        PrefillConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured key, else the first non-empty key env var.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key_with(self.api_key.as_deref(), |name| std::env::var(name).ok())
    }
}

fn resolve_api_key_with(
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|&name| lookup(name))
        .map(|k| k.trim().to_string())
        .find(|k| !k.is_empty())
}

/// Builder for [`PrefillConfig`].
#[derive(Debug)]
pub struct PrefillConfigBuilder {
    config: PrefillConfig,
}

impl PrefillConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = Some(n);
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn raw_output(mut self, v: bool) -> Self {
        self.config.raw_output = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn model_client(mut self, client: Arc<dyn GenerativeModel>) -> Self {
        self.config.model_client = Some(client);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PrefillConfig, PrefillError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(PrefillError::InvalidConfig("model must not be empty".into()));
        }
        if c.base_url.trim().is_empty() {
            return Err(PrefillError::InvalidConfig("base URL must not be empty".into()));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(PrefillError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_output_tokens == Some(0) {
            return Err(PrefillError::InvalidConfig(
                "max output tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
