//! Prefill entry points.
//!
//! One run reads the three inputs, encodes the two PDFs, assembles the
//! prompt and waits for a single model answer. [`prefill`] returns the text
//! in memory; [`prefill_to_file`] writes it atomically; [`prefill_sync`]
//! wraps the async call for callers without a runtime.

use crate::config::PrefillConfig;
use crate::error::PrefillError;
use crate::output::{PrefillOutput, PrefillStats};
use crate::pipeline::encode::encode_pdf;
use crate::pipeline::gemini::{GeminiClient, GenerativeModel, PrefillRequest};
use crate::pipeline::input::{load_pdf, load_text, DocumentRole, DocumentSource};
use crate::pipeline::postprocess::clean_text;
use crate::progress::Stage;
use crate::prompts::{build_prompt, DEFAULT_PREFILL_TEMPLATE};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// The three documents of a prefill run.
///
/// Every slot is optional so a form-like caller can hand over whatever was
/// uploaded; [`prefill`] performs the presence checks.
#[derive(Debug, Clone, Default)]
pub struct PrefillInputs {
    /// Request for Tender PDF.
    pub rft: Option<DocumentSource>,
    /// Tender Response Document template PDF.
    pub trd: Option<DocumentSource>,
    /// Company information text.
    pub company_info: Option<DocumentSource>,
}

impl PrefillInputs {
    pub fn new(rft: DocumentSource, trd: DocumentSource, company_info: DocumentSource) -> Self {
        Self {
            rft: Some(rft),
            trd: Some(trd),
            company_info: Some(company_info),
        }
    }

    /// Build inputs from CLI-style strings (paths or URLs).
    pub fn from_args(rft: &str, trd: &str, company_info: &str) -> Self {
        Self::new(
            DocumentSource::parse(rft),
            DocumentSource::parse(trd),
            DocumentSource::parse(company_info),
        )
    }
}

/// Prefill the TRD template from the RFT and the company information.
///
/// # Errors
/// - `MissingTenderDocuments` when the RFT or the TRD is absent
/// - `MissingDocument` when the company information is absent
/// - input errors (not found, not a PDF, invalid UTF-8, download failure)
/// - `ApiKeyMissing` when no model client or key is available
/// - model errors, including `UnexpectedResponse` when the answer has no text
pub async fn prefill(
    inputs: &PrefillInputs,
    config: &PrefillConfig,
) -> Result<PrefillOutput, PrefillError> {
    let result = run(inputs, config).await;
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_error(&e.to_string());
    }
    result
}

async fn run(inputs: &PrefillInputs, config: &PrefillConfig) -> Result<PrefillOutput, PrefillError> {
    let total_start = Instant::now();

    // ── Step 1: Presence checks ──────────────────────────────────────────
    let (Some(rft_src), Some(trd_src)) = (&inputs.rft, &inputs.trd) else {
        return Err(PrefillError::MissingTenderDocuments);
    };
    let company_src = inputs
        .company_info
        .as_ref()
        .ok_or(PrefillError::MissingDocument {
            role: DocumentRole::CompanyInfo,
        })?;

    // ── Step 2: Resolve model ────────────────────────────────────────────
    let model = resolve_model(config)?;
    info!("Starting prefill with model {}", model.name());

    // ── Step 3: Load documents ───────────────────────────────────────────
    notify_stage(config, Stage::Loading);
    let timeout = config.download_timeout_secs;
    let rft = load_pdf(DocumentRole::Rft, rft_src, timeout).await?;
    let trd = load_pdf(DocumentRole::Trd, trd_src, timeout).await?;
    let company_info = load_text(DocumentRole::CompanyInfo, company_src, timeout).await?;

    // ── Step 4: Encode PDFs to base64 ────────────────────────────────────
    notify_stage(config, Stage::Encoding);
    let rft_encoded = encode_pdf(&rft);
    let trd_encoded = encode_pdf(&trd);

    // ── Step 5: Assemble prompt ──────────────────────────────────────────
    notify_stage(config, Stage::Prompting);
    let prompt = assemble_prompt(config, &company_info);
    debug!("Prompt is {} chars", prompt.chars().count());

    let mut stats = PrefillStats {
        rft_bytes: rft.bytes.len(),
        trd_bytes: trd.bytes.len(),
        company_info_bytes: company_info.len(),
        rft_encoded_len: rft_encoded.encoded_len(),
        trd_encoded_len: trd_encoded.encoded_len(),
        prompt_chars: prompt.chars().count(),
        ..Default::default()
    };

    let request = PrefillRequest {
        documents: vec![rft_encoded, trd_encoded],
        prompt,
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
    };

    // ── Step 6: Call the model ───────────────────────────────────────────
    notify_stage(config, Stage::Generating);
    if let Some(ref cb) = config.progress_callback {
        cb.on_request_start(model.name(), stats.rft_encoded_len + stats.trd_encoded_len);
    }
    info!("Waiting for response...");
    let llm_start = Instant::now();
    let response = model.generate(&request).await?;
    stats.llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 7: Clean up and report ──────────────────────────────────────
    let text = if config.raw_output {
        response.text
    } else {
        clean_text(&response.text)
    };

    stats.input_tokens = response.prompt_tokens;
    stats.output_tokens = response.output_tokens;
    stats.duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Prefill complete: {} chars in {}ms",
        text.len(),
        stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_complete(text.len());
    }

    Ok(PrefillOutput {
        text,
        model: model.name().to_string(),
        finish_reason: response.finish_reason,
        stats,
    })
}

/// Prefill and write the text directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn prefill_to_file(
    inputs: &PrefillInputs,
    output_path: impl AsRef<Path>,
    config: &PrefillConfig,
) -> Result<PrefillStats, PrefillError> {
    let output = prefill(inputs, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| PrefillError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "prefill".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, &output.text)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`prefill`].
///
/// Creates a temporary tokio runtime internally.
pub fn prefill_sync(
    inputs: &PrefillInputs,
    config: &PrefillConfig,
) -> Result<PrefillOutput, PrefillError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PrefillError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(prefill(inputs, config))
}

/// Prefill from in-memory uploads.
///
/// # Example
/// ```rust,no_run
/// use edgequake_tender::{prefill_from_bytes, PrefillConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let rft = std::fs::read("rft.pdf")?;
/// let trd = std::fs::read("trd.pdf")?;
/// let company = std::fs::read("company.txt")?;
/// let output = prefill_from_bytes(&rft, &trd, &company, &PrefillConfig::default()).await?;
/// println!("{}", output.text);
/// # Ok(())
/// # }
/// ```
pub async fn prefill_from_bytes(
    rft: &[u8],
    trd: &[u8],
    company_info: &[u8],
    config: &PrefillConfig,
) -> Result<PrefillOutput, PrefillError> {
    let inputs = PrefillInputs::new(
        DocumentSource::from_bytes("rft.pdf", rft),
        DocumentSource::from_bytes("trd.pdf", trd),
        DocumentSource::from_bytes("company_info.txt", company_info),
    );
    prefill(&inputs, config).await
}

/// Assemble the prompt without contacting the model.
///
/// Only the company information is read; the PDFs are not needed.
pub async fn preview_prompt(
    inputs: &PrefillInputs,
    config: &PrefillConfig,
) -> Result<String, PrefillError> {
    let company_src = inputs
        .company_info
        .as_ref()
        .ok_or(PrefillError::MissingDocument {
            role: DocumentRole::CompanyInfo,
        })?;
    let company_info = load_text(
        DocumentRole::CompanyInfo,
        company_src,
        config.download_timeout_secs,
    )
    .await?;
    Ok(assemble_prompt(config, &company_info))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn assemble_prompt(config: &PrefillConfig, company_info: &str) -> String {
    let template = config
        .prompt_template
        .as_deref()
        .unwrap_or(DEFAULT_PREFILL_TEMPLATE);
    build_prompt(template, company_info)
}

/// Injected client first, else a Gemini client from config and environment.
fn resolve_model(config: &PrefillConfig) -> Result<Arc<dyn GenerativeModel>, PrefillError> {
    if let Some(ref client) = config.model_client {
        return Ok(Arc::clone(client));
    }
    Ok(Arc::new(GeminiClient::from_config(config)?))
}

fn notify_stage(config: &PrefillConfig, stage: Stage) {
    debug!("{}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}
