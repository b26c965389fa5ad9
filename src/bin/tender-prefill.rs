//! CLI binary for edgequake-tender.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PrefillConfig` and prints the prefilled document.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_tender::{
    prefill, prefill_to_file, preview_prompt, DocumentSource, PrefillConfig, PrefillInputs,
    PrefillProgressCallback, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that follows the prefill stages.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Prefilling");
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl PrefillProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        self.bar.set_message(stage.message());
    }

    fn on_request_start(&self, model: &str, payload_len: usize) {
        self.bar.println(format!(
            "  {} sending 2 PDFs to {}  {}",
            dim("→"),
            bold(model),
            dim(&format!("{:.1} MB base64", payload_len as f64 / 1_048_576.0)),
        ));
    }

    fn on_complete(&self, text_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} The TRD document has been prefilled successfully!  {}",
            green("✔"),
            dim(&format!("{text_len} chars"))
        );
    }

    fn on_error(&self, _error: &str) {
        // main prints the error.
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Prefill to stdout
  tender-prefill --rft rft.pdf --trd trd_template.pdf --company-info company.txt

  # Write to a file
  tender-prefill --rft rft.pdf --trd trd.pdf --company-info company.txt -o trd_prefilled.md

  # Documents straight from a tender portal
  tender-prefill --rft https://tenders.example.org/rft.pdf --trd trd.pdf --company-info company.txt

  # Inspect the prompt without calling the model (no API key needed)
  tender-prefill --company-info company.txt --print-prompt

  # JSON output with token usage
  tender-prefill --rft rft.pdf --trd trd.pdf --company-info company.txt --json > out.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  GOOGLE_API_KEY          Fallback API key variable
  TENDER_MODEL            Override model ID (default: gemini-1.5-flash)
  TENDER_BASE_URL         Override the Gemini REST root

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Prefill:         tender-prefill --rft rft.pdf --trd trd.pdf --company-info company.txt
"#;

/// Prefill a Tender Response Document from an RFT and a company profile.
#[derive(Parser, Debug)]
#[command(
    name = "tender-prefill",
    version,
    about = "Prefill a Tender Response Document (TRD) from a Request for Tender (RFT) using Gemini",
    long_about = "Upload a Request for Tender (RFT) document and a Tender Response Document (TRD) \
template together with a plain-text company profile. The TRD is prefilled from the RFT and the \
company information by a Gemini model; the result is printed as Markdown.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Request for Tender (RFT) PDF: path or HTTP/HTTPS URL.
    #[arg(long, env = "TENDER_RFT")]
    rft: Option<String>,

    /// Tender Response Document (TRD) template PDF: path or HTTP/HTTPS URL.
    #[arg(long, env = "TENDER_TRD")]
    trd: Option<String>,

    /// Company information (UTF-8 text): path or HTTP/HTTPS URL.
    #[arg(long, env = "TENDER_COMPANY_INFO")]
    company_info: Option<String>,

    /// Write the prefilled document to this file instead of stdout.
    #[arg(short, long, env = "TENDER_OUTPUT")]
    output: Option<PathBuf>,

    /// Gemini model ID.
    #[arg(long, env = "TENDER_MODEL", default_value = "gemini-1.5-flash")]
    model: String,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini REST root URL.
    #[arg(long, env = "TENDER_BASE_URL")]
    base_url: Option<String>,

    /// Sampling temperature (0.0–2.0). Model default when unset.
    #[arg(long, env = "TENDER_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max output tokens. Model default when unset.
    #[arg(long, env = "TENDER_MAX_OUTPUT_TOKENS")]
    max_output_tokens: Option<u32>,

    /// Path to a text file with a custom prompt template ({company_info} placeholder).
    #[arg(long, env = "TENDER_PROMPT_TEMPLATE")]
    prompt_template: Option<PathBuf>,

    /// Print the model text exactly as returned.
    #[arg(long)]
    raw: bool,

    /// Output structured JSON (PrefillOutput) instead of the document.
    #[arg(long)]
    json: bool,

    /// Print the assembled prompt and exit without calling the model.
    #[arg(long)]
    print_prompt: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "TENDER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TENDER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TENDER_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, env = "TENDER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Model call timeout in seconds.
    #[arg(long, env = "TENDER_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs; verbose wins over both.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.print_prompt && io::stderr().is_terminal();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let inputs = PrefillInputs {
        rft: cli.rft.as_deref().map(DocumentSource::parse),
        trd: cli.trd.as_deref().map(DocumentSource::parse),
        company_info: cli.company_info.as_deref().map(DocumentSource::parse),
    };

    // ── Prompt preview mode ──────────────────────────────────────────────
    if cli.print_prompt {
        let config = build_config(&cli, None, None).await?;
        let prompt = preview_prompt(&inputs, &config)
            .await
            .context("Failed to assemble prompt")?;
        println!("{prompt}");
        return Ok(());
    }

    // ── API key ──────────────────────────────────────────────────────────
    let api_key = match cli.api_key.clone().filter(|k| !k.trim().is_empty()) {
        Some(key) => Some(key),
        None if should_prompt_for_key(&inputs) => prompt_for_api_key()?,
        None => None,
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PrefillProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, api_key, progress_cb).await?;

    // ── Run prefill ──────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = prefill_to_file(&inputs, output_path, &config)
            .await
            .context("Prefill failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {}ms  →  {}",
                green("✔"),
                stats.duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.input_tokens.to_string()),
                dim(&stats.output_tokens.to_string()),
            );
        }
    } else {
        let output = prefill(&inputs, &config).await.context("Prefill failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            if !cli.quiet {
                handle
                    .write_all(b"### Prefilled Tender Response Document\n\n")
                    .context("Failed to write to stdout")?;
            }
            handle
                .write_all(output.text.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {}ms total",
                dim(&output.stats.input_tokens.to_string()),
                dim(&output.stats.output_tokens.to_string()),
                output.stats.duration_ms,
            );
        }
    }

    Ok(())
}

/// Missing tender documents are reported before anyone is asked for a key.
fn should_prompt_for_key(inputs: &PrefillInputs) -> bool {
    inputs.rft.is_some() && inputs.trd.is_some()
}

/// Ask for the API key on an interactive terminal when none is configured.
///
/// Returns `None` when stdin is not a terminal or a key is already available
/// from `GOOGLE_API_KEY`; the library then reports the missing key.
fn prompt_for_api_key() -> Result<Option<String>> {
    if PrefillConfig::default().resolve_api_key().is_some() || !io::stdin().is_terminal() {
        return Ok(None);
    }

    eprint!("Enter API key first: ");
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read API key from stdin")?;

    let key = line.trim().to_string();
    Ok((!key.is_empty()).then_some(key))
}

/// Map CLI args to `PrefillConfig`.
async fn build_config(
    cli: &Cli,
    api_key: Option<String>,
    progress: Option<ProgressCallback>,
) -> Result<PrefillConfig> {
    let mut builder = PrefillConfig::builder()
        .model(cli.model.clone())
        .raw_output(cli.raw)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.prompt_template {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(key) = api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_output_tokens {
        builder = builder.max_output_tokens(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
