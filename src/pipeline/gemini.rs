//! Model invocation: one `generateContent` call against the Gemini REST API.
//!
//! The request carries, in order, the RFT PDF, the TRD template PDF and the
//! prompt text as parts of a single user turn. There is no retry: a failed
//! call is reported to the caller as-is.
//!
//! ## Wire format
//!
//! ```text
//! POST {base_url}/models/{model}:generateContent
//! x-goog-api-key: <key>
//!
//! { "contents": [{ "role": "user", "parts": [
//!     { "inlineData": { "mimeType": "application/pdf", "data": "<b64>" } },
//!     { "inlineData": { "mimeType": "application/pdf", "data": "<b64>" } },
//!     { "text": "<prompt>" } ] }],
//!   "generationConfig": { "temperature": 0.2, "maxOutputTokens": 8192 } }
//! ```

use crate::config::PrefillConfig;
use crate::error::PrefillError;
use crate::pipeline::encode::InlineDocument;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Everything the model needs for one prefill.
#[derive(Debug, Clone)]
pub struct PrefillRequest {
    /// Attachments in the order they are sent.
    pub documents: Vec<InlineDocument>,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// Text produced by the model plus usage counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub finish_reason: Option<String>,
    pub prompt_tokens: u32,
    pub output_tokens: u32,
}

/// A hosted model that turns a [`PrefillRequest`] into text.
///
/// [`GeminiClient`] is the production implementation; tests and embedding
/// applications can inject their own via
/// [`crate::config::PrefillConfigBuilder::model_client`].
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier used in logs and output.
    fn name(&self) -> &str;

    async fn generate(&self, request: &PrefillRequest) -> Result<ModelResponse, PrefillError>;
}

/// reqwest-backed Gemini client.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, PrefillError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PrefillError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let model = model.trim_start_matches("models/").to_string();
        Ok(Self {
            http,
            endpoint: generate_content_url(base_url, &model),
            model,
            api_key: api_key.into(),
            timeout_secs,
        })
    }

    /// Build a client from the config, resolving the API key from the
    /// environment when the config does not carry one.
    pub fn from_config(config: &PrefillConfig) -> Result<Self, PrefillError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| PrefillError::ApiKeyMissing {
                model: config.model.clone(),
            })?;
        Self::new(
            &config.base_url,
            &config.model,
            api_key,
            config.api_timeout_secs,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &PrefillRequest) -> Result<ModelResponse, PrefillError> {
        let body = GenerateContentRequest::from_request(request);

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(map_error_status(
                status.as_u16(),
                &text,
                &self.model,
                retry_after,
            ));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|e| PrefillError::UnexpectedResponse {
                detail: format!("response body is not valid JSON: {e}"),
            })?;

        extract_response(parsed)
    }
}

impl GeminiClient {
    fn transport_error(&self, e: reqwest::Error) -> PrefillError {
        if e.is_timeout() {
            PrefillError::ApiTimeout {
                secs: self.timeout_secs,
            }
        } else {
            PrefillError::Transport(e.to_string())
        }
    }
}

/// `{base}/models/{model}:generateContent`
pub fn generate_content_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model.trim_start_matches("models/")
    )
}

// ── Request body ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart<'a> {
    InlineData(InlineBlob<'a>),
    Text(&'a str),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineBlob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_request(request: &'a PrefillRequest) -> Self {
        let mut parts: Vec<RequestPart<'a>> = request
            .documents
            .iter()
            .map(|doc| {
                RequestPart::InlineData(InlineBlob {
                    mime_type: &doc.mime_type,
                    data: &doc.data,
                })
            })
            .collect();
        parts.push(RequestPart::Text(&request.prompt));

        let generation_config =
            if request.temperature.is_some() || request.max_output_tokens.is_some() {
                Some(GenerationConfig {
                    temperature: request.temperature,
                    max_output_tokens: request.max_output_tokens,
                })
            } else {
                None
            };

        Self {
            contents: vec![RequestContent {
                role: "user",
                parts,
            }],
            generation_config,
        }
    }
}

// ── Response body ────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

/// Pull the text out of the first candidate.
///
/// Text parts are concatenated in order; "thought" parts are skipped. A
/// response without any text is an error carrying whatever reason the API
/// gave.
fn extract_response(resp: GenerateContentResponse) -> Result<ModelResponse, PrefillError> {
    let usage = resp.usage_metadata.unwrap_or_default();

    let Some(candidate) = resp.candidates.into_iter().next() else {
        let detail = match resp.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => format!("prompt blocked: {reason}"),
            None => "response contains no candidates".to_string(),
        };
        warn!("{}", detail);
        return Err(PrefillError::UnexpectedResponse { detail });
    };

    let texts: Vec<String> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();

    if texts.is_empty() {
        let detail = match candidate.finish_reason.as_deref() {
            Some(reason) => format!("candidate has no text (finish reason: {reason})"),
            None => "candidate has no text".to_string(),
        };
        warn!("{}", detail);
        return Err(PrefillError::UnexpectedResponse { detail });
    }

    debug!(
        "{} input tokens, {} output tokens, finish reason {:?}",
        usage.prompt_token_count, usage.candidates_token_count, candidate.finish_reason
    );

    Ok(ModelResponse {
        text: texts.concat(),
        finish_reason: candidate.finish_reason,
        prompt_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}

/// Map a non-2xx status and its body to a [`PrefillError`].
fn map_error_status(
    status: u16,
    body: &str,
    model: &str,
    retry_after_secs: Option<u64>,
) -> PrefillError {
    let message = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(env) => match env.error.status {
            Some(s) if !env.error.message.is_empty() => format!("{s}: {}", env.error.message),
            Some(s) => s,
            None => env.error.message,
        },
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().chars().take(500).collect(),
    };

    match status {
        401 | 403 => PrefillError::AuthError { detail: message },
        429 => PrefillError::RateLimitExceeded {
            model: model.to_string(),
            retry_after_secs,
        },
        _ => PrefillError::LlmApiError { status, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::{encode_document, PDF_MIME_TYPE};
    use serde_json::{json, Value};

    fn sample_request() -> PrefillRequest {
        PrefillRequest {
            documents: vec![
                encode_document(b"%PDF-rft", PDF_MIME_TYPE),
                encode_document(b"%PDF-trd", PDF_MIME_TYPE),
            ],
            prompt: "Fill the TRD".into(),
            temperature: None,
            max_output_tokens: None,
        }
    }

    fn parse(v: Value) -> GenerateContentResponse {
        serde_json::from_value(v).expect("valid response JSON")
    }

    #[test]
    fn request_body_orders_documents_before_prompt() {
        let req = sample_request();
        let body = serde_json::to_value(GenerateContentRequest::from_request(&req)).unwrap();

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], req.documents[0].data);
        assert_eq!(parts[1]["inlineData"]["data"], req.documents[1].data);
        assert_eq!(parts[2]["text"], "Fill the TRD");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn request_body_carries_generation_config() {
        let mut req = sample_request();
        req.temperature = Some(0.5);
        req.max_output_tokens = Some(8192);
        let body = serde_json::to_value(GenerateContentRequest::from_request(&req)).unwrap();
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);

        req.temperature = None;
        let body = serde_json::to_value(GenerateContentRequest::from_request(&req)).unwrap();
        assert!(body["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn extract_concatenates_text_parts() {
        let resp = parse(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "text": "## Section 1\n" },
                    { "text": "Company: Acme" }
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 1200, "candidatesTokenCount": 340, "totalTokenCount": 1540 }
        }));
        let out = extract_response(resp).unwrap();
        assert_eq!(out.text, "## Section 1\nCompany: Acme");
        assert_eq!(out.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(out.prompt_tokens, 1200);
        assert_eq!(out.output_tokens, 340);
    }

    #[test]
    fn extract_skips_thought_parts() {
        let resp = parse(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "thinking...", "thought": true },
                { "text": "answer" }
            ]}}]
        }));
        assert_eq!(extract_response(resp).unwrap().text, "answer");
    }

    #[test]
    fn extract_reports_block_reason() {
        let resp = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        match extract_response(resp) {
            Err(PrefillError::UnexpectedResponse { detail }) => {
                assert!(detail.contains("SAFETY"), "got: {detail}")
            }
            other => panic!("expected UnexpectedResponse, got {other:?}"),
        }
    }

    #[test]
    fn extract_reports_finish_reason_without_text() {
        let resp = parse(json!({ "candidates": [{ "finishReason": "RECITATION" }] }));
        match extract_response(resp) {
            Err(PrefillError::UnexpectedResponse { detail }) => {
                assert!(detail.contains("RECITATION"), "got: {detail}")
            }
            other => panic!("expected UnexpectedResponse, got {other:?}"),
        }
    }

    #[test]
    fn extract_empty_body_is_unexpected() {
        let resp = parse(json!({}));
        assert!(matches!(
            extract_response(resp),
            Err(PrefillError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn map_status_decodes_api_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        match map_error_status(400, body, "gemini-1.5-flash", None) {
            PrefillError::LlmApiError { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "INVALID_ARGUMENT: API key not valid");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn map_status_auth_and_rate_limit() {
        assert!(matches!(
            map_error_status(403, "{}", "m", None),
            PrefillError::AuthError { .. }
        ));
        match map_error_status(429, "", "gemini-1.5-flash", Some(12)) {
            PrefillError::RateLimitExceeded {
                model,
                retry_after_secs,
            } => {
                assert_eq!(model, "gemini-1.5-flash");
                assert_eq!(retry_after_secs, Some(12));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn map_status_plain_text_body() {
        match map_error_status(502, "Bad Gateway", "m", None) {
            PrefillError::LlmApiError { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn endpoint_url_shape() {
        assert_eq!(
            generate_content_url(
                "https://generativelanguage.googleapis.com/v1beta/",
                "models/gemini-1.5-flash"
            ),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    // ── Wire tests against a loopback server ────────────────────────────

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP reply on 127.0.0.1 and hand back the raw
    /// request (head and body) the client sent.
    async fn serve_once(
        status_line: &'static str,
        extra_headers: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let request = read_request(&mut sock).await;
            let reply = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n{extra_headers}content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            request
        });

        (base, handle)
    }

    async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn generate_sends_key_header_and_parses_candidates() {
        let (base, server) = serve_once(
            "200 OK",
            "",
            r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":9,"candidatesTokenCount":1}}"#,
        )
        .await;
        let client = GeminiClient::new(&base, "gemini-1.5-flash", "k123", 5).unwrap();

        let out = client.generate(&sample_request()).await.unwrap();
        assert_eq!(out.text, "Hi");
        assert_eq!(out.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(out.prompt_tokens, 9);
        assert_eq!(out.output_tokens, 1);

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(
            request.starts_with("POST /models/gemini-1.5-flash:generateContent HTTP/1.1"),
            "got: {request}"
        );
        assert!(lower.contains("x-goog-api-key: k123"), "got: {request}");
        assert!(request.contains("\"inlineData\""));
        assert!(request.contains("\"text\":\"Fill the TRD\""));
    }

    #[tokio::test]
    async fn generate_maps_429_with_retry_after() {
        let (base, server) = serve_once(
            "429 Too Many Requests",
            "retry-after: 7\r\n",
            r#"{"error":{"code":429,"message":"Resource exhausted","status":"RESOURCE_EXHAUSTED"}}"#,
        )
        .await;
        let client = GeminiClient::new(&base, "gemini-1.5-flash", "k", 5).unwrap();

        match client.generate(&sample_request()).await {
            Err(PrefillError::RateLimitExceeded {
                model,
                retry_after_secs,
            }) => {
                assert_eq!(model, "gemini-1.5-flash");
                assert_eq!(retry_after_secs, Some(7));
            }
            other => panic!("expected RateLimitExceeded, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn generate_rejects_non_json_success_body() {
        let (base, server) = serve_once("200 OK", "", "<html>captive portal</html>").await;
        let client = GeminiClient::new(&base, "gemini-1.5-flash", "k", 5).unwrap();

        match client.generate(&sample_request()).await {
            Err(PrefillError::UnexpectedResponse { detail }) => {
                assert!(detail.contains("not valid JSON"), "got: {detail}")
            }
            other => panic!("expected UnexpectedResponse, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn generate_maps_server_error_envelope() {
        let (base, server) = serve_once(
            "500 Internal Server Error",
            "",
            r#"{"error":{"code":500,"message":"An internal error has occurred.","status":"INTERNAL"}}"#,
        )
        .await;
        let client = GeminiClient::new(&base, "gemini-1.5-flash", "k", 5).unwrap();

        match client.generate(&sample_request()).await {
            Err(PrefillError::LlmApiError { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "INTERNAL: An internal error has occurred.");
            }
            other => panic!("expected LlmApiError, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn generate_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let _ = read_request(&mut sock).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let client = GeminiClient::new(&base, "gemini-1.5-flash", "k", 1).unwrap();

        match client.generate(&sample_request()).await {
            Err(PrefillError::ApiTimeout { secs }) => assert_eq!(secs, 1),
            other => panic!("expected ApiTimeout, got {other:?}"),
        }
        server.abort();
    }

    #[test]
    fn client_debug_redacts_key() {
        let client = GeminiClient::new("http://localhost:1", "gemini-1.5-flash", "secret-key", 5)
            .unwrap();
        let dbg = format!("{client:?}");
        assert!(!dbg.contains("secret-key"));
        assert_eq!(client.name(), "gemini-1.5-flash");
        assert!(client.endpoint().ends_with("gemini-1.5-flash:generateContent"));
    }
}
