//! Input resolution: turn a user-supplied path, URL or buffer into bytes.
//!
//! The model receives every document inline in the request body, so each
//! input is read fully into memory. Nothing touches the file system after
//! this stage. PDFs are checked for the `%PDF` magic bytes here so a wrong
//! upload fails with a readable error instead of an opaque API 400.

use crate::error::PrefillError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which slot of the form a document fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentRole {
    /// Request for Tender: requirements, scope and evaluation criteria.
    Rft,
    /// Tender Response Document template to be prefilled.
    Trd,
    /// Plain-text company profile.
    CompanyInfo,
}

impl DocumentRole {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentRole::Rft => "Request for Tender (RFT)",
            DocumentRole::Trd => "Tender Response Document (TRD)",
            DocumentRole::CompanyInfo => "Company Information",
        }
    }
}

impl fmt::Display for DocumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a document comes from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Local file.
    Path(PathBuf),
    /// HTTP/HTTPS URL, downloaded on load.
    Url(String),
    /// Bytes already in memory (e.g. an upload).
    Bytes { name: String, bytes: Vec<u8> },
}

impl DocumentSource {
    /// Interpret a CLI-style argument: URLs by prefix, everything else as a path.
    pub fn parse(input: &str) -> Self {
        if is_url(input) {
            DocumentSource::Url(input.to_string())
        } else {
            DocumentSource::Path(PathBuf::from(input))
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        DocumentSource::Bytes {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Short display name used in logs and errors.
    pub fn name(&self) -> String {
        match self {
            DocumentSource::Path(p) => p.display().to_string(),
            DocumentSource::Url(u) => u.clone(),
            DocumentSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// A document read into memory.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub role: DocumentRole,
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a PDF document and validate its magic bytes.
pub async fn load_pdf(
    role: DocumentRole,
    source: &DocumentSource,
    timeout_secs: u64,
) -> Result<LoadedDocument, PrefillError> {
    let doc = load_bytes(role, source, timeout_secs).await?;

    if doc.bytes.is_empty() {
        return Err(PrefillError::EmptyDocument {
            role,
            name: doc.name,
        });
    }

    if doc.bytes.len() < 4 || &doc.bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = doc.bytes.len().min(4);
        magic[..n].copy_from_slice(&doc.bytes[..n]);
        return Err(PrefillError::NotAPdf {
            role,
            name: doc.name,
            magic,
        });
    }

    debug!("{}: {} bytes from {}", role, doc.bytes.len(), doc.name);
    Ok(doc)
}

/// Load a UTF-8 text document. A leading byte-order mark is dropped.
pub async fn load_text(
    role: DocumentRole,
    source: &DocumentSource,
    timeout_secs: u64,
) -> Result<String, PrefillError> {
    let doc = load_bytes(role, source, timeout_secs).await?;
    decode_text(role, &doc.name, doc.bytes)
}

fn decode_text(role: DocumentRole, name: &str, bytes: Vec<u8>) -> Result<String, PrefillError> {
    let text = String::from_utf8(bytes).map_err(|e| PrefillError::InvalidText {
        role,
        name: name.to_string(),
        detail: e.utf8_error().to_string(),
    })?;

    Ok(match text.strip_prefix('\u{FEFF}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

async fn load_bytes(
    role: DocumentRole,
    source: &DocumentSource,
    timeout_secs: u64,
) -> Result<LoadedDocument, PrefillError> {
    let bytes = match source {
        DocumentSource::Path(path) => read_local(role, path).await?,
        DocumentSource::Url(url) => download_url(url, timeout_secs).await?,
        DocumentSource::Bytes { bytes, .. } => bytes.clone(),
    };

    Ok(LoadedDocument {
        role,
        name: source.name(),
        bytes,
    })
}

async fn read_local(role: DocumentRole, path: &Path) -> Result<Vec<u8>, PrefillError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PrefillError::FileNotFound {
            role,
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(PrefillError::PermissionDenied { path: path.to_path_buf() })
        }
        Err(source) => Err(PrefillError::ReadFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, PrefillError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PrefillError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PrefillError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PrefillError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PrefillError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PrefillError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
