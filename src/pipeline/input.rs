//! Input resolution: load a résumé from a local path, a URL or memory.
//!
//! Résumés are small (a few hundred KB), so the whole document is held in
//! memory. The kind is decided from the magic bytes first, since uploads are
//! frequently renamed. Only when the content is not recognised does the file
//! extension decide (a PDF with bytes before its `%PDF` header, say).

use crate::error::Cv2CareerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Accepted résumé formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
}

impl DocumentKind {
    /// MIME type sent with the attachment.
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Png => "image/png",
            DocumentKind::Jpeg => "image/jpeg",
        }
    }

    /// Detect the kind from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            return Some(DocumentKind::Pdf);
        }
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) => Some(DocumentKind::Png),
            Ok(image::ImageFormat::Jpeg) => Some(DocumentKind::Jpeg),
            _ => None,
        }
    }

    /// Kind implied by the extension of a file name or URL path.
    pub fn from_extension(name: &str) -> Option<Self> {
        let path = name.split(['?', '#']).next().unwrap_or(name);
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "png" => Some(DocumentKind::Png),
            "jpg" | "jpeg" => Some(DocumentKind::Jpeg),
            _ => None,
        }
    }

    pub fn is_image(self) -> bool {
        !matches!(self, DocumentKind::Pdf)
    }
}

/// A résumé loaded into memory.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    /// File name or URL, for messages.
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl ResumeDocument {
    /// Validate an in-memory upload.
    ///
    /// Content that matches no known signature falls back to the extension
    /// of `name`; anything else is [`Cv2CareerError::UnsupportedDocument`].
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, Cv2CareerError> {
        let name = name.into();
        if bytes.is_empty() {
            return Err(Cv2CareerError::EmptyDocument { name });
        }
        let kind = DocumentKind::sniff(&bytes).or_else(|| {
            let kind = DocumentKind::from_extension(&name)?;
            warn!("'{}' has unrecognised content; trusting its extension ({:?})", name, kind);
            Some(kind)
        });
        let kind = kind.ok_or_else(|| {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            Cv2CareerError::UnsupportedDocument {
                name: name.clone(),
                detail: format!("unrecognised content (first bytes: {magic:?})"),
            }
        })?;
        debug!("Loaded '{}' as {:?}, {} bytes", name, kind, bytes.len());
        Ok(Self { name, kind, bytes })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory résumé.
///
/// URLs are downloaded; anything else is treated as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResumeDocument, Cv2CareerError> {
    if input.trim().is_empty() {
        return Err(Cv2CareerError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

async fn read_local(path: &Path) -> Result<ResumeDocument, Cv2CareerError> {
    let path: PathBuf = path.to_path_buf();
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Cv2CareerError::PermissionDenied { path: path.clone() },
        _ => Cv2CareerError::FileNotFound { path: path.clone() },
    })?;
    ResumeDocument::from_bytes(path.display().to_string(), bytes)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResumeDocument, Cv2CareerError> {
    info!("Downloading résumé from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Cv2CareerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Cv2CareerError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Cv2CareerError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Cv2CareerError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Cv2CareerError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    ResumeDocument::from_bytes(url, bytes.to_vec())
}
