//! Plain-text extraction from uploaded resume files.

use bytes::Bytes;
use thiserror::Error;

pub const PDF: &str = "application/pdf";
pub const PLAIN_TEXT: &str = "text/plain";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("Failed to parse PDF: {0}")]
    Pdf(String),

    #[error("File is not valid UTF-8 text")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Media type without parameters, lower-cased: `Text/Plain; charset=utf-8` → `text/plain`.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_supported(content_type: &str) -> bool {
    matches!(media_type(content_type).as_str(), PDF | PLAIN_TEXT)
}

/// Extracts text from a PDF or UTF-8 text upload. PDF parsing runs on the
/// blocking pool; a panic inside the parser surfaces as `Join`.
pub async fn extract_text(content_type: &str, bytes: Bytes) -> Result<String, ExtractError> {
    match media_type(content_type).as_str() {
        PDF => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| ExtractError::Pdf(format!("{e:?}")))
        })
        .await?,
        PLAIN_TEXT => Ok(String::from_utf8(bytes.to_vec())?),
        other => Err(ExtractError::Unsupported(other.to_string())),
    }
}
