use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Upload size limit.
pub const MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
    Txt,
}

impl DocumentFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or(mime).trim();
        match essence.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/msword" => Some(Self::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension
            .trim_start_matches('.')
            .to_ascii_lowercase()
            .as_str()
        {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "txt" | "text" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Format for a file on disk. Files without an extension are read as
    /// plain text; an unrecognised extension is rejected.
    pub fn detect(path: &Path) -> Result<Self, ExtractionError> {
        match path.extension() {
            None => Ok(Self::Txt),
            Some(ext) => {
                let ext = ext.to_string_lossy();
                Self::from_extension(&ext)
                    .ok_or_else(|| ExtractionError::UnsupportedFormat(format!(".{ext}")))
            }
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Doc => "application/msword",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Txt => "text/plain",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Txt => "txt",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to extract text from {format} document: {reason}")]
    ExtractionFailed {
        format: DocumentFormat,
        reason: String,
    },
    #[error("document is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// Extract plain text from `bytes`, collapsing whitespace.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractionError> {
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(ExtractionError::TooLarge {
            size: bytes.len(),
            limit: MAX_DOCUMENT_BYTES,
        });
    }

    let raw = match format {
        DocumentFormat::Txt => String::from_utf8(bytes.to_vec()).map_err(|err| {
            ExtractionError::ExtractionFailed {
                format,
                reason: err.to_string(),
            }
        })?,
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes).map_err(|err| {
            ExtractionError::ExtractionFailed {
                format,
                reason: err.to_string(),
            }
        })?,
        DocumentFormat::Doc | DocumentFormat::Docx => {
            return Err(ExtractionError::UnsupportedFormat(format.mime().to_string()));
        }
    };

    let cleaned = clean_text(&raw);
    debug!(%format, raw_len = raw.len(), cleaned_len = cleaned.len(), "extracted document text");
    Ok(cleaned)
}

/// Collapse every whitespace run to a single space and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
