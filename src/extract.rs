//! Text extraction for uploaded documents.
//!
//! Callers supply bytes + content-type; this module returns plain UTF-8 text.
//! PDF pages are extracted individually and joined in page order.

/// Supported MIME types for extraction.
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_TEXT: &str = "text/plain";

/// Extraction error. No panic on malformed input; callers skip or abort the document.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedContentType(String),
    Pdf(String),
    Utf8(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedContentType(ct) => {
                write!(f, "unsupported content-type: {}", ct)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Utf8(e) => write!(f, "text is not valid UTF-8: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Maps a file extension to the MIME type used by [`extract_text`].
pub fn content_type_for_path(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        "txt" => Some(MIME_TEXT),
        _ => None,
    }
}

/// Extracts plain text from document content. Returns a UTF-8 string or an error.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_MARKDOWN | MIME_TEXT => extract_utf8(bytes),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages.join("\n"))
}

fn extract_utf8(bytes: &[u8]) -> Result<String, ExtractError> {
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|e| ExtractError::Utf8(e.to_string()))
}
