//! Text extraction interface.
//!
//! Binary-format parsing (PDF, OOXML) is the job of the upstream
//! extraction service; this module only defines the seam the ingestion
//! pipeline consumes, plus the plain-text implementation used for
//! already-extracted uploads and for tests.

use anyhow::Result;

/// Turns a stored document's raw bytes into plain UTF-8 text.
///
/// Implementations wrap whatever extraction backend the deployment uses.
/// Unreadable or corrupt input is an error; the caller rejects the
/// document before anything reaches the chunker.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Pass-through extractor for `text/plain` content.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        if !content_type.starts_with("text/") {
            anyhow::bail!("unsupported content-type: {}", content_type);
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|e| anyhow::anyhow!("document is not valid UTF-8: {}", e))?;
        Ok(text.to_string())
    }
}
