//! Source acquisition.
//!
//! A [`SourceResolver`] turns a caller-supplied reference (path, link, upload id)
//! into something the encoder can read directly. Any failure is a
//! [`SourceError`]; the session treats it as non-retryable for that item.

use std::path::Path;

use async_trait::async_trait;

use crate::error::SourceError;

/// URL schemes the encoder can read without a download step.
pub const STREAM_SCHEMES: &[&str] = &["http", "https", "rtmp", "rtmps", "rtsp", "srt"];

/// Produces a ready-to-read input for a source reference.
#[async_trait]
pub trait SourceResolver: Send + Sync + 'static {
    /// Resolves `reference` to a local path or streamable URL.
    async fn resolve(&self, reference: &str) -> Result<String, SourceError>;
}

/// Accepts stream URLs as-is and local files that exist.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalResolver;

#[async_trait]
impl SourceResolver for LocalResolver {
    async fn resolve(&self, reference: &str) -> Result<String, SourceError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SourceError::new(reference, "empty source reference"));
        }
        if is_stream_url(reference) {
            return Ok(reference.to_string());
        }
        if reference.contains("://") {
            return Err(SourceError::new(reference, "unsupported url scheme"));
        }

        match tokio::fs::metadata(Path::new(reference)).await {
            Ok(meta) if meta.is_file() => Ok(reference.to_string()),
            Ok(_) => Err(SourceError::new(reference, "not a regular file")),
            Err(e) => Err(SourceError::new(reference, e.to_string())),
        }
    }
}

/// True if `reference` starts with one of [`STREAM_SCHEMES`].
pub fn is_stream_url(reference: &str) -> bool {
    reference
        .split_once("://")
        .is_some_and(|(scheme, rest)| {
            !rest.is_empty() && STREAM_SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme))
        })
}
